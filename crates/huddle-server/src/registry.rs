//! Room registry for participant and reservation tracking.
//!
//! The registry maintains bidirectional mappings: room -> sessions (for
//! relay fan-out) and session -> room (for cleanup on disconnect), plus the
//! pending-reservation table fed by the room-creation endpoint and the
//! per-address connection counters behind admission control.
//!
//! Purely in-memory and synchronous. The driver owns the only instance; all
//! state dies with the process, which is the point of an ephemeral relay.

use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::{Duration, Instant};

use huddle_proto::RoomId;

/// Hard occupancy cap per room. Two parties, never more.
pub const MAX_ROOM_OCCUPANCY: usize = 2;

/// A registered room member.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Public key encoding announced at registration, relayed verbatim.
    pub public_key: String,
    /// The room this session occupies.
    pub room_id: RoomId,
}

/// Tracks rooms, their members, pending reservations, and per-address
/// connection counts.
#[derive(Debug, Default)]
pub struct RoomRegistry {
    /// Session ID -> participant (only registered sessions appear here)
    participants: HashMap<u64, Participant>,
    /// Room ID -> member session IDs
    rooms: HashMap<RoomId, HashSet<u64>>,
    /// Reserved-but-unoccupied rooms and when they were reserved
    pending: HashMap<RoomId, Instant>,
    /// Source address -> live connection count
    connections_per_ip: HashMap<IpAddr, u32>,
}

impl RoomRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Count a new connection from `addr` against the per-address cap.
    ///
    /// Returns `false` and counts nothing when the cap is already reached.
    pub fn admit(&mut self, addr: IpAddr, cap: u32) -> bool {
        let count = self.connections_per_ip.entry(addr).or_insert(0);
        if *count >= cap {
            return false;
        }
        *count += 1;
        true
    }

    /// Release one connection slot for `addr`. Empty counters are removed
    /// so the map only holds addresses with live connections.
    pub fn release(&mut self, addr: IpAddr) {
        if let Some(count) = self.connections_per_ip.get_mut(&addr) {
            *count = count.saturating_sub(1);
            if *count == 0 {
                self.connections_per_ip.remove(&addr);
            }
        }
    }

    /// Reserve a room for a creator that has not connected yet. Idempotent;
    /// a repeat reservation refreshes the timestamp. Reserving an occupied
    /// room is a no-op.
    pub fn reserve(&mut self, room_id: RoomId, now: Instant) {
        if self.rooms.contains_key(&room_id) {
            return;
        }
        self.pending.insert(room_id, now);
    }

    /// Whether a room is either occupied or holds a live reservation.
    pub fn room_exists(&self, room_id: &RoomId) -> bool {
        self.rooms.contains_key(room_id) || self.pending.contains_key(room_id)
    }

    /// Drop reservations older than `ttl`, returning how many were purged.
    pub fn sweep_pending(&mut self, now: Instant, ttl: Duration) -> usize {
        let before = self.pending.len();
        self.pending.retain(|_, reserved_at| now.duration_since(*reserved_at) < ttl);
        before - self.pending.len()
    }

    /// Current members of a room, with their announced keys.
    pub fn members(&self, room_id: &RoomId) -> impl Iterator<Item = (u64, &Participant)> + '_ {
        self.rooms
            .get(room_id)
            .into_iter()
            .flat_map(|s| s.iter().copied())
            .filter_map(|sid| self.participants.get(&sid).map(|p| (sid, p)))
    }

    /// Member count for a room.
    pub fn occupancy(&self, room_id: &RoomId) -> usize {
        self.rooms.get(room_id).map_or(0, HashSet::len)
    }

    /// The participant record for a session, if registered.
    pub fn participant(&self, session_id: u64) -> Option<&Participant> {
        self.participants.get(&session_id)
    }

    /// Register a session into a room. The occupancy check is the caller's;
    /// joining consumes any pending reservation.
    pub fn join(&mut self, session_id: u64, participant: Participant) {
        self.pending.remove(&participant.room_id);
        self.rooms.entry(participant.room_id.clone()).or_default().insert(session_id);
        self.participants.insert(session_id, participant);
    }

    /// Remove a session from its room, if any. Returns the removed record.
    /// Emptied rooms are deleted outright; they do not return to pending.
    pub fn leave(&mut self, session_id: u64) -> Option<Participant> {
        let participant = self.participants.remove(&session_id)?;
        if let Some(members) = self.rooms.get_mut(&participant.room_id) {
            members.remove(&session_id);
            if members.is_empty() {
                self.rooms.remove(&participant.room_id);
            }
        }
        Some(participant)
    }

    /// Live connections currently counted for `addr`.
    pub fn connections_for(&self, addr: IpAddr) -> u32 {
        self.connections_per_ip.get(&addr).copied().unwrap_or(0)
    }

    /// Number of occupied rooms.
    pub fn room_count(&self) -> usize {
        self.rooms.len()
    }

    /// Number of live reservations.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }
}
