//! Relay driver.
//!
//! The driver is the whole relay as a synchronous event processor: the
//! transport runtime feeds it [`RelayEvent`]s and executes the returned
//! [`RelayAction`]s verbatim. No IO, no clock, no locks in here; every
//! behavior is testable by feeding events and asserting on actions.
//!
//! The relay treats message payloads as opaque blobs. It assigns ids,
//! timestamps, and routes; it never inspects contents.

use std::collections::HashMap;
use std::net::IpAddr;
use std::time::{Duration, Instant};

use huddle_proto::{AckStatus, ClientFrame, ErrorCode, MAX_MESSAGE_BYTES, RoomId, ServerFrame};

use crate::registry::{MAX_ROOM_OCCUPANCY, Participant, RoomRegistry};

/// Default per-address connection cap.
pub const MAX_CONNECTIONS_PER_IP: u32 = 8;

/// How long a reserved room waits for its creator before expiring.
pub const PENDING_ROOM_TTL: Duration = Duration::from_secs(15 * 60);

/// How often the runtime should sweep expired reservations.
pub const SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Relay tuning knobs.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Per-address connection cap.
    pub max_connections_per_ip: u32,
    /// Reservation lifetime for unoccupied rooms.
    pub pending_room_ttl: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            max_connections_per_ip: MAX_CONNECTIONS_PER_IP,
            pending_room_ttl: PENDING_ROOM_TTL,
        }
    }
}

/// Events the relay driver processes, produced by the transport runtime.
#[derive(Debug, Clone)]
pub enum RelayEvent {
    /// A connection finished its transport handshake.
    ConnectionAccepted {
        /// Runtime-assigned connection id.
        session_id: u64,
        /// Source address, for admission control.
        addr: IpAddr,
    },

    /// A decoded frame arrived from a connection.
    FrameReceived {
        /// Sending connection.
        session_id: u64,
        /// The decoded frame.
        frame: ClientFrame,
        /// Receive time, Unix milliseconds. Stamped into relayed messages.
        now_ms: u64,
    },

    /// A connection closed, cleanly or not.
    ConnectionClosed {
        /// The closed connection.
        session_id: u64,
    },
}

/// Actions the driver produces, executed in order by the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayAction {
    /// Send a frame to one connection.
    Send {
        /// Target connection.
        session_id: u64,
        /// Frame to encode and write.
        frame: ServerFrame,
    },

    /// Close a connection.
    Close {
        /// Connection to close.
        session_id: u64,
    },
}

/// The relay state machine: admission control, room membership, pending
/// reservations, and message fan-out.
#[derive(Debug, Default)]
pub struct RelayDriver {
    registry: RoomRegistry,
    /// Session -> source address, for counter release on close. Present for
    /// every accepted connection, registered or not.
    connections: HashMap<u64, IpAddr>,
    config: RelayConfig,
}

impl RelayDriver {
    /// Create a driver with the given configuration.
    pub fn new(config: RelayConfig) -> Self {
        Self { registry: RoomRegistry::new(), connections: HashMap::new(), config }
    }

    /// Process one event. Actions must be executed in order.
    pub fn process_event(&mut self, event: RelayEvent) -> Vec<RelayAction> {
        match event {
            RelayEvent::ConnectionAccepted { session_id, addr } => {
                self.on_accepted(session_id, addr)
            },
            RelayEvent::FrameReceived { session_id, frame, now_ms } => match frame {
                ClientFrame::Register { public_key, room_id } => {
                    self.on_register(session_id, public_key, &room_id)
                },
                ClientFrame::RoomMessage { message } => {
                    self.on_room_message(session_id, message, now_ms)
                },
            },
            RelayEvent::ConnectionClosed { session_id } => self.on_closed(session_id),
        }
    }

    /// Reserve `room_id` for a creator that has not connected yet.
    /// Idempotent. Fed by the room-creation endpoint.
    pub fn reserve(&mut self, room_id: RoomId, now: Instant) {
        self.registry.reserve(room_id, now);
    }

    /// Whether `room_id` is occupied or holds a live reservation.
    pub fn room_exists(&self, room_id: &RoomId) -> bool {
        self.registry.room_exists(room_id)
    }

    /// Drop reservations older than the configured TTL. Returns how many
    /// were purged, for the runtime's log line.
    pub fn sweep(&mut self, now: Instant) -> usize {
        self.registry.sweep_pending(now, self.config.pending_room_ttl)
    }

    fn on_accepted(&mut self, session_id: u64, addr: IpAddr) -> Vec<RelayAction> {
        if !self.registry.admit(addr, self.config.max_connections_per_ip) {
            return vec![
                RelayAction::Send {
                    session_id,
                    frame: ServerFrame::Error {
                        code: Some(ErrorCode::ConnectionLimitExceeded),
                        message: "Too many connections from your address".to_string(),
                    },
                },
                RelayAction::Close { session_id },
            ];
        }
        self.connections.insert(session_id, addr);
        Vec::new()
    }

    fn on_register(
        &mut self,
        session_id: u64,
        public_key: String,
        raw_room_id: &str,
    ) -> Vec<RelayAction> {
        if !self.connections.contains_key(&session_id) {
            return Vec::new();
        }
        let Ok(room_id) = RoomId::parse(raw_room_id) else {
            return vec![invalid_registration(session_id)];
        };
        if public_key.trim().is_empty() {
            return vec![invalid_registration(session_id)];
        }

        let mut actions = Vec::new();

        // Re-registration is an implicit leave: the old room sees a normal
        // departure before the new join happens.
        if self.registry.participant(session_id).is_some() {
            actions.extend(self.depart(session_id));
        }

        if self.registry.occupancy(&room_id) >= MAX_ROOM_OCCUPANCY {
            actions.push(RelayAction::Send { session_id, frame: ServerFrame::RoomFull });
            return actions;
        }

        // Snapshot the incumbents before the join mutates membership.
        let incumbents: Vec<(u64, String)> = self
            .registry
            .members(&room_id)
            .map(|(sid, p)| (sid, p.public_key.clone()))
            .collect();

        self.registry
            .join(session_id, Participant { public_key: public_key.clone(), room_id });

        // Pairing frames only flow once the room actually has a pair: the
        // first joiner hears nothing until a peer arrives.
        if !incumbents.is_empty() {
            actions.push(RelayAction::Send {
                session_id,
                frame: ServerFrame::PeersList {
                    peers: incumbents.iter().map(|(_, key)| key.clone()).collect(),
                },
            });
            for (incumbent, _) in &incumbents {
                actions.push(RelayAction::Send {
                    session_id: *incumbent,
                    frame: ServerFrame::PeerConnected {
                        peer_key: public_key.clone(),
                        socket_id: session_id.to_string(),
                    },
                });
            }
        }
        actions.push(RelayAction::Send {
            session_id,
            frame: ServerFrame::RegisterAck { status: AckStatus::Ok },
        });
        actions
    }

    fn on_room_message(
        &mut self,
        session_id: u64,
        message: String,
        now_ms: u64,
    ) -> Vec<RelayAction> {
        if message.len() > MAX_MESSAGE_BYTES {
            return vec![RelayAction::Send {
                session_id,
                frame: ServerFrame::Error {
                    code: Some(ErrorCode::MessageTooLarge),
                    message: format!("Message exceeds {MAX_MESSAGE_BYTES} bytes"),
                },
            }];
        }
        let Some(sender) = self.registry.participant(session_id) else {
            return vec![RelayAction::Send {
                session_id,
                frame: ServerFrame::Error {
                    code: Some(ErrorCode::NotRegistered),
                    message: "User not registered".to_string(),
                },
            }];
        };
        let from = sender.public_key.clone();
        let room_id = sender.room_id.clone();

        let message_id = format!("{session_id}-{now_ms}");
        let mut actions: Vec<RelayAction> = self
            .registry
            .members(&room_id)
            .filter(|(sid, _)| *sid != session_id)
            .map(|(sid, _)| RelayAction::Send {
                session_id: sid,
                frame: ServerFrame::RoomMessage {
                    id: message_id.clone(),
                    from: from.clone(),
                    message: message.clone(),
                    timestamp: now_ms,
                },
            })
            .collect();
        actions.push(RelayAction::Send {
            session_id,
            frame: ServerFrame::MessageAck { status: AckStatus::Delivered, message_id },
        });
        actions
    }

    fn on_closed(&mut self, session_id: u64) -> Vec<RelayAction> {
        let actions = self.depart(session_id);
        if let Some(addr) = self.connections.remove(&session_id) {
            self.registry.release(addr);
        }
        actions
    }

    /// Remove a session from its room and notify the remaining members.
    fn depart(&mut self, session_id: u64) -> Vec<RelayAction> {
        let Some(gone) = self.registry.leave(session_id) else {
            return Vec::new();
        };
        self.registry
            .members(&gone.room_id)
            .map(|(sid, _)| RelayAction::Send {
                session_id: sid,
                frame: ServerFrame::PeerDisconnected { peer_key: gone.public_key.clone() },
            })
            .collect()
    }
}

fn invalid_registration(session_id: u64) -> RelayAction {
    RelayAction::Send {
        session_id,
        frame: ServerFrame::Error {
            code: Some(ErrorCode::InvalidRegistration),
            message: "Invalid registration data".to_string(),
        },
    }
}
