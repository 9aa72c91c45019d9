//! The chat client state machine.
//!
//! [`ChatClient`] is sans-IO: it owns the session lifecycle (connect,
//! register, pair, chat, teardown) as a pure event processor. A transport
//! shim feeds it [`ClientEvent`]s and executes the returned
//! [`ClientAction`]s in order. This keeps every protocol and crypto decision
//! in one synchronously testable place; the shim never makes one.
//!
//! Incoming ciphertext is decrypted inside event processing, so the
//! transcript order is exactly the arrival order. There is no reordering
//! buffer and no sender-timestamp sort.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use huddle_crypto::{
    KeyPair, RsaPublicKey, decrypt_direct, decrypt_message, encrypt_message, import_public_key,
};
use huddle_proto::{ClientFrame, RoomId, ServerFrame};

use crate::event::{ClientAction, ClientEvent, ConnectionStatus, Notice};
use crate::store::SessionStore;
use crate::watchdog::InactivityWatchdog;

/// How long one connection attempt may take before it is abandoned.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Session-store key prefix for the per-room peer key cache. The full key
/// is the prefix followed by the room id.
const PEER_KEY_PREFIX: &str = "huddle.peerKey.";

/// Connection attempts before the client gives up and resets to entry.
pub const MAX_CONNECT_ATTEMPTS: u32 = 3;

/// Session lifecycle. Transitions only move forward except for the
/// `Paired` -> `Registered` edge when the peer leaves.
#[derive(Debug)]
enum Phase {
    /// Dialing, or dialed and waiting for the registration ack.
    Connecting {
        attempt: u32,
        deadline: Instant,
    },
    /// Registered in the room, alone.
    Registered,
    /// A peer is present; its imported key is the only copy we hold.
    Paired {
        peer_key: Box<RsaPublicKey>,
    },
    /// Torn down. Terminal.
    Closed,
}

/// One end of a two-party encrypted session.
pub struct ChatClient<S: SessionStore> {
    room_id: RoomId,
    keys: KeyPair,
    phase: Phase,
    watchdog: InactivityWatchdog,
    /// Session-scoped storage for the peer key cache. Written on pairing,
    /// cleared the moment the peer leaves or the session ends.
    store: S,
    /// Local ids of optimistically echoed messages, confirmed FIFO: the
    /// relay acks a single peer's messages in the order it received them.
    pending_echoes: VecDeque<u64>,
    next_local_id: u64,
}

impl<S: SessionStore> ChatClient<S> {
    /// Start a session for `room_id`. The transport shim should begin
    /// dialing immediately; the first attempt's deadline starts at `now`.
    pub fn new(room_id: RoomId, keys: KeyPair, store: S, now: Instant) -> Self {
        Self {
            room_id,
            keys,
            phase: Phase::Connecting { attempt: 1, deadline: now + CONNECT_TIMEOUT },
            watchdog: InactivityWatchdog::new(now),
            store,
            pending_echoes: VecDeque::new(),
            next_local_id: 0,
        }
    }

    /// The peer's encoded key as cached for this room, if a peer is or was
    /// recently present. Lets a remounting view restore the peer identity
    /// without waiting for the relay.
    pub fn cached_peer_key(&self) -> Option<String> {
        self.store.get(&self.peer_cache_key())
    }

    fn peer_cache_key(&self) -> String {
        format!("{PEER_KEY_PREFIX}{}", self.room_id)
    }

    /// Status for the UI indicator.
    pub fn status(&self) -> ConnectionStatus {
        match self.phase {
            Phase::Connecting { .. } => ConnectionStatus::Connecting,
            Phase::Registered => ConnectionStatus::Waiting,
            Phase::Paired { .. } => ConnectionStatus::Paired,
            Phase::Closed => ConnectionStatus::Closed,
        }
    }

    /// Whether a peer is present and messages can be sent.
    pub fn is_paired(&self) -> bool {
        matches!(self.phase, Phase::Paired { .. })
    }

    /// Advance the state machine. Actions must be executed in order.
    pub fn process_event(&mut self, event: ClientEvent, now: Instant) -> Vec<ClientAction> {
        if matches!(self.phase, Phase::Closed) {
            return Vec::new();
        }
        match event {
            ClientEvent::TransportConnected => self.on_connected(),
            ClientEvent::TransportClosed => self.on_transport_closed(now),
            ClientEvent::Frame(frame) => self.on_frame(frame),
            ClientEvent::SendPlaintext(text) => self.on_send(&text),
            ClientEvent::Activity => {
                self.watchdog.record_activity(now);
                Vec::new()
            },
            ClientEvent::Tick => self.on_tick(now),
            ClientEvent::Teardown => self.teardown(),
        }
    }

    fn on_connected(&mut self) -> Vec<ClientAction> {
        let Ok(public_key) = self.keys.export_public() else {
            // Export of our own freshly generated key cannot fail in
            // practice; treat it as fatal rather than limping on.
            let mut actions = self.teardown();
            actions.push(ClientAction::Notify(Notice::ConnectionFailed));
            return actions;
        };
        vec![ClientAction::SendFrame(ClientFrame::Register {
            public_key,
            room_id: self.room_id.to_string(),
        })]
    }

    fn on_transport_closed(&mut self, now: Instant) -> Vec<ClientAction> {
        // Peer state is stale the moment the socket dies.
        self.pending_echoes.clear();
        match self.phase {
            // A failed dial burns an attempt; an established session that
            // drops starts over with a fresh budget.
            Phase::Connecting { attempt, .. } => self.redial(attempt, now),
            _ => {
                self.phase = Phase::Connecting { attempt: 1, deadline: now + CONNECT_TIMEOUT };
                vec![ClientAction::Status(ConnectionStatus::Connecting), ClientAction::Reconnect]
            },
        }
    }

    fn on_tick(&mut self, now: Instant) -> Vec<ClientAction> {
        if let Phase::Connecting { attempt, deadline } = &self.phase {
            let (attempt, deadline) = (*attempt, *deadline);
            if now >= deadline {
                let mut actions = vec![ClientAction::Disconnect];
                actions.extend(self.redial(attempt, now));
                return actions;
            }
        }
        if self.watchdog.poll(now) {
            let mut actions = self.teardown();
            actions.push(ClientAction::Notify(Notice::SessionEnded));
            actions.push(ClientAction::ResetToEntry);
            return actions;
        }
        Vec::new()
    }

    /// Consume one connection attempt. Dial again or give up.
    fn redial(&mut self, spent: u32, now: Instant) -> Vec<ClientAction> {
        if spent >= MAX_CONNECT_ATTEMPTS {
            let mut actions = self.teardown();
            actions.push(ClientAction::Notify(Notice::ConnectionFailed));
            actions.push(ClientAction::ResetToEntry);
            return actions;
        }
        self.phase = Phase::Connecting { attempt: spent + 1, deadline: now + CONNECT_TIMEOUT };
        vec![ClientAction::Reconnect, ClientAction::Status(ConnectionStatus::Connecting)]
    }

    fn on_frame(&mut self, frame: ServerFrame) -> Vec<ClientAction> {
        match frame {
            ServerFrame::RegisterAck { .. } => {
                if matches!(self.phase, Phase::Connecting { .. }) {
                    self.phase = Phase::Registered;
                    vec![ClientAction::Status(ConnectionStatus::Waiting)]
                } else {
                    Vec::new()
                }
            },
            ServerFrame::PeersList { peers } => match peers.first() {
                Some(encoded) => self.pair_with(encoded),
                None => Vec::new(),
            },
            ServerFrame::PeerConnected { peer_key, .. } => self.pair_with(&peer_key),
            ServerFrame::PeerDisconnected { .. } => {
                // Drop the cached key; the next joiner brings a new one.
                self.phase = Phase::Registered;
                self.store.remove(&self.peer_cache_key());
                self.pending_echoes.clear();
                vec![
                    ClientAction::Status(ConnectionStatus::Waiting),
                    ClientAction::Notify(Notice::PeerLeft),
                ]
            },
            ServerFrame::RoomMessage { id, message, timestamp, .. } => {
                self.on_room_message(id, &message, timestamp)
            },
            ServerFrame::MessageAck { message_id, .. } => match self.pending_echoes.pop_front() {
                Some(local_id) => vec![ClientAction::ConfirmDelivery { local_id, message_id }],
                None => Vec::new(),
            },
            ServerFrame::RoomFull => {
                let mut actions = self.teardown();
                actions.push(ClientAction::Notify(Notice::RoomFull));
                actions.push(ClientAction::ResetToEntry);
                actions
            },
            ServerFrame::Error { message, .. } => {
                vec![ClientAction::Notify(Notice::RelayError(message))]
            },
        }
    }

    fn pair_with(&mut self, encoded: &str) -> Vec<ClientAction> {
        match import_public_key(encoded) {
            Ok(peer_key) => {
                self.phase = Phase::Paired { peer_key: Box::new(peer_key) };
                self.store.set(&self.peer_cache_key(), encoded.to_string());
                vec![
                    ClientAction::Status(ConnectionStatus::Paired),
                    ClientAction::Notify(Notice::PeerJoined),
                ]
            },
            Err(e) => {
                // A key we cannot import is a peer we cannot talk to.
                vec![ClientAction::Notify(Notice::RelayError(format!(
                    "unusable peer key: {e}"
                )))]
            },
        }
    }

    fn on_send(&mut self, text: &str) -> Vec<ClientAction> {
        let Phase::Paired { peer_key } = &self.phase else {
            return vec![ClientAction::Notify(Notice::NoPeer)];
        };
        match encrypt_message(text, peer_key) {
            Ok(blob) => {
                let local_id = self.next_local_id;
                self.next_local_id += 1;
                self.pending_echoes.push_back(local_id);
                vec![
                    ClientAction::Echo { local_id, text: text.to_string() },
                    ClientAction::SendFrame(ClientFrame::RoomMessage { message: blob }),
                ]
            },
            Err(e) => vec![ClientAction::Notify(Notice::RelayError(format!(
                "encryption failed: {e}"
            )))],
        }
    }

    fn on_room_message(&mut self, id: String, blob: &str, timestamp: u64) -> Vec<ClientAction> {
        // Hybrid first, then the legacy per-chunk format older peers send.
        let decrypted = decrypt_message(blob, self.keys.private())
            .or_else(|_| decrypt_direct(blob, self.keys.private()));
        match decrypted {
            Ok(text) => vec![ClientAction::Deliver { id, text, timestamp }],
            Err(_) => vec![ClientAction::Notify(Notice::UndecryptableMessage)],
        }
    }

    fn teardown(&mut self) -> Vec<ClientAction> {
        // Dropping Paired releases the only copy of the peer key.
        self.phase = Phase::Closed;
        self.watchdog.cancel();
        self.store.remove(&self.peer_cache_key());
        self.pending_echoes.clear();
        vec![
            ClientAction::Disconnect,
            ClientAction::EraseKeys,
            ClientAction::Status(ConnectionStatus::Closed),
        ]
    }
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use huddle_crypto::export_public_key;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::store::MemorySessionStore;

    /// RSA keygen is expensive; every test shares one pair per side.
    fn side_keys() -> &'static (KeyPair, KeyPair) {
        static PAIRS: OnceLock<(KeyPair, KeyPair)> = OnceLock::new();
        PAIRS.get_or_init(|| {
            let mut rng = StdRng::seed_from_u64(0x6A6F_696E);
            (
                KeyPair::generate_with_rng(&mut rng).unwrap(),
                KeyPair::generate_with_rng(&mut rng).unwrap(),
            )
        })
    }

    fn room() -> RoomId {
        RoomId::parse("a1b2c3d4").unwrap()
    }

    fn paired_client(now: Instant) -> (ChatClient<MemorySessionStore>, &'static KeyPair) {
        let (own, peer) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);
        client.process_event(ClientEvent::TransportConnected, now);
        client.process_event(
            ClientEvent::Frame(ServerFrame::RegisterAck { status: huddle_proto::AckStatus::Ok }),
            now,
        );
        let peer_encoded = export_public_key(peer.public()).unwrap();
        client.process_event(
            ClientEvent::Frame(ServerFrame::PeersList { peers: vec![peer_encoded] }),
            now,
        );
        assert!(client.is_paired());
        (client, peer)
    }

    #[test]
    fn registers_on_connect() {
        let now = Instant::now();
        let (own, _) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);

        let actions = client.process_event(ClientEvent::TransportConnected, now);
        let [ClientAction::SendFrame(ClientFrame::Register { public_key, room_id })] =
            actions.as_slice()
        else {
            panic!("expected a register frame, got {actions:?}");
        };
        assert_eq!(*public_key, own.export_public().unwrap());
        assert_eq!(room_id, "a1b2c3d4");
    }

    #[test]
    fn register_ack_moves_to_waiting() {
        let now = Instant::now();
        let (own, _) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);
        client.process_event(ClientEvent::TransportConnected, now);

        let actions = client.process_event(
            ClientEvent::Frame(ServerFrame::RegisterAck { status: huddle_proto::AckStatus::Ok }),
            now,
        );
        assert_eq!(actions, vec![ClientAction::Status(ConnectionStatus::Waiting)]);
        assert_eq!(client.status(), ConnectionStatus::Waiting);
    }

    #[test]
    fn peer_connected_pairs() {
        let now = Instant::now();
        let (own, peer) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);
        client.process_event(ClientEvent::TransportConnected, now);
        client.process_event(
            ClientEvent::Frame(ServerFrame::RegisterAck { status: huddle_proto::AckStatus::Ok }),
            now,
        );

        let actions = client.process_event(
            ClientEvent::Frame(ServerFrame::PeerConnected {
                peer_key: export_public_key(peer.public()).unwrap(),
                socket_id: "7".to_string(),
            }),
            now,
        );
        assert!(actions.contains(&ClientAction::Notify(Notice::PeerJoined)));
        assert!(client.is_paired());
    }

    #[test]
    fn garbage_peer_key_does_not_pair() {
        let now = Instant::now();
        let (own, _) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);
        client.process_event(ClientEvent::TransportConnected, now);
        client.process_event(
            ClientEvent::Frame(ServerFrame::RegisterAck { status: huddle_proto::AckStatus::Ok }),
            now,
        );

        let actions = client.process_event(
            ClientEvent::Frame(ServerFrame::PeersList { peers: vec!["!!!".to_string()] }),
            now,
        );
        assert!(!client.is_paired());
        assert!(matches!(actions.as_slice(), [ClientAction::Notify(Notice::RelayError(_))]));
    }

    #[test]
    fn send_before_pairing_is_refused() {
        let now = Instant::now();
        let (own, _) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);

        let actions = client.process_event(ClientEvent::SendPlaintext("hi".to_string()), now);
        assert_eq!(actions, vec![ClientAction::Notify(Notice::NoPeer)]);
    }

    #[test]
    fn sent_message_decrypts_on_the_other_side() {
        let now = Instant::now();
        let (mut alice, peer) = paired_client(now);

        let actions = alice.process_event(ClientEvent::SendPlaintext("hello bob".to_string()), now);
        let [ClientAction::Echo { local_id: 0, text }, ClientAction::SendFrame(ClientFrame::RoomMessage { message })] =
            actions.as_slice()
        else {
            panic!("expected echo then send, got {actions:?}");
        };
        assert_eq!(text, "hello bob");

        // Feed the relayed blob to a client owning the recipient key.
        let mut bob = ChatClient::new(room(), peer.clone(), MemorySessionStore::new(), now);
        let delivered = bob.process_event(
            ClientEvent::Frame(ServerFrame::RoomMessage {
                id: "1-42".to_string(),
                from: "alice".to_string(),
                message: message.clone(),
                timestamp: 42,
            }),
            now,
        );
        assert_eq!(
            delivered,
            vec![ClientAction::Deliver {
                id: "1-42".to_string(),
                text: "hello bob".to_string(),
                timestamp: 42,
            }]
        );
    }

    #[test]
    fn legacy_format_still_decrypts() {
        let now = Instant::now();
        let (own, _) = side_keys();
        let blob = huddle_crypto::encrypt_direct("old style", own.public()).unwrap();

        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);
        let actions = client.process_event(
            ClientEvent::Frame(ServerFrame::RoomMessage {
                id: "1-1".to_string(),
                from: "peer".to_string(),
                message: blob,
                timestamp: 1,
            }),
            now,
        );
        assert!(matches!(
            actions.as_slice(),
            [ClientAction::Deliver { text, .. }] if text == "old style"
        ));
    }

    #[test]
    fn undecryptable_message_is_dropped_with_notice() {
        let now = Instant::now();
        let (own, _) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);

        let actions = client.process_event(
            ClientEvent::Frame(ServerFrame::RoomMessage {
                id: "1-1".to_string(),
                from: "peer".to_string(),
                message: "not|an|envelope".to_string(),
                timestamp: 1,
            }),
            now,
        );
        assert_eq!(actions, vec![ClientAction::Notify(Notice::UndecryptableMessage)]);
    }

    #[test]
    fn acks_confirm_echoes_in_fifo_order() {
        let now = Instant::now();
        let (mut client, _) = paired_client(now);

        client.process_event(ClientEvent::SendPlaintext("one".to_string()), now);
        client.process_event(ClientEvent::SendPlaintext("two".to_string()), now);

        let ack = ServerFrame::MessageAck {
            status: huddle_proto::AckStatus::Delivered,
            message_id: "1-100".to_string(),
        };
        let first = client.process_event(ClientEvent::Frame(ack.clone()), now);
        let second = client.process_event(ClientEvent::Frame(ack.clone()), now);
        let confirmed = |local_id| ClientAction::ConfirmDelivery {
            local_id,
            message_id: "1-100".to_string(),
        };
        assert_eq!(first, vec![confirmed(0)]);
        assert_eq!(second, vec![confirmed(1)]);

        // A stray ack with nothing pending is ignored.
        assert!(client.process_event(ClientEvent::Frame(ack), now).is_empty());
    }

    #[test]
    fn peer_departure_returns_to_waiting_and_clears_key() {
        let now = Instant::now();
        let (mut client, _) = paired_client(now);

        let actions = client.process_event(
            ClientEvent::Frame(ServerFrame::PeerDisconnected { peer_key: "gone".to_string() }),
            now,
        );
        assert!(actions.contains(&ClientAction::Notify(Notice::PeerLeft)));
        assert_eq!(client.status(), ConnectionStatus::Waiting);

        let refused = client.process_event(ClientEvent::SendPlaintext("hi".to_string()), now);
        assert_eq!(refused, vec![ClientAction::Notify(Notice::NoPeer)]);
    }

    #[test]
    fn room_full_tears_down_and_resets() {
        let now = Instant::now();
        let (own, _) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), now);
        client.process_event(ClientEvent::TransportConnected, now);

        let actions = client.process_event(ClientEvent::Frame(ServerFrame::RoomFull), now);
        assert!(actions.contains(&ClientAction::Disconnect));
        assert!(actions.contains(&ClientAction::Notify(Notice::RoomFull)));
        assert!(actions.contains(&ClientAction::ResetToEntry));
        assert_eq!(client.status(), ConnectionStatus::Closed);

        // Closed is terminal.
        assert!(client.process_event(ClientEvent::TransportConnected, now).is_empty());
    }

    #[test]
    fn connect_timeout_retries_then_gives_up() {
        let start = Instant::now();
        let (own, _) = side_keys();
        let mut client = ChatClient::new(room(), own.clone(), MemorySessionStore::new(), start);

        // Attempts 1 and 2 time out and trigger a redial.
        let mut now = start;
        for _ in 0..2 {
            now += CONNECT_TIMEOUT;
            let actions = client.process_event(ClientEvent::Tick, now);
            assert!(actions.contains(&ClientAction::Reconnect), "got {actions:?}");
        }

        // The third timeout exhausts the budget.
        now += CONNECT_TIMEOUT;
        let actions = client.process_event(ClientEvent::Tick, now);
        assert!(actions.contains(&ClientAction::Notify(Notice::ConnectionFailed)));
        assert!(actions.contains(&ClientAction::ResetToEntry));
        assert_eq!(client.status(), ConnectionStatus::Closed);
    }

    #[test]
    fn transport_drop_mid_session_redials() {
        let now = Instant::now();
        let (mut client, _) = paired_client(now);

        let actions = client.process_event(ClientEvent::TransportClosed, now);
        assert_eq!(
            actions,
            vec![ClientAction::Status(ConnectionStatus::Connecting), ClientAction::Reconnect]
        );
        assert_eq!(client.status(), ConnectionStatus::Connecting);
    }

    #[test]
    fn inactivity_fires_once_and_ends_the_session() {
        let start = Instant::now();
        let (mut client, _) = paired_client(start);

        let quiet = start + crate::watchdog::INACTIVITY_TIMEOUT;
        let actions = client.process_event(ClientEvent::Tick, quiet);
        assert!(actions.contains(&ClientAction::Notify(Notice::SessionEnded)));
        assert!(actions.contains(&ClientAction::Disconnect));
        assert!(actions.contains(&ClientAction::ResetToEntry));
        assert_eq!(client.status(), ConnectionStatus::Closed);
    }

    #[test]
    fn activity_defers_the_watchdog() {
        let start = Instant::now();
        let (mut client, _) = paired_client(start);

        let later = start + crate::watchdog::INACTIVITY_TIMEOUT - Duration::from_secs(1);
        client.process_event(ClientEvent::Activity, later);

        let would_have_fired = start + crate::watchdog::INACTIVITY_TIMEOUT;
        assert!(client.process_event(ClientEvent::Tick, would_have_fired).is_empty());
        assert!(client.is_paired());
    }

    #[test]
    fn teardown_is_deterministic() {
        let now = Instant::now();
        let (mut client, _) = paired_client(now);

        let actions = client.process_event(ClientEvent::Teardown, now);
        assert_eq!(
            actions,
            vec![
                ClientAction::Disconnect,
                ClientAction::EraseKeys,
                ClientAction::Status(ConnectionStatus::Closed),
            ]
        );
        // No timer can fire after teardown.
        assert!(client.process_event(ClientEvent::Tick, now + Duration::from_secs(3600)).is_empty());
    }

    #[test]
    fn session_end_paths_order_key_destruction() {
        // Every path that closes the session must instruct the shim to
        // destroy stored key material.
        let start = Instant::now();
        let (mut idle, _) = paired_client(start);
        let quiet = start + crate::watchdog::INACTIVITY_TIMEOUT;
        let fired = idle.process_event(ClientEvent::Tick, quiet);
        assert!(fired.contains(&ClientAction::EraseKeys));

        let (mut full, _) = paired_client(start);
        let refused = full.process_event(ClientEvent::Frame(ServerFrame::RoomFull), start);
        assert!(refused.contains(&ClientAction::EraseKeys));
    }

    #[test]
    fn pairing_caches_the_peer_key_per_room() {
        let now = Instant::now();
        let (client, peer) = paired_client(now);
        let expected = export_public_key(peer.public()).unwrap();
        assert_eq!(client.cached_peer_key(), Some(expected));
    }

    #[test]
    fn peer_departure_clears_the_cached_key() {
        let now = Instant::now();
        let (mut client, _) = paired_client(now);
        assert!(client.cached_peer_key().is_some());

        client.process_event(
            ClientEvent::Frame(ServerFrame::PeerDisconnected { peer_key: "gone".to_string() }),
            now,
        );
        assert!(client.cached_peer_key().is_none());
    }

    #[test]
    fn teardown_clears_the_cached_key() {
        let now = Instant::now();
        let (mut client, _) = paired_client(now);
        assert!(client.cached_peer_key().is_some());

        client.process_event(ClientEvent::Teardown, now);
        assert!(client.cached_peer_key().is_none());
    }
}
