//! Session manager
//!
//! Routes inbound messages to sessions and collects what they want to send.
//!
//! ## Architecture
//!
//! ```text
//! Transport (caller)
//!   ├─ SessionManager ← THIS MODULE
//!   │   ├─ ProtocolDispatcher (opens sessions)
//!   │   └─ Sessions, keyed by (peer, protocol)
//!   └─ ShareVersionStore (shared by all sessions)
//! ```
//!
//! ## Routing
//!
//! 1. Decode the inbound bytes.
//! 2. If an open session exists for `(peer, protocol)`, feed it the message.
//!    A finished session is replaced when the message starts a new
//!    conversation.
//! 3. Otherwise ask the dispatcher whether the message starts one.
//! 4. Messages that match no session and start nothing are discarded.
//!
//! Every call returns the [`Outbound`] messages the touched sessions queued.
//! Iteration is ordered by `(peer, protocol)` so runs are reproducible.

use std::{
    collections::{BTreeMap, btree_map::Entry},
    sync::Arc,
    time::Instant,
};

use derec_proto::{Envelope, Message, ProtocolType};

use crate::{
    dispatcher::{ProtocolDispatcher, SessionConfig},
    error::SessionError,
    peer::PeerId,
    session::Session,
    store::ShareVersionStore,
};

/// A message a session wants delivered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    /// Destination
    pub peer: PeerId,
    /// Message to encode and send
    pub message: Message,
}

impl Outbound {
    /// Serialize for the transport.
    ///
    /// Sealed messages need the envelope agreed with `peer`.
    pub fn encode(&self, envelope: Option<Envelope<'_>>) -> Result<Vec<u8>, SessionError> {
        Ok(self.message.encode(envelope)?)
    }
}

/// Owns every session of one local identity.
pub struct SessionManager<S: ShareVersionStore + 'static> {
    dispatcher: ProtocolDispatcher,
    store: Arc<S>,
    sessions: BTreeMap<(PeerId, ProtocolType), Session>,
}

impl<S: ShareVersionStore + 'static> SessionManager<S> {
    /// Create a manager whose sessions share `store`
    pub fn new(config: SessionConfig, store: S) -> Self {
        let store = Arc::new(store);
        let shared: Arc<dyn ShareVersionStore> = store.clone();
        Self {
            dispatcher: ProtocolDispatcher::new(config, shared),
            store,
            sessions: BTreeMap::new(),
        }
    }

    /// Share version store used by the sessions
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Number of open sessions
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Open session for `(peer, protocol)`
    pub fn session(&self, peer: PeerId, protocol: ProtocolType) -> Option<&Session> {
        self.sessions.get(&(peer, protocol))
    }

    /// Mutable access to the open session for `(peer, protocol)`
    pub fn session_mut(&mut self, peer: PeerId, protocol: ProtocolType) -> Option<&mut Session> {
        self.sessions.get_mut(&(peer, protocol))
    }

    /// Decode `bytes` from `peer` and apply the message.
    ///
    /// # Errors
    ///
    /// - [`SessionError::Protocol`] if the bytes do not decode
    /// - any error from [`SessionManager::handle_message`]
    pub fn handle_inbound(
        &mut self,
        peer: PeerId,
        bytes: &[u8],
        envelope: Option<Envelope<'_>>,
        now: Instant,
    ) -> Result<Vec<Outbound>, SessionError> {
        let message = Message::decode(bytes, envelope).map_err(|err| {
            tracing::warn!(
                %peer,
                len = bytes.len(),
                error = %err,
                "discarding undecodable message"
            );
            err
        })?;
        self.handle_message(peer, &message, now)
    }

    /// Apply an already decoded message from `peer`.
    ///
    /// A session opened for this message is kept only if the message applied
    /// cleanly.
    pub fn handle_message(
        &mut self,
        peer: PeerId,
        message: &Message,
        now: Instant,
    ) -> Result<Vec<Outbound>, SessionError> {
        let protocol = message.protocol_type();
        let key = (peer, protocol);

        if let Some(session) = self.sessions.get_mut(&key) {
            let restart = session.protocol_status().is_terminal() && message.first_in_protocol();
            if !restart {
                if !session.process_message(message)? {
                    tracing::debug!(%peer, ?protocol, "message not consumed, discarding");
                }
                return Ok(drain(peer, session));
            }
        }

        let Some(mut session) = self.dispatcher.possible_start_protocol(message, peer, now)? else {
            tracing::debug!(
                %peer,
                message_type = ?message.message_type(),
                "no session for message, discarding"
            );
            return Ok(Vec::new());
        };

        session.process_message(message)?;
        let outbound = drain(peer, &mut session);
        if let Some(mut previous) = self.sessions.insert(key, session) {
            previous.stop_timer();
            tracing::debug!(%peer, ?protocol, "finished session replaced");
        }
        Ok(outbound)
    }

    /// Open a session for `(peer, protocol)` and drain anything it queued.
    ///
    /// An open session is kept as is; a finished one is replaced.
    pub fn start(
        &mut self,
        peer: PeerId,
        protocol: ProtocolType,
        now: Instant,
    ) -> Result<Vec<Outbound>, SessionError> {
        let session = self.open(peer, protocol, now)?;
        Ok(drain(peer, session))
    }

    /// Start pairing with `peer` as the initiator.
    pub fn begin_pairing(
        &mut self,
        peer: PeerId,
        nonce: u8,
        now: Instant,
    ) -> Result<Vec<Outbound>, SessionError> {
        let session = self.open(peer, ProtocolType::Pairing, now)?;
        if let Some(pairing) = session.as_pairing_mut() {
            pairing.begin(nonce)?;
        }
        Ok(drain(peer, session))
    }

    /// Send a lockbox share to `peer`.
    ///
    /// Each share after a completed exchange runs in a fresh session.
    pub fn send_share(
        &mut self,
        peer: PeerId,
        share_version: u16,
        share: impl Into<Vec<u8>>,
        now: Instant,
    ) -> Result<Vec<Outbound>, SessionError> {
        let session = self.open(peer, ProtocolType::LockboxSharesUpdate, now)?;
        if let Some(lockbox) = session.as_lockbox_mut() {
            lockbox.send_share(share_version, share)?;
        }
        Ok(drain(peer, session))
    }

    /// Fire every timer due at `now` and drain what the sessions queued.
    pub fn poll_timers(&mut self, now: Instant) -> Vec<Outbound> {
        let mut outbound = Vec::new();
        for ((peer, protocol), session) in &mut self.sessions {
            let fired = session.poll_timer(now);
            if fired > 0 {
                tracing::trace!(%peer, ?protocol, fired, "timer ticks");
            }
            outbound.extend(drain(*peer, session));
        }
        outbound
    }

    /// Stop the session's timer and forget it.
    pub fn close(&mut self, peer: PeerId, protocol: ProtocolType) -> Option<Session> {
        let mut session = self.sessions.remove(&(peer, protocol))?;
        session.stop_timer();
        tracing::debug!(%peer, ?protocol, status = ?session.protocol_status(), "session closed");
        Some(session)
    }

    /// Serialize a drained message, sealing it with `envelope` when needed.
    pub fn encode_outbound(
        &self,
        outbound: &Outbound,
        envelope: Option<Envelope<'_>>,
    ) -> Result<Vec<u8>, SessionError> {
        outbound.encode(envelope)
    }

    fn open(
        &mut self,
        peer: PeerId,
        protocol: ProtocolType,
        now: Instant,
    ) -> Result<&mut Session, SessionError> {
        match self.sessions.entry((peer, protocol)) {
            Entry::Occupied(mut entry) => {
                if entry.get().protocol_status().is_terminal() {
                    let mut previous =
                        entry.insert(self.dispatcher.start_protocol(protocol, peer, now)?);
                    previous.stop_timer();
                    tracing::debug!(%peer, ?protocol, "finished session replaced");
                } else {
                    tracing::trace!(%peer, ?protocol, "session already open");
                }
                Ok(entry.into_mut())
            },
            Entry::Vacant(entry) => {
                Ok(entry.insert(self.dispatcher.start_protocol(protocol, peer, now)?))
            },
        }
    }
}

fn drain(peer: PeerId, session: &mut Session) -> Vec<Outbound> {
    session.drain_outbox().into_iter().map(|message| Outbound { peer, message }).collect()
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use derec_proto::{
        KeepAliveRequest, KeepAliveResponse, OperatingMode, PairingRequest, ProtocolError,
        ProtocolStatus, StoreLockboxShareRequest, StoreLockboxShareResponse, WireMessage,
    };

    use super::*;
    use crate::{
        keep_alive::KeepAliveState, lockbox::LockboxSession, store::MemoryShareVersionStore,
    };

    const BOB: PeerId = PeerId(0xB0B);

    fn manager() -> SessionManager<MemoryShareVersionStore> {
        SessionManager::new(SessionConfig::default(), MemoryShareVersionStore::new())
    }

    #[test]
    fn keep_alive_request_opens_session_and_is_answered() {
        let mut manager = manager();
        manager.store().record_share_version(BOB, 34).unwrap();

        let bytes = KeepAliveRequest::new().encode(None).unwrap();
        let outbound = manager.handle_inbound(BOB, &bytes, None, Instant::now()).unwrap();

        assert_eq!(
            outbound,
            vec![Outbound { peer: BOB, message: KeepAliveResponse::new(34).into() }]
        );
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn continuation_without_session_is_discarded() {
        let mut manager = manager();
        let outbound = manager
            .handle_message(BOB, &KeepAliveResponse::new(1).into(), Instant::now())
            .unwrap();

        assert!(outbound.is_empty());
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn undecodable_bytes_surface_protocol_error() {
        let mut manager = manager();
        let result = manager.handle_inbound(BOB, &[0x00, 0x02, 0x02, 0x00], None, Instant::now());

        assert_eq!(result, Err(SessionError::Protocol(ProtocolError::UnsupportedVersion(2))));
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn second_request_reuses_session() {
        let mut manager = manager();
        let now = Instant::now();
        manager.handle_message(BOB, &KeepAliveRequest::new().into(), now).unwrap();
        manager.handle_message(BOB, &KeepAliveRequest::new().into(), now).unwrap();
        assert_eq!(manager.session_count(), 1);
    }

    #[test]
    fn poll_timers_drains_keep_alive_requests() {
        let mut manager = manager();
        let t0 = Instant::now();
        manager.start(BOB, ProtocolType::KeepAlive, t0).unwrap();

        let outbound = manager.poll_timers(t0 + Duration::from_secs(10));
        assert_eq!(
            outbound,
            vec![Outbound { peer: BOB, message: KeepAliveRequest::new().into() }]
        );
        assert!(manager.poll_timers(t0 + Duration::from_secs(11)).is_empty());
    }

    #[test]
    fn response_brings_session_in_sync() {
        let mut manager = manager();
        let t0 = Instant::now();
        manager.start(BOB, ProtocolType::KeepAlive, t0).unwrap();
        manager.poll_timers(t0 + Duration::from_secs(10));

        manager.handle_message(BOB, &KeepAliveResponse::new(3).into(), t0).unwrap();

        let state = manager
            .session(BOB, ProtocolType::KeepAlive)
            .and_then(Session::as_keep_alive)
            .map(|s| s.state());
        assert_eq!(state, Some(KeepAliveState::InSync));
    }

    #[test]
    fn close_stops_timer() {
        let mut manager = manager();
        let t0 = Instant::now();
        manager.start(BOB, ProtocolType::KeepAlive, t0).unwrap();

        let closed = manager.close(BOB, ProtocolType::KeepAlive).unwrap();
        assert!(!closed.as_keep_alive().is_some_and(|s| s.timer_running()));
        assert_eq!(closed.protocol_status(), ProtocolStatus::NotStarted);
        assert!(manager.poll_timers(t0 + Duration::from_secs(60)).is_empty());
        assert!(manager.close(BOB, ProtocolType::KeepAlive).is_none());
    }

    #[test]
    fn recovery_cannot_be_started() {
        let mut manager = manager();
        let result = manager.start(BOB, ProtocolType::Recovery, Instant::now());
        assert_eq!(result, Err(SessionError::UnknownProtocolType(ProtocolType::Recovery)));
    }

    #[test]
    fn finished_pairing_is_replaced_by_new_request() {
        let mut manager = manager();
        let now = Instant::now();
        let request: Message =
            PairingRequest::new(0, 1, OperatingMode::Normal, "Alice", "1", vec![1; 32]).into();

        manager.handle_message(BOB, &request, now).unwrap();
        manager
            .session_mut(BOB, ProtocolType::Pairing)
            .unwrap()
            .process_message(&derec_proto::PairingAck::new().into())
            .unwrap();
        assert_eq!(
            manager.session(BOB, ProtocolType::Pairing).map(Session::protocol_status),
            Some(ProtocolStatus::DoneSuccess)
        );

        let outbound = manager.handle_message(BOB, &request, now).unwrap();
        assert_eq!(outbound.len(), 1);
        assert_eq!(
            manager.session(BOB, ProtocolType::Pairing).map(Session::protocol_status),
            Some(ProtocolStatus::Active)
        );
    }

    #[test]
    fn share_exchange_records_versions_on_both_sides() {
        let mut owner = manager();
        let mut helper = manager();
        let now = Instant::now();
        let alice = PeerId(0xA11CE);

        helper.start(alice, ProtocolType::LockboxSharesUpdate, now).unwrap();
        let requests = owner.send_share(BOB, 7, vec![1, 2, 3], now).unwrap();
        assert_eq!(
            requests[0].message,
            Message::from(StoreLockboxShareRequest::new(7, vec![1, 2, 3]))
        );

        let replies = helper.handle_message(alice, &requests[0].message, now).unwrap();
        assert_eq!(replies[0].message, Message::from(StoreLockboxShareResponse::new(7)));
        assert_eq!(helper.store().share_version(alice), Ok(Some(7)));

        owner.handle_message(BOB, &replies[0].message, now).unwrap();
        assert_eq!(owner.store().share_version(BOB), Ok(Some(7)));
    }

    #[test]
    fn next_share_after_completed_exchange_opens_fresh_session() {
        let mut owner = manager();
        let now = Instant::now();

        owner.send_share(BOB, 1, vec![1], now).unwrap();
        owner.handle_message(BOB, &StoreLockboxShareResponse::new(1).into(), now).unwrap();
        let lockbox_status = |owner: &SessionManager<MemoryShareVersionStore>| {
            owner.session(BOB, ProtocolType::LockboxSharesUpdate).map(Session::protocol_status)
        };
        assert_eq!(lockbox_status(&owner), Some(ProtocolStatus::DoneSuccess));

        let requests = owner.send_share(BOB, 2, vec![2], now).unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(lockbox_status(&owner), Some(ProtocolStatus::Active));
        let session = owner.session(BOB, ProtocolType::LockboxSharesUpdate).unwrap();
        assert_eq!(session.as_lockbox().and_then(LockboxSession::awaiting_version), Some(2));
    }

    #[test]
    fn finished_lockbox_session_rejects_inbound_shares() {
        let mut owner = manager();
        let now = Instant::now();

        owner.send_share(BOB, 3, vec![1], now).unwrap();
        owner.handle_message(BOB, &StoreLockboxShareResponse::new(3).into(), now).unwrap();

        let result =
            owner.handle_message(BOB, &StoreLockboxShareRequest::new(9, vec![7]).into(), now);
        assert!(matches!(result, Err(SessionError::UnexpectedMessageType { state: "Done", .. })));
        assert_eq!(owner.store().share_version(BOB), Ok(Some(3)));
        assert_eq!(
            owner.session(BOB, ProtocolType::LockboxSharesUpdate).map(Session::protocol_status),
            Some(ProtocolStatus::DoneSuccess)
        );
    }

    #[test]
    fn outbound_encodes_cleartext_without_envelope() {
        let outbound = Outbound { peer: BOB, message: KeepAliveRequest::new().into() };
        insta::assert_snapshot!(hex::encode(outbound.encode(None).unwrap()), @"00010200");
    }

    #[test]
    fn sealed_outbound_needs_envelope() {
        let manager = SessionManager::new(SessionConfig::default(), MemoryShareVersionStore::new());
        let outbound = Outbound { peer: BOB, message: derec_proto::PairingAck::new().into() };

        assert_eq!(
            manager.encode_outbound(&outbound, None),
            Err(SessionError::Protocol(ProtocolError::MissingCipherContext))
        );
    }
}
