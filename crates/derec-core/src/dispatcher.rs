//! Protocol dispatcher.
//!
//! Factory for sessions: opens one explicitly for a protocol, or inspects an
//! inbound message and opens one if that message starts a conversation.

use std::{fmt, sync::Arc, time::Instant};

use derec_proto::{Message, ProtocolType};

use crate::{
    error::SessionError,
    keep_alive::{KeepAliveConfig, KeepAliveSession},
    lockbox::LockboxSession,
    pairing::{PairingProfile, PairingSession},
    peer::PeerId,
    session::Session,
    store::ShareVersionStore,
};

/// Configuration handed to every new session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionConfig {
    /// Keep-alive timing and thresholds
    pub keep_alive: KeepAliveConfig,
    /// Local details advertised during pairing
    pub pairing: PairingProfile,
}

/// Opens sessions for the local identity.
#[derive(Clone)]
pub struct ProtocolDispatcher {
    config: SessionConfig,
    store: Arc<dyn ShareVersionStore>,
}

impl ProtocolDispatcher {
    /// Create a dispatcher whose sessions share `store`
    pub fn new(config: SessionConfig, store: Arc<dyn ShareVersionStore>) -> Self {
        Self { config, store }
    }

    /// Configuration applied to new sessions
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Open a fresh session for `protocol` with `peer`.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnknownProtocolType`] for protocols without a session
    /// implementation (`Recovery`).
    pub fn start_protocol(
        &self,
        protocol: ProtocolType,
        peer: PeerId,
        now: Instant,
    ) -> Result<Session, SessionError> {
        let session = match protocol {
            ProtocolType::KeepAlive => Session::from(KeepAliveSession::new(
                peer,
                self.config.keep_alive.clone(),
                Arc::clone(&self.store),
                now,
            )),
            ProtocolType::Pairing => {
                Session::from(PairingSession::new(peer, self.config.pairing.clone()))
            },
            ProtocolType::LockboxSharesUpdate => {
                Session::from(LockboxSession::new(peer, Arc::clone(&self.store)))
            },
            ProtocolType::Recovery => return Err(SessionError::UnknownProtocolType(protocol)),
        };

        tracing::debug!(%peer, ?protocol, "session opened");
        Ok(session)
    }

    /// Open a session if `message` starts a conversation.
    ///
    /// Returns `Ok(None)` for continuation messages. The message itself is
    /// not applied; pass it to [`Session::process_message`] next.
    pub fn possible_start_protocol(
        &self,
        message: &Message,
        peer: PeerId,
        now: Instant,
    ) -> Result<Option<Session>, SessionError> {
        if !message.first_in_protocol() {
            return Ok(None);
        }
        self.start_protocol(message.protocol_type(), peer, now).map(Some)
    }
}

impl fmt::Debug for ProtocolDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProtocolDispatcher").field("config", &self.config).finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use derec_proto::{
        KeepAliveRequest, KeepAliveResponse, OperatingMode, PairingAck, PairingRequest,
        ProtocolStatus, StoreLockboxShareRequest,
    };

    use super::*;
    use crate::{keep_alive::KeepAliveState, store::MemoryShareVersionStore};

    fn dispatcher() -> ProtocolDispatcher {
        ProtocolDispatcher::new(SessionConfig::default(), Arc::new(MemoryShareVersionStore::new()))
    }

    #[test]
    fn keep_alive_request_starts_session() {
        let session = dispatcher()
            .possible_start_protocol(&KeepAliveRequest::new().into(), PeerId(1), Instant::now())
            .unwrap()
            .unwrap();

        assert_eq!(session.protocol_type(), ProtocolType::KeepAlive);
        assert_eq!(session.peer(), PeerId(1));
        assert_eq!(session.protocol_status(), ProtocolStatus::NotStarted);
        assert_eq!(
            session.as_keep_alive().map(KeepAliveSession::state),
            Some(KeepAliveState::OutOfSync)
        );
    }

    #[test]
    fn pairing_request_starts_session() {
        let request =
            PairingRequest::new(0, 1, OperatingMode::Normal, "Alice", "1", vec![1; 32]).into();
        let session =
            dispatcher().possible_start_protocol(&request, PeerId(1), Instant::now()).unwrap();
        assert_eq!(session.map(|s| s.protocol_type()), Some(ProtocolType::Pairing));
    }

    #[test]
    fn continuation_messages_start_nothing() {
        let dispatcher = dispatcher();
        let now = Instant::now();
        let continuations: [Message; 3] = [
            KeepAliveResponse::new(3).into(),
            PairingAck::new().into(),
            StoreLockboxShareRequest::new(1, vec![]).into(),
        ];

        for message in &continuations {
            assert!(dispatcher.possible_start_protocol(message, PeerId(1), now).unwrap().is_none());
        }
    }

    #[test]
    fn explicit_start_for_every_modeled_protocol() {
        let dispatcher = dispatcher();
        let now = Instant::now();

        for protocol in
            [ProtocolType::KeepAlive, ProtocolType::Pairing, ProtocolType::LockboxSharesUpdate]
        {
            let session = dispatcher.start_protocol(protocol, PeerId(2), now).unwrap();
            assert_eq!(session.protocol_type(), protocol);
        }
    }

    #[test]
    fn recovery_has_no_session() {
        let result = dispatcher().start_protocol(ProtocolType::Recovery, PeerId(2), Instant::now());
        assert_eq!(result.err(), Some(SessionError::UnknownProtocolType(ProtocolType::Recovery)));
    }
}
