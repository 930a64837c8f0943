//! Lockbox shares update session.
//!
//! The owner sends a share to a helper with [`LockboxSession::send_share`];
//! the helper records the carried version for the owner and acknowledges it.
//! When the acknowledgement comes back, the owner records that the helper
//! holds that version. Both sides write the shared [`ShareVersionStore`],
//! which keep-alive sessions read to answer requests.
//!
//! Share contents are opaque here and are not retained.

use std::{fmt, sync::Arc};

use derec_proto::{
    Message, MessageType, ProtocolStatus, ProtocolType, StoreLockboxShareRequest,
    StoreLockboxShareResponse,
};

use crate::{error::SessionError, peer::PeerId, session::SessionCore, store::ShareVersionStore};

/// Lockbox shares update session with one peer.
pub struct LockboxSession {
    pub(crate) core: SessionCore,
    peer: PeerId,
    awaiting_version: Option<u16>,
    store: Arc<dyn ShareVersionStore>,
}

impl LockboxSession {
    /// Open an idle session
    pub fn new(peer: PeerId, store: Arc<dyn ShareVersionStore>) -> Self {
        Self { core: SessionCore::new(), peer, awaiting_version: None, store }
    }

    /// Remote party
    pub fn peer(&self) -> PeerId {
        self.peer
    }

    /// Version sent to the peer and not yet acknowledged
    pub fn awaiting_version(&self) -> Option<u16> {
        self.awaiting_version
    }

    /// Queue a share for the peer to store. Starts a new exchange.
    ///
    /// # Errors
    ///
    /// [`SessionError::UnexpectedMessageType`] once the session is finished;
    /// a new exchange needs a new session.
    pub fn send_share(
        &mut self,
        share_version: u16,
        share: impl Into<Vec<u8>>,
    ) -> Result<(), SessionError> {
        if self.core.status().is_terminal() {
            return Err(self.unexpected(MessageType::StoreLockboxShareRequest));
        }

        self.core.enqueue(StoreLockboxShareRequest::new(share_version, share));
        self.awaiting_version = Some(share_version);
        self.core.set_status(ProtocolStatus::Active);
        Ok(())
    }

    /// Apply an inbound message. Other protocols return `Ok(false)`.
    pub fn process_message(&mut self, message: &Message) -> Result<bool, SessionError> {
        if message.protocol_type() != ProtocolType::LockboxSharesUpdate {
            return Ok(false);
        }

        if self.core.status().is_terminal() {
            return Err(self.unexpected(message.message_type()));
        }

        match message {
            Message::StoreLockboxShareRequest(request) => {
                let version = request.share_version();
                if !self.store.record_share_version(self.peer, version)? {
                    tracing::debug!(peer = %self.peer, version, "stale share version ignored");
                }
                self.core.enqueue(StoreLockboxShareResponse::new(version));
                self.core.activate();
            },
            Message::StoreLockboxShareResponse(response) if self.awaiting_version.is_some() => {
                self.store.record_share_version(self.peer, response.share_version())?;
                self.awaiting_version = None;
                self.core.set_status(ProtocolStatus::DoneSuccess);
            },
            other => return Err(self.unexpected(other.message_type())),
        }
        Ok(true)
    }

    fn unexpected(&self, message_type: MessageType) -> SessionError {
        let state = if self.core.status().is_terminal() {
            "Done"
        } else if self.awaiting_version.is_some() {
            "AwaitingResponse"
        } else {
            "Idle"
        };
        SessionError::UnexpectedMessageType { state, message_type }
    }
}

impl fmt::Debug for LockboxSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockboxSession")
            .field("peer", &self.peer)
            .field("status", &self.core.status())
            .field("awaiting_version", &self.awaiting_version)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use derec_proto::KeepAliveResponse;

    use super::*;
    use crate::store::MemoryShareVersionStore;

    const PEER: PeerId = PeerId(9);

    fn session(store: &MemoryShareVersionStore) -> LockboxSession {
        LockboxSession::new(PEER, Arc::new(store.clone()))
    }

    #[test]
    fn helper_records_version_and_acknowledges() {
        let store = MemoryShareVersionStore::new();
        let mut helper = session(&store);

        let request = StoreLockboxShareRequest::new(23, vec![0xde, 0xad]).into();
        assert_eq!(helper.process_message(&request), Ok(true));

        assert_eq!(store.share_version(PEER), Ok(Some(23)));
        assert_eq!(helper.core.dequeue(), Some(Message::from(StoreLockboxShareResponse::new(23))));
        assert_eq!(helper.core.status(), ProtocolStatus::Active);
    }

    #[test]
    fn stale_request_does_not_roll_back() {
        let store = MemoryShareVersionStore::new();
        store.record_share_version(PEER, 30).unwrap();
        let mut helper = session(&store);

        helper.process_message(&StoreLockboxShareRequest::new(12, vec![]).into()).unwrap();
        assert_eq!(store.share_version(PEER), Ok(Some(30)));
        assert_eq!(helper.core.pending(), 1);
    }

    #[test]
    fn owner_completes_on_response() {
        let store = MemoryShareVersionStore::new();
        let mut owner = session(&store);

        owner.send_share(4, vec![1, 2]).unwrap();
        assert_eq!(owner.awaiting_version(), Some(4));
        assert_eq!(
            owner.core.dequeue(),
            Some(Message::from(StoreLockboxShareRequest::new(4, vec![1, 2])))
        );

        assert_eq!(owner.process_message(&StoreLockboxShareResponse::new(4).into()), Ok(true));
        assert_eq!(owner.core.status(), ProtocolStatus::DoneSuccess);
        assert_eq!(owner.awaiting_version(), None);
        assert_eq!(store.share_version(PEER), Ok(Some(4)));
    }

    #[test]
    fn finished_session_stays_finished() {
        let store = MemoryShareVersionStore::new();
        let mut owner = session(&store);
        owner.send_share(4, vec![1]).unwrap();
        owner.core.dequeue();
        owner.process_message(&StoreLockboxShareResponse::new(4).into()).unwrap();

        let done = SessionError::UnexpectedMessageType {
            state: "Done",
            message_type: MessageType::StoreLockboxShareRequest,
        };
        assert_eq!(owner.send_share(5, vec![2]), Err(done.clone()));
        assert_eq!(
            owner.process_message(&StoreLockboxShareRequest::new(6, vec![]).into()),
            Err(done)
        );

        assert_eq!(owner.core.status(), ProtocolStatus::DoneSuccess);
        assert_eq!(owner.core.pending(), 0);
        assert_eq!(owner.awaiting_version(), None);
        assert_eq!(store.share_version(PEER), Ok(Some(4)));
    }

    #[test]
    fn unsolicited_response_is_rejected() {
        let store = MemoryShareVersionStore::new();
        let mut owner = session(&store);

        assert_eq!(
            owner.process_message(&StoreLockboxShareResponse::new(4).into()),
            Err(SessionError::UnexpectedMessageType {
                state: "Idle",
                message_type: MessageType::StoreLockboxShareResponse,
            })
        );
        assert_eq!(store.share_version(PEER), Ok(None));
    }

    #[test]
    fn other_protocols_are_ignored() {
        let store = MemoryShareVersionStore::new();
        let mut helper = session(&store);
        assert_eq!(helper.process_message(&KeepAliveResponse::new(1).into()), Ok(false));
        assert_eq!(helper.core.status(), ProtocolStatus::NotStarted);
    }
}
