//! Protocol sessions.
//!
//! A session is one conversation with one peer for one protocol. Each owns
//! its [`ProtocolStatus`] and a FIFO outbox. Callers feed it inbound messages
//! through [`Session::process_message`] and drain what it wants to send with
//! [`Session::next_message_to_send`].
//!
//! ```text
//! inbound bytes ─> Message::decode ─> SessionManager
//!                                       ├─ open session for (peer, protocol)
//!                                       └─ ProtocolDispatcher::possible_start_protocol
//!                                              │
//!                                              v
//!                                   Session::process_message ─> outbox
//! ```
//!
//! Sessions are sans-IO: time comes in as a parameter and nothing is sent
//! until the caller drains the outbox.

use std::{collections::VecDeque, time::Instant};

use derec_proto::{Message, ProtocolStatus, ProtocolType};

use crate::{
    error::SessionError, keep_alive::KeepAliveSession, lockbox::LockboxSession,
    pairing::PairingSession, peer::PeerId,
};

/// Status and outbox shared by every session kind.
#[derive(Debug, Clone)]
pub(crate) struct SessionCore {
    status: ProtocolStatus,
    outbox: VecDeque<Message>,
}

impl SessionCore {
    pub(crate) fn new() -> Self {
        Self { status: ProtocolStatus::NotStarted, outbox: VecDeque::new() }
    }

    pub(crate) fn status(&self) -> ProtocolStatus {
        self.status
    }

    pub(crate) fn set_status(&mut self, status: ProtocolStatus) {
        self.status = status;
    }

    /// Move `NotStarted` to `Active`; leave any other status alone
    pub(crate) fn activate(&mut self) {
        if self.status == ProtocolStatus::NotStarted {
            self.status = ProtocolStatus::Active;
        }
    }

    pub(crate) fn enqueue(&mut self, message: impl Into<Message>) {
        self.outbox.push_back(message.into());
    }

    pub(crate) fn dequeue(&mut self) -> Option<Message> {
        self.outbox.pop_front()
    }

    pub(crate) fn pending(&self) -> usize {
        self.outbox.len()
    }
}

/// Any open session
#[derive(Debug)]
pub enum Session {
    /// Liveness checking
    KeepAlive(KeepAliveSession),
    /// Device pairing
    Pairing(PairingSession),
    /// Lockbox share distribution
    LockboxSharesUpdate(LockboxSession),
}

impl Session {
    /// Protocol this session runs
    pub fn protocol_type(&self) -> ProtocolType {
        match self {
            Self::KeepAlive(_) => ProtocolType::KeepAlive,
            Self::Pairing(_) => ProtocolType::Pairing,
            Self::LockboxSharesUpdate(_) => ProtocolType::LockboxSharesUpdate,
        }
    }

    /// Remote party of this session
    pub fn peer(&self) -> PeerId {
        match self {
            Self::KeepAlive(s) => s.peer(),
            Self::Pairing(s) => s.peer(),
            Self::LockboxSharesUpdate(s) => s.peer(),
        }
    }

    /// Current protocol status
    pub fn protocol_status(&self) -> ProtocolStatus {
        self.core().status()
    }

    /// Remove and return the oldest queued outbound message.
    ///
    /// An immediate second call returns the next one, or `None`.
    pub fn next_message_to_send(&mut self) -> Option<Message> {
        self.core_mut().dequeue()
    }

    /// Number of queued outbound messages
    pub fn pending_messages(&self) -> usize {
        self.core().pending()
    }

    /// Drain the whole outbox in FIFO order
    pub fn drain_outbox(&mut self) -> Vec<Message> {
        std::iter::from_fn(|| self.next_message_to_send()).collect()
    }

    /// Apply an inbound message.
    ///
    /// Returns `Ok(false)` without side effects if the message belongs to
    /// another protocol, `Ok(true)` if it was consumed.
    ///
    /// # Errors
    ///
    /// - [`SessionError::UnexpectedMessageType`] if the message belongs to
    ///   this protocol but is not valid in the current state
    /// - [`SessionError::Store`] if the share version store failed
    pub fn process_message(&mut self, message: &Message) -> Result<bool, SessionError> {
        match self {
            Self::KeepAlive(s) => s.process_message(message),
            Self::Pairing(s) => s.process_message(message),
            Self::LockboxSharesUpdate(s) => s.process_message(message),
        }
    }

    /// Fire every timer tick due at `now`. Returns the number fired.
    pub fn poll_timer(&mut self, now: Instant) -> usize {
        match self {
            Self::KeepAlive(s) => s.poll_timer(now),
            Self::Pairing(_) | Self::LockboxSharesUpdate(_) => 0,
        }
    }

    /// Stop the session's periodic timer, if it has one. Idempotent.
    pub fn stop_timer(&mut self) {
        if let Self::KeepAlive(s) = self {
            s.stop_periodic_timer();
        }
    }

    /// Keep-alive view of this session
    pub fn as_keep_alive(&self) -> Option<&KeepAliveSession> {
        match self {
            Self::KeepAlive(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable keep-alive view of this session
    pub fn as_keep_alive_mut(&mut self) -> Option<&mut KeepAliveSession> {
        match self {
            Self::KeepAlive(s) => Some(s),
            _ => None,
        }
    }

    /// Pairing view of this session
    pub fn as_pairing(&self) -> Option<&PairingSession> {
        match self {
            Self::Pairing(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable pairing view of this session
    pub fn as_pairing_mut(&mut self) -> Option<&mut PairingSession> {
        match self {
            Self::Pairing(s) => Some(s),
            _ => None,
        }
    }

    /// Lockbox view of this session
    pub fn as_lockbox(&self) -> Option<&LockboxSession> {
        match self {
            Self::LockboxSharesUpdate(s) => Some(s),
            _ => None,
        }
    }

    /// Mutable lockbox view of this session
    pub fn as_lockbox_mut(&mut self) -> Option<&mut LockboxSession> {
        match self {
            Self::LockboxSharesUpdate(s) => Some(s),
            _ => None,
        }
    }

    fn core(&self) -> &SessionCore {
        match self {
            Self::KeepAlive(s) => &s.core,
            Self::Pairing(s) => &s.core,
            Self::LockboxSharesUpdate(s) => &s.core,
        }
    }

    fn core_mut(&mut self) -> &mut SessionCore {
        match self {
            Self::KeepAlive(s) => &mut s.core,
            Self::Pairing(s) => &mut s.core,
            Self::LockboxSharesUpdate(s) => &mut s.core,
        }
    }
}

impl From<KeepAliveSession> for Session {
    fn from(session: KeepAliveSession) -> Self {
        Self::KeepAlive(session)
    }
}

impl From<PairingSession> for Session {
    fn from(session: PairingSession) -> Self {
        Self::Pairing(session)
    }
}

impl From<LockboxSession> for Session {
    fn from(session: LockboxSession) -> Self {
        Self::LockboxSharesUpdate(session)
    }
}
