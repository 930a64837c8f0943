//! Error types for the DeRec session layer.
//!
//! - [`SessionError`]: a message could not be applied to a session
//! - [`StoreError`]: the share version store failed
//!
//! Codec failures arrive wrapped as [`SessionError::Protocol`].

use derec_proto::{MessageType, ProtocolError, ProtocolType};
use thiserror::Error;

/// Errors raised by sessions, the dispatcher and the session manager.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Protocol has no session implementation
    #[error("unknown protocol type: {0:?}")]
    UnknownProtocolType(ProtocolType),

    /// Message belongs to the session's protocol but is not valid in its
    /// current state
    #[error("unexpected {message_type:?} in {state}")]
    UnexpectedMessageType {
        /// Session state when the message arrived
        state: &'static str,
        /// Type of the rejected message
        message_type: MessageType,
    },

    /// Inbound bytes failed to decode, or an outbound message failed to encode
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Share version store failed
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl SessionError {
    /// Returns true if the error only concerns the offending message.
    ///
    /// Discardable errors mean "drop this message and carry on". The rest
    /// mean the local side is broken (store failure) or the caller asked for
    /// something that can never work, so retrying the same call is pointless.
    pub fn is_discardable(&self) -> bool {
        matches!(self, Self::UnexpectedMessageType { .. } | Self::Protocol(_))
    }
}

/// Errors raised by a share version store.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A writer panicked while holding the store lock
    #[error("share version store lock poisoned")]
    Poisoned,

    /// Snapshot could not be encoded or decoded
    #[error("snapshot error: {0}")]
    Snapshot(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_level_errors_are_discardable() {
        assert!(
            SessionError::UnexpectedMessageType {
                state: "InSync",
                message_type: MessageType::PairingAck,
            }
            .is_discardable()
        );
        assert!(SessionError::from(ProtocolError::AuthenticationFailed).is_discardable());
    }

    #[test]
    fn local_failures_are_not_discardable() {
        assert!(!SessionError::UnknownProtocolType(ProtocolType::Recovery).is_discardable());
        assert!(!SessionError::from(StoreError::Poisoned).is_discardable());
    }

    #[test]
    fn display_names_the_message() {
        let err = SessionError::UnexpectedMessageType {
            state: "AwaitingAck",
            message_type: MessageType::PairingRequest,
        };
        insta::assert_snapshot!(err.to_string(), @"unexpected PairingRequest in AwaitingAck");
    }
}
