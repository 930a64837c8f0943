//! Error types for the DeRec wire format.
//!
//! All errors are structured, testable, and provide actionable information.

use thiserror::Error;

use crate::MessageType;

/// Errors raised while encoding or decoding a protocol message.
///
/// None of these errors are fatal to a session. They describe a single message
/// that must be dropped; the caller decides whether the peer is still trusted.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Protocol version other than the one this codec understands
    #[error("unsupported protocol version: {0}")]
    UnsupportedVersion(u16),

    /// Decoded message type does not match the variant being decoded
    #[error("unexpected message type: expected {expected:?}, got {actual:#06x}")]
    UnexpectedMessageType {
        /// Type the decoder was asked for
        expected: MessageType,
        /// Raw type code found on the wire
        actual: u16,
    },

    /// Sealed section failed to verify
    #[error("authentication failed: sealed section did not verify")]
    AuthenticationFailed,

    /// Message type code is not in the registry or has no codec
    #[error("unknown message type: {0:#06x}")]
    UnknownMessageType(u16),

    /// Buffer ended before the layout was complete
    #[error("message truncated: needed {needed} more bytes, {available} available")]
    Truncated {
        /// Bytes the next field requires
        needed: usize,
        /// Bytes left in the buffer
        available: usize,
    },

    /// Bytes left over after the layout was fully parsed
    #[error("{0} trailing bytes after message")]
    TrailingBytes(usize),

    /// String field is not valid UTF-8
    #[error("field `{field}` is not valid UTF-8")]
    InvalidUtf8 {
        /// Name of the offending field
        field: &'static str,
    },

    /// Variable-length field does not fit its 16-bit length prefix
    #[error("field `{field}` is {len} bytes, exceeds maximum {max}", max = u16::MAX)]
    FieldTooLong {
        /// Name of the offending field
        field: &'static str,
        /// Actual length in bytes
        len: usize,
    },

    /// Operating mode byte is not a known mode
    #[error("invalid operating mode: {0:#04x}")]
    InvalidOperatingMode(u8),

    /// Message has a sealed section but no cipher context was supplied
    #[error("message requires a cipher context")]
    MissingCipherContext,

    /// Nonce length does not match the cipher
    #[error("invalid nonce length: expected {expected} bytes, got {actual}")]
    InvalidNonceLength {
        /// Nonce length the cipher requires
        expected: usize,
        /// Nonce length supplied
        actual: usize,
    },

    /// Cipher refused to seal the plaintext
    #[error("encryption failed")]
    EncryptionFailed,
}

impl ProtocolError {
    /// Returns true if the error indicates tampering or a wrong key rather
    /// than a malformed encoding.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, Self::AuthenticationFailed)
    }
}

/// Convenient Result type alias for codec operations
pub type Result<T> = std::result::Result<T, ProtocolError>;
