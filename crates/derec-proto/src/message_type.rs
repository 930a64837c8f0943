//! Message and protocol identifiers.
//!
//! Every DeRec message carries a 16-bit type code. Codes are grouped by
//! protocol using the high byte, so the protocol a message belongs to is never
//! transmitted on its own; it is inferred from the type code.
//!
//! # Code Ranges
//!
//! - `0x00xx`: Pairing
//! - `0x01xx`: Recovery (share retrieval, operating mode)
//! - `0x02xx`: Keep-alive
//! - `0x03xx`: Lockbox shares update

use serde_repr::{Deserialize_repr, Serialize_repr};

/// The protocols a session can run.
///
/// Ordinals are stable but never written to the wire by this codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum ProtocolType {
    /// Device/helper pairing
    Pairing = 0,
    /// Storing and refreshing lockbox shares on helpers
    LockboxSharesUpdate = 1,
    /// Helper liveness checks
    KeepAlive = 2,
    /// Share retrieval during recovery
    Recovery = 3,
}

impl ProtocolType {
    /// All protocol types, in ordinal order
    pub const ALL: [Self; 4] =
        [Self::Pairing, Self::LockboxSharesUpdate, Self::KeepAlive, Self::Recovery];

    /// Stable ordinal value
    #[must_use]
    pub const fn ordinal(self) -> u8 {
        self as u8
    }
}

/// Message type codes.
///
/// # Representation
///
/// Serialized as a Big Endian `u16`. The `#[repr(u16)]` keeps the numeric
/// values stable for wire compatibility; codes are never reused across
/// protocols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u16)]
pub enum MessageType {
    // Pairing (0x00xx)
    /// Opens a pairing conversation
    PairingRequest = 0x0000,
    /// Helper's reply to a pairing request
    PairingResponse = 0x0001,
    /// Final acknowledgement of a pairing
    PairingAck = 0x0002,

    // Recovery (0x01xx)
    /// Ask a helper for a stored share
    LockboxShareRetrievalRequest = 0x0100,
    /// Helper's reply carrying the share
    LockboxShareRetrievalResponse = 0x0101,
    /// Switch between normal and recovery mode
    OperatingModeUpdate = 0x0102,

    // Keep-alive (0x02xx)
    /// Periodic liveness probe
    KeepAliveRequest = 0x0200,
    /// Liveness reply carrying the stored share version
    KeepAliveResponse = 0x0201,

    // Lockbox shares update (0x03xx)
    /// Ask a helper to store a share
    StoreLockboxShareRequest = 0x0300,
    /// Helper's confirmation of a stored share
    StoreLockboxShareResponse = 0x0301,
    /// Notify helpers that a new lockbox version exists
    LockboxUpdateRequest = 0x0302,
}

impl MessageType {
    /// Convert to raw u16 value
    #[must_use]
    pub const fn to_u16(self) -> u16 {
        self as u16
    }

    /// Convert from raw u16 value
    ///
    /// Returns `None` if the value doesn't correspond to a known message type.
    /// Unknown codes MUST be rejected, not silently ignored.
    #[must_use]
    pub const fn from_u16(value: u16) -> Option<Self> {
        match value {
            0x0000 => Some(Self::PairingRequest),
            0x0001 => Some(Self::PairingResponse),
            0x0002 => Some(Self::PairingAck),

            0x0100 => Some(Self::LockboxShareRetrievalRequest),
            0x0101 => Some(Self::LockboxShareRetrievalResponse),
            0x0102 => Some(Self::OperatingModeUpdate),

            0x0200 => Some(Self::KeepAliveRequest),
            0x0201 => Some(Self::KeepAliveResponse),

            0x0300 => Some(Self::StoreLockboxShareRequest),
            0x0301 => Some(Self::StoreLockboxShareResponse),
            0x0302 => Some(Self::LockboxUpdateRequest),

            _ => None,
        }
    }

    /// Protocol this message type belongs to (selected by the high byte)
    #[must_use]
    pub const fn protocol_type(self) -> ProtocolType {
        match self.to_u16() >> 8 {
            0x00 => ProtocolType::Pairing,
            0x01 => ProtocolType::Recovery,
            0x02 => ProtocolType::KeepAlive,
            0x03 => ProtocolType::LockboxSharesUpdate,
            _ => unreachable!(),
        }
    }

    /// True for the message type that legitimately opens a new conversation
    /// for its protocol.
    #[must_use]
    pub const fn first_in_protocol(self) -> bool {
        matches!(self, Self::PairingRequest | Self::KeepAliveRequest)
    }
}
