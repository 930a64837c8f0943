//! Small protocol enumerations shared by messages and sessions.

use serde::{Deserialize, Serialize};
use serde_repr::{Deserialize_repr, Serialize_repr};

use crate::errors::{ProtocolError, Result};

/// Operating mode advertised by a peer during pairing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize_repr, Deserialize_repr)]
#[repr(u8)]
pub enum OperatingMode {
    /// Regular operation, shares are being stored
    Normal = 0x00,
    /// The owner is recovering and asks helpers for their shares
    Recovery = 0xFF,
}

impl OperatingMode {
    /// Convert to the wire byte
    #[must_use]
    pub const fn to_u8(self) -> u8 {
        self as u8
    }

    /// Parse a wire byte
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidOperatingMode`] for any byte that is not
    /// a defined mode.
    pub const fn from_u8(value: u8) -> Result<Self> {
        match value {
            0x00 => Ok(Self::Normal),
            0xFF => Ok(Self::Recovery),
            other => Err(ProtocolError::InvalidOperatingMode(other)),
        }
    }
}

/// Progress of a protocol conversation.
///
/// `DoneSuccess` and `DoneFailure` are terminal: the only way to retry is to
/// start a new conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolStatus {
    /// The conversation hasn't started yet
    NotStarted,
    /// More messages are expected
    Active,
    /// The conversation finished successfully
    DoneSuccess,
    /// The conversation failed
    DoneFailure,
}

impl ProtocolStatus {
    /// True once the conversation can make no further progress
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::DoneSuccess | Self::DoneFailure)
    }
}
