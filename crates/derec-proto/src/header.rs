//! Fixed message prelude with zero-copy parsing.
//!
//! Every message starts with a 2-byte protocol version. Cleartext variants
//! follow it directly with their 2-byte type code, giving a fixed 4-byte
//! prelude that can be inspected without knowing the variant.

use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::{
    MessageType,
    errors::{ProtocolError, Result},
};

/// Protocol version understood by this codec
pub const PROTOCOL_VERSION: u16 = 1;

/// Size of the version field
pub const VERSION_SIZE: usize = 2;

/// Fail with [`ProtocolError::UnsupportedVersion`] unless `version` is
/// [`PROTOCOL_VERSION`].
pub fn check_version(version: u16) -> Result<()> {
    if version == PROTOCOL_VERSION { Ok(()) } else { Err(ProtocolError::UnsupportedVersion(version)) }
}

/// Read and validate the leading version field.
///
/// Returns the bytes following it.
pub fn split_version(bytes: &[u8]) -> Result<&[u8]> {
    let (version, rest) = bytes.split_first_chunk::<VERSION_SIZE>().ok_or(
        ProtocolError::Truncated { needed: VERSION_SIZE, available: bytes.len() },
    )?;
    check_version(u16::from_be_bytes(*version))?;
    Ok(rest)
}

/// 4-byte prelude of a cleartext message (Big Endian network byte order)
///
/// Fields are stored as raw byte arrays so every bit pattern is a valid
/// value and the struct can be cast from untrusted bytes.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned)]
pub struct MessageHeader {
    version: [u8; 2],
    message_type: [u8; 2],
}

impl MessageHeader {
    /// Size of the serialized prelude
    pub const SIZE: usize = 4;

    /// Prelude for the current protocol version
    #[must_use]
    pub fn new(message_type: MessageType) -> Self {
        Self::with_version(PROTOCOL_VERSION, message_type)
    }

    /// Prelude for an explicit protocol version
    #[must_use]
    pub fn with_version(version: u16, message_type: MessageType) -> Self {
        Self {
            version: version.to_be_bytes(),
            message_type: message_type.to_u16().to_be_bytes(),
        }
    }

    /// Parse the prelude from the front of `bytes` (zero-copy).
    ///
    /// Only the length is checked here; version and type validation are left
    /// to the caller so that each variant reports its own error.
    pub fn from_bytes(bytes: &[u8]) -> Result<&Self> {
        Self::ref_from_prefix(bytes)
            .map(|(header, _)| header)
            .map_err(|_| ProtocolError::Truncated { needed: Self::SIZE, available: bytes.len() })
    }

    /// Serialize to bytes
    #[must_use]
    #[allow(clippy::wrong_self_convention)]
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut arr = [0u8; Self::SIZE];
        arr.copy_from_slice(self.as_bytes());
        arr
    }

    /// Protocol version
    #[must_use]
    pub fn version(&self) -> u16 {
        u16::from_be_bytes(self.version)
    }

    /// Raw message type code
    #[must_use]
    pub fn message_type(&self) -> u16 {
        u16::from_be_bytes(self.message_type)
    }

    /// Message type code as an enum, `None` if unknown
    #[must_use]
    pub fn message_type_enum(&self) -> Option<MessageType> {
        MessageType::from_u16(self.message_type())
    }

    /// Check the version and that the type code is `expected`.
    pub fn expect(&self, expected: MessageType) -> Result<()> {
        check_version(self.version())?;
        if self.message_type() != expected.to_u16() {
            return Err(ProtocolError::UnexpectedMessageType {
                expected,
                actual: self.message_type(),
            });
        }
        Ok(())
    }
}
