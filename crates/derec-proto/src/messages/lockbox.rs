//! Lockbox share storage messages.
//!
//! ```text
//! StoreLockboxShareRequest:  [version][0x0300][share_version: 2][len][share]
//! StoreLockboxShareResponse: [version][0x0301][share_version: 2]
//! ```
//!
//! The share bytes are opaque to this crate. They are produced (and
//! encrypted) by the secret-sharing layer before they reach the codec.

use super::{WireMessage, cleartext_reader, cleartext_writer};
use crate::{Envelope, MessageType, errors::Result, header::PROTOCOL_VERSION};

/// Ask a helper to store a lockbox share.
///
/// # Security
///
/// - **Debug Redaction**: The `Debug` impl prints only the share length.
#[derive(Clone, PartialEq, Eq)]
pub struct StoreLockboxShareRequest {
    protocol_version: u16,
    share_version: u16,
    share: Vec<u8>,
}

impl StoreLockboxShareRequest {
    /// Build a store request for the current protocol version
    #[must_use]
    pub fn new(share_version: u16, share: impl Into<Vec<u8>>) -> Self {
        Self { protocol_version: PROTOCOL_VERSION, share_version, share: share.into() }
    }

    /// Same request for another protocol version
    #[must_use]
    pub fn with_protocol_version(self, protocol_version: u16) -> Self {
        Self { protocol_version, ..self }
    }

    /// Version of the lockbox this share belongs to
    #[must_use]
    pub fn share_version(&self) -> u16 {
        self.share_version
    }

    /// Opaque share bytes
    #[must_use]
    pub fn share(&self) -> &[u8] {
        &self.share
    }
}

impl std::fmt::Debug for StoreLockboxShareRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreLockboxShareRequest")
            .field("protocol_version", &self.protocol_version)
            .field("share_version", &self.share_version)
            .field("share", &format!("<redacted {} bytes>", self.share.len()))
            .finish()
    }
}

impl WireMessage for StoreLockboxShareRequest {
    const MESSAGE_TYPE: MessageType = MessageType::StoreLockboxShareRequest;

    fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    fn encode(&self, _envelope: Option<Envelope<'_>>) -> Result<Vec<u8>> {
        let mut writer = cleartext_writer(self.protocol_version, Self::MESSAGE_TYPE)?;
        writer.put_u16(self.share_version);
        writer.put_bytes("share", &self.share)?;
        Ok(writer.into_vec())
    }

    fn decode(bytes: &[u8], _envelope: Option<Envelope<'_>>) -> Result<Self> {
        let mut reader = cleartext_reader(bytes, Self::MESSAGE_TYPE)?;
        let share_version = reader.read_u16()?;
        let share = reader.read_bytes()?.to_vec();
        reader.finish()?;
        Ok(Self::new(share_version, share))
    }
}

/// Helper's confirmation that a share version is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreLockboxShareResponse {
    protocol_version: u16,
    share_version: u16,
}

impl StoreLockboxShareResponse {
    /// Build a store response for the current protocol version
    #[must_use]
    pub fn new(share_version: u16) -> Self {
        Self { protocol_version: PROTOCOL_VERSION, share_version }
    }

    /// Same response for another protocol version
    #[must_use]
    pub fn with_protocol_version(self, protocol_version: u16) -> Self {
        Self { protocol_version, ..self }
    }

    /// Share version the helper now holds
    #[must_use]
    pub fn share_version(&self) -> u16 {
        self.share_version
    }
}

impl WireMessage for StoreLockboxShareResponse {
    const MESSAGE_TYPE: MessageType = MessageType::StoreLockboxShareResponse;

    fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    fn encode(&self, _envelope: Option<Envelope<'_>>) -> Result<Vec<u8>> {
        let mut writer = cleartext_writer(self.protocol_version, Self::MESSAGE_TYPE)?;
        writer.put_u16(self.share_version);
        Ok(writer.into_vec())
    }

    fn decode(bytes: &[u8], _envelope: Option<Envelope<'_>>) -> Result<Self> {
        let mut reader = cleartext_reader(bytes, Self::MESSAGE_TYPE)?;
        let share_version = reader.read_u16()?;
        reader.finish()?;
        Ok(Self::new(share_version))
    }
}
