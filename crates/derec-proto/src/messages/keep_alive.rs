//! Keep-alive messages.
//!
//! Both variants are cleartext. A request is just the prelude; a response
//! adds the share version the helper currently stores for the owner.
//!
//! ```text
//! KeepAliveRequest:  [version: 2][0x0200]
//! KeepAliveResponse: [version: 2][0x0201][stored_version: 2]
//! ```

use super::{WireMessage, cleartext_reader, cleartext_writer};
use crate::{Envelope, MessageType, errors::Result, header::PROTOCOL_VERSION};

/// Periodic liveness probe. Opens a keep-alive conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveRequest {
    protocol_version: u16,
}

impl KeepAliveRequest {
    /// Build a request for the current protocol version
    #[must_use]
    pub fn new() -> Self {
        Self { protocol_version: PROTOCOL_VERSION }
    }

    /// Same request for another protocol version
    #[must_use]
    pub fn with_protocol_version(self, protocol_version: u16) -> Self {
        Self { protocol_version }
    }
}

impl Default for KeepAliveRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl WireMessage for KeepAliveRequest {
    const MESSAGE_TYPE: MessageType = MessageType::KeepAliveRequest;

    fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    fn encode(&self, _envelope: Option<Envelope<'_>>) -> Result<Vec<u8>> {
        Ok(cleartext_writer(self.protocol_version, Self::MESSAGE_TYPE)?.into_vec())
    }

    fn decode(bytes: &[u8], _envelope: Option<Envelope<'_>>) -> Result<Self> {
        let reader = cleartext_reader(bytes, Self::MESSAGE_TYPE)?;
        reader.finish()?;
        Ok(Self::new())
    }
}

/// Reply to a keep-alive request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeepAliveResponse {
    protocol_version: u16,
    stored_share_version: u16,
}

impl KeepAliveResponse {
    /// Build a response reporting `stored_share_version`
    #[must_use]
    pub fn new(stored_share_version: u16) -> Self {
        Self { protocol_version: PROTOCOL_VERSION, stored_share_version }
    }

    /// Same response for another protocol version
    #[must_use]
    pub fn with_protocol_version(self, protocol_version: u16) -> Self {
        Self { protocol_version, ..self }
    }

    /// Lockbox share version the responder holds for the requester
    #[must_use]
    pub fn stored_share_version(&self) -> u16 {
        self.stored_share_version
    }
}

impl WireMessage for KeepAliveResponse {
    const MESSAGE_TYPE: MessageType = MessageType::KeepAliveResponse;

    fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    fn encode(&self, _envelope: Option<Envelope<'_>>) -> Result<Vec<u8>> {
        let mut writer = cleartext_writer(self.protocol_version, Self::MESSAGE_TYPE)?;
        writer.put_u16(self.stored_share_version);
        Ok(writer.into_vec())
    }

    fn decode(bytes: &[u8], _envelope: Option<Envelope<'_>>) -> Result<Self> {
        let mut reader = cleartext_reader(bytes, Self::MESSAGE_TYPE)?;
        let stored_share_version = reader.read_u16()?;
        reader.finish()?;
        Ok(Self::new(stored_share_version))
    }
}
