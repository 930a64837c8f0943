//! Pairing messages.
//!
//! ```text
//! PairingRequest:  [version][0x0000][counter: 1][nonce: 1][mode: 1]
//!                  [len][name][len][phone][len][ecdh_public_key]
//! PairingResponse: [version][len][ecdh_public_key]
//!                  seal([0x0001][first_counter: 1][len][nonces][mode: 1]
//!                       [len][name][len][phone])
//! PairingAck:      [version] seal([0x0002])
//! ```
//!
//! The request travels in the clear because the peers share no key yet. The
//! response exposes only the responder's ephemeral public key; everything
//! else, including its type code, is sealed.

use super::{
    WireMessage, cleartext_reader, cleartext_writer, expect_sealed_type, require_envelope,
};
use crate::{
    Envelope, MessageType, OperatingMode,
    errors::Result,
    header::{PROTOCOL_VERSION, check_version, split_version},
    wire::{WireReader, WireWriter},
};

/// Opens a pairing conversation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingRequest {
    protocol_version: u16,
    counter: u8,
    nonce: u8,
    operating_mode: OperatingMode,
    name: String,
    phone: String,
    ecdh_public_key: Vec<u8>,
}

impl PairingRequest {
    /// Build a pairing request for the current protocol version
    #[must_use]
    pub fn new(
        counter: u8,
        nonce: u8,
        operating_mode: OperatingMode,
        name: impl Into<String>,
        phone: impl Into<String>,
        ecdh_public_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            counter,
            nonce,
            operating_mode,
            name: name.into(),
            phone: phone.into(),
            ecdh_public_key: ecdh_public_key.into(),
        }
    }

    /// Same request for another protocol version
    #[must_use]
    pub fn with_protocol_version(self, protocol_version: u16) -> Self {
        Self { protocol_version, ..self }
    }

    /// Sender's message counter
    #[must_use]
    pub fn counter(&self) -> u8 {
        self.counter
    }

    /// Single-use pairing nonce
    #[must_use]
    pub fn nonce(&self) -> u8 {
        self.nonce
    }

    /// Sender's operating mode
    #[must_use]
    pub fn operating_mode(&self) -> OperatingMode {
        self.operating_mode
    }

    /// Sender's display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sender's phone number
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Sender's ephemeral ECDH public key
    #[must_use]
    pub fn ecdh_public_key(&self) -> &[u8] {
        &self.ecdh_public_key
    }
}

impl WireMessage for PairingRequest {
    const MESSAGE_TYPE: MessageType = MessageType::PairingRequest;

    fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    fn encode(&self, _envelope: Option<Envelope<'_>>) -> Result<Vec<u8>> {
        let mut writer = cleartext_writer(self.protocol_version, Self::MESSAGE_TYPE)?;
        writer.put_u8(self.counter);
        writer.put_u8(self.nonce);
        writer.put_u8(self.operating_mode.to_u8());
        writer.put_str("name", &self.name)?;
        writer.put_str("phone", &self.phone)?;
        writer.put_bytes("ecdh_public_key", &self.ecdh_public_key)?;
        Ok(writer.into_vec())
    }

    fn decode(bytes: &[u8], _envelope: Option<Envelope<'_>>) -> Result<Self> {
        let mut reader = cleartext_reader(bytes, Self::MESSAGE_TYPE)?;
        let counter = reader.read_u8()?;
        let nonce = reader.read_u8()?;
        let operating_mode = OperatingMode::from_u8(reader.read_u8()?)?;
        let name = reader.read_str("name")?;
        let phone = reader.read_str("phone")?;
        let ecdh_public_key = reader.read_bytes()?.to_vec();
        reader.finish()?;

        Ok(Self::new(counter, nonce, operating_mode, name, phone, ecdh_public_key))
    }
}

/// Helper's reply to a pairing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingResponse {
    protocol_version: u16,
    first_counter: u8,
    nonces: Vec<u8>,
    operating_mode: OperatingMode,
    name: String,
    phone: String,
    ecdh_public_key: Vec<u8>,
}

impl PairingResponse {
    /// Build a pairing response for the current protocol version
    #[must_use]
    pub fn new(
        first_counter: u8,
        nonces: impl Into<Vec<u8>>,
        operating_mode: OperatingMode,
        name: impl Into<String>,
        phone: impl Into<String>,
        ecdh_public_key: impl Into<Vec<u8>>,
    ) -> Self {
        Self {
            protocol_version: PROTOCOL_VERSION,
            first_counter,
            nonces: nonces.into(),
            operating_mode,
            name: name.into(),
            phone: phone.into(),
            ecdh_public_key: ecdh_public_key.into(),
        }
    }

    /// Same response for another protocol version
    #[must_use]
    pub fn with_protocol_version(self, protocol_version: u16) -> Self {
        Self { protocol_version, ..self }
    }

    /// First counter value the responder will use
    #[must_use]
    pub fn first_counter(&self) -> u8 {
        self.first_counter
    }

    /// Nonces issued by the responder
    #[must_use]
    pub fn nonces(&self) -> &[u8] {
        &self.nonces
    }

    /// Responder's operating mode
    #[must_use]
    pub fn operating_mode(&self) -> OperatingMode {
        self.operating_mode
    }

    /// Responder's display name
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Responder's phone number
    #[must_use]
    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Responder's ephemeral ECDH public key (sent in the clear)
    #[must_use]
    pub fn ecdh_public_key(&self) -> &[u8] {
        &self.ecdh_public_key
    }

    fn encode_sealed_section(&self) -> Result<Vec<u8>> {
        let mut writer = WireWriter::new();
        writer.put_u16(Self::MESSAGE_TYPE.to_u16());
        writer.put_u8(self.first_counter);
        writer.put_bytes("nonces", &self.nonces)?;
        writer.put_u8(self.operating_mode.to_u8());
        writer.put_str("name", &self.name)?;
        writer.put_str("phone", &self.phone)?;
        Ok(writer.into_vec())
    }
}

impl WireMessage for PairingResponse {
    const MESSAGE_TYPE: MessageType = MessageType::PairingResponse;

    fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    fn encode(&self, envelope: Option<Envelope<'_>>) -> Result<Vec<u8>> {
        check_version(self.protocol_version)?;
        let envelope = require_envelope(envelope)?;

        let mut writer = WireWriter::new();
        writer.put_u16(self.protocol_version);
        writer.put_bytes("ecdh_public_key", &self.ecdh_public_key)?;
        writer.put_raw(&envelope.seal(&self.encode_sealed_section()?)?);
        Ok(writer.into_vec())
    }

    fn decode(bytes: &[u8], envelope: Option<Envelope<'_>>) -> Result<Self> {
        let mut reader = WireReader::new(split_version(bytes)?);
        let envelope = require_envelope(envelope)?;

        let ecdh_public_key = reader.read_bytes()?.to_vec();
        let opened = envelope.open(reader.read_rest())?;

        let mut sealed = WireReader::new(&opened);
        expect_sealed_type(&mut sealed, Self::MESSAGE_TYPE)?;
        let first_counter = sealed.read_u8()?;
        let nonces = sealed.read_bytes()?.to_vec();
        let operating_mode = OperatingMode::from_u8(sealed.read_u8()?)?;
        let name = sealed.read_str("name")?;
        let phone = sealed.read_str("phone")?;
        sealed.finish()?;

        Ok(Self::new(first_counter, nonces, operating_mode, name, phone, ecdh_public_key))
    }
}

/// Final acknowledgement that closes a pairing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairingAck {
    protocol_version: u16,
}

impl PairingAck {
    /// Build an ack for the current protocol version
    #[must_use]
    pub fn new() -> Self {
        Self { protocol_version: PROTOCOL_VERSION }
    }

    /// Same ack for another protocol version
    #[must_use]
    pub fn with_protocol_version(self, protocol_version: u16) -> Self {
        Self { protocol_version }
    }
}

impl Default for PairingAck {
    fn default() -> Self {
        Self::new()
    }
}

impl WireMessage for PairingAck {
    const MESSAGE_TYPE: MessageType = MessageType::PairingAck;

    fn protocol_version(&self) -> u16 {
        self.protocol_version
    }

    fn encode(&self, envelope: Option<Envelope<'_>>) -> Result<Vec<u8>> {
        check_version(self.protocol_version)?;
        let envelope = require_envelope(envelope)?;

        let mut writer = WireWriter::new();
        writer.put_u16(self.protocol_version);
        writer.put_raw(&envelope.seal(&Self::MESSAGE_TYPE.to_u16().to_be_bytes())?);
        Ok(writer.into_vec())
    }

    fn decode(bytes: &[u8], envelope: Option<Envelope<'_>>) -> Result<Self> {
        let body = split_version(bytes)?;
        let opened = require_envelope(envelope)?.open(body)?;

        let mut sealed = WireReader::new(&opened);
        expect_sealed_type(&mut sealed, Self::MESSAGE_TYPE)?;
        sealed.finish()?;
        Ok(Self::new())
    }
}
