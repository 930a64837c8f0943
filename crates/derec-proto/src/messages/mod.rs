//! Message variants and their wire layouts.
//!
//! Each variant implements [`WireMessage`]. Variants come in two shapes:
//!
//! - **Cleartext**: `version ‖ type ‖ fields`. Keep-alive and lockbox share
//!   messages use this shape; their type code can be read without a key.
//! - **Sealed**: `version ‖ cleartext prefix ‖ seal(type ‖ fields)`. The type
//!   code travels inside the sealed section and is only checked after the
//!   section verifies. Pairing responses and acks use this shape.
//!
//! Messages are immutable once built. The `with_protocol_version` builders
//! return a new value and exist so callers can produce (and tests can reject)
//! messages for other protocol versions.

pub mod keep_alive;
pub mod lockbox;
pub mod pairing;

pub use keep_alive::{KeepAliveRequest, KeepAliveResponse};
pub use lockbox::{StoreLockboxShareRequest, StoreLockboxShareResponse};
pub use pairing::{PairingAck, PairingRequest, PairingResponse};

use crate::{
    Envelope, MessageType, ProtocolType,
    errors::{ProtocolError, Result},
    header::{MessageHeader, check_version, split_version},
    wire::{WireReader, WireWriter},
};

/// Codec contract shared by every message variant.
pub trait WireMessage: Sized {
    /// Type code this variant encodes as
    const MESSAGE_TYPE: MessageType;

    /// Protocol version the message was built or decoded with
    fn protocol_version(&self) -> u16;

    /// Serialize to wire bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnsupportedVersion`] unless the version is 1
    /// - [`ProtocolError::MissingCipherContext`] for sealed variants without
    ///   an envelope
    /// - [`ProtocolError::FieldTooLong`] if a variable field exceeds 65535
    ///   bytes
    fn encode(&self, envelope: Option<Envelope<'_>>) -> Result<Vec<u8>>;

    /// Parse wire bytes into a fully populated message.
    ///
    /// Cleartext variants ignore the envelope.
    fn decode(bytes: &[u8], envelope: Option<Envelope<'_>>) -> Result<Self>;

    /// Protocol this variant belongs to
    fn protocol_type(&self) -> ProtocolType {
        Self::MESSAGE_TYPE.protocol_type()
    }

    /// True if this variant may open a new conversation
    fn first_in_protocol(&self) -> bool {
        Self::MESSAGE_TYPE.first_in_protocol()
    }
}

/// Start a cleartext message: version and type prelude.
fn cleartext_writer(version: u16, message_type: MessageType) -> Result<WireWriter> {
    check_version(version)?;
    let mut writer = WireWriter::new();
    writer.put_raw(&MessageHeader::with_version(version, message_type).to_bytes());
    Ok(writer)
}

/// Validate a cleartext prelude and return a reader over the fields.
fn cleartext_reader(bytes: &[u8], expected: MessageType) -> Result<WireReader<'_>> {
    split_version(bytes)?;
    let header = MessageHeader::from_bytes(bytes)?;
    header.expect(expected)?;
    Ok(WireReader::new(&bytes[MessageHeader::SIZE..]))
}

/// Read the type code at the front of an opened sealed section.
fn expect_sealed_type(reader: &mut WireReader<'_>, expected: MessageType) -> Result<()> {
    let actual = reader.read_u16()?;
    if actual != expected.to_u16() {
        return Err(ProtocolError::UnexpectedMessageType { expected, actual });
    }
    Ok(())
}

fn require_envelope(envelope: Option<Envelope<'_>>) -> Result<Envelope<'_>> {
    envelope.ok_or(ProtocolError::MissingCipherContext)
}
