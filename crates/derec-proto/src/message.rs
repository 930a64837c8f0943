//! The closed set of DeRec messages.
//!
//! [`Message`] is what sessions consume and produce. It dispatches to the
//! per-variant codecs in [`crate::messages`] by matching on the variant, and
//! [`Message::decode`] recovers the variant from raw bytes.
//!
//! # Recognizing Sealed Variants
//!
//! Cleartext variants announce their type in the 4-byte prelude. Sealed
//! variants hide it, so decoding tries each sealed layout. Bytes sealed for
//! one layout never verify when read as another. Sealed bytes can still look
//! like a cleartext prelude, so with an envelope a layout that verifies is
//! preferred over a cleartext parse.

use crate::{
    Envelope, MessageType, ProtocolType,
    errors::{ProtocolError, Result},
    header::{MessageHeader, split_version},
    messages::{
        KeepAliveRequest, KeepAliveResponse, PairingAck, PairingRequest, PairingResponse,
        StoreLockboxShareRequest, StoreLockboxShareResponse, WireMessage,
    },
};

/// Any message this codec can encode or decode
///
/// # Invariants
///
/// - **Type Uniqueness**: Each variant corresponds to exactly one
///   [`MessageType`], returned by [`Message::message_type`].
/// - **Immutability**: Variants expose getters only; a decoded message is
///   never modified after construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Opens a pairing conversation
    PairingRequest(PairingRequest),
    /// Helper's reply to a pairing request
    PairingResponse(PairingResponse),
    /// Final acknowledgement of a pairing
    PairingAck(PairingAck),
    /// Periodic liveness probe
    KeepAliveRequest(KeepAliveRequest),
    /// Liveness reply
    KeepAliveResponse(KeepAliveResponse),
    /// Ask a helper to store a share
    StoreLockboxShareRequest(StoreLockboxShareRequest),
    /// Helper's confirmation of a stored share
    StoreLockboxShareResponse(StoreLockboxShareResponse),
}

impl Message {
    /// Type code of this message
    #[must_use]
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::PairingRequest(_) => PairingRequest::MESSAGE_TYPE,
            Self::PairingResponse(_) => PairingResponse::MESSAGE_TYPE,
            Self::PairingAck(_) => PairingAck::MESSAGE_TYPE,
            Self::KeepAliveRequest(_) => KeepAliveRequest::MESSAGE_TYPE,
            Self::KeepAliveResponse(_) => KeepAliveResponse::MESSAGE_TYPE,
            Self::StoreLockboxShareRequest(_) => StoreLockboxShareRequest::MESSAGE_TYPE,
            Self::StoreLockboxShareResponse(_) => StoreLockboxShareResponse::MESSAGE_TYPE,
        }
    }

    /// Protocol this message belongs to
    #[must_use]
    pub fn protocol_type(&self) -> ProtocolType {
        self.message_type().protocol_type()
    }

    /// True if this message may open a new conversation
    #[must_use]
    pub fn first_in_protocol(&self) -> bool {
        self.message_type().first_in_protocol()
    }

    /// Protocol version the message carries
    #[must_use]
    pub fn protocol_version(&self) -> u16 {
        match self {
            Self::PairingRequest(m) => m.protocol_version(),
            Self::PairingResponse(m) => m.protocol_version(),
            Self::PairingAck(m) => m.protocol_version(),
            Self::KeepAliveRequest(m) => m.protocol_version(),
            Self::KeepAliveResponse(m) => m.protocol_version(),
            Self::StoreLockboxShareRequest(m) => m.protocol_version(),
            Self::StoreLockboxShareResponse(m) => m.protocol_version(),
        }
    }

    /// True if encoding this message requires an [`Envelope`]
    #[must_use]
    pub fn is_sealed(&self) -> bool {
        !has_cleartext_header(self.message_type())
    }

    /// Serialize to wire bytes
    pub fn encode(&self, envelope: Option<Envelope<'_>>) -> Result<Vec<u8>> {
        match self {
            Self::PairingRequest(m) => m.encode(envelope),
            Self::PairingResponse(m) => m.encode(envelope),
            Self::PairingAck(m) => m.encode(envelope),
            Self::KeepAliveRequest(m) => m.encode(envelope),
            Self::KeepAliveResponse(m) => m.encode(envelope),
            Self::StoreLockboxShareRequest(m) => m.encode(envelope),
            Self::StoreLockboxShareResponse(m) => m.encode(envelope),
        }
    }

    /// Decode any message from wire bytes.
    ///
    /// # Errors
    ///
    /// - [`ProtocolError::UnsupportedVersion`] if the version is not 1
    /// - [`ProtocolError::UnknownMessageType`] for a registry code this codec
    ///   has no layout for
    /// - [`ProtocolError::MissingCipherContext`] if the bytes can only be a
    ///   sealed variant and no envelope was given
    /// - [`ProtocolError::AuthenticationFailed`] if no sealed layout verifies
    /// - any structural error from the matching variant decoder
    pub fn decode(bytes: &[u8], envelope: Option<Envelope<'_>>) -> Result<Self> {
        split_version(bytes)?;
        let code = MessageHeader::from_bytes(bytes).ok().map(MessageHeader::message_type);

        match code.and_then(MessageType::from_u16) {
            Some(message_type) if has_cleartext_header(message_type) => {
                let cleartext = decode_cleartext(message_type, bytes);
                match envelope.map(|envelope| decode_sealed(bytes, envelope)) {
                    Some(Ok(sealed)) => Ok(sealed),
                    _ => cleartext,
                }
            },
            known => match envelope {
                Some(envelope) => decode_sealed(bytes, envelope),
                None => match (known, code) {
                    (Some(_), Some(code)) => Err(ProtocolError::UnknownMessageType(code)),
                    _ => Err(ProtocolError::MissingCipherContext),
                },
            },
        }
    }
}

/// Variants whose type code follows the version in the clear
const fn has_cleartext_header(message_type: MessageType) -> bool {
    matches!(
        message_type,
        MessageType::PairingRequest
            | MessageType::KeepAliveRequest
            | MessageType::KeepAliveResponse
            | MessageType::StoreLockboxShareRequest
            | MessageType::StoreLockboxShareResponse
    )
}

fn decode_cleartext(message_type: MessageType, bytes: &[u8]) -> Result<Message> {
    match message_type {
        MessageType::PairingRequest => PairingRequest::decode(bytes, None).map(Into::into),
        MessageType::KeepAliveRequest => KeepAliveRequest::decode(bytes, None).map(Into::into),
        MessageType::KeepAliveResponse => KeepAliveResponse::decode(bytes, None).map(Into::into),
        MessageType::StoreLockboxShareRequest => {
            StoreLockboxShareRequest::decode(bytes, None).map(Into::into)
        },
        MessageType::StoreLockboxShareResponse => {
            StoreLockboxShareResponse::decode(bytes, None).map(Into::into)
        },
        other => Err(ProtocolError::UnknownMessageType(other.to_u16())),
    }
}

fn decode_sealed(bytes: &[u8], envelope: Envelope<'_>) -> Result<Message> {
    let ack_err = match PairingAck::decode(bytes, Some(envelope)) {
        Ok(ack) => return Ok(ack.into()),
        Err(err) => err,
    };

    // The ack verified but was malformed: that error is authoritative.
    if !ack_err.is_authentication_failure() {
        return Err(ack_err);
    }

    PairingResponse::decode(bytes, Some(envelope)).map(Into::into).map_err(|err| match err {
        // Bytes too short for the response prefix and not a valid ack either.
        ProtocolError::Truncated { .. } => ProtocolError::AuthenticationFailed,
        other => other,
    })
}

macro_rules! impl_from_variant {
    ($($variant:ident),* $(,)?) => {
        $(
            impl From<$variant> for Message {
                fn from(message: $variant) -> Self {
                    Self::$variant(message)
                }
            }
        )*
    };
}

impl_from_variant!(
    PairingRequest,
    PairingResponse,
    PairingAck,
    KeepAliveRequest,
    KeepAliveResponse,
    StoreLockboxShareRequest,
    StoreLockboxShareResponse,
);
