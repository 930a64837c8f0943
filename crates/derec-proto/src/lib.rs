//! Wire format for the DeRec social recovery protocols.
//!
//! Every message starts with a 2-byte Big Endian protocol version. Cleartext
//! messages follow it with a 2-byte type code and their fields; sealed
//! messages carry the type code inside an AEAD-sealed section so that only
//! the paired peer can tell what kind of message it is.
//!
//! Variable-length fields are prefixed with a `u16` byte count. Decoders
//! consume the whole input and reject trailing bytes.
//!
//! # Security
//!
//! The version is checked before anything else is read. Sealed sections are
//! parsed only after they verify, and unknown type codes are rejected rather
//! than skipped.
#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cipher;
pub mod errors;
pub mod header;
pub mod message;
pub mod message_type;
pub mod messages;
pub mod types;
pub mod wire;

pub use cipher::{ChaChaCipher, CipherContext, Envelope, decrypt, encrypt};
pub use errors::{ProtocolError, Result};
pub use header::{MessageHeader, PROTOCOL_VERSION};
pub use message::Message;
pub use message_type::{MessageType, ProtocolType};
pub use messages::{
    KeepAliveRequest, KeepAliveResponse, PairingAck, PairingRequest, PairingResponse,
    StoreLockboxShareRequest, StoreLockboxShareResponse, WireMessage,
};
pub use types::{OperatingMode, ProtocolStatus};
