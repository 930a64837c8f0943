//! Big Endian field codec shared by every message variant.
//!
//! Variable-length fields are written as a 2-byte Big Endian byte count
//! followed by the bytes. Strings are UTF-8 and their prefix counts bytes, not
//! characters.
//!
//! The reader never panics on short input: every access checks the remaining
//! length first and reports [`ProtocolError::Truncated`].

use bytes::{BufMut, BytesMut};

use crate::errors::{ProtocolError, Result};

/// Append-only field writer
#[derive(Debug, Default)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    /// Create an empty writer
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Write a single byte
    pub fn put_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    /// Write a Big Endian u16
    pub fn put_u16(&mut self, value: u16) {
        self.buf.put_u16(value);
    }

    /// Write raw bytes without a prefix
    pub fn put_raw(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Write a length-prefixed byte field
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::FieldTooLong`] if `bytes` does not fit a
    /// 16-bit length. Nothing is written in that case.
    pub fn put_bytes(&mut self, field: &'static str, bytes: &[u8]) -> Result<()> {
        let len = u16::try_from(bytes.len())
            .map_err(|_| ProtocolError::FieldTooLong { field, len: bytes.len() })?;
        self.buf.put_u16(len);
        self.buf.put_slice(bytes);
        Ok(())
    }

    /// Write a length-prefixed UTF-8 string
    pub fn put_str(&mut self, field: &'static str, value: &str) -> Result<()> {
        self.put_bytes(field, value.as_bytes())
    }

    /// Finish writing and return the encoded bytes
    #[must_use]
    pub fn into_vec(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Cursor over an encoded message
#[derive(Debug, Clone)]
pub struct WireReader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Start reading at the beginning of `bytes`
    #[must_use]
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    /// Bytes not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8]> {
        let available = self.remaining();
        if len > available {
            return Err(ProtocolError::Truncated { needed: len, available });
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    /// Read a single byte
    pub fn read_u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    /// Read a Big Endian u16
    pub fn read_u16(&mut self) -> Result<u16> {
        let bytes = self.take(2)?;
        Ok((u16::from(bytes[0]) << 8) | u16::from(bytes[1]))
    }

    /// Read a length-prefixed byte field
    pub fn read_bytes(&mut self) -> Result<&'a [u8]> {
        let len = self.read_u16()? as usize;
        self.take(len)
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_str(&mut self, field: &'static str) -> Result<String> {
        let bytes = self.read_bytes()?;
        std::str::from_utf8(bytes)
            .map(str::to_owned)
            .map_err(|_| ProtocolError::InvalidUtf8 { field })
    }

    /// Consume everything that is left
    pub fn read_rest(&mut self) -> &'a [u8] {
        let rest = &self.bytes[self.pos..];
        self.pos = self.bytes.len();
        rest
    }

    /// Require that the whole buffer was consumed
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::TrailingBytes`] if anything is left.
    pub fn finish(self) -> Result<()> {
        match self.remaining() {
            0 => Ok(()),
            extra => Err(ProtocolError::TrailingBytes(extra)),
        }
    }
}
