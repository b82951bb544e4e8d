//! Bounded, deterministic byte packing primitives.
//!
//! Fixed-width integers are big-endian; byte strings carry a 4-byte length
//! prefix. Writer and reader mirror each other so that overruns and
//! truncation fail the same way on both sides.

use crate::errors::{ChainError, ChainResult};

fn parse_err(msg: &str) -> ChainError {
    ChainError::FailedParsing(msg.into())
}

/// Append-only encoder with a hard output-size cap.
pub struct ByteWriter {
    buf: Vec<u8>,
    limit: usize,
}

impl ByteWriter {
    pub fn new(limit: usize) -> Self {
        ByteWriter {
            buf: Vec::with_capacity(128),
            limit,
        }
    }

    fn ensure(&mut self, additional: usize) -> ChainResult<()> {
        if self.buf.len().saturating_add(additional) > self.limit {
            return Err(parse_err("encoded size exceeds limit"));
        }
        Ok(())
    }

    pub fn write_u16(&mut self, value: u16) -> ChainResult<()> {
        self.ensure(2)?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    pub fn write_u64(&mut self, value: u64) -> ChainResult<()> {
        self.ensure(8)?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    /// Signed 64-bit value, written as its two's-complement bit pattern.
    pub fn write_i64(&mut self, value: i64) -> ChainResult<()> {
        self.write_u64(value as u64)
    }

    /// Length-prefixed byte string.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> ChainResult<()> {
        let len = u32::try_from(bytes.len()).map_err(|_| parse_err("byte string too long"))?;
        self.ensure(4 + bytes.len())?;
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(bytes);
        Ok(())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor-based decoder over a byte slice.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        ByteReader { buf, pos: 0 }
    }

    fn take(&mut self, count: usize) -> ChainResult<&'a [u8]> {
        let end = self
            .pos
            .checked_add(count)
            .ok_or_else(|| parse_err("length overflow"))?;
        if end > self.buf.len() {
            return Err(parse_err("truncated input"));
        }
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u16(&mut self) -> ChainResult<u16> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_u64(&mut self) -> ChainResult<u64> {
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(self.take(8)?);
        Ok(u64::from_be_bytes(bytes))
    }

    pub fn read_i64(&mut self) -> ChainResult<i64> {
        Ok(self.read_u64()? as i64)
    }

    pub fn read_bytes(&mut self) -> ChainResult<&'a [u8]> {
        let mut len = [0u8; 4];
        len.copy_from_slice(self.take(4)?);
        self.take(u32::from_be_bytes(len) as usize)
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Fail unless every input byte has been consumed.
    pub fn expect_done(&self) -> ChainResult<()> {
        if self.remaining() != 0 {
            return Err(parse_err("trailing bytes"));
        }
        Ok(())
    }
}
