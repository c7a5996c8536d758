//! Length-prefixed binary record framing: `u64` length (native byte order)
//! followed by exactly that many payload bytes, plus a chunked buffered
//! reader over that wire form.

use std::io::{self, Read, Write};
use std::sync::Arc;

use crate::error::MrError;

/// Encodes a `T` to its payload bytes.
pub type EncodeFn<T> = Arc<dyn Fn(&T) -> Vec<u8> + Send + Sync>;
/// Decodes payload bytes back to a `T`.
pub type DecodeFn<T> = Arc<dyn Fn(&[u8]) -> Result<T, MrError> + Send + Sync>;

/// Writes `u64 length` + payload records to any `Write`.
pub struct FrameWriter<W> {
    inner: W,
}

impl<W: Write> FrameWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub fn write_record(&mut self, payload: &[u8]) -> io::Result<()> {
        let len = payload.len() as u64;
        self.inner.write_all(&len.to_ne_bytes())?;
        self.inner.write_all(payload)?;
        Ok(())
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

/// Reads `u64 length` + payload records from any `Read`, buffering chunks
/// of `buffer_size` bytes. A record spanning a chunk boundary is
/// reassembled into its own `Vec`; steady-state resident memory stays near
/// one buffer's worth.
pub struct FrameReader<R> {
    inner: R,
    buf: Vec<u8>,
    pos: usize,
    filled: usize,
}

const LEN_PREFIX_BYTES: usize = std::mem::size_of::<u64>();

impl<R: Read> FrameReader<R> {
    pub fn new(inner: R, buffer_size: usize) -> Self {
        Self { inner, buf: vec![0u8; buffer_size.max(LEN_PREFIX_BYTES)], pos: 0, filled: 0 }
    }

    fn refill(&mut self) -> io::Result<bool> {
        self.pos = 0;
        self.filled = self.inner.read(&mut self.buf)?;
        Ok(self.filled > 0)
    }

    fn ensure_readable(&mut self) -> io::Result<bool> {
        if self.pos < self.filled {
            return Ok(true);
        }
        self.refill()
    }

    /// True if the buffer still holds unread bytes or a refill yields more.
    pub fn has_next(&mut self) -> io::Result<bool> {
        self.ensure_readable()
    }

    fn read_exact_buffered(&mut self, n: usize, out: &mut Vec<u8>) -> io::Result<()> {
        let mut remaining = n;
        while remaining > 0 {
            if self.pos >= self.filled && !self.refill()? {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "stream ended mid-record",
                ));
            }
            let available = self.filled - self.pos;
            let take = available.min(remaining);
            out.extend_from_slice(&self.buf[self.pos..self.pos + take]);
            self.pos += take;
            remaining -= take;
        }
        Ok(())
    }

    /// Reads one raw payload, or `None` at a clean end of stream.
    pub fn next_payload(&mut self) -> io::Result<Option<Vec<u8>>> {
        if !self.ensure_readable()? {
            return Ok(None);
        }
        let mut len_bytes = Vec::with_capacity(LEN_PREFIX_BYTES);
        self.read_exact_buffered(LEN_PREFIX_BYTES, &mut len_bytes)?;
        let len = u64::from_ne_bytes(len_bytes.try_into().expect("exactly 8 bytes")) as usize;
        let mut payload = Vec::with_capacity(len);
        self.read_exact_buffered(len, &mut payload)?;
        Ok(Some(payload))
    }
}

/// A [`FrameWriter`] paired with an [`EncodeFn`] for a specific `T`.
pub struct TypedFrameWriter<W, T> {
    raw: FrameWriter<W>,
    encode: EncodeFn<T>,
}

impl<W: Write, T> TypedFrameWriter<W, T> {
    pub fn new(inner: W, encode: EncodeFn<T>) -> Self {
        Self { raw: FrameWriter::new(inner), encode }
    }

    pub fn write_value(&mut self, value: &T) -> io::Result<()> {
        let payload = (self.encode)(value);
        self.raw.write_record(&payload)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.raw.flush()
    }

    pub fn into_inner(self) -> W {
        self.raw.into_inner()
    }
}

/// A [`FrameReader`] paired with a [`DecodeFn`] for a specific `T`.
pub struct TypedFrameReader<R, T> {
    raw: FrameReader<R>,
    decode: DecodeFn<T>,
}

impl<R: Read, T> TypedFrameReader<R, T> {
    pub fn new(inner: R, buffer_size: usize, decode: DecodeFn<T>) -> Self {
        Self { raw: FrameReader::new(inner, buffer_size), decode }
    }

    pub fn has_next(&mut self) -> io::Result<bool> {
        self.raw.has_next()
    }

    pub fn next_value(&mut self) -> Result<Option<T>, MrError> {
        match self.raw.next_payload()? {
            Some(bytes) => Ok(Some((self.decode)(&bytes)?)),
            None => Ok(None),
        }
    }
}
