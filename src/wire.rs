//! Little-endian binary codec shared by the cache and tile backend protocols.
//!
//! All frames are length-prefixed: a `u32` payload length followed by the
//! payload itself, whose first byte is the command or response code. Integers
//! are little-endian, floats are IEEE 754.

use std::io::{Read, Write};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

/// Upper bound on a single frame, guards against corrupted length prefixes.
const MAX_FRAME_BYTES: u32 = 1 << 30;

/// Errors raised while encoding, decoding or transporting frames.
#[derive(Debug, Error)]
pub enum WireError {
    /// Underlying socket or pipe error
    #[error("wire I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Frame length prefix out of bounds
    #[error("invalid frame length: {0} bytes")]
    Frame(u32),

    /// Payload ended before a field could be read
    #[error("unexpected end of payload reading {0}")]
    Truncated(&'static str),

    /// A string field was not valid UTF-8
    #[error("invalid UTF-8 in field {0}")]
    Utf8(&'static str),

    /// Peer answered with a well-formed but unexpected code or value
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Peer reported that the requested element does not exist
    #[error("no such element: {0}")]
    NoSuchElement(String),

    /// Request issued in a state the protocol does not allow
    #[error("illegal protocol state: {0}")]
    IllegalState(String),
}

/// Types with a fixed binary representation on the wire.
///
/// `read_from` must consume exactly the bytes `write_to` produced.
pub trait Wire: Sized {
    fn write_to(&self, buf: &mut BytesMut);
    fn read_from(buf: &mut Bytes) -> Result<Self, WireError>;

    /// Encode into a fresh buffer.
    fn to_wire(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.write_to(&mut buf);
        buf.freeze()
    }
}

/// Write a length-prefixed string.
pub fn put_string(buf: &mut BytesMut, value: &str) {
    buf.put_u32_le(value.len() as u32);
    buf.put_slice(value.as_bytes());
}

/// Read a length-prefixed string.
pub fn get_string(buf: &mut Bytes, field: &'static str) -> Result<String, WireError> {
    let len = get_u32(buf, field)? as usize;
    if buf.remaining() < len {
        return Err(WireError::Truncated(field));
    }
    let raw = buf.split_to(len);
    String::from_utf8(raw.to_vec()).map_err(|_| WireError::Utf8(field))
}

pub fn get_u8(buf: &mut Bytes, field: &'static str) -> Result<u8, WireError> {
    ensure(buf, 1, field)?;
    Ok(buf.get_u8())
}

pub fn get_u16(buf: &mut Bytes, field: &'static str) -> Result<u16, WireError> {
    ensure(buf, 2, field)?;
    Ok(buf.get_u16_le())
}

pub fn get_u32(buf: &mut Bytes, field: &'static str) -> Result<u32, WireError> {
    ensure(buf, 4, field)?;
    Ok(buf.get_u32_le())
}

pub fn get_u64(buf: &mut Bytes, field: &'static str) -> Result<u64, WireError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_u64_le())
}

pub fn get_i32(buf: &mut Bytes, field: &'static str) -> Result<i32, WireError> {
    ensure(buf, 4, field)?;
    Ok(buf.get_i32_le())
}

pub fn get_i64(buf: &mut Bytes, field: &'static str) -> Result<i64, WireError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_i64_le())
}

pub fn get_f64(buf: &mut Bytes, field: &'static str) -> Result<f64, WireError> {
    ensure(buf, 8, field)?;
    Ok(buf.get_f64_le())
}

/// Write an optional `f64` as a presence byte followed by the value.
pub fn put_opt_f64(buf: &mut BytesMut, value: Option<f64>) {
    match value {
        Some(v) => {
            buf.put_u8(1);
            buf.put_f64_le(v);
        }
        None => buf.put_u8(0),
    }
}

pub fn get_opt_f64(buf: &mut Bytes, field: &'static str) -> Result<Option<f64>, WireError> {
    match get_u8(buf, field)? {
        0 => Ok(None),
        1 => Ok(Some(get_f64(buf, field)?)),
        tag => Err(WireError::Protocol(format!(
            "invalid option tag {tag} for {field}"
        ))),
    }
}

fn ensure(buf: &Bytes, need: usize, field: &'static str) -> Result<(), WireError> {
    if buf.remaining() < need {
        Err(WireError::Truncated(field))
    } else {
        Ok(())
    }
}

/// Write one length-prefixed frame.
pub fn write_frame(stream: &mut impl Write, payload: &[u8]) -> Result<(), WireError> {
    let len = payload.len() as u32;
    if len > MAX_FRAME_BYTES {
        return Err(WireError::Frame(len));
    }
    stream.write_all(&len.to_le_bytes())?;
    stream.write_all(payload)?;
    stream.flush()?;
    Ok(())
}

/// Read one length-prefixed frame.
pub fn read_frame(stream: &mut impl Read) -> Result<Bytes, WireError> {
    let mut prefix = [0u8; 4];
    stream.read_exact(&mut prefix)?;
    let len = u32::from_le_bytes(prefix);
    if len > MAX_FRAME_BYTES {
        return Err(WireError::Frame(len));
    }
    let mut payload = vec![0u8; len as usize];
    stream.read_exact(&mut payload)?;
    Ok(Bytes::from(payload))
}
