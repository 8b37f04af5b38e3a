//! Wire protocol encoding and decoding primitives.
//!
//! All integers are big-endian (network byte order). A frame is
//! `[tag:1][length:4][body:length-4]`, where the length counts itself but not
//! the tag. Startup-phase frontend frames carry no tag.

use crate::error::{Error, Result};
use crate::logging;
use tracing::Level;

use super::backend::{BackendMessage, RawMessage};
use super::frontend::FrontendMessage;

/// Size of a tagged frame header: type byte plus length.
pub const FRAME_HEADER_LEN: usize = 5;

/// Read 1-byte unsigned integer.
#[inline]
pub fn read_u8(data: &[u8]) -> Result<(u8, &[u8])> {
    if data.is_empty() {
        return Err(Error::Protocol("read_u8: empty buffer".into()));
    }
    Ok((data[0], &data[1..]))
}

/// Read 2-byte big-endian unsigned integer.
#[inline]
pub fn read_u16(data: &[u8]) -> Result<(u16, &[u8])> {
    let (bytes, rest) = read_array::<2>(data, "read_u16")?;
    Ok((u16::from_be_bytes(*bytes), rest))
}

/// Read 4-byte big-endian signed integer.
#[inline]
pub fn read_i32(data: &[u8]) -> Result<(i32, &[u8])> {
    let (bytes, rest) = read_array::<4>(data, "read_i32")?;
    Ok((i32::from_be_bytes(*bytes), rest))
}

/// Read 4-byte big-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (bytes, rest) = read_array::<4>(data, "read_u32")?;
    Ok((u32::from_be_bytes(*bytes), rest))
}

#[inline]
fn read_array<'a, const N: usize>(data: &'a [u8], what: &str) -> Result<(&'a [u8; N], &'a [u8])> {
    data.split_first_chunk::<N>().ok_or_else(|| {
        Error::Protocol(format!(
            "{what}: buffer too short: {} < {N}",
            data.len()
        ))
    })
}

/// Read fixed-length bytes.
#[inline]
pub fn read_bytes(data: &[u8], len: usize) -> Result<(&[u8], &[u8])> {
    if data.len() < len {
        return Err(Error::Protocol(format!(
            "read_bytes: buffer too short: {} < {}",
            data.len(),
            len
        )));
    }
    Ok((&data[..len], &data[len..]))
}

/// Read null-terminated string.
/// Returns the string bytes (without the null terminator) and remaining data.
#[inline]
pub fn read_cstring(data: &[u8]) -> Result<(&[u8], &[u8])> {
    match memchr::memchr(0, data) {
        Some(pos) => Ok((&data[..pos], &data[pos + 1..])),
        None => Err(Error::Protocol(
            "read_cstring: no null terminator found".into(),
        )),
    }
}

/// Read null-terminated string as &str.
#[inline]
pub fn read_cstr(data: &[u8]) -> Result<(&str, &[u8])> {
    let (bytes, rest) = read_cstring(data)?;
    let s = simdutf8::compat::from_utf8(bytes)
        .map_err(|e| Error::Protocol(format!("read_cstr: invalid UTF-8: {e}")))?;
    Ok((s, rest))
}

/// Write 1-byte unsigned integer.
#[inline]
pub fn write_u8(out: &mut Vec<u8>, value: u8) {
    out.push(value);
}

/// Write 2-byte big-endian unsigned integer.
#[inline]
pub fn write_u16(out: &mut Vec<u8>, value: u16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write 4-byte big-endian signed integer.
#[inline]
pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write 4-byte big-endian unsigned integer.
#[inline]
pub fn write_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write raw bytes.
#[inline]
pub fn write_bytes(out: &mut Vec<u8>, data: &[u8]) {
    out.extend_from_slice(data);
}

/// Write null-terminated string.
#[inline]
pub fn write_cstring(out: &mut Vec<u8>, s: &[u8]) {
    out.extend_from_slice(s);
    out.push(0);
}

/// Write null-terminated string from &str.
#[inline]
pub fn write_cstr(out: &mut Vec<u8>, s: &str) {
    write_cstring(out, s.as_bytes());
}

/// Message builder helper that handles the length field.
///
/// Frame format:
/// - Type byte (1 byte) - NOT included in length
/// - Length (4 bytes) - includes itself
/// - Payload (Length - 4 bytes)
pub struct MessageBuilder<'a> {
    buf: &'a mut Vec<u8>,
    start: usize,
}

impl<'a> MessageBuilder<'a> {
    /// Start building a message with a type byte.
    pub fn new(buf: &'a mut Vec<u8>, type_byte: u8) -> Self {
        buf.push(type_byte);
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]); // Placeholder for length
        Self { buf, start }
    }

    /// Start building an untagged message (startup, SSL probe, cancel).
    pub fn new_startup(buf: &'a mut Vec<u8>) -> Self {
        let start = buf.len();
        buf.extend_from_slice(&[0, 0, 0, 0]); // Placeholder for length
        Self { buf, start }
    }

    /// Get mutable access to the underlying buffer.
    pub fn buf(&mut self) -> &mut Vec<u8> {
        self.buf
    }

    /// Write a u8.
    pub fn write_u8(&mut self, value: u8) {
        write_u8(self.buf, value);
    }

    /// Write a u16.
    pub fn write_u16(&mut self, value: u16) {
        write_u16(self.buf, value);
    }

    /// Write an i32.
    pub fn write_i32(&mut self, value: i32) {
        write_i32(self.buf, value);
    }

    /// Write a u32.
    pub fn write_u32(&mut self, value: u32) {
        write_u32(self.buf, value);
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, data: &[u8]) {
        write_bytes(self.buf, data);
    }

    /// Write null-terminated string.
    pub fn write_cstr(&mut self, s: &str) {
        write_cstr(self.buf, s);
    }

    /// Finish building the message and fill in the length field.
    pub fn finish(self) {
        let len = (self.buf.len() - self.start) as u32;
        self.buf[self.start..self.start + 4].copy_from_slice(&len.to_be_bytes());
    }
}

/// Fail unless the whole body was consumed.
#[inline]
pub fn expect_end(rest: &[u8], what: &str) -> Result<()> {
    if rest.is_empty() {
        Ok(())
    } else {
        Err(Error::Protocol(format!(
            "{what}: {} trailing bytes in message body",
            rest.len()
        )))
    }
}

/// Decode a tagged frame header into the type byte and body length.
///
/// The declared length includes the 4 length bytes themselves, so anything
/// below 4 is malformed.
pub fn parse_frame_header(header: &[u8; FRAME_HEADER_LEN]) -> Result<(u8, usize)> {
    let length = u32::from_be_bytes([header[1], header[2], header[3], header[4]]);
    if length < 4 {
        return Err(Error::Protocol(format!(
            "Invalid message length {} for message '{}'",
            length,
            header[0].escape_ascii()
        )));
    }
    Ok((header[0], (length - 4) as usize))
}

/// Split one complete tagged frame off the front of `data`.
///
/// Fails if `data` holds fewer bytes than the header declares.
pub fn split_frame(data: &[u8]) -> Result<(RawMessage<'_>, &[u8])> {
    let (header, rest) = data.split_first_chunk::<FRAME_HEADER_LEN>().ok_or_else(|| {
        Error::Protocol(format!(
            "truncated frame header: {} < {}",
            data.len(),
            FRAME_HEADER_LEN
        ))
    })?;
    let (type_byte, body_len) = parse_frame_header(header)?;
    if rest.len() < body_len {
        return Err(Error::Protocol(format!(
            "truncated body for message '{}': declared {} bytes, {} available",
            type_byte.escape_ascii(),
            body_len,
            rest.len()
        )));
    }
    let (payload, rest) = rest.split_at(body_len);
    Ok((RawMessage::new(type_byte, payload), rest))
}

/// Append `msg` as a complete frame to `buf`.
///
/// Nothing is logged here; the frame is logged once it has been flushed.
#[inline]
pub fn encode_message<M: FrontendMessage + ?Sized>(buf: &mut Vec<u8>, msg: &M) {
    msg.write_frame(buf);
}

/// Decode a received frame into a typed message.
///
/// Rows are not logged; a bulk fetch would flood the log.
pub fn decode_message(raw: RawMessage<'_>) -> Result<BackendMessage<'_>> {
    let msg = raw.decode()?;
    if !msg.is_data_row() && logging::enabled(Level::DEBUG) {
        tracing::debug!("<- {}", msg);
    }
    Ok(msg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_length() {
        let mut buf = Vec::new();
        let mut msg = MessageBuilder::new(&mut buf, b'p');
        msg.write_cstr("abc");
        msg.finish();
        assert_eq!(buf, b"p\x00\x00\x00\x08abc\x00");
    }

    #[test]
    fn startup_builder_has_no_tag() {
        let mut buf = Vec::new();
        let mut msg = MessageBuilder::new_startup(&mut buf);
        msg.write_u32(1);
        msg.finish();
        assert_eq!(buf, [0, 0, 0, 8, 0, 0, 0, 1]);
    }

    #[test]
    fn split_frame_exact() {
        let data = b"Z\x00\x00\x00\x05IZ\x00\x00\x00\x05T";
        let (msg, rest) = split_frame(data).unwrap();
        assert_eq!(msg.type_byte, b'Z');
        assert_eq!(msg.payload, b"I");
        let (msg, rest) = split_frame(rest).unwrap();
        assert_eq!(msg.payload, b"T");
        assert!(rest.is_empty());
    }

    #[test]
    fn split_frame_short_body_fails() {
        // declares 6 body bytes, only 2 present
        let data = b"S\x00\x00\x00\x0aab";
        let err = split_frame(data).unwrap_err();
        assert!(matches!(err, Error::Protocol(_)));
    }

    #[test]
    fn split_frame_bad_length_fails() {
        let data = b"Z\x00\x00\x00\x03";
        assert!(split_frame(data).is_err());
        assert!(split_frame(b"Z\x00").is_err());
    }

    #[test]
    fn cstr_reading() {
        let (s, rest) = read_cstr(b"user\x00dbadmin\x00").unwrap();
        assert_eq!(s, "user");
        let (s, rest) = read_cstr(rest).unwrap();
        assert_eq!(s, "dbadmin");
        assert!(rest.is_empty());
        assert!(read_cstr(b"no terminator").is_err());
        assert!(expect_end(b"x", "test").is_err());
    }
}
