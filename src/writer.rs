//! Cramberry encoder: append-only buffer with sticky-first-error semantics.

use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::types::{
    canonicalize_f32, canonicalize_f64, encode_uvarint, zigzag_encode, FieldTag, WireType,
    END_MARKER, MAX_VARINT_LEN_64,
};

const INITIAL_CAPACITY: usize = 256;
/// Buffer growth doubles up to this cap, then grows by exact demand.
const GROWTH_CAP: usize = 1 << 20;

/// Writer encodes Cramberry data into a binary buffer.
///
/// Every write operation: short-circuits if an error is already recorded,
/// fails with [`Error::FrozenBuffer`] if [`Writer::freeze`] has been called,
/// consults the relevant `Limits` bound before touching the buffer, and on a
/// limit breach records the error and leaves the buffer unchanged.
pub struct Writer {
    buffer: Vec<u8>,
    depth: usize,
    err: Option<Error>,
    frozen: bool,
    limits: Limits,
}

impl Writer {
    /// Creates a new writer with default limits.
    pub fn new() -> Self {
        Self::with_limits(Limits::default())
    }

    /// Creates a new writer with the given resource limits.
    pub fn with_limits(limits: Limits) -> Self {
        Self {
            buffer: Vec::with_capacity(INITIAL_CAPACITY),
            depth: 0,
            err: None,
            frozen: false,
            limits,
        }
    }

    /// Creates a new writer with the specified initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: Vec::with_capacity(capacity),
            depth: 0,
            err: None,
            frozen: false,
            limits: Limits::default(),
        }
    }

    /// Returns the current length of the buffer.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Returns true if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Returns the configured resource limits.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Returns the sticky error, if any has been recorded.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Returns the encoded bytes as a slice. Does not freeze the writer.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Freezes the writer and returns an immutable view of the accumulated
    /// bytes. Further writes fail with [`Error::FrozenBuffer`].
    pub fn freeze(&mut self) -> &[u8] {
        self.frozen = true;
        &self.buffer
    }

    /// Consumes the writer and returns the encoded bytes.
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Resets the writer for reuse: buffer truncated, error cleared, depth
    /// zero, frozen cleared. Limits are preserved.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.err = None;
        self.frozen = false;
        self.depth = 0;
    }

    fn fail<T>(&mut self, e: Error) -> Result<T> {
        self.err = Some(e.clone());
        Err(e)
    }

    /// Short-circuits on a previously recorded error or a frozen buffer.
    fn check(&mut self) -> Result<()> {
        if let Some(e) = &self.err {
            return Err(e.clone());
        }
        if self.frozen {
            return self.fail(Error::FrozenBuffer);
        }
        Ok(())
    }

    fn reserve_for(&mut self, additional: usize) {
        if self.buffer.capacity() - self.buffer.len() < additional {
            let want = self.buffer.len() + additional;
            let grown = if self.buffer.capacity() < GROWTH_CAP {
                (self.buffer.capacity() * 2).max(want)
            } else {
                want
            };
            self.buffer.reserve(grown - self.buffer.len());
        }
    }

    fn check_message_size(&mut self, additional: usize) -> Result<()> {
        let projected = self.buffer.len() + additional;
        if !Limits::check(self.limits.max_message_size, projected) {
            return self.fail(Error::MaxSizeExceeded {
                limit: self.limits.max_message_size,
            });
        }
        Ok(())
    }

    fn push_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.check()?;
        self.check_message_size(data.len())?;
        self.reserve_for(data.len());
        self.buffer.extend_from_slice(data);
        Ok(())
    }

    /// Enters a nested composite (struct, map, composite sequence). Must be
    /// paired with [`Writer::exit_nested`]. Packed primitive sequences do not
    /// need to bracket themselves: their risk is bounded by array-length
    /// limits instead.
    pub fn enter_nested(&mut self) -> Result<()> {
        self.check()?;
        let new_depth = self.depth + 1;
        if !Limits::check(self.limits.max_depth, new_depth) {
            return self.fail(Error::MaxDepthExceeded {
                limit: self.limits.max_depth,
            });
        }
        self.depth = new_depth;
        Ok(())
    }

    /// Exits a nested composite entered via [`Writer::enter_nested`].
    pub fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Reserves space for a length prefix and returns a checkpoint; pair with
    /// [`Writer::end_message`].
    pub fn begin_message(&mut self) -> Result<usize> {
        self.check()?;
        let checkpoint = self.buffer.len();
        self.reserve_for(MAX_VARINT_LEN_64);
        self.buffer.resize(checkpoint + MAX_VARINT_LEN_64, 0);
        Ok(checkpoint)
    }

    /// Computes the payload length since `checkpoint`, encodes it as a
    /// varint, and shifts the payload leftward to close the unused prefix
    /// gap reserved by [`Writer::begin_message`].
    pub fn end_message(&mut self, checkpoint: usize) -> Result<()> {
        self.check()?;
        let payload_start = checkpoint + MAX_VARINT_LEN_64;
        let payload_len = self.buffer.len() - payload_start;

        if !Limits::check(self.limits.max_message_size, self.buffer.len()) {
            return self.fail(Error::MaxSizeExceeded {
                limit: self.limits.max_message_size,
            });
        }

        let mut len_buf = Vec::new();
        encode_uvarint(&mut len_buf, payload_len as u64);
        let prefix_len = len_buf.len();

        self.buffer
            .copy_within(payload_start..payload_start + payload_len, checkpoint + prefix_len);
        self.buffer[checkpoint..checkpoint + prefix_len].copy_from_slice(&len_buf);
        self.buffer.truncate(checkpoint + prefix_len + payload_len);
        Ok(())
    }

    /// Writes a V2 compact field tag.
    pub fn write_tag(&mut self, field_number: u32, wire_type: WireType) -> Result<()> {
        self.check()?;
        let mut buf = Vec::new();
        FieldTag::new(field_number, wire_type).encode_compact(&mut buf);
        self.push_bytes(&buf)
    }

    /// Writes the end marker (0x00) terminating a struct body.
    pub fn write_end_marker(&mut self) -> Result<()> {
        self.push_bytes(&[END_MARKER])
    }

    /// Writes a single raw byte, bypassing varint continuation semantics.
    /// Used for `u8`/`i8`/`bool`, which are always exactly one byte wide.
    pub fn write_raw_byte(&mut self, value: u8) -> Result<()> {
        self.push_bytes(&[value])
    }

    /// Writes raw, unframed bytes with no length prefix.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.push_bytes(data)
    }

    /// Writes an unsigned LEB128 varint.
    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        self.check()?;
        let mut buf = Vec::new();
        encode_uvarint(&mut buf, value);
        self.push_bytes(&buf)
    }

    /// Writes a signed LEB128 varint via zigzag encoding.
    pub fn write_svarint(&mut self, value: i64) -> Result<()> {
        self.write_varint(zigzag_encode(value))
    }

    /// Writes a boolean as a single `{0,1}` byte.
    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_raw_byte(if value { 1 } else { 0 })
    }

    /// Writes a 4-byte little-endian fixed value.
    pub fn write_fixed32(&mut self, value: u32) -> Result<()> {
        self.push_bytes(&value.to_le_bytes())
    }

    /// Writes an 8-byte little-endian fixed value.
    pub fn write_fixed64(&mut self, value: u64) -> Result<()> {
        self.push_bytes(&value.to_le_bytes())
    }

    /// Canonicalizes and writes a 32-bit float (little-endian).
    pub fn write_float32(&mut self, value: f32) -> Result<()> {
        self.write_fixed32(canonicalize_f32(value).to_bits())
    }

    /// Canonicalizes and writes a 64-bit float (little-endian).
    pub fn write_float64(&mut self, value: f64) -> Result<()> {
        self.write_fixed64(canonicalize_f64(value).to_bits())
    }

    /// Writes a length-prefixed UTF-8 string, checked against
    /// `max_string_length`.
    pub fn write_string(&mut self, value: &str) -> Result<()> {
        self.check()?;
        if !Limits::check(self.limits.max_string_length, value.len()) {
            return self.fail(Error::MaxStringLength {
                limit: self.limits.max_string_length,
            });
        }
        self.write_varint(value.len() as u64)?;
        self.push_bytes(value.as_bytes())
    }

    /// Writes length-prefixed bytes, checked against `max_bytes_length`.
    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        self.check()?;
        if !Limits::check(self.limits.max_bytes_length, data.len()) {
            return self.fail(Error::MaxBytesLength {
                limit: self.limits.max_bytes_length,
            });
        }
        self.write_varint(data.len() as u64)?;
        self.push_bytes(data)
    }

    /// Writes a sequence element count, checked against `max_array_length`.
    pub fn write_array_len(&mut self, count: usize) -> Result<()> {
        self.check()?;
        if !Limits::check(self.limits.max_array_length, count) {
            return self.fail(Error::MaxArrayLength {
                limit: self.limits.max_array_length,
            });
        }
        self.write_varint(count as u64)
    }

    /// Writes a map entry count, checked against `max_map_size`.
    pub fn write_map_len(&mut self, count: usize) -> Result<()> {
        self.check()?;
        if !Limits::check(self.limits.max_map_size, count) {
            return self.fail(Error::MaxMapSize {
                limit: self.limits.max_map_size,
            });
        }
        self.write_varint(count as u64)
    }
}

impl Default for Writer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_varint_scenarios() {
        let mut w = Writer::new();
        w.write_varint(300).unwrap();
        assert_eq!(w.as_bytes(), &[0xac, 0x02]);
    }

    #[test]
    fn write_svarint_scenarios() {
        let mut w = Writer::new();
        w.write_svarint(-1).unwrap();
        assert_eq!(w.as_bytes(), &[1]);

        let mut w = Writer::new();
        w.write_svarint(1).unwrap();
        assert_eq!(w.as_bytes(), &[2]);

        let mut w = Writer::new();
        w.write_svarint(-64).unwrap();
        assert_eq!(w.as_bytes(), &[0x7f]);
    }

    #[test]
    fn write_float32_canonicalizes_nan() {
        let mut w = Writer::new();
        let nan_with_payload = f32::from_bits(0x7FBF_FFFF);
        w.write_float32(nan_with_payload).unwrap();
        assert_eq!(w.as_bytes(), &[0x00, 0x00, 0xC0, 0x7F]);
    }

    #[test]
    fn frozen_buffer_rejects_writes() {
        let mut w = Writer::new();
        w.write_bool(true).unwrap();
        w.freeze();
        assert!(matches!(w.write_bool(false), Err(Error::FrozenBuffer)));
    }

    #[test]
    fn sticky_error_short_circuits() {
        let mut w = Writer::with_limits(Limits::default().with_max_depth(1));
        w.enter_nested().unwrap();
        assert!(w.enter_nested().is_err());
        // Once poisoned, every subsequent call returns the same error.
        assert!(matches!(
            w.write_bool(true),
            Err(Error::MaxDepthExceeded { .. })
        ));
    }

    #[test]
    fn message_framing_roundtrip() {
        let mut w = Writer::new();
        let checkpoint = w.begin_message().unwrap();
        w.write_string("hello").unwrap();
        w.end_message(checkpoint).unwrap();

        let bytes = w.into_bytes();
        let (len, n) = crate::types::decode_uvarint(&bytes).unwrap();
        assert_eq!(len as usize, bytes.len() - n);
    }

    #[test]
    fn end_marker_is_zero_byte() {
        let mut w = Writer::new();
        w.write_end_marker().unwrap();
        assert_eq!(w.as_bytes(), &[0x00]);
    }

    #[test]
    fn max_string_length_enforced() {
        let mut w = Writer::with_limits(Limits::default().with_max_string_length(2));
        assert!(matches!(
            w.write_string("abc"),
            Err(Error::MaxStringLength { .. })
        ));
        assert!(w.as_bytes().is_empty());
    }
}
