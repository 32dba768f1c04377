//! Cramberry decoder: bounds-checked, non-owning view over a byte slice.

use crate::borrow::{BorrowedBytes, BorrowedStr};
use crate::error::{Error, Result};
use crate::limits::Limits;
use crate::types::{
    decode_compact_tag, decode_uvarint, zigzag_decode, CompactTag, WireType, END_MARKER,
};

/// Reader decodes Cramberry data from a borrowed byte slice.
///
/// Mirrors [`crate::writer::Writer`]'s sticky-first-error model: once an
/// error is recorded, every subsequent operation is a no-op returning that
/// error. The generation counter increments on every [`Reader::reset`] so
/// zero-copy borrows taken before a reset can detect staleness (§4.7).
pub struct Reader<'a> {
    buffer: &'a [u8],
    pos: usize,
    depth: usize,
    err: Option<Error>,
    generation: u64,
    limits: Limits,
    /// Stack of message-end boundaries pushed by `begin_message`.
    ends: Vec<usize>,
}

impl<'a> Reader<'a> {
    /// Creates a new reader over `data` with default limits.
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_limits(data, Limits::default())
    }

    /// Creates a new reader over `data` with the given resource limits.
    pub fn with_limits(data: &'a [u8], limits: Limits) -> Self {
        Self {
            buffer: data,
            pos: 0,
            depth: 0,
            err: None,
            generation: 0,
            limits,
            ends: Vec::new(),
        }
    }

    /// Current byte offset into the buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes remaining before the innermost message boundary (or buffer end).
    pub fn remaining(&self) -> usize {
        self.effective_end().saturating_sub(self.pos)
    }

    /// True if there is more data to read before the innermost boundary.
    pub fn has_more(&self) -> bool {
        self.pos < self.effective_end()
    }

    /// Current nesting depth.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Monotonic counter bumped on every [`Reader::reset`].
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns the configured resource limits.
    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Returns the sticky error, if any has been recorded.
    pub fn err(&self) -> Option<&Error> {
        self.err.as_ref()
    }

    /// Re-targets this reader at `data`, clearing position/error/depth and
    /// bumping the generation counter so outstanding borrowed views become
    /// detectably stale.
    pub fn reset(&mut self, data: &'a [u8]) {
        self.buffer = data;
        self.pos = 0;
        self.depth = 0;
        self.err = None;
        self.ends.clear();
        self.generation = self.generation.wrapping_add(1);
    }

    fn fail<T>(&mut self, e: Error) -> Result<T> {
        self.err = Some(e.clone());
        Err(e)
    }

    fn check(&mut self) -> Result<()> {
        if let Some(e) = &self.err {
            return Err(e.clone());
        }
        Ok(())
    }

    fn effective_end(&self) -> usize {
        self.ends.last().copied().unwrap_or(self.buffer.len())
    }

    fn check_available(&mut self, needed: usize) -> Result<()> {
        self.check()?;
        let end = self.effective_end();
        match self.pos.checked_add(needed) {
            Some(pos_after) if pos_after <= end => Ok(()),
            Some(_) => self.fail(Error::eof(needed, end.saturating_sub(self.pos))),
            None => self.fail(Error::Overflow),
        }
    }

    /// Reads a single raw byte, bypassing varint continuation semantics.
    pub fn read_raw_byte(&mut self) -> Result<u8> {
        self.check_available(1)?;
        let v = self.buffer[self.pos];
        self.pos += 1;
        Ok(v)
    }

    /// Reads `length` raw bytes.
    pub fn read_raw(&mut self, length: usize) -> Result<&'a [u8]> {
        self.check_available(length)?;
        let bytes = &self.buffer[self.pos..self.pos + length];
        self.pos += length;
        Ok(bytes)
    }

    /// Reads an unsigned LEB128 varint, enforcing the overflow/overlong/
    /// truncation rules of §4.1.
    pub fn read_varint(&mut self) -> Result<u64> {
        self.check()?;
        let end = self.effective_end();
        let available = &self.buffer[self.pos..end];
        match decode_uvarint(available) {
            Ok((value, n)) => {
                self.pos += n;
                Ok(value)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Reads a signed LEB128 varint via zigzag decoding.
    pub fn read_svarint(&mut self) -> Result<i64> {
        Ok(zigzag_decode(self.read_varint()?))
    }

    /// Reads a boolean.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_raw_byte()? != 0)
    }

    /// Reads a 4-byte little-endian fixed value.
    pub fn read_fixed32(&mut self) -> Result<u32> {
        let b = self.read_raw(4)?;
        Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
    }

    /// Reads an 8-byte little-endian fixed value.
    pub fn read_fixed64(&mut self) -> Result<u64> {
        let b = self.read_raw(8)?;
        Ok(u64::from_le_bytes([
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
        ]))
    }

    /// Reads a 32-bit float. Bits are returned verbatim; canonicalization is
    /// only ever performed on encode.
    pub fn read_float32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_fixed32()?))
    }

    /// Reads a 64-bit float. Bits are returned verbatim.
    pub fn read_float64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_fixed64()?))
    }

    fn read_length_prefix(&mut self, limit: usize, err: impl Fn(usize) -> Error) -> Result<usize> {
        let len = self.read_varint()?;
        if len > usize::MAX as u64 {
            return self.fail(Error::Overflow);
        }
        let len = len as usize;
        if !Limits::check(limit, len) {
            return self.fail(err(limit));
        }
        Ok(len)
    }

    /// Reads a length-prefixed UTF-8 string, copying it into an owned
    /// `String`. Validates UTF-8 when `limits.validate_utf8` is set.
    pub fn read_string(&mut self) -> Result<String> {
        Ok(self.read_str_borrowed_inner()?.0)
    }

    /// Reads a length-prefixed string as a zero-copy borrowed view.
    pub fn read_string_borrowed(&mut self) -> Result<BorrowedStr> {
        let (_, handle) = self.read_str_borrowed_inner()?;
        Ok(handle)
    }

    fn read_str_borrowed_inner(&mut self) -> Result<(String, BorrowedStr)> {
        let limit = self.limits.max_string_length;
        let validate = self.limits.validate_utf8;
        let len = self.read_length_prefix(limit, |l| Error::MaxStringLength { limit: l })?;
        let bytes = self.read_raw(len)?;
        if validate && std::str::from_utf8(bytes).is_err() {
            return self.fail(Error::InvalidUtf8);
        }
        let owned = String::from_utf8_lossy(bytes).into_owned();
        let handle = BorrowedStr::new(bytes, self.generation);
        Ok((owned, handle))
    }

    /// Reads length-prefixed bytes, copying into an owned `Vec<u8>`.
    pub fn read_bytes(&mut self) -> Result<Vec<u8>> {
        let limit = self.limits.max_bytes_length;
        let len = self.read_length_prefix(limit, |l| Error::MaxBytesLength { limit: l })?;
        Ok(self.read_raw(len)?.to_vec())
    }

    /// Reads length-prefixed bytes as a zero-copy borrowed view.
    pub fn read_bytes_borrowed(&mut self) -> Result<BorrowedBytes> {
        let limit = self.limits.max_bytes_length;
        let len = self.read_length_prefix(limit, |l| Error::MaxBytesLength { limit: l })?;
        let bytes = self.read_raw(len)?;
        Ok(BorrowedBytes::new(bytes, self.generation))
    }

    /// Reads and validates a sequence element count against `max_array_length`.
    pub fn read_array_len(&mut self) -> Result<usize> {
        let limit = self.limits.max_array_length;
        self.read_length_prefix(limit, |l| Error::MaxArrayLength { limit: l })
    }

    /// Reads and validates a map entry count against `max_map_size`.
    pub fn read_map_len(&mut self) -> Result<usize> {
        let limit = self.limits.max_map_size;
        self.read_length_prefix(limit, |l| Error::MaxMapSize { limit: l })
    }

    /// Reads a V2 compact field tag, or the end marker.
    pub fn read_tag(&mut self) -> Result<CompactTag> {
        self.check()?;
        let end = self.effective_end();
        if self.pos >= end {
            return self.fail(Error::eof(1, 0));
        }
        match decode_compact_tag(&self.buffer[self.pos..end]) {
            Ok((tag, n)) => {
                self.pos += n;
                Ok(tag)
            }
            Err(e) => self.fail(e),
        }
    }

    /// Checks if the next byte is the end marker without consuming it.
    pub fn peek_end_marker(&self) -> bool {
        self.pos < self.effective_end() && self.buffer[self.pos] == END_MARKER
    }

    /// Returns the next byte without consuming it, or `None` at the boundary.
    pub fn peek_byte(&self) -> Option<u8> {
        if self.pos < self.effective_end() {
            Some(self.buffer[self.pos])
        } else {
            None
        }
    }

    /// Enters a nested composite; call before recursing into a struct body,
    /// map, or composite sequence.
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

    /// Exits a nested composite entered via [`Reader::enter_nested`].
    pub fn exit_nested(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    /// Reads the length prefix of a delimited message, validates it against
    /// `max_message_size`, and returns the absolute end-of-message offset.
    pub fn begin_message(&mut self) -> Result<usize> {
        let limit = self.limits.max_message_size;
        let len = self.read_length_prefix(limit, |l| Error::MaxSizeExceeded { limit: l })?;
        let end = match self.pos.checked_add(len) {
            Some(end) => end,
            None => return self.fail(Error::Overflow),
        };
        if end > self.buffer.len() {
            return self.fail(Error::eof(len, self.buffer.len().saturating_sub(self.pos)));
        }
        self.ends.push(end);
        Ok(end)
    }

    /// Forces the position to `end`, skipping any unconsumed bytes in the
    /// message (tolerating unknown trailing fields). Message framing alone
    /// does not count as nesting (matching `Writer::begin_message`); a
    /// caller recursing into the message body is responsible for its own
    /// `enter_nested`/`exit_nested` pair.
    pub fn end_message(&mut self, end: usize) -> Result<()> {
        self.check()?;
        self.pos = end;
        self.ends.pop();
        Ok(())
    }

    /// Skips a value of the given wire type, for forward compatibility with
    /// unknown fields. `TYPEREF` can only skip its type-id varint: the
    /// concrete value cannot be structurally skipped without the type
    /// descriptor, a documented limitation of polymorphic fields.
    pub fn skip_value(&mut self, wire_type: WireType) -> Result<()> {
        match wire_type {
            WireType::Varint | WireType::SVarint => {
                self.read_varint()?;
            }
            WireType::Fixed64 => {
                self.check_available(8)?;
                self.pos += 8;
            }
            WireType::Fixed32 => {
                self.check_available(4)?;
                self.pos += 4;
            }
            WireType::Bytes => {
                let limit = self.limits.max_bytes_length;
                let len = self.read_length_prefix(limit, |l| Error::MaxBytesLength { limit: l })?;
                self.check_available(len)?;
                self.pos += len;
            }
            WireType::TypeRef => {
                self.read_varint()?;
            }
        }
        Ok(())
    }

    /// Creates a sub-reader bounded to the next `length` bytes, advancing
    /// past them in this reader.
    pub fn sub_reader(&mut self, length: usize) -> Result<Reader<'a>> {
        let bytes = self.read_raw(length)?;
        Ok(Reader::with_limits(bytes, self.limits))
    }
}
