//! Cramberry - schema-informed binary serialization for Rust.
//!
//! The wire format is specified in [`types`]; [`Writer`]/[`Reader`] are the
//! low-level primitive codec; [`value`] is the reflective translator that
//! drives them from a runtime [`metadata::Kind`] descriptor instead of
//! generated per-type code; [`registry`] handles polymorphic (`TYPEREF`)
//! fields for hand-written encode/decode functions.
//!
//! # Example
//!
//! ```rust
//! use cramberry::metadata::{Kind, StructDescriptorBuilder};
//! use cramberry::value::Value;
//! use std::sync::Arc;
//!
//! let descriptor = Arc::new(
//!     StructDescriptorBuilder::new("Point")
//!         .field(1, "x", Kind::I32, false, true)
//!         .field(2, "y", Kind::I32, false, true)
//!         .build()
//!         .unwrap(),
//! );
//! let point = Value::Struct(vec![(1, Value::I32(3)), (2, Value::I32(4))]);
//!
//! let bytes = cramberry::encode(&point).unwrap();
//! let decoded = cramberry::decode(&bytes, &Kind::Struct(descriptor)).unwrap();
//! assert_eq!(decoded, point);
//! ```

mod borrow;
mod error;
pub mod metadata;
pub mod pool;
mod reader;
pub mod registry;
pub mod stream;
pub mod limits;
pub mod types;
pub mod value;
mod writer;

pub use borrow::{resolve_bytes, resolve_str, try_resolve_bytes, try_resolve_str, BorrowedBytes, BorrowedStr};
pub use error::{Error, ErrorClass, Result};
pub use limits::Limits;
pub use reader::Reader;
pub use registry::{Decoder, Encoder, Registry};
pub use stream::{StreamReader, StreamWriter};
pub use types::{FieldTag, TypeId, WireType};
pub use value::{decode_value, encode_value, KindResolver, Value};
pub use writer::Writer;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Encodes `value` to a new buffer with default [`Limits`] (§6.2).
pub fn encode(value: &Value) -> Result<Vec<u8>> {
    encode_with_limits(value, Limits::default())
}

/// Encodes `value` to a new buffer with the given resource limits.
pub fn encode_with_limits(value: &Value, limits: Limits) -> Result<Vec<u8>> {
    let mut writer = Writer::with_limits(limits);
    encode_value(&mut writer, value)?;
    Ok(writer.into_bytes())
}

/// Encodes `value` and appends the bytes onto `out`, with default limits.
pub fn encode_append(out: &mut Vec<u8>, value: &Value) -> Result<()> {
    encode_append_with_limits(out, value, Limits::default())
}

/// Encodes `value` and appends the bytes onto `out`.
pub fn encode_append_with_limits(out: &mut Vec<u8>, value: &Value, limits: Limits) -> Result<()> {
    let mut writer = Writer::with_limits(limits);
    encode_value(&mut writer, value)?;
    out.extend_from_slice(writer.as_bytes());
    Ok(())
}

/// Decodes a value of the given `kind` from `bytes`, with default limits.
pub fn decode(bytes: &[u8], kind: &metadata::Kind) -> Result<Value> {
    decode_with_limits(bytes, kind, Limits::default())
}

/// Decodes a value of the given `kind` from `bytes`.
pub fn decode_with_limits(bytes: &[u8], kind: &metadata::Kind, limits: Limits) -> Result<Value> {
    let mut reader = Reader::with_limits(bytes, limits);
    decode_value(&mut reader, kind, None)
}

/// Returns the number of bytes `value` would occupy when encoded. Computed
/// by actually encoding into a scratch buffer and measuring it; the wire
/// format has no way to size a composite value without walking it, so this
/// does no better than encode, just discards the bytes.
pub fn size_of(value: &Value) -> Result<usize> {
    let mut writer = Writer::new();
    encode_value(&mut writer, value)?;
    Ok(writer.len())
}

/// Marshal encodes a value using a custom encoder function, bypassing the
/// `Value` translator entirely for hand-written encode paths.
pub fn marshal<T, F>(value: &T, encoder: F) -> Result<Vec<u8>>
where
    F: FnOnce(&mut Writer, &T) -> Result<()>,
{
    let mut writer = Writer::new();
    encoder(&mut writer, value)?;
    Ok(writer.into_bytes())
}

/// Unmarshal decodes a value using a custom decoder function.
pub fn unmarshal<T, F>(data: &[u8], decoder: F) -> Result<T>
where
    F: FnOnce(&mut Reader) -> Result<T>,
{
    let mut reader = Reader::new(data);
    decoder(&mut reader)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Kind, StructDescriptorBuilder};

    #[test]
    fn top_level_encode_decode_roundtrip() {
        let descriptor = std::sync::Arc::new(
            StructDescriptorBuilder::new("Point")
                .field(1, "x", Kind::I32, false, true)
                .field(2, "y", Kind::I32, false, true)
                .build()
                .unwrap(),
        );
        let point = Value::Struct(vec![(1, Value::I32(3)), (2, Value::I32(4))]);
        let bytes = encode(&point).unwrap();
        assert_eq!(size_of(&point).unwrap(), bytes.len());
        let decoded = decode(&bytes, &Kind::Struct(descriptor)).unwrap();
        assert_eq!(decoded, point);
    }

    #[test]
    fn encode_append_accumulates_onto_existing_buffer() {
        let mut out = vec![0xffu8];
        encode_append(&mut out, &Value::Bool(true)).unwrap();
        assert_eq!(out, vec![0xff, 0x01]);
    }
}
