//! The reflective translator (§4.4): a runtime tagged-value tree plus the
//! encode/decode dispatch that drives a [`Writer`]/[`Reader`] from it.
//!
//! `Value` is self-describing for encode (every variant already knows its own
//! shape). Decode instead needs a [`Kind`] — the schema half of the protocol
//! — since raw bytes carry no type information of their own.

use std::cmp::Ordering;

use crate::error::{Error, Result};
use crate::metadata::Kind;
use crate::reader::Reader;
use crate::types::{TypeId, WireType};
use crate::writer::Writer;

/// A function resolving a polymorphic type id to the [`Kind`] needed to
/// decode its inline value. The crate does not ship a process-wide registry
/// for this (that lives in [`crate::registry`] for the concrete-type API);
/// callers of the `Value` translator supply their own mapping.
pub type KindResolver<'a> = &'a dyn Fn(TypeId) -> Option<Kind>;

/// A dynamically-typed Cramberry value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    I8(i8),
    U8(u8),
    I16(i16),
    U16(u16),
    I32(i32),
    U32(u32),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Seq(Vec<Value>),
    Map(Vec<(Value, Value)>),
    /// Field number -> value, conventionally in ascending field-number order.
    Struct(Vec<(u32, Value)>),
    Optional(Option<Box<Value>>),
    Polymorphic {
        type_id: TypeId,
        value: Option<Box<Value>>,
    },
}

impl Value {
    /// The wire type a struct field holding this value is tagged with.
    fn wire_type(&self) -> WireType {
        match self {
            Value::Bool(_) | Value::U8(_) | Value::U16(_) | Value::U32(_) | Value::U64(_) => {
                WireType::Varint
            }
            Value::I8(_) | Value::I16(_) | Value::I32(_) | Value::I64(_) => WireType::SVarint,
            Value::F32(_) => WireType::Fixed32,
            Value::F64(_) => WireType::Fixed64,
            Value::String(_) | Value::Bytes(_) | Value::Seq(_) | Value::Map(_) | Value::Struct(_) => {
                WireType::Bytes
            }
            Value::Optional(None) => WireType::Varint,
            Value::Optional(Some(inner)) => inner.wire_type(),
            Value::Polymorphic { .. } => WireType::TypeRef,
        }
    }

    /// True when this value needs the outer varint-byte-length wrap (§4.5)
    /// to stay skippable as an unknown field. Strings/bytes already carry
    /// their own length prefix; scalars carry none at all.
    fn needs_length_wrap(&self) -> bool {
        match self {
            Value::Struct(_) | Value::Seq(_) | Value::Map(_) => true,
            Value::Optional(Some(inner)) => inner.needs_length_wrap(),
            _ => false,
        }
    }

    /// True for the primitive kinds eligible for packed sequence encoding.
    fn is_packable(&self) -> bool {
        matches!(
            self,
            Value::Bool(_)
                | Value::I8(_)
                | Value::U8(_)
                | Value::I16(_)
                | Value::U16(_)
                | Value::I32(_)
                | Value::U32(_)
                | Value::I64(_)
                | Value::U64(_)
                | Value::F32(_)
                | Value::F64(_)
        )
    }

    /// Whether omit_empty (§4.6) would skip a struct field holding this value.
    /// A present `Optional` or `Polymorphic` is never considered empty:
    /// presence itself is the meaningful fact for those kinds.
    pub fn is_default(&self) -> bool {
        match self {
            Value::Bool(b) => !b,
            Value::I8(v) => *v == 0,
            Value::U8(v) => *v == 0,
            Value::I16(v) => *v == 0,
            Value::U16(v) => *v == 0,
            Value::I32(v) => *v == 0,
            Value::U32(v) => *v == 0,
            Value::I64(v) => *v == 0,
            Value::U64(v) => *v == 0,
            Value::F32(v) => *v == 0.0,
            Value::F64(v) => *v == 0.0,
            Value::String(s) => s.is_empty(),
            Value::Bytes(b) => b.is_empty(),
            Value::Seq(v) => v.is_empty(),
            Value::Map(v) => v.is_empty(),
            Value::Struct(_) => false,
            Value::Optional(None) => true,
            Value::Optional(Some(_)) => false,
            Value::Polymorphic { .. } => false,
        }
    }
}

/// Total order over map keys (§4.4): strings/bools/ints compare naturally;
/// floats use IEEE-754 total order with NaN sorting greatest and -0.0 == 0.0.
fn compare_keys(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
        (Value::I8(x), Value::I8(y)) => x.cmp(y),
        (Value::U8(x), Value::U8(y)) => x.cmp(y),
        (Value::I16(x), Value::I16(y)) => x.cmp(y),
        (Value::U16(x), Value::U16(y)) => x.cmp(y),
        (Value::I32(x), Value::I32(y)) => x.cmp(y),
        (Value::U32(x), Value::U32(y)) => x.cmp(y),
        (Value::I64(x), Value::I64(y)) => x.cmp(y),
        (Value::U64(x), Value::U64(y)) => x.cmp(y),
        (Value::String(x), Value::String(y)) => x.cmp(y),
        (Value::F32(x), Value::F32(y)) => compare_floats(*x as f64, *y as f64),
        (Value::F64(x), Value::F64(y)) => compare_floats(*x, *y),
        _ => Ordering::Equal,
    }
}

fn compare_floats(a: f64, b: f64) -> Ordering {
    let an = a.is_nan();
    let bn = b.is_nan();
    if an && bn {
        return Ordering::Equal;
    }
    if an {
        return Ordering::Greater;
    }
    if bn {
        return Ordering::Less;
    }
    // -0.0 == 0.0 under partial_cmp already.
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// Encodes `value` onto `writer`. Self-described from the `Value` tree; no
/// schema is consulted.
pub fn encode_value(writer: &mut Writer, value: &Value) -> Result<()> {
    match value {
        Value::Bool(b) => writer.write_bool(*b),
        Value::I8(v) => writer.write_raw_byte(*v as u8),
        Value::U8(v) => writer.write_raw_byte(*v),
        Value::I16(v) => writer.write_svarint(*v as i64),
        Value::U16(v) => writer.write_varint(*v as u64),
        Value::I32(v) => writer.write_svarint(*v as i64),
        Value::U32(v) => writer.write_varint(*v as u64),
        Value::I64(v) => writer.write_svarint(*v),
        Value::U64(v) => writer.write_varint(*v),
        Value::F32(v) => writer.write_float32(*v),
        Value::F64(v) => writer.write_float64(*v),
        Value::String(s) => writer.write_string(s),
        Value::Bytes(b) => writer.write_bytes(b),
        Value::Seq(items) => encode_seq(writer, items),
        Value::Map(pairs) => {
            let deterministic = writer.limits().deterministic;
            encode_map(writer, pairs, deterministic)
        }
        Value::Struct(fields) => encode_struct(writer, fields),
        Value::Optional(None) => writer.write_raw_byte(0),
        Value::Optional(Some(inner)) => encode_value(writer, inner),
        Value::Polymorphic { type_id, value } => {
            writer.write_varint(*type_id as u64)?;
            if *type_id != 0 {
                if let Some(inner) = value {
                    encode_value(writer, inner)?;
                }
            }
            Ok(())
        }
    }
}

fn encode_seq(writer: &mut Writer, items: &[Value]) -> Result<()> {
    writer.write_array_len(items.len())?;
    let packed = items.iter().all(Value::is_packable);
    if packed {
        for item in items {
            encode_value(writer, item)?;
        }
        Ok(())
    } else {
        writer.enter_nested()?;
        for item in items {
            encode_value(writer, item)?;
        }
        writer.exit_nested();
        Ok(())
    }
}

fn encode_map(writer: &mut Writer, pairs: &[(Value, Value)], deterministic: bool) -> Result<()> {
    for (k, _) in pairs {
        if k.wire_type() == WireType::TypeRef || matches!(k, Value::Struct(_) | Value::Seq(_) | Value::Map(_)) {
            return Err(Error::UnsupportedMapKeyType);
        }
    }
    writer.write_map_len(pairs.len())?;
    writer.enter_nested()?;
    if deterministic {
        let mut sorted: Vec<&(Value, Value)> = pairs.iter().collect();
        sorted.sort_by(|a, b| compare_keys(&a.0, &b.0));
        for (k, v) in sorted {
            encode_value(writer, k)?;
            encode_value(writer, v)?;
        }
    } else {
        for (k, v) in pairs {
            encode_value(writer, k)?;
            encode_value(writer, v)?;
        }
    }
    writer.exit_nested();
    Ok(())
}

fn encode_struct(writer: &mut Writer, fields: &[(u32, Value)]) -> Result<()> {
    let omit_empty = writer.limits().omit_empty;
    let mut sorted: Vec<&(u32, Value)> = fields.iter().collect();
    sorted.sort_by_key(|(n, _)| *n);

    writer.enter_nested()?;
    for (field_number, val) in sorted {
        if omit_empty && val.is_default() {
            continue;
        }
        writer.write_tag(*field_number, val.wire_type())?;
        if val.needs_length_wrap() {
            let checkpoint = writer.begin_message()?;
            encode_value(writer, val)?;
            writer.end_message(checkpoint)?;
        } else {
            encode_value(writer, val)?;
        }
    }
    writer.write_end_marker()?;
    writer.exit_nested();
    Ok(())
}

/// Decodes a value of the given `kind` from `reader`. Composite kinds
/// recurse structurally; `Kind::Polymorphic` consults `resolver` to learn
/// the concrete kind for the type id found on the wire.
pub fn decode_value(reader: &mut Reader, kind: &Kind, resolver: Option<KindResolver>) -> Result<Value> {
    match kind {
        Kind::Bool => Ok(Value::Bool(reader.read_bool()?)),
        Kind::I8 => Ok(Value::I8(reader.read_raw_byte()? as i8)),
        Kind::U8 => Ok(Value::U8(reader.read_raw_byte()?)),
        Kind::I16 => Ok(Value::I16(reader.read_svarint()? as i16)),
        Kind::U16 => Ok(Value::U16(reader.read_varint()? as u16)),
        Kind::I32 => Ok(Value::I32(reader.read_svarint()? as i32)),
        Kind::U32 => Ok(Value::U32(reader.read_varint()? as u32)),
        Kind::I64 => Ok(Value::I64(reader.read_svarint()?)),
        Kind::U64 => Ok(Value::U64(reader.read_varint()?)),
        Kind::F32 => Ok(Value::F32(reader.read_float32()?)),
        Kind::F64 => Ok(Value::F64(reader.read_float64()?)),
        Kind::String => Ok(Value::String(reader.read_string()?)),
        Kind::Bytes => Ok(Value::Bytes(reader.read_bytes()?)),
        Kind::Seq(elem) => decode_seq(reader, elem, resolver),
        Kind::Map(k, v) => decode_map(reader, k, v, resolver),
        Kind::Struct(descriptor) => decode_struct(reader, descriptor, resolver),
        Kind::Optional(inner) => decode_optional(reader, inner, resolver),
        Kind::Polymorphic => decode_polymorphic(reader, resolver),
    }
}

const PREALLOC_CAP: usize = 1024;

fn decode_seq(reader: &mut Reader, elem: &Kind, resolver: Option<KindResolver>) -> Result<Value> {
    let count = reader.read_array_len()?;
    let mut items = Vec::with_capacity(count.min(PREALLOC_CAP));
    if elem.is_packable() {
        for _ in 0..count {
            items.push(decode_value(reader, elem, resolver)?);
        }
    } else {
        reader.enter_nested()?;
        for _ in 0..count {
            items.push(decode_value(reader, elem, resolver)?);
        }
        reader.exit_nested();
    }
    Ok(Value::Seq(items))
}

fn decode_map(
    reader: &mut Reader,
    key_kind: &Kind,
    value_kind: &Kind,
    resolver: Option<KindResolver>,
) -> Result<Value> {
    if !key_kind.is_valid_map_key() {
        return Err(Error::UnsupportedMapKeyType);
    }
    let count = reader.read_map_len()?;
    reader.enter_nested()?;
    let mut pairs = Vec::with_capacity(count.min(PREALLOC_CAP));
    for _ in 0..count {
        let k = decode_value(reader, key_kind, resolver)?;
        let v = decode_value(reader, value_kind, resolver)?;
        pairs.push((k, v));
    }
    reader.exit_nested();
    Ok(Value::Map(pairs))
}

fn decode_struct(
    reader: &mut Reader,
    descriptor: &crate::metadata::StructDescriptor,
    resolver: Option<KindResolver>,
) -> Result<Value> {
    use crate::types::CompactTag;

    reader.enter_nested()?;
    let mut fields = Vec::new();
    let mut seen = std::collections::HashSet::new();
    loop {
        match reader.read_tag()? {
            CompactTag::EndMarker => break,
            CompactTag::Field(tag) => {
                if let Some(fd) = descriptor.by_field_number(tag.field_number) {
                    let val = if fd.kind.needs_length_wrap() {
                        let end = reader.begin_message()?;
                        let v = decode_value(reader, &fd.kind, resolver)?;
                        reader.end_message(end)?;
                        v
                    } else {
                        decode_value(reader, &fd.kind, resolver)?
                    };
                    seen.insert(tag.field_number);
                    fields.push((tag.field_number, val));
                } else if reader.limits().strict_mode {
                    return Err(Error::UnknownField(tag.field_number));
                } else {
                    reader.skip_value(tag.wire_type)?;
                }
            }
        }
    }
    reader.exit_nested();

    for fd in descriptor.fields() {
        if fd.required && !seen.contains(&fd.field_number) {
            return Err(Error::RequiredFieldMissing(fd.name.clone()));
        }
    }
    Ok(Value::Struct(fields))
}

fn decode_optional(reader: &mut Reader, inner: &Kind, resolver: Option<KindResolver>) -> Result<Value> {
    if reader.peek_byte() == Some(0) {
        reader.read_raw_byte()?;
        return Ok(Value::Optional(None));
    }
    let inner_value = decode_value(reader, inner, resolver)?;
    Ok(Value::Optional(Some(Box::new(inner_value))))
}

fn decode_polymorphic(reader: &mut Reader, resolver: Option<KindResolver>) -> Result<Value> {
    let type_id = reader.read_varint()? as TypeId;
    if type_id == 0 {
        return Ok(Value::Polymorphic {
            type_id: 0,
            value: None,
        });
    }
    let resolver = resolver.ok_or(Error::UnknownType(type_id))?;
    let inner_kind = resolver(type_id).ok_or(Error::UnknownType(type_id))?;
    let inner = decode_value(reader, &inner_kind, Some(resolver))?;
    Ok(Value::Polymorphic {
        type_id,
        value: Some(Box::new(inner)),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::Limits;
    use crate::metadata::StructDescriptorBuilder;
    use std::sync::Arc;

    fn roundtrip(kind: &Kind, value: &Value) -> Value {
        let mut w = Writer::new();
        encode_value(&mut w, value).unwrap();
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        decode_value(&mut r, kind, None).unwrap()
    }

    #[test]
    fn scalar_roundtrip() {
        assert_eq!(roundtrip(&Kind::U32, &Value::U32(300)), Value::U32(300));
        assert_eq!(roundtrip(&Kind::I32, &Value::I32(-42)), Value::I32(-42));
        assert_eq!(
            roundtrip(&Kind::String, &Value::String("hi".into())),
            Value::String("hi".into())
        );
    }

    #[test]
    fn packed_sequence_roundtrip() {
        let kind = Kind::Seq(Box::new(Kind::U32));
        let value = Value::Seq(vec![Value::U32(1), Value::U32(2), Value::U32(3)]);
        assert_eq!(roundtrip(&kind, &value), value);
    }

    #[test]
    fn tagged_sequence_of_structs_roundtrip() {
        let descriptor = Arc::new(
            StructDescriptorBuilder::new("Point")
                .field(1, "x", Kind::I32, false, true)
                .field(2, "y", Kind::I32, false, true)
                .build()
                .unwrap(),
        );
        let kind = Kind::Seq(Box::new(Kind::Struct(descriptor.clone())));
        let value = Value::Seq(vec![
            Value::Struct(vec![(1, Value::I32(1)), (2, Value::I32(2))]),
            Value::Struct(vec![(1, Value::I32(3)), (2, Value::I32(4))]),
        ]);
        assert_eq!(roundtrip(&kind, &value), value);
    }

    #[test]
    fn struct_field_roundtrip_with_nested_message() {
        let inner_desc = Arc::new(
            StructDescriptorBuilder::new("Inner")
                .field(1, "v", Kind::String, false, true)
                .build()
                .unwrap(),
        );
        let outer_desc = Arc::new(
            StructDescriptorBuilder::new("Outer")
                .field(1, "n", Kind::U32, false, true)
                .field(2, "inner", Kind::Struct(inner_desc), false, true)
                .build()
                .unwrap(),
        );
        let value = Value::Struct(vec![
            (1, Value::U32(7)),
            (
                2,
                Value::Struct(vec![(1, Value::String("nested".into()))]),
            ),
        ]);
        let kind = Kind::Struct(outer_desc);
        assert_eq!(roundtrip(&kind, &value), value);
    }

    #[test]
    fn omit_empty_skips_zero_valued_fields() {
        let descriptor = Arc::new(
            StructDescriptorBuilder::new("S")
                .field(1, "a", Kind::U32, false, true)
                .field(2, "b", Kind::U32, false, true)
                .build()
                .unwrap(),
        );
        let value = Value::Struct(vec![(1, Value::U32(0)), (2, Value::U32(9))]);
        let mut w = Writer::new();
        encode_value(&mut w, &value).unwrap();
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = decode_value(&mut r, &Kind::Struct(descriptor), None).unwrap();
        assert_eq!(decoded, Value::Struct(vec![(2, Value::U32(9))]));
    }

    #[test]
    fn unknown_field_skipped_when_not_strict() {
        let producer = Arc::new(
            StructDescriptorBuilder::new("Wide")
                .field(1, "a", Kind::U32, false, true)
                .field(2, "extra", Kind::String, false, true)
                .build()
                .unwrap(),
        );
        let consumer = Arc::new(
            StructDescriptorBuilder::new("Narrow")
                .field(1, "a", Kind::U32, false, true)
                .build()
                .unwrap(),
        );
        let value = Value::Struct(vec![(1, Value::U32(5)), (2, Value::String("drop me".into()))]);
        let mut w = Writer::new();
        encode_value(&mut w, &value).unwrap();
        let bytes = w.into_bytes();

        let mut r = Reader::new(&bytes);
        let decoded = decode_value(&mut r, &Kind::Struct(consumer), None).unwrap();
        assert_eq!(decoded, Value::Struct(vec![(1, Value::U32(5))]));
        let _ = producer;
    }

    #[test]
    fn strict_mode_rejects_unknown_field() {
        let producer = Arc::new(
            StructDescriptorBuilder::new("Wide")
                .field(1, "a", Kind::U32, false, true)
                .field(2, "extra", Kind::String, false, true)
                .build()
                .unwrap(),
        );
        let consumer = Arc::new(
            StructDescriptorBuilder::new("Narrow")
                .field(1, "a", Kind::U32, false, true)
                .build()
                .unwrap(),
        );
        let value = Value::Struct(vec![(1, Value::U32(5)), (2, Value::String("x".into()))]);
        let mut w = Writer::new();
        encode_value(&mut w, &value).unwrap();
        let bytes = w.into_bytes();

        let mut r = Reader::with_limits(&bytes, Limits::default().with_strict_mode(true));
        assert!(matches!(
            decode_value(&mut r, &Kind::Struct(consumer), None),
            Err(Error::UnknownField(2))
        ));
        let _ = producer;
    }

    #[test]
    fn required_field_missing_errors() {
        let descriptor = Arc::new(
            StructDescriptorBuilder::new("S")
                .field(1, "a", Kind::U32, true, false)
                .build()
                .unwrap(),
        );
        let mut w = Writer::new();
        encode_value(&mut w, &Value::Struct(vec![])).unwrap();
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert!(matches!(
            decode_value(&mut r, &Kind::Struct(descriptor), None),
            Err(Error::RequiredFieldMissing(_))
        ));
    }

    #[test]
    fn map_with_deterministic_ordering() {
        let kind = Kind::Map(Box::new(Kind::String), Box::new(Kind::U32));
        let value = Value::Map(vec![
            (Value::String("b".into()), Value::U32(2)),
            (Value::String("a".into()), Value::U32(1)),
        ]);
        let mut w = Writer::new();
        encode_value(&mut w, &value).unwrap();
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = decode_value(&mut r, &kind, None).unwrap();
        assert_eq!(
            decoded,
            Value::Map(vec![
                (Value::String("a".into()), Value::U32(1)),
                (Value::String("b".into()), Value::U32(2)),
            ])
        );
    }

    #[test]
    fn map_rejects_composite_keys() {
        let mut w = Writer::new();
        let bad = Value::Map(vec![(Value::Seq(vec![]), Value::U32(1))]);
        assert!(matches!(
            encode_value(&mut w, &bad),
            Err(Error::UnsupportedMapKeyType)
        ));
    }

    #[test]
    fn float_total_order_sorts_nan_greatest() {
        let mut keys = [Value::F64(1.0), Value::F64(f64::NAN), Value::F64(-0.0)];
        keys.sort_by(compare_keys);
        assert!(matches!(keys[2], Value::F64(v) if v.is_nan()));
    }

    #[test]
    fn optional_roundtrips_present_and_absent() {
        let kind = Kind::Optional(Box::new(Kind::String));
        assert_eq!(
            roundtrip(&kind, &Value::Optional(None)),
            Value::Optional(None)
        );
        assert_eq!(
            roundtrip(&kind, &Value::Optional(Some(Box::new(Value::String("x".into()))))),
            Value::Optional(Some(Box::new(Value::String("x".into()))))
        );
    }

    #[test]
    fn polymorphic_nil_roundtrip() {
        let mut w = Writer::new();
        encode_value(
            &mut w,
            &Value::Polymorphic {
                type_id: 0,
                value: None,
            },
        )
        .unwrap();
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let decoded = decode_value(&mut r, &Kind::Polymorphic, None).unwrap();
        assert_eq!(
            decoded,
            Value::Polymorphic {
                type_id: 0,
                value: None
            }
        );
    }

    #[test]
    fn polymorphic_resolves_via_resolver() {
        let mut w = Writer::new();
        encode_value(
            &mut w,
            &Value::Polymorphic {
                type_id: 200,
                value: Some(Box::new(Value::String("hi".into()))),
            },
        )
        .unwrap();
        let bytes = w.into_bytes();
        let resolver = |id: TypeId| -> Option<Kind> {
            if id == 200 {
                Some(Kind::String)
            } else {
                None
            }
        };
        let mut r = Reader::new(&bytes);
        let decoded = decode_value(&mut r, &Kind::Polymorphic, Some(&resolver)).unwrap();
        assert_eq!(
            decoded,
            Value::Polymorphic {
                type_id: 200,
                value: Some(Box::new(Value::String("hi".into())))
            }
        );
    }
}
