//! Forward compatibility: a wider schema's encoding decodes cleanly against
//! a narrower one, with unknown fields skipped regardless of their wire type
//! or position.

use std::sync::Arc;

use cramberry::metadata::{Kind, StructDescriptorBuilder};
use cramberry::value::Value;
use cramberry::{decode, decode_with_limits, encode, Limits};

fn wide_descriptor() -> Arc<cramberry::metadata::StructDescriptor> {
    Arc::new(
        StructDescriptorBuilder::new("Wide")
            .field(1, "a", Kind::I32, false, true)
            .field(2, "extra_varint", Kind::U32, false, true)
            .field(3, "b", Kind::String, false, true)
            .field(4, "extra_fixed64", Kind::F64, false, true)
            .field(5, "extra_bytes", Kind::Bytes, false, true)
            .field(6, "extra_fixed32", Kind::F32, false, true)
            .build()
            .unwrap(),
    )
}

fn narrow_descriptor() -> Arc<cramberry::metadata::StructDescriptor> {
    Arc::new(
        StructDescriptorBuilder::new("Narrow")
            .field(1, "a", Kind::I32, false, true)
            .field(3, "b", Kind::String, false, true)
            .build()
            .unwrap(),
    )
}

#[test]
fn unknown_fields_of_every_wire_type_are_skipped() {
    let wide_value = Value::Struct(vec![
        (1, Value::I32(7)),
        (2, Value::U32(99)),
        (3, Value::String("kept".into())),
        (4, Value::F64(1.5)),
        (5, Value::Bytes(vec![1, 2, 3])),
        (6, Value::F32(2.5)),
    ]);
    let bytes = encode(&wide_value).unwrap();

    let decoded = decode(&bytes, &Kind::Struct(narrow_descriptor())).unwrap();
    assert_eq!(
        decoded,
        Value::Struct(vec![(1, Value::I32(7)), (3, Value::String("kept".into()))])
    );
}

#[test]
fn unknown_fields_interleaved_and_trailing_are_skipped() {
    let wide_value = Value::Struct(vec![
        (2, Value::U32(1)),
        (1, Value::I32(7)),
        (4, Value::F64(1.0)),
        (3, Value::String("kept".into())),
        (6, Value::F32(1.0)),
        (5, Value::Bytes(vec![9])),
    ]);
    let bytes = encode(&wide_value).unwrap();

    let decoded = decode(&bytes, &Kind::Struct(narrow_descriptor())).unwrap();
    assert_eq!(
        decoded,
        Value::Struct(vec![(1, Value::I32(7)), (3, Value::String("kept".into()))])
    );
}

#[test]
fn reencoding_a_narrow_decode_drops_the_unknown_fields() {
    let wide_value = Value::Struct(vec![
        (1, Value::I32(7)),
        (2, Value::U32(99)),
        (3, Value::String("kept".into())),
    ]);
    let wide_bytes = encode(&wide_value).unwrap();

    let narrow_descriptor = narrow_descriptor();
    let decoded = decode(&wide_bytes, &Kind::Struct(narrow_descriptor.clone())).unwrap();
    let reencoded = encode(&decoded).unwrap();

    let roundtripped = decode(&reencoded, &Kind::Struct(narrow_descriptor)).unwrap();
    assert_eq!(roundtripped, decoded);
    assert!(reencoded.len() < wide_bytes.len());
}

#[test]
fn strict_mode_rejects_unknown_fields_instead_of_skipping() {
    let wide_value = Value::Struct(vec![(1, Value::I32(7)), (2, Value::U32(99))]);
    let bytes = encode(&wide_value).unwrap();

    let strict = Limits::default().with_strict_mode(true);
    let err = decode_with_limits(&bytes, &Kind::Struct(narrow_descriptor()), strict).unwrap_err();
    assert!(matches!(err, cramberry::Error::UnknownField(2)));
}

#[test]
fn required_field_absent_from_wire_errors() {
    let wide = wide_descriptor();
    let descriptor = Arc::new(
        StructDescriptorBuilder::new("Requires")
            .field(1, "a", Kind::I32, true, true)
            .field(7, "missing", Kind::String, true, true)
            .build()
            .unwrap(),
    );
    let value = Value::Struct(vec![(1, Value::I32(1))]);
    let bytes = encode(&value).unwrap();
    let err = decode(&bytes, &Kind::Struct(descriptor)).unwrap_err();
    assert!(matches!(err, cramberry::Error::RequiredFieldMissing(_)));
    let _ = wide;
}
