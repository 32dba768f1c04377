use std::sync::Arc;

use cramberry::metadata::{Kind, StructDescriptorBuilder};
use cramberry::value::{decode_value, encode_value, Value};
use cramberry::{Reader, Writer};
use criterion::{black_box, criterion_group, criterion_main, Criterion};

fn sample_descriptor() -> Arc<cramberry::metadata::StructDescriptor> {
    Arc::new(
        StructDescriptorBuilder::new("Sample")
            .field(1, "id", Kind::U64, false, true)
            .field(2, "name", Kind::String, false, true)
            .field(3, "tags", Kind::Seq(Box::new(Kind::String)), false, true)
            .build()
            .unwrap(),
    )
}

fn sample_value() -> Value {
    Value::Struct(vec![
        (1, Value::U64(42)),
        (2, Value::String("cramberry".into())),
        (
            3,
            Value::Seq(vec![
                Value::String("fast".into()),
                Value::String("compact".into()),
                Value::String("schema-informed".into()),
            ]),
        ),
    ])
}

fn bench_encode(c: &mut Criterion) {
    let value = sample_value();
    c.bench_function("encode struct", |b| {
        b.iter(|| {
            let mut w = Writer::new();
            encode_value(&mut w, black_box(&value)).unwrap();
            black_box(w.into_bytes())
        })
    });
}

fn bench_decode(c: &mut Criterion) {
    let descriptor = sample_descriptor();
    let mut w = Writer::new();
    encode_value(&mut w, &sample_value()).unwrap();
    let bytes = w.into_bytes();

    c.bench_function("decode struct", |b| {
        b.iter(|| {
            let mut r = Reader::new(black_box(&bytes));
            black_box(decode_value(&mut r, &Kind::Struct(descriptor.clone()), None).unwrap())
        })
    });
}

criterion_group!(benches, bench_encode, bench_decode);
criterion_main!(benches);
