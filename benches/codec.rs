//! Benchmarks for the schema-driven codec and the raw record codec.

use criterion::{black_box, criterion_group, criterion_main, Criterion, Throughput};

use picopb::{FieldSpec, Payload, Schema, Value};

fn person_schema() -> Schema {
    Schema::parse_fields(&[
        FieldSpec::scalar("name", "*U"),
        FieldSpec::scalar("id", "t"),
        FieldSpec::scalar("email", "U"),
        FieldSpec::nested_with(
            "phones",
            "+[",
            [FieldSpec::scalar("number", "*U"), FieldSpec::scalar("kind", "t")],
        ),
    ])
    .unwrap()
}

fn person_payload() -> Payload {
    Payload::map([
        ("name", Value::from("John Doe")),
        ("id", Value::Int(1234)),
        ("email", Value::from("jdoe@example.com")),
        (
            "phones",
            Value::List(vec![
                Value::Message(Payload::map([
                    ("number", Value::from("555-4321")),
                    ("kind", Value::Int(1)),
                ])),
                Value::Message(Payload::map([
                    ("number", Value::from("555-9876")),
                    ("kind", Value::Int(2)),
                ])),
            ]),
        ),
    ])
}

fn bench_schema_codec(c: &mut Criterion) {
    let schema = person_schema();
    let payload = person_payload();
    let encoded = schema.encode(&payload).unwrap();

    let mut group = c.benchmark_group("schema");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| schema.encode(black_box(&payload)).unwrap())
    });
    group.bench_function("decode", |b| {
        b.iter(|| schema.decode(black_box(&encoded)).unwrap())
    });
    group.finish();
}

fn bench_packed(c: &mut Criterion) {
    let schema = Schema::parse("#T").unwrap();
    let payload = Payload::seq([Value::List((0..256u64).map(Value::Uint).collect())]);
    let encoded = schema.encode(&payload).unwrap();

    let mut group = c.benchmark_group("packed");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("encode", |b| {
        b.iter(|| schema.encode(black_box(&payload)).unwrap())
    });
    group.bench_function("decode", |b| {
        b.iter(|| schema.decode(black_box(&encoded)).unwrap())
    });
    group.finish();
}

fn bench_raw(c: &mut Criterion) {
    let schema = person_schema();
    let encoded = schema.encode(&person_payload()).unwrap();

    let mut group = c.benchmark_group("raw");
    group.throughput(Throughput::Bytes(encoded.len() as u64));
    group.bench_function("decode", |b| {
        b.iter(|| picopb::decode_raw(black_box(&encoded)).unwrap())
    });
    group.finish();
}

criterion_group!(benches, bench_schema_codec, bench_packed, bench_raw);
criterion_main!(benches);
