//! Write/read throughput for the container format.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use avrofile::schema::parse_schema;
use avrofile::{Codec, Schema, StreamReader, StreamWriter, Value};

fn event_schema() -> Schema {
    parse_schema(
        r#"{
            "type": "record",
            "name": "event",
            "fields": [
                {"name": "id", "type": "long"},
                {"name": "name", "type": "string"},
                {"name": "payload", "type": ["null", "string"]}
            ]
        }"#,
    )
    .unwrap()
}

fn sample_events(count: usize) -> Vec<Value> {
    (0..count)
        .map(|i| {
            Value::Record(vec![
                ("id".to_string(), Value::Long(i as i64)),
                ("name".to_string(), Value::String(format!("event-{}", i))),
                (
                    "payload".to_string(),
                    if i % 3 == 0 {
                        Value::Null
                    } else {
                        Value::String("x".repeat(i % 50))
                    },
                ),
            ])
        })
        .collect()
}

fn write_file(codec: Codec, events: &[Value]) -> Vec<u8> {
    let mut writer = StreamWriter::new(event_schema(), codec);
    let mut out = Vec::new();
    for event in events {
        if let Some(bytes) = writer.append(event).unwrap() {
            out.extend_from_slice(&bytes);
        }
    }
    out.extend_from_slice(&writer.finish().unwrap());
    out
}

fn bench_write(c: &mut Criterion) {
    let events = sample_events(10_000);
    let mut group = c.benchmark_group("write");
    group.throughput(Throughput::Elements(events.len() as u64));
    for codec in [Codec::Null, Codec::Deflate, Codec::Snappy] {
        group.bench_with_input(BenchmarkId::from_parameter(codec.name()), &codec, |b, codec| {
            b.iter(|| black_box(write_file(*codec, &events)));
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let events = sample_events(10_000);
    let mut group = c.benchmark_group("read");
    group.throughput(Throughput::Elements(events.len() as u64));
    for codec in [Codec::Null, Codec::Deflate, Codec::Snappy] {
        let bytes = write_file(codec, &events);
        group.bench_with_input(BenchmarkId::from_parameter(codec.name()), &bytes, |b, bytes| {
            b.iter(|| {
                let mut reader = StreamReader::new();
                let mut values = reader.push(black_box(bytes)).unwrap();
                values.extend(reader.finish().unwrap());
                black_box(values)
            });
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_read);
criterion_main!(benches);
