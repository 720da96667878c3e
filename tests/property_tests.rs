//! Property-based tests: universal properties checked across generated
//! inputs.

use proptest::prelude::*;

use avrofile::buffer::ByteBuffer;
use avrofile::datum::{DatumReader, DatumWriter};
use avrofile::{decode, encode};
use avrofile::{Codec, Schema, StreamReader, StreamWriter, Value};

// ============================================================================
// Zig-zag varints
// ============================================================================

proptest! {
    #[test]
    fn prop_zigzag_roundtrip_full_range(value in any::<i64>()) {
        let mut buf = ByteBuffer::new();
        encode::write_long(&mut buf, value);
        prop_assert_eq!(decode::read_long(&mut buf).unwrap(), value);
        prop_assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn prop_single_byte_encoding_is_exactly_small_range(value in -200i64..200) {
        let mut buf = ByteBuffer::new();
        encode::write_long(&mut buf, value);
        let single = buf.len() == 1;
        prop_assert_eq!(single, (-64..=63).contains(&value));
    }

    #[test]
    fn prop_int_roundtrip(value in any::<i32>()) {
        let mut buf = ByteBuffer::new();
        encode::write_int(&mut buf, value);
        prop_assert_eq!(decode::read_int(&mut buf).unwrap(), value);
    }
}

// ============================================================================
// Primitive datum round trips
// ============================================================================

fn arb_primitive() -> impl Strategy<Value = (Schema, Value)> {
    prop_oneof![
        Just((Schema::Null, Value::Null)),
        any::<bool>().prop_map(|v| (Schema::Boolean, Value::Boolean(v))),
        any::<i32>().prop_map(|v| (Schema::Int, Value::Int(v))),
        any::<i64>().prop_map(|v| (Schema::Long, Value::Long(v))),
        proptest::num::f32::NORMAL.prop_map(|v| (Schema::Float, Value::Float(v))),
        proptest::num::f64::NORMAL.prop_map(|v| (Schema::Double, Value::Double(v))),
        proptest::collection::vec(any::<u8>(), 0..64)
            .prop_map(|v| (Schema::Bytes, Value::Bytes(v))),
        ".{0,32}".prop_map(|v| (Schema::String, Value::String(v))),
    ]
}

proptest! {
    #[test]
    fn prop_primitive_roundtrip((schema, value) in arb_primitive()) {
        let mut buf = ByteBuffer::new();
        DatumWriter::with_schema(schema.clone())
            .write(&value, &mut buf)
            .unwrap();
        let reader = DatumReader {
            writers_schema: Some(schema),
            readers_schema: None,
        };
        prop_assert_eq!(reader.read(&mut buf).unwrap(), value);
        prop_assert_eq!(buf.remaining(), 0);
    }

    #[test]
    fn prop_array_of_longs_roundtrip(values in proptest::collection::vec(any::<i64>(), 0..40)) {
        let schema = Schema::Array(Box::new(Schema::Long));
        let datum = Value::Array(values.into_iter().map(Value::Long).collect());
        let mut buf = ByteBuffer::new();
        DatumWriter::with_schema(schema.clone())
            .write(&datum, &mut buf)
            .unwrap();
        let reader = DatumReader {
            writers_schema: Some(schema),
            readers_schema: None,
        };
        prop_assert_eq!(reader.read(&mut buf).unwrap(), datum);
    }
}

// ============================================================================
// Buffer growth
// ============================================================================

proptest! {
    /// Any interleaving of writes and reads preserves every written byte in
    /// order, across all internal compactions and reallocations.
    #[test]
    fn prop_buffer_never_loses_bytes(
        ops in proptest::collection::vec((proptest::collection::vec(any::<u8>(), 1..48), 0usize..64), 1..40)
    ) {
        let mut buf = ByteBuffer::new();
        let mut written: Vec<u8> = Vec::new();
        let mut consumed: Vec<u8> = Vec::new();

        for (chunk, read_request) in ops {
            buf.write(&chunk);
            written.extend_from_slice(&chunk);
            let take = read_request.min(buf.remaining());
            consumed.extend_from_slice(buf.read(take).unwrap());
        }
        let rest = buf.remaining();
        consumed.extend_from_slice(buf.read(rest).unwrap());
        prop_assert_eq!(consumed, written);
    }
}

// ============================================================================
// Container stream
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// A file written with any codec and chunked arbitrarily on read yields
    /// exactly the values written, in order.
    #[test]
    fn prop_container_roundtrip_chunked(
        values in proptest::collection::vec(any::<i64>(), 1..80),
        codec_index in 0usize..3,
        chunk_size in 1usize..512,
        sync_interval in 16usize..512,
    ) {
        let codec = [Codec::Null, Codec::Deflate, Codec::Snappy][codec_index];
        let schema = Schema::Long;
        let expected: Vec<Value> = values.into_iter().map(Value::Long).collect();

        let mut writer = StreamWriter::new(schema, codec).with_sync_interval(sync_interval);
        let mut bytes = Vec::new();
        for value in &expected {
            if let Some(out) = writer.append(value).unwrap() {
                bytes.extend_from_slice(&out);
            }
        }
        bytes.extend_from_slice(&writer.finish().unwrap());

        let mut reader = StreamReader::new();
        let mut decoded = Vec::new();
        for chunk in bytes.chunks(chunk_size) {
            decoded.extend(reader.push(chunk).unwrap());
        }
        decoded.extend(reader.finish().unwrap());
        prop_assert_eq!(decoded, expected);
    }
}
