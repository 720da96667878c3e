//! End-to-end container format tests: write a file, read it back.

use avrofile::buffer::ByteBuffer;
use avrofile::container::{header_schema, MAGIC, SYNC_SIZE};
use avrofile::datum::DatumReader;
use avrofile::schema::parse_schema;
use avrofile::{decode, AvroFile, Codec, Error, FileError, Schema, StreamReader, StreamWriter, Value};

use tempfile::tempdir;

/// The nested schema with a `["string","int","null"]` union field.
fn nested_schema() -> Schema {
    parse_schema(
        r#"{
            "type": "record",
            "name": "nested",
            "fields": [
                {"name": "key", "type": "string"},
                {"name": "value", "type": "string"},
                {"name": "flag", "type": "boolean"},
                {"name": "subrecord", "type": {
                    "type": "record",
                    "name": "sub",
                    "fields": [
                        {"name": "key", "type": "string"},
                        {"name": "value", "type": ["string", "int", "null"]}
                    ]
                }}
            ]
        }"#,
    )
    .unwrap()
}

fn nested_record(key: &str, value: &str, flag: bool, sub_key: &str, sub_value: Value) -> Value {
    Value::Record(vec![
        ("key".to_string(), Value::String(key.to_string())),
        ("value".to_string(), Value::String(value.to_string())),
        ("flag".to_string(), Value::Boolean(flag)),
        (
            "subrecord".to_string(),
            Value::Record(vec![
                ("key".to_string(), Value::String(sub_key.to_string())),
                ("value".to_string(), sub_value),
            ]),
        ),
    ])
}

fn three_records() -> Vec<Value> {
    vec![
        nested_record("john", "hive", true, "preference", Value::Int(2)),
        nested_record("eric", "lola", true, "postcode", Value::Null),
        nested_record("fred", "wonka", false, "city", Value::String("Ann Arbor".into())),
    ]
}

fn write_stream(schema: Schema, codec: Codec, values: &[Value], sync_interval: usize) -> Vec<u8> {
    let mut writer = StreamWriter::new(schema, codec).with_sync_interval(sync_interval);
    let mut out = Vec::new();
    for value in values {
        if let Some(bytes) = writer.append(value).unwrap() {
            out.extend_from_slice(&bytes);
        }
    }
    out.extend_from_slice(&writer.finish().unwrap());
    out
}

fn read_stream(bytes: &[u8]) -> Vec<Value> {
    let mut reader = StreamReader::new();
    let mut values = reader.push(bytes).unwrap();
    values.extend(reader.finish().unwrap());
    values
}

// ============================================================================
// The concrete three-record scenario
// ============================================================================

#[test]
fn test_three_records_deflate_roundtrip() {
    let values = three_records();
    let bytes = write_stream(nested_schema(), Codec::Deflate, &values, 16000);

    // Read with no explicit reader schema: the header's schema drives decode
    let decoded = read_stream(&bytes);
    assert_eq!(decoded, values);

    // Union field decoded to 2, null, and "Ann Arbor" in original order
    let union_values: Vec<&Value> = decoded
        .iter()
        .map(|r| r.get("subrecord").unwrap().get("value").unwrap())
        .collect();
    assert_eq!(union_values[0], &Value::Int(2));
    assert_eq!(union_values[1], &Value::Null);
    assert_eq!(union_values[2], &Value::String("Ann Arbor".into()));
}

// ============================================================================
// Per-codec file round trips
// ============================================================================

#[test]
fn test_file_roundtrip_all_codecs() {
    let dir = tempdir().unwrap();
    for codec in [Codec::Null, Codec::Deflate, Codec::Snappy] {
        let path = dir.path().join(format!("data-{}.avro", codec.name()));
        let values = three_records();

        let mut writer = AvroFile::open_write(&path, nested_schema(), codec).unwrap();
        for value in &values {
            writer.append(value).unwrap();
        }
        writer.close().unwrap();

        let reader = AvroFile::open_read(&path).unwrap();
        let decoded: Vec<Value> = reader.map(|r| r.unwrap()).collect();
        assert_eq!(decoded, values, "codec {}", codec);
    }
}

#[test]
fn test_file_reader_exposes_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("header.avro");

    let mut writer = AvroFile::open_write(&path, nested_schema(), Codec::Deflate).unwrap();
    for value in &three_records() {
        writer.append(value).unwrap();
    }
    writer.close().unwrap();

    let mut reader = AvroFile::open_read(&path).unwrap();
    assert!(reader.header().is_none(), "header not parsed before reading");
    let first = reader.next().unwrap().unwrap();
    assert_eq!(first.get("key"), Some(&Value::String("john".into())));

    let header = reader.header().expect("header available after first value");
    assert_eq!(header.magic, MAGIC);
    assert_eq!(header.codec().unwrap(), Codec::Deflate);
    assert_eq!(header.schema().unwrap(), nested_schema());
}

#[test]
fn test_many_values_across_many_blocks() {
    // A small sync interval forces many blocks
    let schema = parse_schema(r#""long""#).unwrap();
    let values: Vec<Value> = (0..1000).map(Value::Long).collect();
    let bytes = write_stream(schema, Codec::Deflate, &values, 64);
    assert_eq!(read_stream(&bytes), values);
}

// ============================================================================
// Sync markers
// ============================================================================

/// Walk the raw file: parse the header with the datum layer, then step block
/// records by hand, returning each block's trailing marker.
fn collect_block_markers(bytes: &[u8]) -> ([u8; SYNC_SIZE], Vec<[u8; SYNC_SIZE]>) {
    let mut buf = ByteBuffer::new();
    buf.write(bytes);

    let schema = header_schema();
    let header_value = DatumReader::new()
        .read_data(&schema, &schema, &mut buf)
        .unwrap();
    let header = avrofile::Header::from_value(&header_value).unwrap();

    let mut markers = Vec::new();
    while buf.remaining() > 0 {
        let _count = decode::read_long(&mut buf).unwrap();
        let payload = decode::read_bytes(&mut buf).unwrap();
        assert!(!payload.is_empty());
        let mut marker = [0u8; SYNC_SIZE];
        marker.copy_from_slice(&decode::read_fixed(&mut buf, SYNC_SIZE).unwrap());
        markers.push(marker);
    }
    (header.sync_marker, markers)
}

#[test]
fn test_every_block_carries_the_header_sync_marker() {
    let schema = parse_schema(r#""long""#).unwrap();
    let values: Vec<Value> = (0..200).map(Value::Long).collect();
    let bytes = write_stream(schema, Codec::Null, &values, 32);

    let (header_marker, block_markers) = collect_block_markers(&bytes);
    assert!(block_markers.len() > 1, "expected multiple blocks");
    for marker in &block_markers {
        assert_eq!(marker, &header_marker);
    }
}

#[test]
fn test_distinct_files_get_distinct_sync_markers() {
    let schema = parse_schema(r#""long""#).unwrap();
    let a = write_stream(schema.clone(), Codec::Null, &[Value::Long(1)], 16000);
    let b = write_stream(schema, Codec::Null, &[Value::Long(1)], 16000);
    let (marker_a, _) = collect_block_markers(&a);
    let (marker_b, _) = collect_block_markers(&b);
    assert_ne!(marker_a, marker_b);
}

// ============================================================================
// Corruption
// ============================================================================

#[test]
fn test_corrupted_snappy_block_fails_with_codec_error() {
    let schema = parse_schema(r#""string""#).unwrap();
    let values = vec![Value::String("a value that compresses".repeat(8))];
    let mut bytes = write_stream(schema, Codec::Snappy, &values, 16000);

    // Locate the block payload: header, then count and payload length
    let mut buf = ByteBuffer::new();
    buf.write(&bytes);
    let hs = header_schema();
    DatumReader::new().read_data(&hs, &hs, &mut buf).unwrap();
    decode::read_long(&mut buf).unwrap(); // object count
    let payload = decode::read_bytes(&mut buf).unwrap();
    let consumed = bytes.len() - buf.remaining();
    let payload_start = consumed - payload.len();

    // Flip a bit inside the compressed body, not the trailing 4-byte CRC
    assert!(payload.len() > 8);
    bytes[payload_start + 2] ^= 0x01;

    let mut reader = StreamReader::new();
    let err = match reader.push(&bytes) {
        Err(e) => e,
        Ok(_) => reader.finish().unwrap_err(),
    };
    assert!(matches!(err, Error::File(FileError::Codec(_))));
}

#[test]
fn test_not_an_avro_file() {
    let mut reader = StreamReader::new();
    let err = reader
        .push(b"PK\x03\x04 definitely a zip file, not avro........")
        .unwrap_err();
    assert!(matches!(err, Error::File(FileError::BadMagic(_))));
}

// ============================================================================
// Chunked delivery
// ============================================================================

#[test]
fn test_chunked_delivery_matches_single_push() {
    let values = three_records();
    let bytes = write_stream(nested_schema(), Codec::Snappy, &values, 64);

    for chunk_size in [1, 3, 7, 64, 1024] {
        let mut reader = StreamReader::new();
        let mut decoded = Vec::new();
        for chunk in bytes.chunks(chunk_size) {
            decoded.extend(reader.push(chunk).unwrap());
        }
        decoded.extend(reader.finish().unwrap());
        assert_eq!(decoded, values, "chunk size {}", chunk_size);
    }
}
