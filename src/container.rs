//! Container file framing: magic, header and block layouts, sync markers.
//!
//! The header and block record layouts are themselves ordinary [`Schema`]
//! trees fed through the datum layer, not hand-rolled parsers. A file is the
//! header (magic, metadata map, sync marker) followed by block records, each
//! carrying an object count, a compressed payload, and the file's sync
//! marker again.

use std::collections::HashMap;

use bytes::Bytes;
use rand::Rng;

use crate::codec::Codec;
use crate::error::{Error, FileError};
use crate::schema::{parse_schema, FieldSchema, FixedSchema, RecordSchema, Schema};
use crate::value::Value;

/// First bytes of every container file: "Obj" plus the format version.
pub const MAGIC: [u8; 4] = [b'O', b'b', b'j', 0x01];

/// Width of the sync marker delimiting blocks.
pub const SYNC_SIZE: usize = 16;

/// Accumulated datum-block size that closes a block, by default.
pub const DEFAULT_SYNC_INTERVAL: usize = 1000 * SYNC_SIZE;

/// Metadata key naming the block compression codec.
pub const CODEC_KEY: &str = "avro.codec";

/// Metadata key holding the JSON writer schema.
pub const SCHEMA_KEY: &str = "avro.schema";

/// The file header layout.
pub fn header_schema() -> Schema {
    Schema::Record(RecordSchema::new(
        "org.apache.avro.file.Header",
        vec![
            FieldSchema::new("magic", Schema::Fixed(FixedSchema::new("magic", MAGIC.len()))),
            FieldSchema::new("meta", Schema::Map(Box::new(Schema::Bytes))),
            FieldSchema::new("sync", Schema::Fixed(FixedSchema::new("sync", SYNC_SIZE))),
        ],
    ))
}

/// The block record layout.
pub fn block_schema() -> Schema {
    Schema::Record(RecordSchema::new(
        "org.apache.avro.block",
        vec![
            FieldSchema::new("objectCount", Schema::Long),
            FieldSchema::new("objects", Schema::Bytes),
            FieldSchema::new("sync", Schema::Fixed(FixedSchema::new("sync", SYNC_SIZE))),
        ],
    ))
}

/// Generate a fresh random 16-byte sync marker.
pub fn generate_sync_marker() -> [u8; SYNC_SIZE] {
    let mut marker = [0u8; SYNC_SIZE];
    rand::rng().fill(&mut marker);
    marker
}

/// Parsed container file header.
#[derive(Debug, Clone)]
pub struct Header {
    /// The magic bytes (always `Obj\x01` once parsed).
    pub magic: [u8; 4],
    /// Metadata key-value pairs; values are raw bytes.
    pub meta: HashMap<String, Vec<u8>>,
    /// 16-byte sync marker every block record must repeat.
    pub sync_marker: [u8; SYNC_SIZE],
}

impl Header {
    /// Build the header a writer session emits: codec name and JSON writer
    /// schema in the metadata map, plus the session's sync marker.
    pub fn new(codec: Codec, schema: &Schema, sync_marker: [u8; SYNC_SIZE]) -> Self {
        let mut meta = HashMap::new();
        meta.insert(CODEC_KEY.to_string(), codec.name().as_bytes().to_vec());
        meta.insert(SCHEMA_KEY.to_string(), schema.to_json().into_bytes());
        Self {
            magic: MAGIC,
            meta,
            sync_marker,
        }
    }

    /// Rebuild a header from the datum decoded under [`header_schema`].
    ///
    /// # Errors
    /// [`FileError::BadMagic`] if the magic bytes are wrong;
    /// [`FileError::MalformedFraming`] if the datum shape is not a header.
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let malformed = |what: &str| FileError::MalformedFraming(format!("header {}", what));

        let magic_bytes = match value.get("magic") {
            Some(Value::Fixed(b)) if b.len() == MAGIC.len() => b,
            _ => return Err(malformed("magic missing or mis-sized").into()),
        };
        let mut magic = [0u8; 4];
        magic.copy_from_slice(magic_bytes);
        if magic != MAGIC {
            return Err(FileError::BadMagic(magic).into());
        }

        let mut meta = HashMap::new();
        match value.get("meta") {
            Some(Value::Map(entries)) => {
                for (key, entry) in entries {
                    match entry {
                        Value::Bytes(b) => {
                            meta.insert(key.clone(), b.clone());
                        }
                        _ => return Err(malformed("metadata value is not bytes").into()),
                    }
                }
            }
            _ => return Err(malformed("metadata map missing").into()),
        }

        let sync_marker = match value.get("sync") {
            Some(Value::Fixed(b)) if b.len() == SYNC_SIZE => {
                let mut marker = [0u8; SYNC_SIZE];
                marker.copy_from_slice(b);
                marker
            }
            _ => return Err(malformed("sync marker missing or mis-sized").into()),
        };

        Ok(Self {
            magic,
            meta,
            sync_marker,
        })
    }

    /// The header as a datum conforming to [`header_schema`].
    pub fn to_value(&self) -> Value {
        let mut entries: Vec<(String, Value)> = self
            .meta
            .iter()
            .map(|(k, v)| (k.clone(), Value::Bytes(v.clone())))
            .collect();
        // Deterministic metadata order on the wire
        entries.sort_by(|(a, _), (b, _)| a.cmp(b));

        Value::Record(vec![
            ("magic".to_string(), Value::Fixed(self.magic.to_vec())),
            ("meta".to_string(), Value::Map(entries)),
            ("sync".to_string(), Value::Fixed(self.sync_marker.to_vec())),
        ])
    }

    /// Get a metadata value by key.
    pub fn get_metadata(&self, key: &str) -> Option<&[u8]> {
        self.meta.get(key).map(|v| v.as_slice())
    }

    /// Get a metadata value as a string.
    pub fn get_metadata_string(&self, key: &str) -> Option<&str> {
        self.meta.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Parse the embedded writer schema from metadata.
    ///
    /// # Errors
    /// [`FileError::MissingMetadata`] if the schema key is absent;
    /// [`SchemaError`](crate::error::SchemaError) if the JSON is invalid.
    pub fn schema(&self) -> Result<Schema, Error> {
        let json = self
            .get_metadata_string(SCHEMA_KEY)
            .ok_or_else(|| FileError::MissingMetadata(SCHEMA_KEY.to_string()))?;
        Ok(parse_schema(json)?)
    }

    /// Parse the codec from metadata; an absent key means the null codec.
    pub fn codec(&self) -> Result<Codec, Error> {
        match self.get_metadata_string(CODEC_KEY) {
            Some(name) => Ok(Codec::from_name(name)?),
            None => Ok(Codec::Null),
        }
    }
}

/// One framed run of encoded values.
#[derive(Debug, Clone)]
pub struct Block {
    /// Number of datums encoded in the payload.
    pub object_count: i64,
    /// The compressed payload.
    pub objects: Bytes,
    /// Sync marker; must equal the header's.
    pub sync_marker: [u8; SYNC_SIZE],
}

impl Block {
    /// Rebuild a block from the datum decoded under [`block_schema`].
    pub fn from_value(value: &Value) -> Result<Self, Error> {
        let malformed = |what: &str| FileError::MalformedFraming(format!("block {}", what));

        let object_count = match value.get("objectCount") {
            Some(Value::Long(n)) => *n,
            _ => return Err(malformed("object count missing").into()),
        };
        let objects = match value.get("objects") {
            Some(Value::Bytes(b)) => Bytes::copy_from_slice(b),
            _ => return Err(malformed("payload missing").into()),
        };
        let sync_marker = match value.get("sync") {
            Some(Value::Fixed(b)) if b.len() == SYNC_SIZE => {
                let mut marker = [0u8; SYNC_SIZE];
                marker.copy_from_slice(b);
                marker
            }
            _ => return Err(malformed("sync marker missing or mis-sized").into()),
        };

        Ok(Self {
            object_count,
            objects,
            sync_marker,
        })
    }

    /// The block as a datum conforming to [`block_schema`].
    pub fn to_value(&self) -> Value {
        Value::Record(vec![
            ("objectCount".to_string(), Value::Long(self.object_count)),
            ("objects".to_string(), Value::Bytes(self.objects.to_vec())),
            ("sync".to_string(), Value::Fixed(self.sync_marker.to_vec())),
        ])
    }
}
