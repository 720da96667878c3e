//! Streaming reader/writer for the Avro object container file format.
//!
//! This library implements the schema-driven binary encoding (zig-zag
//! varints, little-endian IEEE 754, length-prefixed bytes and strings) and
//! the self-describing container framing built on top of it: a header that
//! embeds its own schema and codec, followed by sync-marked, independently
//! compressed blocks of encoded values.
//!
//! Both directions are incremental. [`reader::StreamReader`] consumes raw
//! byte chunks as they arrive and emits values as blocks complete;
//! [`writer::StreamWriter`] accepts one value at a time and hands back
//! framed bytes whenever a block closes. [`file::AvroFile`] wraps both in a
//! local-file convenience layer.
//!
//! Reading supports schema resolution: data written under one schema can be
//! decoded under a structurally compatible reader schema, dropping
//! writer-only record fields and re-matching union branches.

pub mod buffer;
pub mod codec;
pub mod container;
pub mod datum;
pub mod decode;
pub mod encode;
pub mod error;
pub mod file;
pub mod reader;
pub mod schema;
pub mod value;
pub mod writer;

// Re-export main types
pub use buffer::ByteBuffer;
pub use codec::Codec;
pub use container::{Block, Header};
pub use datum::{validate_value, validates, DatumReader, DatumWriter};
pub use error::{
    BlockError, CodecError, Error, FileError, IoError, SchemaError, ValidationError,
};
pub use file::{AvroFile, FileReader, FileSession, FileWriter, Mode, OpenOptions};
pub use reader::StreamReader;
pub use schema::{parse_schema, Schema};
pub use value::Value;
pub use writer::StreamWriter;
