//! Streaming container writer.
//!
//! [`StreamWriter`] accepts one value at a time, accumulates encoded datums
//! into a pending block, and frames a compressed block record whenever the
//! accumulated size crosses the sync interval. The header (with a fresh
//! random sync marker) is produced when the first value arrives; ending the
//! session flushes any pending data.

use bytes::Bytes;
use tracing::debug;

use crate::buffer::ByteBuffer;
use crate::codec::Codec;
use crate::container::{
    block_schema, generate_sync_marker, header_schema, Block, Header, DEFAULT_SYNC_INTERVAL,
    SYNC_SIZE,
};
use crate::datum::DatumWriter;
use crate::error::Error;
use crate::schema::Schema;
use crate::value::Value;

/// Chunk-producing writer session for a container byte stream.
///
/// Each [`append`](Self::append) validates and encodes one value; when a
/// block fills up, the call returns the framed bytes to hand to the byte
/// sink. [`finish`](Self::finish) flushes the final partial block.
///
/// # Example
/// ```
/// use avrofile::schema::parse_schema;
/// use avrofile::writer::StreamWriter;
/// use avrofile::{Codec, Value};
///
/// let schema = parse_schema(r#""long""#).unwrap();
/// let mut writer = StreamWriter::new(schema, Codec::Null);
/// let mut out = Vec::new();
/// if let Some(bytes) = writer.append(&Value::Long(42)).unwrap() {
///     out.extend_from_slice(&bytes);
/// }
/// out.extend_from_slice(&writer.finish().unwrap());
/// assert!(!out.is_empty());
/// ```
#[derive(Debug)]
pub struct StreamWriter {
    writers_schema: Schema,
    datum_writer: DatumWriter,
    codec: Codec,
    /// Encoded datums accumulating toward the next block.
    datum_block: ByteBuffer,
    /// Framed header/block bytes staged for the caller.
    file_block: ByteBuffer,
    sync_marker: [u8; SYNC_SIZE],
    sync_interval: usize,
    /// Datums in the pending block.
    block_count: i64,
    /// Whether the header has been written.
    started: bool,
}

impl StreamWriter {
    /// Create a writer session for a schema and codec.
    pub fn new(writers_schema: Schema, codec: Codec) -> Self {
        Self {
            datum_writer: DatumWriter::with_schema(writers_schema.clone()),
            writers_schema,
            codec,
            datum_block: ByteBuffer::new(),
            file_block: ByteBuffer::new(),
            sync_marker: [0; SYNC_SIZE],
            sync_interval: DEFAULT_SYNC_INTERVAL,
            block_count: 0,
            started: false,
        }
    }

    /// Override the accumulated-size threshold that closes a block.
    pub fn with_sync_interval(mut self, sync_interval: usize) -> Self {
        self.sync_interval = sync_interval;
        self
    }

    /// The schema every appended value must conform to.
    pub fn schema(&self) -> &Schema {
        &self.writers_schema
    }

    /// The session's sync marker, once the header has been generated.
    pub fn sync_marker(&self) -> Option<[u8; SYNC_SIZE]> {
        self.started.then_some(self.sync_marker)
    }

    /// Validate and encode one value.
    ///
    /// Returns the framed bytes for the byte sink when this append closed a
    /// block, `None` while the block is still accumulating.
    ///
    /// # Errors
    /// [`Error::Validation`] if the value does not conform to the schema;
    /// the pending block is left exactly as it was, so the session remains
    /// usable and previously emitted blocks are unaffected.
    pub fn append(&mut self, datum: &Value) -> Result<Option<Bytes>, Error> {
        if !self.started {
            self.write_header()?;
            self.started = true;
        }

        self.datum_writer.write(datum, &mut self.datum_block)?;
        self.block_count += 1;

        if self.datum_block.len() > self.sync_interval {
            self.close_block()?;
            return Ok(Some(self.take_staged()));
        }
        Ok(None)
    }

    /// End the session, flushing any pending block.
    ///
    /// Returns the remaining framed bytes (empty if nothing was ever
    /// appended).
    pub fn finish(&mut self) -> Result<Bytes, Error> {
        if self.block_count > 0 {
            self.close_block()?;
        }
        Ok(self.take_staged())
    }

    /// Write the file header: magic, metadata, and a fresh sync marker.
    fn write_header(&mut self) -> Result<(), Error> {
        self.sync_marker = generate_sync_marker();
        let header = Header::new(self.codec, self.schema(), self.sync_marker);
        debug!(codec = %self.codec, "writing container header");
        self.datum_writer
            .write_data(&header_schema(), &header.to_value(), &mut self.file_block)
    }

    /// Compress the pending datums and frame them as a block record.
    fn close_block(&mut self) -> Result<(), Error> {
        let payload = self.codec.compress(self.datum_block.as_slice())?;
        debug!(
            objects = self.block_count,
            raw = self.datum_block.len(),
            compressed = payload.len(),
            "closing block"
        );

        let block = Block {
            object_count: self.block_count,
            objects: payload.into(),
            sync_marker: self.sync_marker,
        };
        self.datum_writer
            .write_data(&block_schema(), &block.to_value(), &mut self.file_block)?;

        self.datum_block.flush();
        self.block_count = 0;
        Ok(())
    }

    /// Hand the staged framing bytes to the caller and reset the stage.
    fn take_staged(&mut self) -> Bytes {
        let bytes = Bytes::copy_from_slice(self.file_block.as_slice());
        self.file_block.flush();
        bytes
    }
}
