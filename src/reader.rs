//! Streaming container reader.
//!
//! [`StreamReader`] consumes raw byte chunks as they arrive and emits decoded
//! values as soon as complete blocks are available. It never blocks
//! mid-value: a parse attempt that runs out of buffered bytes rewinds to the
//! position before the attempt and waits for the next chunk.

use tracing::{debug, warn};

use crate::buffer::ByteBuffer;
use crate::codec::Codec;
use crate::container::{block_schema, header_schema, Block, Header, SYNC_SIZE};
use crate::datum::DatumReader;
use crate::error::{Error, FileError};
use crate::schema::Schema;
use crate::value::Value;

/// Where the reader session is in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadState {
    /// The header has not been fully received yet.
    AwaitingHeader,
    /// The header is parsed; block records follow.
    InBody,
}

/// Outcome of one parse attempt against the buffered bytes.
enum Parse<T> {
    /// The item was fully decoded.
    Complete(T),
    /// The buffered bytes end mid-item; retry after more input.
    NeedMoreData,
    /// The bytes are malformed; the session is dead.
    Failed(Error),
}

/// Chunk-driven reader session for a container byte stream.
///
/// Feed chunks with [`push`](Self::push) as they arrive; each call returns
/// the values that became complete, in schema field order within a record
/// and in encounter order across the stream. Call [`finish`](Self::finish)
/// at end of input for the final parse attempt.
///
/// A session that has returned a hard error must not be reused.
///
/// # Example
/// ```no_run
/// use avrofile::reader::StreamReader;
///
/// let mut reader = StreamReader::new();
/// let mut values = Vec::new();
/// for chunk in [&[0u8; 0][..]] {
///     values.extend(reader.push(chunk)?);
/// }
/// values.extend(reader.finish()?);
/// # Ok::<(), avrofile::Error>(())
/// ```
#[derive(Debug, Default)]
pub struct StreamReader {
    /// Raw bytes received so far and not yet consumed.
    file_block: ByteBuffer,
    /// Decompressed datum bytes of the block currently being decoded.
    datum_block: ByteBuffer,
    /// Datum decoder; its writer schema comes from the header.
    datum_reader: DatumReader,
    /// Parsed header, once available.
    header: Option<Header>,
    /// Block codec from the header.
    codec: Codec,
    state: ReadState,
}

impl Default for ReadState {
    fn default() -> Self {
        ReadState::AwaitingHeader
    }
}

impl StreamReader {
    /// Create a reader that decodes with the file's own writer schema.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a reader that resolves datums into an explicit reader schema.
    pub fn with_readers_schema(readers_schema: Schema) -> Self {
        Self {
            datum_reader: DatumReader::with_readers_schema(readers_schema),
            ..Self::default()
        }
    }

    /// The parsed file header, available once enough bytes have arrived.
    ///
    /// This is the header-available notification: it flips from `None` to
    /// `Some` exactly once, during the [`push`](Self::push) call that
    /// completes the header.
    pub fn header(&self) -> Option<&Header> {
        self.header.as_ref()
    }

    /// The writer schema embedded in the header, once parsed.
    pub fn writers_schema(&self) -> Option<&Schema> {
        self.datum_reader.writers_schema.as_ref()
    }

    /// Feed one chunk of raw bytes; returns the values completed by it.
    ///
    /// # Errors
    /// Any hard error (bad magic, malformed framing, codec failure,
    /// malformed datum encoding) is terminal for the session. Incomplete
    /// trailing bytes are not an error; they are kept for the next call.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Value>, Error> {
        self.file_block.write(chunk);

        let mut values = Vec::new();
        if self.state == ReadState::AwaitingHeader {
            match self.try_read_header() {
                Parse::Complete(()) => self.state = ReadState::InBody,
                Parse::NeedMoreData => return Ok(values),
                Parse::Failed(e) => return Err(e),
            }
        }
        self.read_blocks(&mut values)?;
        Ok(values)
    }

    /// Signal end of input and make one final parse attempt.
    ///
    /// Bytes that still do not form a complete header or block are dropped
    /// with a warning; a truncated tail is not decodable.
    pub fn finish(&mut self) -> Result<Vec<Value>, Error> {
        let mut values = Vec::new();

        if self.file_block.remaining() > 0 && self.state == ReadState::AwaitingHeader {
            match self.try_read_header() {
                Parse::Complete(()) => self.state = ReadState::InBody,
                Parse::NeedMoreData => {
                    warn!(
                        remaining = self.file_block.remaining(),
                        "input ended before a complete header arrived"
                    );
                    return Ok(values);
                }
                Parse::Failed(e) => return Err(e),
            }
        }
        if self.file_block.remaining() > 0 {
            self.read_blocks(&mut values)?;
            if self.file_block.remaining() > 0 {
                warn!(
                    remaining = self.file_block.remaining(),
                    "input ended mid-block; trailing bytes dropped"
                );
            }
        }
        Ok(values)
    }

    /// Attempt to parse the header from the buffered bytes.
    fn try_read_header(&mut self) -> Parse<()> {
        let saved = self.file_block.offset();
        let schema = header_schema();
        let result = DatumReader::new()
            .read_data(&schema, &schema, &mut self.file_block)
            .and_then(|value| Header::from_value(&value));

        match result {
            Ok(header) => {
                let writers_schema = match header.schema() {
                    Ok(s) => s,
                    Err(e) => return Parse::Failed(e),
                };
                let codec = match header.codec() {
                    Ok(c) => c,
                    Err(e) => return Parse::Failed(e),
                };
                debug!(codec = %codec, "parsed container header");
                self.datum_reader.writers_schema = Some(writers_schema);
                self.codec = codec;
                self.header = Some(header);
                Parse::Complete(())
            }
            Err(e) if e.is_need_more_data() => {
                self.file_block.set_offset(saved);
                Parse::NeedMoreData
            }
            Err(e) => Parse::Failed(e),
        }
    }

    /// Parse as many complete blocks as the buffered bytes allow.
    fn read_blocks(&mut self, values: &mut Vec<Value>) -> Result<(), Error> {
        while self.file_block.remaining() > 0 {
            let saved = self.file_block.offset();
            match self.try_read_block(values) {
                Parse::Complete(()) => {}
                Parse::NeedMoreData => {
                    self.file_block.set_offset(saved);
                    return Ok(());
                }
                Parse::Failed(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Attempt to parse and decode one block record.
    fn try_read_block(&mut self, values: &mut Vec<Value>) -> Parse<()> {
        let schema = block_schema();
        let block_value =
            match DatumReader::new().read_data(&schema, &schema, &mut self.file_block) {
                Ok(v) => v,
                Err(e) if e.is_need_more_data() => return Parse::NeedMoreData,
                Err(e) => return Parse::Failed(e),
            };
        let block = match Block::from_value(&block_value) {
            Ok(b) => b,
            Err(e) => return Parse::Failed(e),
        };

        // Tolerate sync-marker-shaped data inside a block: if the trailing
        // marker doesn't match the header's, it wasn't a sync boundary, so
        // give those bytes back to the stream.
        let expected_sync = self.header.as_ref().map(|h| h.sync_marker);
        if expected_sync.is_some_and(|expected| block.sync_marker != expected) {
            warn!("block sync marker mismatch, rewinding by marker width");
            if let Err(e) = self.file_block.skip(-(SYNC_SIZE as i64)) {
                return Parse::Failed(e.into());
            }
        }

        match self.decode_block(&block, values) {
            Ok(()) => Parse::Complete(()),
            Err(e) => Parse::Failed(e),
        }
    }

    /// Decompress a block payload and decode its datums.
    ///
    /// The payload is complete by construction here, so a delay-read while
    /// decoding datums means the block lied about its contents; it is
    /// converted to a hard framing error rather than a wait.
    fn decode_block(&mut self, block: &Block, values: &mut Vec<Value>) -> Result<(), Error> {
        let data = self.codec.decompress(&block.objects)?;
        debug!(
            objects = block.object_count,
            compressed = block.objects.len(),
            decompressed = data.len(),
            "decoding block"
        );

        if self.datum_block.remaining() == 0 {
            self.datum_block.flush();
        }
        self.datum_block.write(&data);

        for _ in 0..block.object_count {
            match self.datum_reader.read(&mut self.datum_block) {
                Ok(value) => values.push(value),
                Err(e) if e.is_need_more_data() => {
                    return Err(FileError::MalformedFraming(
                        "block payload ended mid-datum".to_string(),
                    )
                    .into());
                }
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }
}
