//! Error types for Avro container streaming.

use thiserror::Error;

/// Errors that can occur while parsing or constructing schema trees.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// Invalid schema structure
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Unsupported schema type
    #[error("Unsupported type: {0}")]
    UnsupportedType(String),
    /// Schema JSON parsing error
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// Errors that can occur during codec operations.
#[derive(Debug, Error)]
pub enum CodecError {
    /// Unsupported codec
    #[error("Unsupported codec: {0}")]
    UnsupportedCodec(String),
    /// Compression error
    #[error("Compression error: {0}")]
    CompressionError(String),
    /// Decompression error
    #[error("Decompression error: {0}")]
    DecompressionError(String),
    /// CRC32 checksum of the decompressed payload did not match
    #[error("CRC32 checksum mismatch: expected 0x{expected:08X}, got 0x{actual:08X}")]
    ChecksumMismatch {
        /// Checksum stored alongside the compressed payload
        expected: u32,
        /// Checksum computed over the decompressed payload
        actual: u32,
    },
}

/// Wire-level encoding and decoding errors.
#[derive(Debug, Error)]
pub enum IoError {
    /// A boolean byte was neither 0 nor 1
    #[error("Invalid boolean value: {0}, expected 0 or 1")]
    InvalidBoolean(u8),
    /// A varint ran past the 64-bit accumulator
    #[error("Invalid varint encoding")]
    InvalidVarint,
    /// A decoded long does not fit the declared int type
    #[error("Integer overflow: {0} does not fit in i32")]
    IntegerOverflow(i64),
    /// A union index fell outside the writer union's branches
    #[error("Union index {index} out of range (0..{branches})")]
    UnionIndexOutOfRange {
        /// The decoded branch index
        index: i64,
        /// Number of branches in the writer union
        branches: usize,
    },
    /// No writer union branch accepted the datum's shape
    #[error("No union branch found for datum {0}")]
    NoMatchingBranch(String),
    /// No reader union branch is compatible with the writer branch
    #[error("No reader union branch compatible with writer branch {0}")]
    NoCompatibleReaderBranch(usize),
    /// Decoded string bytes were not valid UTF-8
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
}

/// Cursor and size invariant violations inside a [`ByteBuffer`].
///
/// [`NeedMoreData`](BlockError::NeedMoreData) is not a hard failure: it marks
/// a read that could succeed once more input arrives, and the streaming state
/// machine converts it into a rewind-and-wait. Every other variant is
/// terminal.
///
/// [`ByteBuffer`]: crate::buffer::ByteBuffer
#[derive(Debug, Error)]
pub enum BlockError {
    /// Read past the written region; more input may still arrive
    #[error("tried to read {requested} bytes, but only {available} bytes available at offset {offset}")]
    NeedMoreData {
        /// Bytes the caller asked for
        requested: usize,
        /// Unread bytes currently buffered
        available: usize,
        /// Read cursor position at the time of the attempt
        offset: usize,
    },
    /// Skip outside the valid cursor range
    #[error("tried to skip {requested} bytes, but only {available} bytes available at offset {offset}")]
    SkipOutOfRange {
        /// Requested cursor delta (may be negative)
        requested: i64,
        /// Unread bytes currently buffered
        available: usize,
        /// Read cursor position at the time of the attempt
        offset: usize,
    },
    /// Read past the allocated capacity
    #[error("tried to read {requested} bytes at offset {offset}, but buffer capacity is {capacity}")]
    ReadPastCapacity {
        /// Bytes the caller asked for
        requested: usize,
        /// Read cursor position at the time of the attempt
        offset: usize,
        /// Allocated capacity
        capacity: usize,
    },
    /// A length prefix decoded to a negative value
    #[error("negative length: {0}")]
    NegativeLength(i64),
}

impl BlockError {
    /// Whether this is the transient "insufficient bytes yet" signal.
    pub fn is_need_more_data(&self) -> bool {
        matches!(self, BlockError::NeedMoreData { .. })
    }
}

/// Container file protocol errors.
#[derive(Debug, Error)]
pub enum FileError {
    /// Header magic did not match `Obj\x01`
    #[error("Not an avro file, header magic was {0:?}")]
    BadMagic([u8; 4]),
    /// Unsupported open mode
    #[error("Unsupported operation {0:?} on file")]
    UnsupportedMode(String),
    /// A required metadata key was absent from the header
    #[error("Missing required metadata key '{0}'")]
    MissingMetadata(String),
    /// Header or block record did not have the expected shape
    #[error("Malformed container framing: {0}")]
    MalformedFraming(String),
    /// Codec error
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Underlying file-system error
    #[error("File system error: {0}")]
    Io(#[from] std::io::Error),
}

/// A datum did not conform to its declared schema.
///
/// Carries the dotted path of record field names leading to the offending
/// value; each enclosing record encoder prefixes its own field name as the
/// error propagates outward.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Field names from outermost record to the offending field
    pub field_path: Vec<String>,
    /// What was wrong with the value
    pub message: String,
}

impl ValidationError {
    /// Create a validation error with an empty field path.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            field_path: Vec::new(),
            message: message.into(),
        }
    }

    /// Prefix an enclosing record's field name onto the path.
    pub fn push_field(mut self, name: &str) -> Self {
        self.field_path.insert(0, name.to_string());
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.field_path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "at field `{}`: {}", self.field_path.join("."), self.message)
        }
    }
}

impl std::error::Error for ValidationError {}

/// Top-level error type for reader and writer sessions.
#[derive(Debug, Error)]
pub enum Error {
    /// Schema error
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),
    /// Wire-level error
    #[error("IO error: {0}")]
    Io(#[from] IoError),
    /// Buffer cursor error
    #[error("Block error: {0}")]
    Block(#[from] BlockError),
    /// Container protocol error
    #[error("File error: {0}")]
    File(#[from] FileError),
    /// Datum validation error
    #[error("Data validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl Error {
    /// Whether this error is the transient delay-read signal.
    ///
    /// The streaming reader treats it as "wait for the next chunk"; it never
    /// reaches callers of the public API.
    pub fn is_need_more_data(&self) -> bool {
        matches!(self, Error::Block(e) if e.is_need_more_data())
    }
}

impl From<CodecError> for Error {
    fn from(err: CodecError) -> Self {
        Error::File(FileError::Codec(err))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::File(FileError::Io(err))
    }
}
