//! File-backed convenience layer over the streaming sessions.
//!
//! [`AvroFile::open`] wires a local file to a [`StreamReader`] or
//! [`StreamWriter`]: read mode feeds fixed-size chunks from disk and exposes
//! a lazy iterator of decoded values; write mode flushes each emitted frame
//! to disk as blocks close.

use std::collections::VecDeque;
use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use crate::codec::Codec;
use crate::container::Header;
use crate::error::{Error, FileError};
use crate::reader::StreamReader;
use crate::schema::Schema;
use crate::value::Value;
use crate::writer::StreamWriter;

/// Default chunk size when reading from disk.
const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Whether a file is opened for reading or writing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Mode {
    /// Read an existing container file.
    #[default]
    Read,
    /// Create or truncate a container file.
    Write,
}

/// Options for [`AvroFile::open`].
#[derive(Debug, Clone, Default)]
pub struct OpenOptions {
    /// Read or write.
    pub mode: Mode,
    /// Block codec (write mode only; read mode takes it from the header).
    pub codec: Codec,
    /// Reader schema for resolution (read mode only).
    pub readers_schema: Option<Schema>,
    /// Chunk size for disk reads; 0 means the default.
    pub chunk_size: usize,
}

impl OpenOptions {
    /// Options for reading.
    pub fn read() -> Self {
        Self {
            mode: Mode::Read,
            ..Self::default()
        }
    }

    /// Options for writing with the given codec.
    pub fn write(codec: Codec) -> Self {
        Self {
            mode: Mode::Write,
            codec,
            ..Self::default()
        }
    }

    /// Set a reader schema for resolution.
    pub fn with_readers_schema(mut self, schema: Schema) -> Self {
        self.readers_schema = Some(schema);
        self
    }

    /// Set the disk read chunk size.
    pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// An open container file session: a reader or a writer.
#[derive(Debug)]
pub enum FileSession {
    /// Read session.
    Reader(FileReader),
    /// Write session.
    Writer(FileWriter),
}

impl FileSession {
    /// Unwrap the read session.
    ///
    /// # Errors
    /// [`FileError::UnsupportedMode`] if the file was opened for writing.
    pub fn into_reader(self) -> Result<FileReader, Error> {
        match self {
            FileSession::Reader(reader) => Ok(reader),
            FileSession::Writer(_) => {
                Err(FileError::UnsupportedMode("write".to_string()).into())
            }
        }
    }

    /// Unwrap the write session.
    ///
    /// # Errors
    /// [`FileError::UnsupportedMode`] if the file was opened for reading.
    pub fn into_writer(self) -> Result<FileWriter, Error> {
        match self {
            FileSession::Writer(writer) => Ok(writer),
            FileSession::Reader(_) => Err(FileError::UnsupportedMode("read".to_string()).into()),
        }
    }
}

/// Entry point for file-backed sessions.
pub struct AvroFile;

impl AvroFile {
    /// Open a container file for reading or writing.
    ///
    /// In write mode `schema` is required; in read mode it is ignored (the
    /// file header carries the writer schema; pass a reader schema through
    /// [`OpenOptions::with_readers_schema`] instead).
    ///
    /// # Errors
    /// [`FileError::Io`] on file-system failures;
    /// [`FileError::UnsupportedMode`] if write mode is requested without a
    /// schema.
    pub fn open(
        path: impl AsRef<Path>,
        schema: Option<Schema>,
        options: OpenOptions,
    ) -> Result<FileSession, Error> {
        match options.mode {
            Mode::Read => {
                let file = File::open(path).map_err(FileError::Io)?;
                let stream = match options.readers_schema {
                    Some(readers) => StreamReader::with_readers_schema(readers),
                    None => StreamReader::new(),
                };
                Ok(FileSession::Reader(FileReader {
                    file,
                    stream,
                    pending: VecDeque::new(),
                    chunk_size: if options.chunk_size == 0 {
                        DEFAULT_CHUNK_SIZE
                    } else {
                        options.chunk_size
                    },
                    finished: false,
                }))
            }
            Mode::Write => {
                let schema = schema.ok_or_else(|| {
                    FileError::UnsupportedMode("write without a schema".to_string())
                })?;
                let file = File::create(path).map_err(FileError::Io)?;
                Ok(FileSession::Writer(FileWriter {
                    file,
                    stream: StreamWriter::new(schema, options.codec),
                }))
            }
        }
    }

    /// Shorthand: open a file and return the read session.
    pub fn open_read(path: impl AsRef<Path>) -> Result<FileReader, Error> {
        Self::open(path, None, OpenOptions::read())?.into_reader()
    }

    /// Shorthand: create a file and return the write session.
    pub fn open_write(
        path: impl AsRef<Path>,
        schema: Schema,
        codec: Codec,
    ) -> Result<FileWriter, Error> {
        Self::open(path, Some(schema), OpenOptions::write(codec))?.into_writer()
    }
}

/// Lazy, finite, non-restartable sequence of decoded values from a file.
#[derive(Debug)]
pub struct FileReader {
    file: File,
    stream: StreamReader,
    pending: VecDeque<Value>,
    chunk_size: usize,
    finished: bool,
}

impl FileReader {
    /// The parsed header, once enough of the file has been consumed.
    pub fn header(&self) -> Option<&Header> {
        self.stream.header()
    }

    /// The writer schema embedded in the file, once the header is parsed.
    pub fn writers_schema(&self) -> Option<&Schema> {
        self.stream.writers_schema()
    }

    /// Pull decoded values until at least one is pending or input ends.
    fn fill_pending(&mut self) -> Result<(), Error> {
        let mut chunk = vec![0u8; self.chunk_size];
        while self.pending.is_empty() && !self.finished {
            let n = self.file.read(&mut chunk).map_err(FileError::Io)?;
            if n == 0 {
                self.finished = true;
                self.pending.extend(self.stream.finish()?);
                break;
            }
            self.pending.extend(self.stream.push(&chunk[..n])?);
        }
        Ok(())
    }
}

impl Iterator for FileReader {
    type Item = Result<Value, Error>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.pending.is_empty() {
            if let Err(e) = self.fill_pending() {
                return Some(Err(e));
            }
        }
        self.pending.pop_front().map(Ok)
    }
}

/// Write session that flushes framed bytes to a file as blocks close.
#[derive(Debug)]
pub struct FileWriter {
    file: File,
    stream: StreamWriter,
}

impl FileWriter {
    /// Validate, encode, and stage one value; completed blocks go to disk.
    pub fn append(&mut self, datum: &Value) -> Result<(), Error> {
        if let Some(bytes) = self.stream.append(datum)? {
            self.file.write_all(&bytes).map_err(FileError::Io)?;
        }
        Ok(())
    }

    /// Flush all pending data and close the session.
    pub fn close(mut self) -> Result<(), Error> {
        let bytes = self.stream.finish()?;
        if !bytes.is_empty() {
            self.file.write_all(&bytes).map_err(FileError::Io)?;
        }
        self.file.flush().map_err(FileError::Io)?;
        Ok(())
    }
}
