//! Compression codec support for container blocks.
//!
//! Each block of encoded datums is compressed independently with the codec
//! declared in the file header. The codec contract is a pair of stable
//! `compress(bytes) -> bytes` / `decompress(bytes) -> bytes` functions per
//! codec name.

use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use snap::raw::{Decoder as SnappyDecoder, Encoder as SnappyEncoder};

use crate::error::CodecError;

/// Size of the CRC32 checksum appended to snappy-compressed blocks.
const CRC_SIZE: usize = 4;

/// Compression codec used within container blocks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    /// No compression (passthrough)
    #[default]
    Null,
    /// Raw DEFLATE (RFC 1951, no zlib wrapper)
    Deflate,
    /// Snappy with Avro framing (4-byte CRC32 suffix)
    Snappy,
}

impl Codec {
    /// Parse a codec from its name string as found in file metadata.
    ///
    /// # Errors
    /// [`CodecError::UnsupportedCodec`] if the name is unknown.
    pub fn from_name(name: &str) -> Result<Self, CodecError> {
        match name {
            "null" => Ok(Codec::Null),
            "deflate" => Ok(Codec::Deflate),
            "snappy" => Ok(Codec::Snappy),
            unknown => Err(CodecError::UnsupportedCodec(format!(
                "Unknown codec '{}'. Supported codecs: null, deflate, snappy",
                unknown
            ))),
        }
    }

    /// The canonical name of this codec, as written into file metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Codec::Null => "null",
            Codec::Deflate => "deflate",
            Codec::Snappy => "snappy",
        }
    }

    /// Compress a block payload with this codec.
    pub fn compress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            Codec::Deflate => compress_deflate(data),
            Codec::Snappy => compress_snappy(data),
        }
    }

    /// Decompress a block payload with this codec.
    pub fn decompress(&self, data: &[u8]) -> Result<Vec<u8>, CodecError> {
        match self {
            Codec::Null => Ok(data.to_vec()),
            Codec::Deflate => decompress_deflate(data),
            Codec::Snappy => decompress_snappy(data),
        }
    }
}

impl std::fmt::Display for Codec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Compress with raw DEFLATE (no zlib or gzip wrapper).
fn compress_deflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(data)
        .map_err(|e| CodecError::CompressionError(format!("Deflate compression failed: {}", e)))?;
    encoder
        .finish()
        .map_err(|e| CodecError::CompressionError(format!("Deflate compression failed: {}", e)))
}

/// Decompress raw DEFLATE data.
fn decompress_deflate(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.is_empty() {
        return Ok(Vec::new());
    }

    let mut decoder = DeflateDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder.read_to_end(&mut decompressed).map_err(|e| {
        CodecError::DecompressionError(format!("Deflate decompression failed: {}", e))
    })?;

    Ok(decompressed)
}

/// Compress snappy data with Avro framing.
///
/// Format: `[snappy_compressed_data][4-byte big-endian CRC32]`, where the
/// checksum is of the *uncompressed* payload and uses the ISO polynomial
/// (CRC32, not CRC32C).
fn compress_snappy(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    let crc = crc32fast::hash(data);

    let mut encoder = SnappyEncoder::new();
    let mut compressed = encoder
        .compress_vec(data)
        .map_err(|e| CodecError::CompressionError(format!("Snappy compression failed: {}", e)))?;

    compressed.extend_from_slice(&crc.to_be_bytes());
    Ok(compressed)
}

/// Decompress snappy data with Avro framing, verifying the trailing CRC32.
fn decompress_snappy(data: &[u8]) -> Result<Vec<u8>, CodecError> {
    if data.len() < CRC_SIZE {
        return Err(CodecError::DecompressionError(
            "Snappy data too short: missing CRC checksum".to_string(),
        ));
    }

    let compressed = &data[..data.len() - CRC_SIZE];
    let crc_bytes = &data[data.len() - CRC_SIZE..];
    let expected = u32::from_be_bytes([crc_bytes[0], crc_bytes[1], crc_bytes[2], crc_bytes[3]]);

    let decompressed = if compressed.is_empty() {
        Vec::new()
    } else {
        let mut decoder = SnappyDecoder::new();
        decoder.decompress_vec(compressed).map_err(|e| {
            CodecError::DecompressionError(format!("Snappy decompression failed: {}", e))
        })?
    };

    let actual = crc32fast::hash(&decompressed);
    if actual != expected {
        return Err(CodecError::ChecksumMismatch { expected, actual });
    }

    Ok(decompressed)
}
