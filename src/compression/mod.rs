// src/compression/mod.rs
//! Stream decompression for package payloads and repository indexes
//!
//! A `.deb` names its payload member `data.tar` with an optional compression
//! suffix; repository indexes may be served compressed too. Both are decoded
//! through [`create_decoder`] so extraction never buffers a whole payload.

use crate::error::{Error, Result};
use std::io::Read;

/// Supported compression formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionFormat {
    /// No compression (raw data)
    None,
    /// Gzip compression (.gz)
    Gzip,
    /// XZ/LZMA compression (.xz)
    Xz,
    /// Zstandard compression (.zst)
    Zstd,
}

impl CompressionFormat {
    /// Detect compression format from a file or member name suffix
    ///
    /// Returns `None` for suffixes this crate cannot decode (e.g. `.bz2`);
    /// a name with no compression suffix is `Some(CompressionFormat::None)`.
    pub fn from_extension(name: &str) -> Option<Self> {
        let name = name.trim_end_matches('/');
        if name.ends_with(".gz") || name.ends_with(".tgz") {
            Some(Self::Gzip)
        } else if name.ends_with(".xz") {
            Some(Self::Xz)
        } else if name.ends_with(".zst") || name.ends_with(".zstd") {
            Some(Self::Zstd)
        } else if name.ends_with(".bz2") || name.ends_with(".lzma") || name.ends_with(".lz4") {
            None
        } else {
            Some(Self::None)
        }
    }

    /// Format of a `.deb` payload member (`data.tar`, `data.tar.xz`, ...)
    ///
    /// `None` when the name is not a payload member at all.
    pub fn from_payload_member(name: &str) -> Option<Self> {
        // GNU ar terminates member names with '/'
        let name = name.trim_end_matches('/');
        if !name.starts_with("data.tar") {
            return None;
        }
        Self::from_extension(name)
    }

    /// Detect compression format from magic bytes
    ///
    /// Magic bytes:
    /// - Gzip: `1f 8b`
    /// - XZ: `fd 37 7a 58 5a 00` (FD + "7zXZ" + NUL)
    /// - Zstd: `28 b5 2f fd`
    pub fn from_magic_bytes(data: &[u8]) -> Self {
        if data.starts_with(&[0x1f, 0x8b]) {
            Self::Gzip
        } else if data.starts_with(&[0xfd, 0x37, 0x7a, 0x58, 0x5a, 0x00]) {
            Self::Xz
        } else if data.starts_with(&[0x28, 0xb5, 0x2f, 0xfd]) {
            Self::Zstd
        } else {
            Self::None
        }
    }

    /// Human-readable name for this format
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Gzip => "gzip",
            Self::Xz => "xz",
            Self::Zstd => "zstd",
        }
    }
}

impl std::fmt::Display for CompressionFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Wrap `reader` in a decoder for `format`
///
/// For `CompressionFormat::None`, returns the reader unchanged.
pub fn create_decoder<'a, R: Read + 'a>(
    reader: R,
    format: CompressionFormat,
) -> Result<Box<dyn Read + 'a>> {
    match format {
        CompressionFormat::None => Ok(Box::new(reader)),
        CompressionFormat::Gzip => Ok(Box::new(flate2::read::GzDecoder::new(reader))),
        CompressionFormat::Xz => Ok(Box::new(xz2::read::XzDecoder::new(reader))),
        CompressionFormat::Zstd => {
            let decoder = zstd::Decoder::new(reader).map_err(|e| {
                Error::IoError(format!("Failed to create zstd decoder: {}", e))
            })?;
            Ok(Box::new(decoder))
        }
    }
}

/// Decompress a byte slice using the specified format
pub fn decompress(data: &[u8], format: CompressionFormat) -> Result<Vec<u8>> {
    let mut decoder = create_decoder(data, format)?;
    let mut output = Vec::new();
    decoder.read_to_end(&mut output).map_err(|e| {
        Error::IoError(format!("Failed to decompress {} data: {}", format, e))
    })?;
    Ok(output)
}

/// Decompress a byte slice, detecting the format from its magic bytes
///
/// Uncompressed input is returned as-is.
pub fn decompress_auto(data: &[u8]) -> Result<Vec<u8>> {
    decompress(data, CompressionFormat::from_magic_bytes(data))
}
