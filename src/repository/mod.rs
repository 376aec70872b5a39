// src/repository/mod.rs

//! Repository access
//!
//! This module provides:
//! - Parsing of the Debian/Termux `Packages` index
//! - The [`Fetcher`] seam used by the installer for all network I/O
//! - An HTTP implementation with retries
//! - Archive downloads with SHA256 verification

mod client;
mod download;
pub mod metadata;

pub use client::RepositoryClient;
pub use download::{download_archive, file_sha256, verify_checksum, ArchiveRequest};
pub use metadata::{parse_index, PackageIndex, PackageRecord};

use crate::compression::decompress_auto;
use crate::error::{Error, Result};
use std::path::Path;
use tracing::debug;

/// Source of repository indexes and package archives
pub trait Fetcher: Send + Sync {
    /// Fetch the raw body of `url`
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;

    /// Stream `url` into `dest_path`, reporting `(bytes so far, total)`
    ///
    /// Returns the number of bytes written.
    fn fetch_to_file(
        &self,
        url: &str,
        dest_path: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64>;

    /// Fetch and parse a package index, decompressing it if needed
    fn fetch_index(&self, url: &str) -> Result<PackageIndex> {
        let bytes = self.fetch_bytes(url)?;
        let data = decompress_auto(&bytes).map_err(|e| {
            Error::ParseError(format!("Failed to decompress index from {}: {}", url, e))
        })?;
        debug!("Index {}: {} bytes -> {} bytes", url, bytes.len(), data.len());
        parse_index(data.as_slice())
    }
}
