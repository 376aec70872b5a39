// src/repository/download.rs

//! Package archive downloads with checksum verification
//!
//! Archives land in the cache directory under a flattened copy of their
//! repository path. When the index carries a SHA256 the download is verified
//! against it, and an already cached archive with a matching checksum is
//! reused instead of being fetched again.

use crate::error::{Error, Result};
use crate::filesystem::path::cache_file_name;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::Fetcher;

/// A request for one archive
#[derive(Debug, Clone)]
pub struct ArchiveRequest<'a> {
    /// Absolute URL of the archive
    pub url: String,
    /// Repository-relative path (index `Filename`), used for the cache name
    pub repo_path: &'a str,
    pub sha256: Option<&'a str>,
}

/// Compute the lowercase hex SHA256 of a file
pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = File::open(path)
        .map_err(|e| Error::IoError(format!("Failed to open {}: {}", path.display(), e)))?;
    let mut hasher = Sha256::new();
    io::copy(&mut file, &mut hasher)
        .map_err(|e| Error::IoError(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(hex::encode(hasher.finalize()))
}

/// Verify a file against an expected SHA256 (case-insensitive)
pub fn verify_checksum(path: &Path, expected: &str) -> Result<()> {
    debug!("Verifying checksum for {}", path.display());

    let actual = file_sha256(path)?;
    if !actual.eq_ignore_ascii_case(expected.trim()) {
        return Err(Error::ChecksumMismatch {
            expected: expected.trim().to_ascii_lowercase(),
            actual,
        });
    }

    debug!("Checksum verified: {}", actual);
    Ok(())
}

/// Download an archive into `cache_dir`, returning its local path
///
/// A file whose checksum does not match is removed before the error is
/// returned.
pub fn download_archive(
    fetcher: &dyn Fetcher,
    request: &ArchiveRequest<'_>,
    cache_dir: &Path,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<PathBuf> {
    let dest_path = cache_dir.join(cache_file_name(request.repo_path)?);

    if let Some(expected) = request.sha256
        && dest_path.is_file()
    {
        match verify_checksum(&dest_path, expected) {
            Ok(()) => {
                debug!("Reusing cached {}", dest_path.display());
                return Ok(dest_path);
            }
            Err(e) => debug!("Cached {} is stale: {}", dest_path.display(), e),
        }
    }

    fetcher.fetch_to_file(&request.url, &dest_path, progress)?;

    if let Some(expected) = request.sha256
        && let Err(e) = verify_checksum(&dest_path, expected)
    {
        warn!("Removing {} after failed verification", dest_path.display());
        let _ = std::fs::remove_file(&dest_path);
        return Err(e);
    }

    Ok(dest_path)
}
