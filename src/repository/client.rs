// src/repository/client.rs

//! HTTP client for repository operations
//!
//! Wraps a blocking reqwest client with retry support. `file://` URLs are
//! served from the local filesystem, which allows mirrors on removable
//! storage and offline testing.

use crate::error::{Error, Result};
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::Fetcher;

/// Default timeout for HTTP requests (30 seconds)
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Maximum retry attempts for failed requests
const MAX_RETRIES: u32 = 3;

/// Retry delay in milliseconds, multiplied by the attempt number
const RETRY_DELAY_MS: u64 = 1000;

/// Buffer size for streaming downloads (8 KB)
const STREAM_BUFFER_SIZE: usize = 8192;

/// Local path of a `file://` URL
fn local_path(url: &str) -> Option<&Path> {
    url.strip_prefix("file://").map(Path::new)
}

/// Copy `reader` into `file` in chunks, reporting progress after each chunk
fn stream_to_file<R: Read>(
    mut reader: R,
    file: &mut File,
    total_size: Option<u64>,
    progress: &mut dyn FnMut(u64, Option<u64>),
) -> Result<u64> {
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; STREAM_BUFFER_SIZE];

    progress(0, total_size);
    loop {
        let bytes_read = reader
            .read(&mut buffer)
            .map_err(|e| Error::DownloadError(format!("Failed to read response: {e}")))?;
        if bytes_read == 0 {
            break;
        }

        file.write_all(&buffer[..bytes_read])
            .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;

        downloaded += bytes_read as u64;
        progress(downloaded, total_size);
    }

    file.flush()
        .map_err(|e| Error::IoError(format!("Failed to write data: {e}")))?;
    Ok(downloaded)
}

/// HTTP client wrapper with retry support
pub struct RepositoryClient {
    client: Client,
    max_retries: u32,
}

impl RepositoryClient {
    /// Create a new repository client
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(concat!("termroot/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| Error::InitError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            max_retries: MAX_RETRIES,
        })
    }

    /// Override the number of attempts per request
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Send a GET request, retrying transport failures
    ///
    /// HTTP error statuses are returned immediately without retrying.
    fn get(&self, url: &str) -> Result<reqwest::blocking::Response> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.client.get(url).send() {
                Ok(response) => {
                    if !response.status().is_success() {
                        return Err(Error::DownloadError(format!(
                            "HTTP {} from {}",
                            response.status(),
                            url
                        )));
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if attempt >= self.max_retries {
                        return Err(Error::DownloadError(format!(
                            "Failed to fetch {url} after {attempt} attempts: {e}"
                        )));
                    }
                    warn!("Request attempt {} for {} failed: {}, retrying...", attempt, url, e);
                    std::thread::sleep(Duration::from_millis(RETRY_DELAY_MS * attempt as u64));
                }
            }
        }
    }
}

impl Fetcher for RepositoryClient {
    fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        debug!("Fetching {}", url);

        if let Some(path) = local_path(url) {
            return fs::read(path).map_err(|e| {
                Error::DownloadError(format!("Failed to read {}: {}", path.display(), e))
            });
        }

        let bytes = self
            .get(url)?
            .bytes()
            .map_err(|e| Error::DownloadError(format!("Failed to read response from {url}: {e}")))?;
        Ok(bytes.to_vec())
    }

    fn fetch_to_file(
        &self,
        url: &str,
        dest_path: &Path,
        progress: &mut dyn FnMut(u64, Option<u64>),
    ) -> Result<u64> {
        info!("Downloading {} to {}", url, dest_path.display());

        if let Some(parent) = dest_path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                Error::IoError(format!("Failed to create directory {}: {e}", parent.display()))
            })?;
        }

        // Write to a temporary file first so an interrupted download never
        // leaves a truncated archive under the final name
        let temp_path = dest_path.with_extension("tmp");
        let mut file = File::create(&temp_path).map_err(|e| {
            Error::IoError(format!("Failed to create file {}: {e}", temp_path.display()))
        })?;

        let streamed = match local_path(url) {
            Some(path) => File::open(path)
                .and_then(|source| Ok((source.metadata()?.len(), source)))
                .map_err(|e| {
                    Error::DownloadError(format!("Failed to read {}: {}", path.display(), e))
                })
                .and_then(|(size, source)| stream_to_file(source, &mut file, Some(size), progress)),
            None => self.get(url).and_then(|response| {
                let total_size = response.content_length();
                stream_to_file(response, &mut file, total_size, progress)
            }),
        };

        let downloaded = match streamed {
            Ok(downloaded) => downloaded,
            Err(e) => {
                drop(file);
                let _ = fs::remove_file(&temp_path);
                return Err(e);
            }
        };
        drop(file);

        fs::rename(&temp_path, dest_path).map_err(|e| {
            Error::IoError(format!(
                "Failed to move {} to {}: {e}",
                temp_path.display(),
                dest_path.display()
            ))
        })?;

        debug!("Downloaded {} bytes to {}", downloaded, dest_path.display());
        Ok(downloaded)
    }
}
