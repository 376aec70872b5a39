// src/installer/mod.rs

//! Installation runs
//!
//! An installation run fetches the index, resolves the requested packages,
//! downloads every selected archive that is not already installed at the
//! resolved version, and extracts the batch in two passes (all files, then
//! all symlinks). Exactly one terminal message is pushed to the status sink
//! per run: the final report, or `error: <cause>`.
//!
//! Runs are not reentrant. While one is in progress any other run request
//! on the same [`Installer`] fails with [`Error::InstallInProgress`].

use crate::config::Config;
use crate::db::InstallState;
use crate::error::{Error, Result};
use crate::filesystem::path::{cache_file_name, remove_existing};
use crate::packages::deb::{
    extract_files, extract_symlinks, ExtractOptions, ExtractStats, PathFilter, RootPrefix,
};
use crate::progress::StatusSink;
use crate::repository::{download_archive, ArchiveRequest, Fetcher, PackageRecord};
use crate::resolver::{Resolution, Resolver};
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, info, warn};

/// Headline of a successful package installation
pub const COMPLETE_MESSAGE: &str = "Package setup complete!";

/// Headline of a successful single-archive installation
pub const FIRMWARE_COMPLETE_MESSAGE: &str = "Firmware setup complete.";

/// Outcome of a successful run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstallReport {
    /// Packages downloaded and extracted by this run
    pub installed: Vec<String>,
    /// Selected packages already installed at the resolved version
    pub skipped: Vec<String>,
    /// Non-fatal problems, one rendered line each
    pub warnings: Vec<String>,
}

impl InstallReport {
    fn headline(headline: &str, warnings: &[String]) -> String {
        let mut message = headline.to_string();
        if !warnings.is_empty() {
            message.push_str("\n\nWarnings:\n");
            for warning in warnings {
                message.push_str(warning);
                message.push('\n');
            }
        }
        message
    }

    /// Completion message followed by a `Warnings:` block when there are any
    pub fn final_message(&self) -> String {
        Self::headline(COMPLETE_MESSAGE, &self.warnings)
    }
}

/// Holds the "install running" flag for the lifetime of a run
struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl RunGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| Error::InstallInProgress)?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}

/// Orchestrates installation runs against one repository and destination
pub struct Installer {
    config: Config,
    fetcher: Arc<dyn Fetcher>,
    state: Arc<dyn InstallState>,
    status: Arc<dyn StatusSink>,
    running: Arc<AtomicBool>,
}

impl Installer {
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        state: Arc<dyn InstallState>,
        status: Arc<dyn StatusSink>,
    ) -> Self {
        Self {
            config,
            fetcher,
            state,
            status,
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Whether a run currently holds the installer
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Fetch the index and resolve `names` without installing anything
    pub fn resolve<S: AsRef<str>>(&self, names: &[S]) -> Result<Resolution> {
        let index_url = self.config.repository.index_url();
        self.status.status("Downloading package index...");
        let index = self.fetcher.fetch_index(&index_url)?;
        info!("Loaded {} packages from {}", index.len(), index_url);

        self.status.status("Resolving dependencies...");
        Resolver::new(&index).resolve(names)
    }

    /// Install `names` and everything they depend on
    pub fn install_packages<S: AsRef<str>>(&self, names: &[S]) -> Result<InstallReport> {
        let _guard = RunGuard::acquire(&self.running)?;
        self.install_locked(names)
    }

    /// Run [`Installer::install_packages`] on a dedicated background thread
    ///
    /// A run already in progress is detected before the thread is started.
    pub fn spawn_install(
        self: Arc<Self>,
        names: Vec<String>,
    ) -> Result<JoinHandle<Result<InstallReport>>> {
        let guard = RunGuard::acquire(&self.running)?;
        thread::Builder::new()
            .name("termroot-install".to_string())
            .spawn(move || {
                let _guard = guard;
                self.install_locked(&names)
            })
            .map_err(|e| Error::InitError(format!("Failed to start install thread: {}", e)))
    }

    fn install_locked<S: AsRef<str>>(&self, names: &[S]) -> Result<InstallReport> {
        let result = self.run_install(names);
        match &result {
            Ok(report) => self.status.finished(&report.final_message()),
            Err(e) => self.status.failed(&format!("error: {}", e)),
        }
        result
    }

    fn run_install<S: AsRef<str>>(&self, names: &[S]) -> Result<InstallReport> {
        let resolution = self.resolve(names)?;
        self.status
            .status("Verifying dependencies and checking for conflicts...");
        let mut report = InstallReport {
            warnings: resolution.report.messages(),
            ..Default::default()
        };
        for warning in &report.warnings {
            warn!("{}", warning);
        }

        let mut pending: Vec<&PackageRecord> = Vec::new();
        for record in resolution.selected.values() {
            if self.state.is_current(&record.name, &record.version)? {
                debug!("{} {} is already installed", record.name, record.version);
                report.skipped.push(record.name.clone());
            } else {
                pending.push(record);
            }
        }
        info!(
            "{} packages to install, {} up to date",
            pending.len(),
            report.skipped.len()
        );

        let archives = self.download_all(&pending)?;

        if !archives.is_empty() {
            let stats = self.extract_all(&archives)?;
            if stats.symlink_failures > 0 {
                report.warnings.push(format!(
                    "Warning: {} symbolic links could not be created",
                    stats.symlink_failures
                ));
            }
        }

        for record in &pending {
            self.state.record_installed(&record.name, &record.version)?;
            report.installed.push(record.name.clone());
        }

        for archive in &archives {
            if let Err(e) = fs::remove_file(archive) {
                warn!("Failed to remove {}: {}", archive.display(), e);
            }
        }

        Ok(report)
    }

    /// Download the archives of `records` into the cache, in order
    fn download_all(&self, records: &[&PackageRecord]) -> Result<Vec<PathBuf>> {
        let cache_dir = &self.config.install.cache_dir;
        let mut archives = Vec::with_capacity(records.len());

        for record in records {
            if record.filename.is_empty() {
                return Err(Error::NotFoundError(format!(
                    "Package {} has no Filename in the index",
                    record.name
                )));
            }

            self.status.status(&format!("Downloading {}...", record.name));
            let request = ArchiveRequest {
                url: self.config.repository.package_url(&record.filename),
                repo_path: &record.filename,
                sha256: record.sha256.as_deref(),
            };
            let status = &self.status;
            let path = download_archive(
                self.fetcher.as_ref(),
                &request,
                cache_dir,
                &mut |current, total| {
                    status.download_progress(&record.name, current, total.or(record.size))
                },
            )?;
            archives.push(path);
        }

        Ok(archives)
    }

    /// Files pass over every archive, then symlinks pass over every archive
    fn extract_all(&self, archives: &[PathBuf]) -> Result<ExtractStats> {
        let options = self.config.extract_options();
        fs::create_dir_all(&options.destination).map_err(|e| {
            Error::IoError(format!(
                "Failed to create destination {}: {}",
                options.destination.display(),
                e
            ))
        })?;

        let mut stats = ExtractStats::default();

        self.status.status("Unpacking files...");
        for archive in archives {
            stats.merge(&extract_files(archive, &options)?);
        }

        self.status.status("Creating symbolic links...");
        for archive in archives {
            stats.merge(&extract_symlinks(archive, &options)?);
        }

        info!(
            "Extracted {} files, {} directories, {} symlinks into {}",
            stats.files,
            stats.directories,
            stats.symlinks,
            options.destination.display()
        );
        Ok(stats)
    }

    /// Download one `.deb` and extract exactly `files` from it
    ///
    /// Payload paths are matched after stripping a leading `./`; each
    /// extracted file is written directly into the destination under its
    /// file name. Requested paths missing from the payload become warnings.
    pub fn install_deb_from_url(&self, url: &str, files: &BTreeSet<String>) -> Result<InstallReport> {
        let _guard = RunGuard::acquire(&self.running)?;

        let result = self.run_deb_install(url, files);
        match &result {
            Ok(report) => self
                .status
                .finished(&InstallReport::headline(FIRMWARE_COMPLETE_MESSAGE, &report.warnings)),
            Err(e) => self.status.failed(&format!("error: {}", e)),
        }
        result
    }

    fn run_deb_install(&self, url: &str, files: &BTreeSet<String>) -> Result<InstallReport> {
        let file_name = url
            .rsplit('/')
            .next()
            .filter(|name| !name.is_empty())
            .ok_or_else(|| Error::InvalidPath(format!("URL has no file name: {}", url)))?;
        let archive = self
            .config
            .install
            .cache_dir
            .join(cache_file_name(file_name)?);

        self.status.status(&format!("Downloading firmware from {}", url));
        let status = &self.status;
        self.fetcher
            .fetch_to_file(url, &archive, &mut |current, total| {
                status.download_progress(file_name, current, total)
            })?;

        self.status.status("Unpacking firmware...");
        let destination = &self.config.install.destination;
        fs::create_dir_all(destination).map_err(|e| {
            Error::IoError(format!(
                "Failed to create destination {}: {}",
                destination.display(),
                e
            ))
        })?;
        let options = ExtractOptions::new(destination, RootPrefix::DotSlash)
            .with_filter(PathFilter::Exact(files.clone()))
            .flattened();

        let extracted = extract_files(&archive, &options);
        if let Err(e) = remove_existing(&archive) {
            warn!("Failed to remove {}: {}", archive.display(), e);
        }
        let stats = extracted?;
        debug!("Extracted {} of {} requested files", stats.files, files.len());

        let warnings = stats
            .missing
            .iter()
            .map(|path| format!("Warning: {} not found in archive", path))
            .collect();
        Ok(InstallReport {
            installed: vec![file_name.to_string()],
            warnings,
            ..Default::default()
        })
    }
}
