// src/packages/deb.rs

//! Debian package payload extraction
//!
//! A `.deb` is an `ar` archive whose `data.tar[.xz|.gz|.zst]` member holds
//! the installed tree. Extraction streams that member straight from disk
//! through the decompressor into the tar reader and materializes entries
//! under a destination root.
//!
//! Extraction is split into two passes that callers run over a whole batch
//! of packages: [`extract_files`] creates directories and regular files,
//! then [`extract_symlinks`] creates symbolic links. Links whose target is a
//! file shipped by another package in the batch therefore never depend on
//! package order.

use crate::compression::{create_decoder, CompressionFormat};
use crate::error::{Error, Result};
use crate::filesystem::path::{remove_existing, safe_join};
use std::collections::BTreeSet;
use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Install prefix baked into Termux package payloads
pub const TERMUX_PREFIX: &str = "./data/data/com.termux/files/usr/";

/// Which entry kinds a pass materializes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtractMode {
    /// Directories and regular files
    FilesOnly,
    /// Symbolic links only
    SymlinksOnly,
}

/// Root path convention of the repository flavor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RootPrefix {
    /// Entries must live under this prefix; it is stripped, others are skipped
    Absolute(String),
    /// A leading `./` is stripped if present
    DotSlash,
}

impl RootPrefix {
    pub fn termux() -> Self {
        RootPrefix::Absolute(TERMUX_PREFIX.to_string())
    }

    /// Path of an archive entry relative to the destination root
    ///
    /// `None` when the entry lies outside the prefix or is the root itself.
    pub fn relative_path<'p>(&self, entry_path: &'p str) -> Option<&'p str> {
        let relative = match self {
            RootPrefix::Absolute(prefix) => {
                let prefix = strip_leading(prefix).trim_end_matches('/');
                let entry = strip_leading(entry_path);
                if prefix.is_empty() {
                    entry
                } else {
                    entry.strip_prefix(prefix)?.strip_prefix('/')?
                }
            }
            RootPrefix::DotSlash => entry_path.strip_prefix("./").unwrap_or(entry_path),
        };

        let relative = relative.trim_end_matches('/');
        (!relative.is_empty()).then_some(relative)
    }
}

fn strip_leading(path: &str) -> &str {
    path.strip_prefix("./").unwrap_or(path).trim_start_matches('/')
}

/// Restricts which relative paths are materialized
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathFilter {
    All,
    /// Paths under any of these prefixes (e.g. `bin/`, `lib/`)
    Prefixes(Vec<String>),
    /// Exactly these paths; extraction stops once all were written
    Exact(BTreeSet<String>),
}

impl PathFilter {
    pub fn allows(&self, relative: &str) -> bool {
        match self {
            PathFilter::All => true,
            PathFilter::Prefixes(prefixes) => prefixes.iter().any(|prefix| {
                relative.starts_with(prefix.as_str())
                    || prefix.trim_end_matches('/') == relative
            }),
            PathFilter::Exact(paths) => paths.contains(relative),
        }
    }
}

/// Where and what to extract
#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub destination: PathBuf,
    pub root_prefix: RootPrefix,
    pub filter: PathFilter,
    /// Write every entry directly into `destination` under its file name
    pub flatten: bool,
}

impl ExtractOptions {
    pub fn new(destination: impl Into<PathBuf>, root_prefix: RootPrefix) -> Self {
        Self {
            destination: destination.into(),
            root_prefix,
            filter: PathFilter::All,
            flatten: false,
        }
    }

    pub fn with_filter(mut self, filter: PathFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn flattened(mut self) -> Self {
        self.flatten = true;
        self
    }

    fn target_path(&self, relative: &str) -> Result<PathBuf> {
        if self.flatten {
            let name = Path::new(relative)
                .file_name()
                .ok_or_else(|| Error::InvalidPath(format!("No file name in {}", relative)))?;
            safe_join(&self.destination, name)
        } else {
            safe_join(&self.destination, relative)
        }
    }
}

/// Counters for one extraction pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractStats {
    pub files: usize,
    pub directories: usize,
    pub symlinks: usize,
    /// Entries outside the prefix or filter, unsafe, or of unsupported kind
    pub skipped: usize,
    pub symlink_failures: usize,
    /// `PathFilter::Exact` paths no payload entry matched in a files pass
    pub missing: Vec<String>,
}

impl ExtractStats {
    pub fn merge(&mut self, other: &ExtractStats) {
        self.files += other.files;
        self.directories += other.directories;
        self.symlinks += other.symlinks;
        self.skipped += other.skipped;
        self.symlink_failures += other.symlink_failures;
        self.missing.extend(other.missing.iter().cloned());
    }
}

/// First pass: directories and regular files
pub fn extract_files(archive_path: &Path, options: &ExtractOptions) -> Result<ExtractStats> {
    extract(archive_path, ExtractMode::FilesOnly, options)
}

/// Second pass: symbolic links
pub fn extract_symlinks(archive_path: &Path, options: &ExtractOptions) -> Result<ExtractStats> {
    extract(archive_path, ExtractMode::SymlinksOnly, options)
}

fn is_payload_member(name: &str) -> bool {
    name.trim_end_matches('/').starts_with("data.tar")
}

/// Extract one pass of a `.deb` archive
///
/// Only the first `data.tar*` member is read; container members after it are
/// never scanned.
pub fn extract(
    archive_path: &Path,
    mode: ExtractMode,
    options: &ExtractOptions,
) -> Result<ExtractStats> {
    let file = File::open(archive_path).map_err(|e| {
        Error::IoError(format!(
            "Failed to open package {}: {}",
            archive_path.display(),
            e
        ))
    })?;
    let mut archive = ar::Archive::new(BufReader::new(file));

    while let Some(member) = archive.next_entry() {
        let member = member.map_err(|e| {
            Error::ParseError(format!(
                "Failed to read archive member in {}: {}",
                archive_path.display(),
                e
            ))
        })?;
        let name = String::from_utf8_lossy(member.header().identifier()).to_string();
        if !is_payload_member(&name) {
            continue;
        }

        let format = CompressionFormat::from_payload_member(&name).ok_or_else(|| {
            Error::ParseError(format!(
                "Unsupported payload compression in {}: {}",
                archive_path.display(),
                name
            ))
        })?;
        debug!(
            "{:?} pass over {} ({}, {})",
            mode,
            archive_path.display(),
            name,
            format
        );

        let decoder = create_decoder(member, format)?;
        return extract_payload(decoder, mode, options).map_err(|e| match e {
            Error::IoError(msg) => {
                Error::IoError(format!("{}: {}", archive_path.display(), msg))
            }
            other => other,
        });
    }

    Err(Error::PayloadNotFound(archive_path.display().to_string()))
}

/// Walk a decompressed tar stream
fn extract_payload<R: Read>(
    reader: R,
    mode: ExtractMode,
    options: &ExtractOptions,
) -> Result<ExtractStats> {
    let mut tar = tar::Archive::new(reader);
    let mut stats = ExtractStats::default();

    let mut remaining: Option<BTreeSet<&str>> = match &options.filter {
        PathFilter::Exact(paths) => Some(paths.iter().map(String::as_str).collect()),
        _ => None,
    };

    let entries = tar
        .entries()
        .map_err(|e| Error::ParseError(format!("Failed to read payload: {}", e)))?;

    for entry in entries {
        let mut entry =
            entry.map_err(|e| Error::ParseError(format!("Failed to read payload entry: {}", e)))?;
        let raw_path = entry
            .path()
            .map_err(|e| Error::ParseError(format!("Invalid payload entry path: {}", e)))?
            .to_string_lossy()
            .into_owned();
        let kind = entry.header().entry_type();

        let Some(relative) = options.root_prefix.relative_path(&raw_path) else {
            stats.skipped += 1;
            continue;
        };
        if !options.filter.allows(relative) {
            stats.skipped += 1;
            continue;
        }

        let target = match options.target_path(relative) {
            Ok(target) => target,
            Err(e) => {
                warn!("Skipping unsafe archive entry {}: {}", raw_path, e);
                stats.skipped += 1;
                continue;
            }
        };

        let written = match mode {
            ExtractMode::FilesOnly if kind.is_dir() => {
                fs::create_dir_all(&target).map_err(|e| {
                    Error::IoError(format!("Failed to create {}: {}", target.display(), e))
                })?;
                stats.directories += 1;
                false
            }
            ExtractMode::FilesOnly if kind.is_file() => {
                write_file(&mut entry, &target)?;
                stats.files += 1;
                true
            }
            ExtractMode::SymlinksOnly if kind.is_symlink() => {
                match entry.link_name() {
                    Ok(Some(link)) => match create_symlink(&link, &target) {
                        Ok(()) => stats.symlinks += 1,
                        Err(e) => {
                            warn!(
                                "Failed to create symlink {} -> {}: {}",
                                target.display(),
                                link.display(),
                                e
                            );
                            stats.symlink_failures += 1;
                        }
                    },
                    Ok(None) | Err(_) => {
                        warn!("Symlink entry {} has no readable target", raw_path);
                        stats.symlink_failures += 1;
                    }
                }
                true
            }
            // Handled by the other pass
            _ if kind.is_dir() || kind.is_file() || kind.is_symlink() => false,
            _ => {
                debug!("Skipping {:?} entry {}", kind, raw_path);
                stats.skipped += 1;
                false
            }
        };

        if written && let Some(remaining) = remaining.as_mut() {
            remaining.remove(relative);
            if remaining.is_empty() {
                debug!("All requested paths extracted, stopping early");
                break;
            }
        }
    }

    if let Some(remaining) = remaining.filter(|r| !r.is_empty())
        && mode == ExtractMode::FilesOnly
    {
        debug!("Requested paths not found in payload: {:?}", remaining);
        stats.missing = remaining.into_iter().map(str::to_string).collect();
    }

    Ok(stats)
}

/// Replace whatever is at `target` with the entry's bytes and permissions
fn write_file<R: Read>(entry: &mut tar::Entry<'_, R>, target: &Path) -> Result<()> {
    let io_err = |e: io::Error| Error::IoError(format!("Failed to write {}: {}", target.display(), e));

    remove_existing(target).map_err(io_err)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut out = File::create(target).map_err(io_err)?;
    io::copy(entry, &mut out).map_err(io_err)?;

    if let Ok(mode) = entry.header().mode() {
        fs::set_permissions(target, fs::Permissions::from_mode(mode & 0o7777)).map_err(io_err)?;
    }

    Ok(())
}

fn create_symlink(link: &Path, target: &Path) -> io::Result<()> {
    remove_existing(target)?;
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    std::os::unix::fs::symlink(link, target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    enum Item<'a> {
        Dir(&'a str),
        File(&'a str, &'a [u8], u32),
        Link(&'a str, &'a str),
        HardLink(&'a str, &'a str),
    }

    /// Build a tar stream with names written verbatim (including `./` and `..`)
    fn tar_bytes(items: &[Item<'_>]) -> Vec<u8> {
        fn header(path: &str, kind: tar::EntryType, size: u64, mode: u32) -> tar::Header {
            let mut header = tar::Header::new_old();
            header.set_entry_type(kind);
            header.set_size(size);
            header.set_mode(mode);
            header.set_mtime(0);
            header.as_old_mut().name[..path.len()].copy_from_slice(path.as_bytes());
            header
        }

        let mut builder = tar::Builder::new(Vec::new());
        for item in items {
            match item {
                Item::Dir(path) => {
                    let mut h = header(path, tar::EntryType::Directory, 0, 0o755);
                    h.set_cksum();
                    builder.append(&h, io::empty()).unwrap();
                }
                Item::File(path, data, mode) => {
                    let mut h = header(path, tar::EntryType::Regular, data.len() as u64, *mode);
                    h.set_cksum();
                    builder.append(&h, *data).unwrap();
                }
                Item::Link(path, link) | Item::HardLink(path, link) => {
                    let kind = if matches!(item, Item::Link(..)) {
                        tar::EntryType::Symlink
                    } else {
                        tar::EntryType::Link
                    };
                    let mut h = header(path, kind, 0, 0o777);
                    h.set_link_name(link).unwrap();
                    h.set_cksum();
                    builder.append(&h, io::empty()).unwrap();
                }
            }
        }
        builder.into_inner().unwrap()
    }

    fn run(items: &[Item<'_>], mode: ExtractMode, options: &ExtractOptions) -> ExtractStats {
        extract_payload(&tar_bytes(items)[..], mode, options).unwrap()
    }

    #[test]
    fn test_termux_prefix_stripping() {
        let prefix = RootPrefix::termux();
        assert_eq!(
            prefix.relative_path("./data/data/com.termux/files/usr/bin/sh"),
            Some("bin/sh")
        );
        assert_eq!(
            prefix.relative_path("data/data/com.termux/files/usr/lib/"),
            Some("lib")
        );
        assert_eq!(prefix.relative_path("./data/data/com.termux/files/usr/"), None);
        assert_eq!(prefix.relative_path("./data/data/com.termux/files/usrx/a"), None);
        assert_eq!(prefix.relative_path("./etc/passwd"), None);
    }

    #[test]
    fn test_dot_slash_prefix_stripping() {
        let prefix = RootPrefix::DotSlash;
        assert_eq!(
            prefix.relative_path("./usr/share/AAVMF/AAVMF_CODE.fd"),
            Some("usr/share/AAVMF/AAVMF_CODE.fd")
        );
        assert_eq!(prefix.relative_path("usr/bin/x"), Some("usr/bin/x"));
        assert_eq!(prefix.relative_path("./"), None);
    }

    #[test]
    fn test_path_filter() {
        let prefixes = PathFilter::Prefixes(vec!["bin/".to_string(), "lib/".to_string()]);
        assert!(prefixes.allows("bin/sh"));
        assert!(prefixes.allows("lib"));
        assert!(!prefixes.allows("share/doc/x"));
        assert!(!prefixes.allows("binary"));

        let exact = PathFilter::Exact(["a/b".to_string()].into_iter().collect());
        assert!(exact.allows("a/b"));
        assert!(!exact.allows("a"));
        assert!(PathFilter::All.allows("anything"));
    }

    #[test]
    fn test_files_pass_skips_symlinks_and_keeps_modes() {
        let dest = TempDir::new().unwrap();
        let options = ExtractOptions::new(dest.path(), RootPrefix::termux());
        let items = [
            Item::Dir("./data/data/com.termux/files/usr/"),
            Item::Dir("./data/data/com.termux/files/usr/bin/"),
            Item::File("./data/data/com.termux/files/usr/bin/tool", b"#!/bin/sh\n", 0o755),
            Item::Link("./data/data/com.termux/files/usr/bin/alias", "tool"),
            Item::File("./control", b"outside", 0o644),
        ];

        let stats = run(&items, ExtractMode::FilesOnly, &options);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.directories, 1);
        assert_eq!(stats.symlinks, 0);
        // The prefix root and ./control
        assert_eq!(stats.skipped, 2);

        let tool = dest.path().join("bin/tool");
        assert_eq!(fs::read(&tool).unwrap(), b"#!/bin/sh\n");
        assert_eq!(fs::metadata(&tool).unwrap().permissions().mode() & 0o777, 0o755);
        assert!(fs::symlink_metadata(dest.path().join("bin/alias")).is_err());

        let stats = run(&items, ExtractMode::SymlinksOnly, &options);
        assert_eq!(stats.symlinks, 1);
        assert_eq!(stats.files, 0);
        assert_eq!(fs::read_link(dest.path().join("bin/alias")).unwrap(), PathBuf::from("tool"));
    }

    #[test]
    fn test_symlink_replaces_existing_directory() {
        let dest = TempDir::new().unwrap();
        fs::create_dir_all(dest.path().join("lib/old/nested")).unwrap();
        fs::write(dest.path().join("lib/old/nested/file"), b"x").unwrap();

        let options = ExtractOptions::new(dest.path(), RootPrefix::DotSlash);
        let stats = run(&[Item::Link("./lib/old", "new")], ExtractMode::SymlinksOnly, &options);
        assert_eq!(stats.symlinks, 1);
        assert_eq!(fs::read_link(dest.path().join("lib/old")).unwrap(), PathBuf::from("new"));
    }

    #[test]
    fn test_existing_file_replaced() {
        let dest = TempDir::new().unwrap();
        fs::write(dest.path().join("x"), b"old content that is longer").unwrap();
        let options = ExtractOptions::new(dest.path(), RootPrefix::DotSlash);
        run(&[Item::File("./x", b"new", 0o644)], ExtractMode::FilesOnly, &options);
        assert_eq!(fs::read(dest.path().join("x")).unwrap(), b"new");
    }

    #[test]
    fn test_traversal_entry_skipped() {
        let dest = TempDir::new().unwrap();
        let inner = dest.path().join("root");
        fs::create_dir(&inner).unwrap();
        let options = ExtractOptions::new(&inner, RootPrefix::DotSlash);

        let stats = run(
            &[
                Item::File("./../escaped", b"bad", 0o644),
                Item::File("./ok", b"good", 0o644),
            ],
            ExtractMode::FilesOnly,
            &options,
        );
        assert_eq!(stats.files, 1);
        assert_eq!(stats.skipped, 1);
        assert!(!dest.path().join("escaped").exists());
        assert!(inner.join("ok").exists());
    }

    #[test]
    fn test_hard_links_skipped() {
        let dest = TempDir::new().unwrap();
        let options = ExtractOptions::new(dest.path(), RootPrefix::DotSlash);
        let items = [Item::File("./a", b"1", 0o644), Item::HardLink("./b", "./a")];
        let stats = run(&items, ExtractMode::FilesOnly, &options);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.skipped, 1);
        assert!(!dest.path().join("b").exists());
    }

    #[test]
    fn test_exact_filter_flattened_and_stops_early() {
        let dest = TempDir::new().unwrap();
        let wanted: BTreeSet<String> = ["usr/share/AAVMF/AAVMF_CODE.fd".to_string()]
            .into_iter()
            .collect();
        let options = ExtractOptions::new(dest.path(), RootPrefix::DotSlash)
            .with_filter(PathFilter::Exact(wanted))
            .flattened();

        let stats = run(
            &[
                Item::File("./usr/share/AAVMF/AAVMF_VARS.fd", b"vars", 0o644),
                Item::File("./usr/share/AAVMF/AAVMF_CODE.fd", b"code", 0o644),
                Item::File("./usr/share/AAVMF/after", b"never read", 0o644),
            ],
            ExtractMode::FilesOnly,
            &options,
        );
        assert_eq!(stats.files, 1);
        // VARS filtered; "after" never reached
        assert_eq!(stats.skipped, 1);
        assert!(stats.missing.is_empty());
        assert_eq!(fs::read(dest.path().join("AAVMF_CODE.fd")).unwrap(), b"code");
    }

    #[test]
    fn test_exact_filter_reports_unmatched_paths() {
        let dest = TempDir::new().unwrap();
        // Left over from an earlier run; must not count as extracted
        fs::write(dest.path().join("b.bin"), b"stale").unwrap();
        let wanted: BTreeSet<String> = ["fw/a.bin", "fw/b.bin", "fw/c.bin"]
            .into_iter()
            .map(String::from)
            .collect();
        let options = ExtractOptions::new(dest.path(), RootPrefix::DotSlash)
            .with_filter(PathFilter::Exact(wanted))
            .flattened();

        let items = [Item::File("./fw/a.bin", b"a", 0o644), Item::Link("./fw/c.bin", "a.bin")];
        let stats = run(&items, ExtractMode::FilesOnly, &options);
        assert_eq!(stats.files, 1);
        assert_eq!(stats.missing, vec!["fw/b.bin", "fw/c.bin"]);

        let links = run(&items, ExtractMode::SymlinksOnly, &options);
        assert!(links.missing.is_empty());
    }

    #[test]
    fn test_prefix_filter() {
        let dest = TempDir::new().unwrap();
        let options = ExtractOptions::new(dest.path(), RootPrefix::DotSlash)
            .with_filter(PathFilter::Prefixes(vec!["bin/".to_string()]));
        let stats = run(
            &[
                Item::File("./bin/a", b"a", 0o755),
                Item::File("./share/doc/a", b"doc", 0o644),
            ],
            ExtractMode::FilesOnly,
            &options,
        );
        assert_eq!(stats.files, 1);
        assert!(dest.path().join("bin/a").exists());
        assert!(!dest.path().join("share").exists());
    }

    #[test]
    fn test_missing_archive_is_io_error() {
        let dest = TempDir::new().unwrap();
        let options = ExtractOptions::new(dest.path(), RootPrefix::DotSlash);
        let err = extract_files(&dest.path().join("missing.deb"), &options).unwrap_err();
        assert!(matches!(err, Error::IoError(_)));
    }

    #[test]
    fn test_stats_merge() {
        let mut total = ExtractStats::default();
        total.merge(&ExtractStats {
            files: 2,
            symlinks: 1,
            ..Default::default()
        });
        total.merge(&ExtractStats {
            files: 1,
            symlink_failures: 1,
            missing: vec!["fw/b.bin".to_string()],
            ..Default::default()
        });
        assert_eq!(total.files, 3);
        assert_eq!(total.missing, vec!["fw/b.bin"]);
        assert_eq!(total.symlinks, 1);
        assert_eq!(total.symlink_failures, 1);
    }
}
