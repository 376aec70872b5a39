// src/repository/metadata.rs

//! Repository index parsing
//!
//! Parses a Debian/Termux `Packages` document into [`PackageRecord`]s. The
//! document is a stream of `Field: value` lines. A record ends at a blank
//! line, at the next `Package:` line, or at the end of the stream, so both
//! the classic blank-line separated layout and a flat `Package:`-prefixed
//! stream are accepted.

use crate::dependencies::parse_provides;
use crate::error::{Error, Result};
use std::collections::btree_map::{self, BTreeMap};
use std::collections::BTreeSet;
use std::io::BufRead;
use tracing::{debug, warn};

/// One package entry from the repository index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRecord {
    pub name: String,
    pub version: String,
    /// Repository-relative path of the `.deb` archive
    pub filename: String,
    pub depends: Option<String>,
    /// Virtual names from the `Provides` field, parsed once when the record
    /// is built (versions ignored)
    pub provides: BTreeSet<String>,
    pub sha256: Option<String>,
    pub size: Option<u64>,
}

impl PackageRecord {
    /// Check whether this package provides `name`
    pub fn provides_name(&self, name: &str) -> bool {
        self.provides.contains(name)
    }
}

/// Fields collected for the record currently being parsed
#[derive(Debug, Default)]
struct PendingRecord {
    name: Option<String>,
    version: Option<String>,
    filename: Option<String>,
    depends: Option<String>,
    pre_depends: Option<String>,
    provides: Option<String>,
    sha256: Option<String>,
    size: Option<u64>,
}

impl PendingRecord {
    fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.version.is_none()
            && self.filename.is_none()
            && self.depends.is_none()
            && self.pre_depends.is_none()
            && self.provides.is_none()
            && self.sha256.is_none()
            && self.size.is_none()
    }

    /// Finish the record; `None` when the mandatory `Package` field is missing
    fn finish(self) -> Option<PackageRecord> {
        let name = self.name.filter(|n| !n.is_empty())?;

        // Pre-Depends must be satisfied before unpacking; for a plain
        // extraction install it is just another dependency.
        let depends = match (self.pre_depends, self.depends) {
            (Some(pre), Some(dep)) => Some(format!("{}, {}", pre, dep)),
            (pre, dep) => pre.or(dep),
        };

        Some(PackageRecord {
            name,
            version: self.version.unwrap_or_default(),
            filename: self.filename.unwrap_or_default(),
            depends,
            provides: parse_provides(self.provides.as_deref()),
            sha256: self.sha256,
            size: self.size,
        })
    }
}

/// Snapshot of a repository index, keyed by package name
#[derive(Debug, Clone, Default)]
pub struct PackageIndex {
    packages: BTreeMap<String, PackageRecord>,
}

impl PackageIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an index held in memory
    pub fn parse_str(content: &str) -> Self {
        let mut parser = IndexParser::new();
        for line in content.lines() {
            parser.feed_line(line);
        }
        parser.finish()
    }

    /// Insert a record, replacing any earlier record with the same name
    pub fn insert(&mut self, record: PackageRecord) {
        if let Some(previous) = self.packages.insert(record.name.clone(), record) {
            debug!(
                "Duplicate index entry for {}, keeping the later one (was {})",
                previous.name, previous.version
            );
        }
    }

    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.packages.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Iterate records in package-name order
    pub fn iter(&self) -> btree_map::Values<'_, String, PackageRecord> {
        self.packages.values()
    }

    /// First package (in name order) whose `Provides` lists `name`
    pub fn find_provider(&self, name: &str) -> Option<&PackageRecord> {
        self.packages.values().find(|p| p.provides_name(name))
    }
}

/// Line-oriented index parser
///
/// Records are committed to the index when the next record starts or the
/// stream ends. A record without a `Package` field is dropped.
#[derive(Debug, Default)]
struct IndexParser {
    index: PackageIndex,
    pending: PendingRecord,
    dropped: usize,
}

impl IndexParser {
    fn new() -> Self {
        Self::default()
    }

    fn commit(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        if pending.is_empty() {
            return;
        }
        match pending.finish() {
            Some(record) => self.index.insert(record),
            None => self.dropped += 1,
        }
    }

    fn feed_line(&mut self, line: &str) {
        let line = line.trim_end_matches('\r');

        if line.trim().is_empty() {
            self.commit();
            return;
        }

        // Continuation lines (multi-line Description etc.) carry nothing we use
        if line.starts_with(' ') || line.starts_with('\t') {
            return;
        }

        let Some((field, value)) = line.split_once(':') else {
            debug!("Ignoring index line without a field name: {:?}", line);
            return;
        };
        let value = value.trim().to_string();

        match field.trim().to_ascii_lowercase().as_str() {
            "package" => {
                self.commit();
                self.pending.name = Some(value);
            }
            "version" => self.pending.version = Some(value),
            "filename" => self.pending.filename = Some(value),
            "depends" => self.pending.depends = Some(value),
            "pre-depends" => self.pending.pre_depends = Some(value),
            "provides" => self.pending.provides = Some(value),
            "sha256" => self.pending.sha256 = Some(value.to_ascii_lowercase()),
            "size" => self.pending.size = value.parse().ok(),
            _ => {}
        }
    }

    fn finish(mut self) -> PackageIndex {
        self.commit();
        if self.dropped > 0 {
            warn!("Dropped {} index records without a Package field", self.dropped);
        }
        debug!("Parsed {} packages from index", self.index.len());
        self.index
    }
}

/// Parse an index document from a line stream
///
/// Only read failures are errors; malformed content is skipped.
pub fn parse_index<R: BufRead>(reader: R) -> Result<PackageIndex> {
    let mut parser = IndexParser::new();
    for line in reader.lines() {
        let line =
            line.map_err(|e| Error::ParseError(format!("Failed to read package index: {}", e)))?;
        parser.feed_line(&line);
    }
    Ok(parser.finish())
}
