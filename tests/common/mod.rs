// tests/common/mod.rs

//! Shared test utilities for integration tests.
//!
//! Builds real `.deb` archives and a `file://` repository around them so the
//! whole pipeline (index fetch, resolution, download, extraction) runs
//! without network access.

#![allow(dead_code)]

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use termroot::repository::file_sha256;
use termroot::Config;

pub const TERMUX_ROOT: &str = "./data/data/com.termux/files/usr/";

/// One payload entry, path given relative to the payload root
#[derive(Debug, Clone)]
pub enum Entry {
    Dir(String),
    File(String, Vec<u8>, u32),
    Symlink(String, String),
}

impl Entry {
    pub fn dir(path: &str) -> Self {
        Entry::Dir(path.to_string())
    }

    pub fn file(path: &str, content: &[u8]) -> Self {
        Entry::File(path.to_string(), content.to_vec(), 0o644)
    }

    pub fn exe(path: &str, content: &[u8]) -> Self {
        Entry::File(path.to_string(), content.to_vec(), 0o755)
    }

    pub fn symlink(path: &str, target: &str) -> Self {
        Entry::Symlink(path.to_string(), target.to_string())
    }
}

/// Payload compression of a fixture archive
#[derive(Debug, Clone, Copy)]
pub enum Payload {
    Xz,
    Gz,
    Zst,
}

impl Payload {
    fn member_name(self) -> &'static str {
        match self {
            Payload::Xz => "data.tar.xz",
            Payload::Gz => "data.tar.gz",
            Payload::Zst => "data.tar.zst",
        }
    }

    fn compress(self, data: &[u8]) -> Vec<u8> {
        match self {
            Payload::Xz => {
                let mut encoder = xz2::write::XzEncoder::new(Vec::new(), 6);
                encoder.write_all(data).unwrap();
                encoder.finish().unwrap()
            }
            Payload::Gz => {
                let mut encoder =
                    flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
                encoder.write_all(data).unwrap();
                encoder.finish().unwrap()
            }
            Payload::Zst => zstd::encode_all(data, 3).unwrap(),
        }
    }
}

fn tar_header(path: &str, kind: tar::EntryType, size: u64, mode: u32) -> tar::Header {
    let mut header = tar::Header::new_old();
    header.set_entry_type(kind);
    header.set_size(size);
    header.set_mode(mode);
    header.set_mtime(0);
    header.as_old_mut().name[..path.len()].copy_from_slice(path.as_bytes());
    header
}

/// Build a tar stream whose entry names are `root` + relative path, verbatim
pub fn tar_bytes(root: &str, entries: &[Entry]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());

    let mut top = tar_header("./", tar::EntryType::Directory, 0, 0o755);
    top.set_cksum();
    builder.append(&top, io::empty()).unwrap();

    for entry in entries {
        match entry {
            Entry::Dir(path) => {
                let name = format!("{}{}/", root, path.trim_end_matches('/'));
                let mut h = tar_header(&name, tar::EntryType::Directory, 0, 0o755);
                h.set_cksum();
                builder.append(&h, io::empty()).unwrap();
            }
            Entry::File(path, content, mode) => {
                let name = format!("{}{}", root, path);
                let mut h = tar_header(&name, tar::EntryType::Regular, content.len() as u64, *mode);
                h.set_cksum();
                builder.append(&h, content.as_slice()).unwrap();
            }
            Entry::Symlink(path, target) => {
                let name = format!("{}{}", root, path);
                let mut h = tar_header(&name, tar::EntryType::Symlink, 0, 0o777);
                h.set_link_name(target).unwrap();
                h.set_cksum();
                builder.append(&h, io::empty()).unwrap();
            }
        }
    }
    builder.into_inner().unwrap()
}

fn ar_member(builder: &mut ar::Builder<Vec<u8>>, name: &str, data: &[u8]) {
    let header = ar::Header::new(name.as_bytes().to_vec(), data.len() as u64);
    builder.append(&header, data).unwrap();
}

/// Build `.deb` bytes: `debian-binary`, `control.tar.xz`, then the payload
pub fn deb_bytes(root: &str, entries: &[Entry], payload: Payload) -> Vec<u8> {
    let control = tar_bytes("./", &[Entry::file("control", b"Package: fixture\n")]);
    let data = tar_bytes(root, entries);

    let mut builder = ar::Builder::new(Vec::new());
    ar_member(&mut builder, "debian-binary", b"2.0\n");
    ar_member(&mut builder, "control.tar.xz", &Payload::Xz.compress(&control));
    ar_member(&mut builder, payload.member_name(), &payload.compress(&data));
    builder.into_inner().unwrap()
}

/// Build `.deb` bytes with no `data.tar*` member at all
pub fn deb_without_payload() -> Vec<u8> {
    let control = tar_bytes("./", &[Entry::file("control", b"Package: broken\n")]);
    let mut builder = ar::Builder::new(Vec::new());
    ar_member(&mut builder, "debian-binary", b"2.0\n");
    ar_member(&mut builder, "control.tar.xz", &Payload::Xz.compress(&control));
    builder.into_inner().unwrap()
}

/// A package to publish in a [`TestRepo`]
#[derive(Debug, Clone)]
pub struct TestPackage {
    pub name: String,
    pub version: String,
    pub depends: Option<String>,
    pub provides: Option<String>,
    pub entries: Vec<Entry>,
    pub payload: Payload,
}

impl TestPackage {
    pub fn new(name: &str, version: &str) -> Self {
        Self {
            name: name.to_string(),
            version: version.to_string(),
            depends: None,
            provides: None,
            entries: Vec::new(),
            payload: Payload::Xz,
        }
    }

    pub fn depends(mut self, depends: &str) -> Self {
        self.depends = Some(depends.to_string());
        self
    }

    pub fn provides(mut self, provides: &str) -> Self {
        self.provides = Some(provides.to_string());
        self
    }

    pub fn entry(mut self, entry: Entry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn filename(&self) -> String {
        let first = self.name.chars().next().unwrap_or('_');
        format!(
            "pool/main/{}/{}/{}_{}_aarch64.deb",
            first, self.name, self.name, self.version
        )
    }
}

/// A `file://` repository plus destination and cache directories
pub struct TestRepo {
    pub dir: TempDir,
    stanzas: Vec<String>,
}

impl TestRepo {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            stanzas: Vec::new(),
        }
    }

    pub fn repo_root(&self) -> PathBuf {
        self.dir.path().join("repo")
    }

    pub fn destination(&self) -> PathBuf {
        self.dir.path().join("root")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.dir.path().join("cache")
    }

    /// Write the package archive and queue its index stanza
    pub fn publish(&mut self, package: &TestPackage) {
        let bytes = deb_bytes(TERMUX_ROOT, &package.entries, package.payload);
        self.publish_raw(package, &bytes, None);
    }

    /// Publish arbitrary archive bytes, optionally with a wrong checksum
    pub fn publish_raw(&mut self, package: &TestPackage, bytes: &[u8], sha256: Option<&str>) {
        let filename = package.filename();
        let path = self.repo_root().join(&filename);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, bytes).unwrap();

        let sha256 = sha256
            .map(str::to_string)
            .unwrap_or_else(|| file_sha256(&path).unwrap());

        let mut stanza = format!("Package: {}\nArchitecture: aarch64\n", package.name);
        stanza.push_str(&format!("Version: {}\n", package.version));
        if let Some(depends) = &package.depends {
            stanza.push_str(&format!("Depends: {}\n", depends));
        }
        if let Some(provides) = &package.provides {
            stanza.push_str(&format!("Provides: {}\n", provides));
        }
        stanza.push_str(&format!("Filename: {}\n", filename));
        stanza.push_str(&format!("Size: {}\n", bytes.len()));
        stanza.push_str(&format!("SHA256: {}\n", sha256));
        stanza.push_str("Description: test fixture\n");
        self.stanzas.push(stanza);
    }

    /// Add an index stanza without any archive behind it
    pub fn publish_index_only(&mut self, stanza: &str) {
        self.stanzas.push(stanza.to_string());
    }

    /// Write `dists/stable/main/binary-aarch64/Packages`
    pub fn write_index(&self) {
        let path = self.repo_root().join("dists/stable/main/binary-aarch64/Packages");
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, self.stanzas.join("\n")).unwrap();
    }

    /// Configuration pointing at this repository
    pub fn config(&self) -> Config {
        let mut config = Config::new();
        config.repository.url = format!("file://{}/", self.repo_root().display());
        config.install.destination = self.destination();
        config.install.cache_dir = self.cache_dir();
        config
    }
}

/// Read a symlink target as a string
pub fn link_target(path: &Path) -> String {
    fs::read_link(path).unwrap().to_string_lossy().to_string()
}
