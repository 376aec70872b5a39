// src/filesystem/path.rs

//! Path handling for untrusted archive and repository paths
//!
//! Tar entries and repository `Filename` fields come from the network. These
//! helpers keep every write inside the destination root and every download
//! inside the cache directory.

use crate::error::{Error, Result};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

/// Sanitize a path from an untrusted source
///
/// Leading slashes and `.` components are dropped; any `..` component is a
/// traversal attempt and is rejected, as is a path that ends up empty.
///
/// ```
/// use termroot::filesystem::path::sanitize_path;
/// use std::path::PathBuf;
///
/// assert_eq!(sanitize_path("./bin/sh").unwrap(), PathBuf::from("bin/sh"));
/// assert!(sanitize_path("lib/../../etc/passwd").is_err());
/// ```
pub fn sanitize_path(path: impl AsRef<Path>) -> Result<PathBuf> {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();
    let relative = path_str.trim_start_matches('/');

    let mut normalized = PathBuf::new();
    for component in Path::new(relative).components() {
        match component {
            Component::Normal(c) => normalized.push(c),
            Component::CurDir | Component::Prefix(_) | Component::RootDir => {}
            Component::ParentDir => return Err(Error::PathTraversal(path_str.to_string())),
        }
    }

    if normalized.as_os_str().is_empty() {
        return Err(Error::InvalidPath(format!(
            "Empty path after sanitization: {:?}",
            path_str
        )));
    }

    Ok(normalized)
}

/// Join an untrusted relative path onto `root`
///
/// When both paths already exist, the canonical result must still lie under
/// the canonical root; this catches a parent directory that is itself a
/// symlink pointing outside the root.
pub fn safe_join(root: impl AsRef<Path>, path: impl AsRef<Path>) -> Result<PathBuf> {
    let root = root.as_ref();
    let joined = root.join(sanitize_path(path)?);

    if let Some(parent) = joined.parent()
        && let (Ok(canonical_root), Ok(canonical_parent)) =
            (root.canonicalize(), parent.canonicalize())
        && !canonical_parent.starts_with(&canonical_root)
    {
        return Err(Error::PathTraversal(format!(
            "Path {} escapes root {}",
            joined.display(),
            root.display()
        )));
    }

    Ok(joined)
}

/// Flatten a repository `Filename` into a single cache file name
///
/// `pool/main/z/zlib/zlib_1.3_aarch64.deb` becomes
/// `pool_main_z_zlib_zlib_1.3_aarch64.deb`.
pub fn cache_file_name(repo_path: &str) -> Result<String> {
    let name = sanitize_path(repo_path)?
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("_");

    if name.contains('\\') {
        return Err(Error::InvalidPath(format!(
            "Filename contains a path separator: {}",
            repo_path
        )));
    }

    Ok(name)
}

/// Remove whatever exists at `path` without following symlinks
///
/// A symlink is unlinked (its target is untouched), a directory is removed
/// recursively, anything else is unlinked. A missing path is not an error.
pub fn remove_existing(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
