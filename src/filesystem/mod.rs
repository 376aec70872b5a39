// src/filesystem/mod.rs

//! Filesystem helpers shared by extraction and downloads

pub mod path;

pub use path::{cache_file_name, remove_existing, safe_join, sanitize_path};
