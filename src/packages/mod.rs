// src/packages/mod.rs

//! Package archive handling
//!
//! Only the Debian `.deb` format is supported; see [`deb`].

pub mod deb;

pub use deb::{
    extract, extract_files, extract_symlinks, ExtractMode, ExtractOptions,
    ExtractStats, PathFilter, RootPrefix, TERMUX_PREFIX,
};
