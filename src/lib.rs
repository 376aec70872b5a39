// src/lib.rs

//! Termroot
//!
//! Resolves Termux/Debian-style binary packages against a remote `Packages`
//! index and installs them into a self-contained root directory.
//!
//! # Architecture
//!
//! - Index: `Packages` stanzas parsed into an in-memory [`PackageIndex`]
//! - Resolver: fixpoint over `Depends` with alternatives, versions and provides
//! - Extraction: `data.tar*` payload of each `.deb`, files first, symlinks second
//! - State: installed name/version pairs kept in SQLite next to the root

pub mod compression;
pub mod config;
pub mod db;
pub mod dependencies;
mod error;
pub mod filesystem;
pub mod installer;
pub mod packages;
pub mod progress;
pub mod repository;
pub mod resolver;
pub mod version;

pub use config::Config;
pub use dependencies::{parse_depends, AlternativeGroup, DependencyAtom, DependencyExpr};
pub use error::{Error, Result};
pub use installer::{InstallReport, Installer};
pub use progress::{
    CallbackProgress, ChannelProgress, CliProgress, LogProgress, ProgressEvent, SilentProgress,
    StatusSink,
};
pub use repository::{Fetcher, PackageIndex, PackageRecord, RepositoryClient};
pub use resolver::{Resolution, ResolutionReport, ResolutionWarning, Resolver};
pub use version::{compare_versions, DebVersion};
