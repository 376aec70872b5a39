// src/config.rs

//! Configuration file handling
//!
//! ```toml
//! [repository]
//! url = "https://packages.termux.dev/apt/termux-main/"
//! index_path = "dists/stable/main/binary-aarch64/Packages"
//! root_prefix = "./data/data/com.termux/files/usr/"
//!
//! [install]
//! destination = "/data/local/termroot"
//! cache_dir = "/data/local/termroot-cache"
//! packages = ["qemu-system-aarch64-headless", "qemu-utils"]
//! filter = ["bin/", "lib/"]
//! ```
//!
//! Every field has a default, so an empty file is a valid configuration.

use crate::error::{Error, Result};
use crate::packages::deb::{ExtractOptions, PathFilter, RootPrefix, TERMUX_PREFIX};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// File name of the install-state database inside the destination
pub const STATE_DB_NAME: &str = ".termroot-state.db";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub repository: RepositoryConfig,

    #[serde(default)]
    pub install: InstallConfig,
}

/// Where packages come from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// Base URL; index and archive paths are relative to it
    #[serde(default = "default_repository_url")]
    pub url: String,

    /// Index path relative to `url`; may be compressed (`Packages.xz`)
    #[serde(default = "default_index_path")]
    pub index_path: String,

    /// Root prefix inside package payloads; `./` means "strip a leading ./"
    #[serde(default = "default_root_prefix")]
    pub root_prefix: String,
}

fn default_repository_url() -> String {
    "https://packages.termux.dev/apt/termux-main/".to_string()
}

fn default_index_path() -> String {
    "dists/stable/main/binary-aarch64/Packages".to_string()
}

fn default_root_prefix() -> String {
    TERMUX_PREFIX.to_string()
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: default_repository_url(),
            index_path: default_index_path(),
            root_prefix: default_root_prefix(),
        }
    }
}

impl RepositoryConfig {
    fn base_url(&self) -> String {
        if self.url.ends_with('/') {
            self.url.clone()
        } else {
            format!("{}/", self.url)
        }
    }

    pub fn index_url(&self) -> String {
        format!("{}{}", self.base_url(), self.index_path.trim_start_matches('/'))
    }

    /// URL of an archive given its index `Filename`
    pub fn package_url(&self, filename: &str) -> String {
        format!("{}{}", self.base_url(), filename.trim_start_matches('/'))
    }

    pub fn root_prefix(&self) -> RootPrefix {
        match self.root_prefix.trim() {
            "" | "." | "./" => RootPrefix::DotSlash,
            prefix => RootPrefix::Absolute(prefix.to_string()),
        }
    }
}

/// What to install and where
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstallConfig {
    #[serde(default = "default_destination")]
    pub destination: PathBuf,

    /// Download directory for archives; emptied of them after each run
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Install-state database; defaults to a file inside `destination`
    #[serde(default)]
    pub state_db: Option<PathBuf>,

    /// Packages installed when none are given on the command line
    #[serde(default)]
    pub packages: Vec<String>,

    /// Relative path prefixes to extract; empty extracts everything
    #[serde(default)]
    pub filter: Vec<String>,
}

fn default_destination() -> PathBuf {
    PathBuf::from("termroot")
}

fn default_cache_dir() -> PathBuf {
    std::env::temp_dir().join("termroot-cache")
}

impl Default for InstallConfig {
    fn default() -> Self {
        Self {
            destination: default_destination(),
            cache_dir: default_cache_dir(),
            state_db: None,
            packages: Vec::new(),
            filter: Vec::new(),
        }
    }
}

impl InstallConfig {
    pub fn state_db_path(&self) -> PathBuf {
        self.state_db
            .clone()
            .unwrap_or_else(|| self.destination.join(STATE_DB_NAME))
    }

    pub fn path_filter(&self) -> PathFilter {
        if self.filter.is_empty() {
            PathFilter::All
        } else {
            PathFilter::Prefixes(self.filter.clone())
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config = Self::parse(&content).map_err(|e| match e {
            Error::ConfigError(msg) => {
                Error::ConfigError(format!("{}: {}", path.display(), msg))
            }
            other => other,
        })?;
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)
            .map_err(|e| Error::ConfigError(format!("Invalid configuration: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let url = self.repository.url.trim();
        if !(url.starts_with("http://") || url.starts_with("https://") || url.starts_with("file://"))
        {
            return Err(Error::ConfigError(format!(
                "repository.url must be an http(s) or file URL, got {:?}",
                self.repository.url
            )));
        }
        if self.repository.index_path.trim().is_empty() {
            return Err(Error::ConfigError(
                "repository.index_path must not be empty".to_string(),
            ));
        }
        if self.install.destination.as_os_str().is_empty() {
            return Err(Error::ConfigError(
                "install.destination must not be empty".to_string(),
            ));
        }
        if let Some(bad) = self.install.filter.iter().find(|p| p.contains("..")) {
            return Err(Error::ConfigError(format!(
                "install.filter entries must be relative paths, got {:?}",
                bad
            )));
        }
        Ok(())
    }

    /// Extraction options for repository packages
    pub fn extract_options(&self) -> ExtractOptions {
        ExtractOptions::new(&self.install.destination, self.repository.root_prefix())
            .with_filter(self.install.path_filter())
    }
}
