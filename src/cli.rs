// src/cli.rs
//! CLI definitions for termroot
//!
//! This module contains all command-line interface definitions using clap.
//! The actual command implementations are in the `commands` module.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "termroot")]
#[command(author = "Termroot Contributors")]
#[command(version)]
#[command(about = "Install Termux packages into a self-contained root", long_about = None)]
pub struct Cli {
    /// Path to the configuration file
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Install packages and their dependencies
    Install {
        /// Package names (defaults to install.packages from the config)
        packages: Vec<String>,

        /// Install root directory
        #[arg(short, long)]
        destination: Option<PathBuf>,

        /// Directory for downloaded archives
        #[arg(long)]
        cache_dir: Option<PathBuf>,

        /// Show what would be installed without installing
        #[arg(long)]
        dry_run: bool,
    },

    /// Resolve packages and print the selected set
    Resolve {
        /// Package names (defaults to install.packages from the config)
        packages: Vec<String>,
    },

    /// Download a single .deb and extract selected files from it
    FetchDeb {
        /// URL of the .deb archive
        url: String,

        /// Paths inside the payload, relative to its root (e.g. usr/share/AAVMF/AAVMF_CODE.fd)
        #[arg(required = true)]
        files: Vec<String>,

        /// Directory the files are written to
        #[arg(short, long)]
        destination: Option<PathBuf>,
    },

    /// List packages recorded as installed in the destination
    List {
        /// Install root directory
        #[arg(short, long)]
        destination: Option<PathBuf>,
    },

    /// Print the effective configuration
    ShowConfig,
}
