// src/commands.rs
//! Command handlers for the termroot CLI

use anyhow::{bail, Context, Result};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use termroot::db::{InstallState, MemoryState, SqliteState};
use termroot::{CliProgress, Config, Installer, RepositoryClient};
use tracing::info;

/// Load the configuration file, or the defaults when none is given
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            Ok(Config::load(path)?)
        }
        None => Ok(Config::new()),
    }
}

/// Packages named on the command line, falling back to the configured list
fn requested_packages(config: &Config, packages: Vec<String>) -> Result<Vec<String>> {
    let packages = if packages.is_empty() {
        config.install.packages.clone()
    } else {
        packages
    };
    if packages.is_empty() {
        bail!("No packages given and install.packages is empty");
    }
    Ok(packages)
}

fn build_installer(config: Config, state: Arc<dyn InstallState>) -> Result<Installer> {
    let fetcher = Arc::new(RepositoryClient::new()?);
    Ok(Installer::new(config, fetcher, state, Arc::new(CliProgress::new())))
}

pub fn cmd_install(
    mut config: Config,
    packages: Vec<String>,
    destination: Option<PathBuf>,
    cache_dir: Option<PathBuf>,
    dry_run: bool,
) -> Result<()> {
    if let Some(destination) = destination {
        config.install.destination = destination;
    }
    if let Some(cache_dir) = cache_dir {
        config.install.cache_dir = cache_dir;
    }
    config.validate()?;
    let packages = requested_packages(&config, packages)?;

    if dry_run {
        return cmd_resolve(config, packages);
    }

    let state_path = config.install.state_db_path();
    let state = SqliteState::open(&state_path)
        .with_context(|| format!("Failed to open install state {}", state_path.display()))?;
    let destination = config.install.destination.clone();
    let installer = build_installer(config, Arc::new(state))?;

    info!("Installing {} into {}", packages.join(", "), destination.display());
    let report = installer.install_packages(&packages)?;

    println!(
        "Installed {} packages ({} already up to date) into {}",
        report.installed.len(),
        report.skipped.len(),
        destination.display()
    );
    Ok(())
}

pub fn cmd_resolve(config: Config, packages: Vec<String>) -> Result<()> {
    let packages = requested_packages(&config, packages)?;
    let installer = build_installer(config, Arc::new(MemoryState::new()))?;
    let resolution = installer.resolve(&packages)?;

    println!("Selected {} packages:", resolution.selected.len());
    for record in resolution.selected.values() {
        println!("  {} {}", record.name, record.version);
    }
    if !resolution.report.is_empty() {
        println!();
        println!("Warnings:");
        for message in resolution.report.messages() {
            println!("  {}", message);
        }
    }
    Ok(())
}

pub fn cmd_fetch_deb(
    mut config: Config,
    url: &str,
    files: Vec<String>,
    destination: Option<PathBuf>,
) -> Result<()> {
    if let Some(destination) = destination {
        config.install.destination = destination;
    }
    config.validate()?;

    let files: BTreeSet<String> = files
        .into_iter()
        .map(|f| f.trim_start_matches("./").trim_start_matches('/').to_string())
        .collect();
    let destination = config.install.destination.clone();
    let installer = build_installer(config, Arc::new(MemoryState::new()))?;
    let report = installer.install_deb_from_url(url, &files)?;

    println!(
        "Extracted {} of {} files into {}",
        files.len() - report.warnings.len(),
        files.len(),
        destination.display()
    );
    Ok(())
}

pub fn cmd_list(mut config: Config, destination: Option<PathBuf>) -> Result<()> {
    if let Some(destination) = destination {
        config.install.destination = destination;
    }

    let state_path = config.install.state_db_path();
    if !state_path.exists() {
        println!("No packages installed in {}", config.install.destination.display());
        return Ok(());
    }

    let state = SqliteState::open(&state_path)?;
    let installed = state.installed()?;
    if installed.is_empty() {
        println!("No packages installed in {}", config.install.destination.display());
        return Ok(());
    }
    for package in installed {
        println!(
            "{} {} (installed {})",
            package.name,
            package.version,
            package.installed_at.format("%Y-%m-%d %H:%M:%S")
        );
    }
    Ok(())
}

pub fn cmd_show_config(config: &Config) -> Result<()> {
    let text = toml::to_string_pretty(config).context("Failed to render configuration")?;
    print!("{}", text);
    Ok(())
}
