// src/main.rs

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Commands};

fn main() -> Result<()> {
    // Initialize tracing subscriber for logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Some(Commands::Install {
            packages,
            destination,
            cache_dir,
            dry_run,
        }) => commands::cmd_install(config, packages, destination, cache_dir, dry_run),
        Some(Commands::Resolve { packages }) => commands::cmd_resolve(config, packages),
        Some(Commands::FetchDeb {
            url,
            files,
            destination,
        }) => commands::cmd_fetch_deb(config, &url, files, destination),
        Some(Commands::List { destination }) => commands::cmd_list(config, destination),
        Some(Commands::ShowConfig) => commands::cmd_show_config(&config),
        None => {
            // No command provided, show help
            println!("termroot v{}", env!("CARGO_PKG_VERSION"));
            println!("Run 'termroot --help' for usage information");
            Ok(())
        }
    }
}
