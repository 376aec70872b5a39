// build.rs

use clap::{Arg, Command};
use clap_mangen::Man;
use std::env;
use std::fs;
use std::path::PathBuf;

/// Common argument: install root directory
fn destination_arg() -> Arg {
    Arg::new("destination")
        .short('d')
        .long("destination")
        .value_name("DIR")
        .help("Install root directory")
}

/// Common argument: packages to operate on
fn packages_arg() -> Arg {
    Arg::new("packages")
        .num_args(0..)
        .help("Package names (defaults to install.packages from the config)")
}

fn build_cli() -> Command {
    Command::new("termroot")
        .version(env!("CARGO_PKG_VERSION"))
        .author("Termroot Contributors")
        .about("Install Termux packages into a self-contained root")
        .subcommand_required(false)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("PATH")
                .global(true)
                .help("Path to the configuration file"),
        )
        .subcommand(
            Command::new("install")
                .about("Install packages and their dependencies")
                .arg(packages_arg())
                .arg(destination_arg())
                .arg(
                    Arg::new("cache_dir")
                        .long("cache-dir")
                        .value_name("DIR")
                        .help("Directory for downloaded archives"),
                )
                .arg(
                    Arg::new("dry_run")
                        .long("dry-run")
                        .action(clap::ArgAction::SetTrue)
                        .help("Show what would be installed without installing"),
                ),
        )
        .subcommand(
            Command::new("resolve")
                .about("Resolve packages and print the selected set")
                .arg(packages_arg()),
        )
        .subcommand(
            Command::new("fetch-deb")
                .about("Download a single .deb and extract selected files from it")
                .arg(Arg::new("url").required(true).help("URL of the .deb archive"))
                .arg(
                    Arg::new("files")
                        .required(true)
                        .num_args(1..)
                        .help("Paths inside the payload, relative to its root"),
                )
                .arg(destination_arg()),
        )
        .subcommand(
            Command::new("list")
                .about("List packages recorded as installed in the destination")
                .arg(destination_arg()),
        )
        .subcommand(Command::new("show-config").about("Print the effective configuration"))
}

fn main() {
    println!("cargo:rerun-if-changed=build.rs");

    let manifest_dir = match env::var("CARGO_MANIFEST_DIR") {
        Ok(dir) => PathBuf::from(dir),
        Err(e) => {
            println!("cargo:warning=CARGO_MANIFEST_DIR not set: {}", e);
            return;
        }
    };
    let man_dir = manifest_dir.join("man");

    if let Err(e) = fs::create_dir_all(&man_dir) {
        println!("cargo:warning=Failed to create man directory: {}", e);
        return;
    }

    let man = Man::new(build_cli());
    let mut buffer = Vec::new();

    if let Err(e) = man.render(&mut buffer) {
        println!("cargo:warning=Failed to render man page: {}", e);
        return;
    }

    let man_path = man_dir.join("termroot.1");
    if let Err(e) = fs::write(&man_path, buffer) {
        println!("cargo:warning=Failed to write man page: {}", e);
    }
}
