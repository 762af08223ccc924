//! datamine - fetch and verify question-answering datasets
//!
//! Keeps one directory per dataset under a local cache root and makes sure
//! its contents match the published manifest.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod cmd;
mod config;

use config::Config;

#[derive(Parser)]
#[command(name = "datamine")]
#[command(about = "Fetch, cache and verify datasets")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Enable debug logging
    #[arg(long, global = true)]
    debug: bool,

    /// Only print warnings and errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Config file path (default: ./datamine.toml or ~/.config/datamine/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Dataset registry (overrides `registry` from the config file)
    #[arg(short, long, global = true)]
    registry: Option<PathBuf>,

    /// Connect timeout in seconds
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout: Option<u64>,

    /// Read timeout in seconds for stall detection
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    read_timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Command {
    /// Make a dataset available locally, downloading it if needed
    Download(cmd::download::DownloadArgs),
    /// Check a local copy against its manifest
    Check(cmd::check::CheckArgs),
    /// List known datasets and their local state
    List,
    /// Print the cache root, or a dataset's directory
    Path(cmd::path::PathArgs),
    /// Write an integrity manifest for a directory tree
    Manifest(cmd::manifest::ManifestArgs),
    /// Show current configuration
    Config,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Progress context (TTY auto-detect)
    let progress = Arc::new(datamine_core::ProgressContext::new());

    let multi = progress.is_tty().then(|| progress.multi());
    datamine_core::init_logging(
        datamine_core::Verbosity::from_flags(cli.quiet, cli.debug),
        multi,
    );

    let mut config = if let Some(path) = &cli.config {
        Config::from_file(path)?
    } else {
        Config::load()?
    };

    // CLI overrides
    if let Some(registry) = cli.registry {
        config.registry = registry;
    }
    if let Some(secs) = cli.connect_timeout {
        config.http.connect_timeout = secs;
    }
    if let Some(secs) = cli.read_timeout {
        config.http.read_timeout = secs;
    }
    config.validate()?;

    let ctx = cmd::Context {
        http: datamine_core::HttpConfig {
            connect_timeout: Duration::from_secs(config.http.connect_timeout),
            read_timeout: Duration::from_secs(config.http.read_timeout),
        },
        config,
        progress,
    };

    match cli.command {
        Command::Download(args) => cmd::download::run(args, &ctx),
        Command::Check(args) => cmd::check::run(args, &ctx),
        Command::List => cmd::list::run(&ctx),
        Command::Path(args) => cmd::path::run(args, &ctx),
        Command::Manifest(args) => cmd::manifest::run(args),
        Command::Config => cmd::show_config(&ctx),
    }
}
