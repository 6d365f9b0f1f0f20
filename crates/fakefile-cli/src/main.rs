//! fakeclient — test client for the fakefile device.
//!
//! Registers an in-process fakefile device, opens it, and drives it the way
//! a user program drives `/dev/fakefile`: write, seek, read, and an
//! oversized write that the device truncates.

mod commands;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fakefile_core::{DeviceConfig, FakeFile, Overrides};
use tracing::{error, info};

/// fakeclient — exercise the fakefile device
#[derive(Parser, Debug)]
#[command(name = "fakeclient", version, about = "Exercise the fakefile character device")]
struct Cli {
    /// Config file path
    #[arg(long, global = true, default_value = "~/.fakefile/config.toml")]
    config: String,

    /// Buffer capacity in bytes (overrides the config file)
    #[arg(long, global = true)]
    capacity: Option<usize>,

    /// Device name (overrides the config file)
    #[arg(long, global = true)]
    name: Option<String>,

    /// Print the report as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "warn")]
    log_level: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a message, read it back, then attempt an oversized write
    Demo {
        /// Message to write (a NUL terminator is appended)
        #[arg(long, default_value = commands::demo::DEFAULT_MESSAGE)]
        message: String,

        /// Size of the oversized write
        #[arg(long, default_value_t = commands::demo::BAD_SIZE)]
        bad_size: usize,
    },

    /// Open and close the device from many threads at once
    Stress {
        /// Number of concurrent threads
        #[arg(long, default_value_t = 8)]
        threads: usize,

        /// Open/close rounds per thread
        #[arg(long, default_value_t = 100)]
        rounds: usize,
    },
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    use tracing_subscriber::EnvFilter;
    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(cli.verbose)
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        error!("{:#}", e);
        eprintln!("fakeclient: {e:#}");
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<()> {
    let config_path = PathBuf::from(&cli.config);
    let config = DeviceConfig::load(
        Some(&config_path),
        Overrides {
            name: cli.name,
            capacity: cli.capacity,
        },
    )
    .context("failed to load config")?;

    let device = FakeFile::new(&config).context("failed to create device")?;
    device.register().context("failed to register device")?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        device = %device.node_path(),
        "starting fakeclient"
    );

    let result = dispatch(cli.command, &device, cli.json);

    device.unregister().context("failed to unregister device")?;
    result
}

fn dispatch(command: Option<Command>, device: &Arc<FakeFile>, json: bool) -> Result<()> {
    match command {
        Some(Command::Demo { message, bad_size }) => {
            commands::demo::run(device, &message, bad_size, json)
        }
        Some(Command::Stress { threads, rounds }) => {
            commands::stress::run(device, threads, rounds, json)
        }
        None => commands::demo::run(
            device,
            commands::demo::DEFAULT_MESSAGE,
            commands::demo::BAD_SIZE,
            json,
        ),
    }
}
