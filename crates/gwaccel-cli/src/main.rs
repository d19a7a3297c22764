//! gwaccel command-line interface
//!
//! Lists OpenCL platforms and devices and probes whether an accelerator
//! context can be built on this host.

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console::style;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::common::RuntimeOptions;
use commands::{devices, probe, version};

/// gwaccel - OpenCL accelerator discovery and context probing
#[derive(Parser)]
#[command(name = "gwaccel")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// OpenCL library to load instead of the system default
    #[arg(long, global = true)]
    library: Option<PathBuf>,

    /// Use the built-in in-memory runtime instead of OpenCL
    #[arg(long, global = true)]
    mock: bool,

    /// YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List platforms and devices with their availability
    Devices {
        /// Device class to list (gpu, accelerator, cpu, default, all)
        #[arg(long)]
        class: Option<String>,
    },

    /// Build an accelerator context, run the self-test and tear it down
    Probe {
        /// Device enumeration index on the selected platform
        #[arg(short, long)]
        device: Option<usize>,

        /// Only accept devices whose name contains this text
        #[arg(short, long)]
        name: Option<String>,

        /// Platform enumeration index
        #[arg(short, long)]
        platform: Option<usize>,

        /// Device class to select from
        #[arg(long)]
        class: Option<String>,
    },

    /// Show version information
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let options = RuntimeOptions {
        library: cli.library,
        mock: cli.mock,
        config: cli.config,
    };

    // Execute command
    let result = match cli.command {
        Commands::Devices { class } => devices::execute(&options, class.as_deref()),
        Commands::Probe {
            device,
            name,
            platform,
            class,
        } => probe::execute(&options, device, name, platform, class.as_deref()),
        Commands::Version => {
            version::execute();
            Ok(())
        }
    };

    // Handle errors
    if let Err(e) = result {
        eprintln!("{} {}", style("Error:").red().bold(), e);
        std::process::exit(1);
    }

    Ok(())
}
