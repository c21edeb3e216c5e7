mod commands;
mod tui;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use enginekit_core::{Config, Precision};
use std::fs::{self, OpenOptions};
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "enginekit")]
#[command(author, version, about = "Download YOLO weights and build TensorRT engines", long_about = None)]
struct Cli {
    /// Model catalog (JSON object: version -> model names)
    #[arg(long, global = true)]
    catalog: Option<PathBuf>,

    /// Configuration file (default: ~/.config/enginekit/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Open the interactive terminal UI
    Ui {
        /// Preselect this model
        model: Option<String>,
    },

    /// List catalog models with download and build status
    #[command(alias = "ls")]
    List {
        /// Only show this version
        #[arg(short, long)]
        version: Option<String>,
    },

    /// Download the weights of a model
    Pull {
        /// Model name (e.g., "yolov8n-seg")
        model: String,
    },

    /// Build a TensorRT engine from downloaded weights
    Build {
        /// Model name
        model: String,

        /// Engine precision: fp32, fp16 or int8
        #[arg(short, long, default_value = "fp16")]
        precision: Precision,

        /// Calibration dataset YAML (required for int8)
        #[arg(short, long)]
        calibration: Option<PathBuf>,

        /// Target device (overrides compiler.device)
        #[arg(short, long)]
        device: Option<String>,

        /// Rebuild without asking if the engine already exists
        #[arg(short, long)]
        yes: bool,

        /// Skip the GPU and TensorRT checks
        #[arg(long)]
        force: bool,
    },

    /// Show weights and engine files of a model
    Info {
        /// Model name
        model: String,
    },

    /// Show GPU, TensorRT and storage status
    Status,

    /// Print the weights directory, creating it if needed
    Path,

    /// Remove partial downloads from the weights directory
    Gc,

    /// View or set configuration
    Config {
        /// Config key (e.g., "compiler.device", "paths.weights_dir")
        key: Option<String>,

        /// Value to set (if omitted, shows current value)
        value: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Commands::Ui { model: None });

    init_logging(matches!(command, Commands::Ui { .. }))?;

    let config_path = match cli.config {
        Some(path) => path,
        None => Config::config_path()?,
    };
    let mut config = Config::load_from(&config_path)?;
    if let Some(catalog) = cli.catalog {
        config.paths.catalog = catalog;
    }

    match command {
        Commands::Ui { model } => {
            tui::run(&config, model.as_deref()).await?;
        }
        Commands::List { version } => {
            commands::list::execute(&config, version.as_deref())?;
        }
        Commands::Pull { model } => {
            commands::pull::execute(&config, &model).await?;
        }
        Commands::Build {
            model,
            precision,
            calibration,
            device,
            yes,
            force,
        } => {
            if let Some(device) = device {
                config.compiler.device = device;
            }
            commands::build::execute(&config, &model, precision, calibration, yes, force).await?;
        }
        Commands::Info { model } => {
            commands::info::execute(&config, &model)?;
        }
        Commands::Status => {
            commands::status::execute(&config)?;
        }
        Commands::Path => {
            commands::path::execute(&config)?;
        }
        Commands::Gc => {
            commands::gc::execute(&config)?;
        }
        Commands::Config { key, value } => {
            commands::config::execute(&config_path, key.as_deref(), value.as_deref())?;
        }
    }

    Ok(())
}

/// The TUI owns the terminal, so it logs to a file; everything else logs to stderr.
fn init_logging(interactive: bool) -> Result<()> {
    if interactive {
        let logs_dir = Config::logs_dir()?;
        fs::create_dir_all(&logs_dir)?;
        let log_path = logs_dir.join("enginekit.log");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)
            .with_context(|| format!("Failed to open log file {}", log_path.display()))?;

        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()),
            )
            .with_ansi(false)
            .with_writer(Mutex::new(file))
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::WARN.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
    Ok(())
}
