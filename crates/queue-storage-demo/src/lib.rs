//! # Queue Storage Demo
//!
//! Walk-through of the queue storage client.
//!
//! This crate provides:
//! - The *getting started* sample: queue creation, sending, peeking,
//!   receiving, updating and deleting messages, batch processing
//! - The *advanced* sample: listing queues, service properties, CORS rules,
//!   service statistics, queue metadata and stored access policies
//! - Configuration loading and the command-line interface
//!
//! Each sample writes its console narrative to a [`Console`] and stops at the
//! first failing step.

use clap::{CommandFactory, Parser, Subcommand};
use queue_storage::{QueueServiceClient, QueueStorageError};
use std::io::{self, Write};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub mod advanced;
pub mod console;
pub mod getting_started;
pub mod settings;

pub use console::Console;
pub use settings::{ConfigError, DemoConfig};

/// Prefix of every queue the samples create
pub const QUEUE_NAME_PREFIX: &str = "demotest";

// ============================================================================
// CLI Structure
// ============================================================================

/// Queue storage samples
#[derive(Parser)]
#[command(name = "queue-storage-demo")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Walk through queue storage operations against a storage account")]
#[command(
    long_about = "Runs the getting-started and advanced queue storage samples against the account named by the configured connection string"
)]
pub struct Cli {
    /// Configuration file path (JSON, same shape as appsettings.json)
    #[arg(short, long, env = "QUEUE_DEMO_CONFIG")]
    pub config: Option<PathBuf>,

    /// Storage connection string; overrides the configuration file
    #[arg(long, env = "QUEUE_DEMO_CONNECTION_STRING", hide_env_values = true)]
    pub connection_string: Option<String>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Print the models each sample fetches as JSON
    #[arg(long)]
    pub json: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Run the getting started sample
    Basic,

    /// Run the advanced sample
    Advanced,

    /// Run the getting started sample, then the advanced sample
    All,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ============================================================================
// Errors
// ============================================================================

/// Errors that end a demo run
#[derive(Debug, Error)]
pub enum DemoError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Storage error: {0}")]
    Storage(#[from] QueueStorageError),

    #[error("Demo step '{step}' failed: {source}")]
    StepFailed {
        step: String,
        #[source]
        source: QueueStorageError,
    },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Wrap a storage failure with the name of the step it ended
pub(crate) fn step_failed(step: &'static str) -> impl Fn(QueueStorageError) -> DemoError {
    move |source| DemoError::StepFailed {
        step: step.to_string(),
        source,
    }
}

/// Print a storage error the way every sample reports failures
pub fn write_exception<W: Write>(out: &mut W, error: &QueueStorageError) -> io::Result<()> {
    writeln!(
        out,
        "Exception thrown. {}, msg = {}",
        error.source_label(),
        error
    )
}

// ============================================================================
// Entry points
// ============================================================================

/// Parse arguments, initialize logging and run the selected command
pub async fn run_cli() -> Result<(), DemoError> {
    let cli = Cli::parse();

    initialize_logging(&cli);

    run(cli, &mut io::stdout()).await
}

/// Run a parsed command, writing the sample narrative to `out`
pub async fn run<W: Write>(cli: Cli, out: &mut W) -> Result<(), DemoError> {
    if let Commands::Completions { shell } = cli.command {
        return execute_completions_command(shell, out);
    }

    let config = DemoConfig::load(cli.config.as_deref())?;
    let connection_string = config.resolve_connection_string(cli.connection_string.as_deref())?;
    let service = connect(connection_string, out)?;
    let mut console = Console::new(out).with_json(cli.json);

    match cli.command {
        Commands::Basic => getting_started::run(&service, &mut console).await,
        Commands::Advanced => advanced::run(&service, &mut console).await,
        Commands::All => {
            getting_started::run(&service, &mut console).await?;
            writeln!(console)?;
            advanced::run(&service, &mut console).await
        }
        Commands::Completions { .. } => Ok(()),
    }
}

/// Build the service client for a connection string
pub fn connect<W: Write>(
    connection_string: &str,
    out: &mut W,
) -> Result<QueueServiceClient, DemoError> {
    let account = match settings::create_storage_account(connection_string) {
        Ok(account) => account,
        Err(e) => {
            writeln!(
                out,
                "Invalid storage account information provided. Please confirm the AccountName and AccountKey are valid in the {} file - then restart the sample.",
                settings::DEFAULT_CONFIG_FILE
            )?;
            return Err(e.into());
        }
    };

    info!(
        account = %account.name(),
        endpoint = %account.queue_endpoint(),
        "Connecting to queue service"
    );

    Ok(QueueServiceClient::new(account)?)
}

/// Initialize logging based on CLI arguments
///
/// `RUST_LOG` takes precedence over `--log-level`. Logs go to stderr so they
/// never interleave with the sample narrative on stdout.
fn initialize_logging(cli: &Cli) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);
    let layer = tracing_subscriber::fmt::layer().with_writer(io::stderr);
    let result = if cli.json_logs {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };

    if let Err(e) = result {
        error!(error = %e, "Logging was already initialized");
    }
}

fn execute_completions_command<W: Write>(
    shell: clap_complete::Shell,
    out: &mut W,
) -> Result<(), DemoError> {
    info!(shell = ?shell, "Generating shell completions");

    let mut command = Cli::command();
    let name = command.get_name().to_string();
    clap_complete::generate(shell, &mut command, name, out);
    Ok(())
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
