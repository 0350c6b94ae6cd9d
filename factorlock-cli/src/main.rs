//! `factorlock`: developer CLI for the multi-factor validation state machine.
//!
//! Each invocation behaves like one page load of the browser app: the
//! controller is loaded from the state directory, the command runs against it
//! and any success sequence it triggers is rendered in the terminal.

#![deny(clippy::all, clippy::pedantic, clippy::nursery)]

mod client;
mod commands;
mod page;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use eyre::{eyre, WrapErr};
use factorlock_core::ControllerConfig;
use tracing_subscriber::EnvFilter;

const DEFAULT_SERVER: &str = "http://127.0.0.1:5000";

#[derive(Debug, Parser)]
#[command(name = "factorlock", version, about)]
struct Cli {
    /// Directory holding the durable and session state files.
    #[arg(long, env = "FACTORLOCK_STATE_DIR", global = true)]
    state_dir: Option<PathBuf>,

    /// JSON controller configuration.
    #[arg(long, env = "FACTORLOCK_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// Session name; each name behaves like a separate browser tab.
    #[arg(long, env = "FACTORLOCK_SESSION", default_value = "default", global = true)]
    session: String,

    /// Step through the success sequence without waiting.
    #[arg(long, global = true)]
    no_delay: bool,

    /// Log debug output.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Show validation state.
    Status {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
    /// Record a successful validation.
    Validate {
        /// face, voice, retina or proximity.
        factor: String,
        /// User the factor matched.
        #[arg(long)]
        user: Option<String>,
    },
    /// Record a failed validation.
    Invalidate {
        /// face, voice, retina or proximity.
        factor: String,
    },
    /// Send a captured sample to the validation server and apply its verdict.
    Submit {
        /// face, voice, retina or proximity.
        factor: String,
        /// Sample file: an image, an audio clip, or proximity JSON.
        #[arg(long)]
        file: PathBuf,
        /// Validation server base URL.
        #[arg(long, env = "FACTORLOCK_SERVER", default_value = DEFAULT_SERVER)]
        server: String,
    },
    /// Reload the page, replaying the success sequence if this session earned it.
    Reload,
    /// Clear every validation.
    Reset,
    /// Forget this session, like closing the tab.
    EndSession,
    /// Show the recorded security violation.
    Violation {
        /// Remove the record after showing it.
        #[arg(long)]
        clear: bool,
    },
}

#[tokio::main]
async fn main() -> eyre::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose)?;

    let state_dir = match cli.state_dir {
        Some(dir) => dir,
        None => dirs::data_dir()
            .ok_or_else(|| eyre!("no data directory on this platform, pass --state-dir"))?
            .join("factorlock"),
    };
    let config = load_config(cli.config.as_deref())?;
    let ctx = commands::Context {
        state_dir,
        session: cli.session,
        config,
        fast: cli.no_delay,
    };

    match cli.command {
        Command::Status { json } => commands::status(&ctx, json),
        Command::Validate { factor, user } => commands::validate(&ctx, &factor, user).await,
        Command::Invalidate { factor } => commands::invalidate(&ctx, &factor).await,
        Command::Submit {
            factor,
            file,
            server,
        } => commands::submit(&ctx, &factor, &file, &server).await,
        Command::Reload => commands::reload(&ctx).await,
        Command::Reset => commands::reset(&ctx),
        Command::EndSession => commands::end_session(&ctx),
        Command::Violation { clear } => commands::violation(&ctx, clear),
    }
}

fn init_tracing(verbose: bool) -> eyre::Result<()> {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| eyre!("failed to install logger: {err}"))
}

fn load_config(path: Option<&std::path::Path>) -> eyre::Result<ControllerConfig> {
    let Some(path) = path else {
        return Ok(ControllerConfig::default());
    };
    let json = std::fs::read_to_string(path)
        .wrap_err_with(|| format!("failed to read {}", path.display()))?;
    Ok(ControllerConfig::from_json(&json)?)
}
