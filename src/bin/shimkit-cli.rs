//! Shimkit CLI - run plugin scripts against the in-memory platform
//!
//! Provides subcommands for running a script file and for writing a default
//! configuration file.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use shimkit::platform::{MemoryPlatform, Platform};
use shimkit::runtime::{Script, Session, load_config, write_config};
use shimkit::signal::{Signal, SignalChannel};
use shimkit::RuntimeConfig;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "shimkit")]
#[command(about = "Run platform plugin scripts against an in-memory platform", long_about = None)]
struct Cli {
    /// Configuration file (JSON)
    #[arg(short, long, default_value = "shimkit.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a script until every interpreter finishes
    Run {
        /// Script file
        script: PathBuf,

        /// JSON array of signals preloaded on the global channel
        #[arg(long)]
        global_signals: Option<PathBuf>,

        /// JSON array of signals preloaded on the user channel
        #[arg(long)]
        user_signals: Option<PathBuf>,

        /// Signed-in player id
        #[arg(long, default_value = "1")]
        player_id: u64,

        /// Signed-in player name
        #[arg(long, default_value = "player")]
        player_name: String,
    },

    /// Write a default configuration file
    InitConfig,

    /// List registered commands
    List,
}

fn load_signals(path: &Path) -> Result<Vec<Signal>> {
    let data = std::fs::read(path).with_context(|| format!("Failed to read {:?}", path))?;
    serde_json::from_slice(&data).with_context(|| format!("Failed to parse signals in {:?}", path))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Only `run` reads the config.
    let config = match cli.command {
        Commands::Run { .. } => Some(load_config(&cli.config)?),
        _ => None,
    };
    let level = if config.as_ref().is_some_and(|c| c.debug) {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    match cli.command {
        Commands::Run {
            script,
            global_signals,
            user_signals,
            player_id,
            player_name,
        } => {
            let config = config.unwrap_or_default();
            let source = std::fs::read_to_string(&script)
                .with_context(|| format!("Failed to read script {:?}", script))?;
            let script = Script::parse(&source)?;

            let platform = Arc::new(MemoryPlatform::new(player_id, player_name));
            if let Some(path) = global_signals {
                platform.load_signals(SignalChannel::Global, load_signals(&path)?);
            }
            if let Some(path) = user_signals {
                platform.load_signals(SignalChannel::User, load_signals(&path)?);
            }

            let mut session = Session::builder(Platform::from_shared(platform))
                .config(config)
                .build()?;
            session.run_script(&script)?;
            let frames = session.run_until_idle().await?;

            println!("Finished after {} frames", frames);
            for (id, value) in session.variables().non_zero() {
                println!("{} = {}", id, value);
            }
        }

        Commands::InitConfig => {
            write_config(&cli.config, &RuntimeConfig::default())?;
            println!("Wrote default configuration to {:?}", cli.config);
        }

        Commands::List => {
            let registry = shimkit::runtime::CommandCatalog::global().snapshot();
            for name in registry.list_commands() {
                println!("{}", name);
            }
        }
    }

    Ok(())
}
