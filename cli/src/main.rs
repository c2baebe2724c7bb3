//! ciphervote: replay governance scenarios against the in-memory backends.

mod replay;
mod script;

use ciphervote_governance::GovernanceConfig;
use ciphervote_utils::{init_logging, LogFormat};
use clap::Parser;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "ciphervote", about = "Confidential proposal voting engine tooling")]
struct Cli {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[arg(long, default_value = "info", env = "CIPHERVOTE_LOG_LEVEL")]
    log_level: String,

    /// Log output format: "human" or "json".
    #[arg(long, default_value = "human", env = "CIPHERVOTE_LOG_FORMAT")]
    log_format: LogFormat,

    /// Path to a TOML engine configuration file. Defaults apply otherwise.
    #[arg(long, env = "CIPHERVOTE_CONFIG")]
    config: Option<PathBuf>,

    /// Subcommand.
    #[command(subcommand)]
    command: Command,
}

#[derive(clap::Subcommand)]
enum Command {
    /// Run a scenario script and print the final state as JSON.
    Replay {
        /// Path to the TOML script.
        script: PathBuf,

        /// Also write the engine snapshot (bincode) to this path.
        #[arg(long)]
        snapshot: Option<PathBuf>,

        /// Pretty-print the JSON report.
        #[arg(long)]
        pretty: bool,
    },
    /// Print the effective engine configuration as TOML.
    Config,
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<GovernanceConfig> {
    match path {
        Some(path) => {
            let config = GovernanceConfig::from_toml_file(&path.to_string_lossy())?;
            tracing::info!("Loaded config from {}", path.display());
            Ok(config)
        }
        None => Ok(GovernanceConfig::default()),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.log_format, &cli.log_level);

    let config = load_config(cli.config.as_ref())?;

    match cli.command {
        Command::Replay {
            script,
            snapshot,
            pretty,
        } => {
            let parsed = script::Script::from_toml_file(&script)?;
            tracing::info!(
                script = %script.display(),
                steps = parsed.steps.len(),
                "replaying script"
            );
            let (report, state) = replay::replay_with_snapshot(&parsed, config)?;
            if let Some(path) = snapshot {
                std::fs::write(&path, state)?;
                tracing::info!("Wrote snapshot to {}", path.display());
            }
            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
        }
        Command::Config => {
            print!("{}", config.to_toml_string()?);
        }
    }
    Ok(())
}
