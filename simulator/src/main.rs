//! Swarm CLI

use clap::{Arg, ArgAction, Command};
use std::{
    fs,
    path::{Path, PathBuf},
    process::ExitCode,
};
use swarm_chain::http::Http;
use swarm_simulator::{config::Config, stress, telemetry, transfers, Error};
use tracing::{error, info};
use zeroize::Zeroizing;

/// Returns the version of the crate.
pub const fn crate_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

const STRESS_CMD: &str = "stress";
const TRANSFERS_CMD: &str = "transfers";

const CONFIG_FLAG: &str = "config";
const MNEMONIC_FLAG: &str = "mnemonic";
const LOG_LEVEL_FLAG: &str = "log-level";
const JSON_FLAG: &str = "json";

/// Arguments shared by every workload.
fn workload(name: &'static str, about: &'static str) -> Command {
    Command::new(name)
        .about(about)
        .arg(
            Arg::new(CONFIG_FLAG)
                .long(CONFIG_FLAG)
                .required(true)
                .help("Path to YAML or JSON config file")
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .arg(
            Arg::new(MNEMONIC_FLAG)
                .long(MNEMONIC_FLAG)
                .required(true)
                .help("Path to a file containing the faucet seed phrase")
                .value_parser(clap::value_parser!(PathBuf)),
        )
}

async fn execute(command: &str, config: &Path, mnemonic: &Path) -> Result<(), Error> {
    let cfg = Config::load(config)?;
    let mnemonic = Zeroizing::new(
        fs::read_to_string(mnemonic).map_err(|_| Error::Mnemonic(mnemonic.to_path_buf()))?,
    );
    let client = Http::new(cfg.http())?;
    info!(chain = %cfg.chain, rpc = %cfg.nodes.rpc[0], api = %cfg.nodes.api, "connecting");
    match command {
        STRESS_CMD => stress::run(cfg, client, mnemonic.trim()).await,
        _ => transfers::run(cfg, client, mnemonic.trim()).await,
    }
}

/// Entrypoint for the Swarm CLI
#[tokio::main]
async fn main() -> ExitCode {
    // Define application
    let matches = Command::new("swarm")
        .version(crate_version())
        .about("Drive load against an Allora chain with thousands of simulated actors.")
        .arg(
            Arg::new(LOG_LEVEL_FLAG)
                .long(LOG_LEVEL_FLAG)
                .global(true)
                .default_value("info")
                .help("Log level (overridden by RUST_LOG)")
                .value_parser(clap::value_parser!(String)),
        )
        .arg(
            Arg::new(JSON_FLAG)
                .long(JSON_FLAG)
                .global(true)
                .help("Emit logs as JSON")
                .action(ArgAction::SetTrue),
        )
        .subcommand_required(true)
        .subcommand(workload(
            STRESS_CMD,
            "Create topics and have workers and reputers submit on every window.",
        ))
        .subcommand(workload(
            TRANSFERS_CMD,
            "Have funded actors send random bank transfers to each other.",
        ))
        .get_matches();

    // Create logger
    let level = matches
        .get_one::<String>(LOG_LEVEL_FLAG)
        .map(String::as_str)
        .unwrap_or("info");
    if let Err(e) = telemetry::init(level, matches.get_flag(JSON_FLAG)) {
        eprintln!("failed to initialize logging: {e}");
        return ExitCode::FAILURE;
    }

    // Parse subcommand
    let Some((command, matches)) = matches.subcommand() else {
        error!("missing subcommand");
        return ExitCode::FAILURE;
    };
    let (Some(config), Some(mnemonic)) = (
        matches.get_one::<PathBuf>(CONFIG_FLAG),
        matches.get_one::<PathBuf>(MNEMONIC_FLAG),
    ) else {
        error!("missing required arguments");
        return ExitCode::FAILURE;
    };
    match execute(command, config, mnemonic).await {
        Ok(()) => {
            info!(command, "simulation complete");
            ExitCode::SUCCESS
        }
        Err(Error::Timeout(timeout)) => {
            info!(command, ?timeout, "simulation reached timeout");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!(error = ?e, command, "simulation failed");
            ExitCode::FAILURE
        }
    }
}
