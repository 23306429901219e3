//! Drive load against an Allora chain with thousands of simulated actors.
//!
//! # Workloads
//!
//! * [stress]: creates topics, funds and registers workers and reputers on them, then runs one
//!   [topic::Loop] per (topic, role) that submits a payload for every registered actor each time
//!   the chain opens a submission window.
//! * [transfers]: funds a set of actors and has them send random amounts to each other in rounds.
//!
//! Both run under an [orchestrator::Orchestrator], which stops everything on the first fatal
//! error, on the global timeout, or when every task completes. Each actor submits through its
//! own sequencer ([swarm_tx::account::Engine]), so concurrent bursts never race an account's
//! sequence.

use std::{path::PathBuf, time::Duration};
use thiserror::Error;

pub mod actor;
pub mod config;
pub mod metrics;
pub mod orchestrator;
pub mod payload;
pub mod registry;
pub mod setup;
pub mod stress;
pub mod telemetry;
pub mod topic;
pub mod transfers;

/// Errors that can occur when running a simulation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid config: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to read mnemonic from {0}")]
    Mnemonic(PathBuf),
    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("key error: {0}")]
    Keys(#[from] swarm_keys::Error),
    #[error("chain error: {0}")]
    Chain(#[from] swarm_chain::Error),
    #[error("transaction error: {0}")]
    Tx(#[from] swarm_tx::Error),
    #[error("transaction {hash} was accepted but never observed in a block")]
    Unobserved { hash: String },
    #[error("faucet balance {balance} cannot fund {actors} actors")]
    InsufficientFunds { balance: u128, actors: usize },
    #[error("{task} failed: {source}")]
    Fatal { task: String, source: Box<Error> },
    #[error("simulation timed out after {0:?}")]
    Timeout(Duration),
    #[error("telemetry error: {0}")]
    Telemetry(String),
}
