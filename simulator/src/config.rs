//! Simulation configuration, loaded from YAML or JSON.

use crate::Error;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

/// Timeout value that disables the global timeout.
pub const NO_TIMEOUT: i64 = -1;

fn default_denom() -> String {
    "uallo".into()
}

fn default_timeout_minutes() -> i64 {
    NO_TIMEOUT
}

fn default_fanout() -> usize {
    1_000
}

fn default_poll_interval_ms() -> u64 {
    4_000
}

fn default_mailbox_size() -> usize {
    16
}

fn default_price_interval_ms() -> u64 {
    2_000
}

fn default_max_retries() -> u32 {
    5
}

fn default_base_delay_ms() -> u64 {
    4_000
}

fn default_batch_size() -> usize {
    1_000
}

fn default_grace_ms() -> u64 {
    10_000
}

/// Gas and fee parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GasConfig {
    /// Gas charged per encoded message byte.
    pub per_byte: u64,

    /// Gas charged per transaction.
    pub base: u64,

    /// Multiplier applied to every estimate (`0` disables it).
    #[serde(default)]
    pub adjustment: f64,

    /// Interval between gas price refreshes.
    #[serde(default = "default_price_interval_ms")]
    pub price_interval_ms: u64,
}

/// Retry limits for transient broadcast failures.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

/// Chain endpoints.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NodesConfig {
    /// CometBFT RPC endpoints (only the first is used).
    pub rpc: Vec<String>,

    /// Cosmos REST gateway.
    pub api: String,
}

/// An inclusive range to draw uniformly from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub min: u64,
    pub max: u64,
}

impl Range {
    pub fn sample<R: rand::Rng>(&self, rng: &mut R) -> u64 {
        rng.gen_range(self.min..=self.max)
    }
}

/// Parameters of the bank transfer workload.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransfersConfig {
    /// Number of actors sending to each other.
    pub num_actors: usize,

    /// Seed used to generate actor keys.
    pub seed: u64,

    /// Transactions sent per round.
    pub txs_per_round: Range,

    /// Amount sent per transaction.
    pub amount: Range,
}

impl Default for TransfersConfig {
    fn default() -> Self {
        Self {
            num_actors: 10,
            seed: 0,
            txs_per_round: Range { min: 1, max: 5 },
            amount: Range { min: 1, max: 100 },
        }
    }
}

/// Configuration of a simulation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Chain identifier.
    pub chain: String,

    /// Denomination of fees, funding, and stake.
    #[serde(default = "default_denom")]
    pub denom: String,

    /// Bech32 prefix of account addresses.
    pub prefix: String,

    pub gas: GasConfig,

    /// Epoch length (and ground truth lag) of created topics.
    pub epoch_length: i64,

    pub num_topics: usize,
    pub workers_per_topic: usize,
    pub reputers_per_topic: usize,

    /// Create every topic in a single transaction instead of one per transaction.
    #[serde(default)]
    pub create_topics_same_block: bool,

    /// Global timeout in minutes ([NO_TIMEOUT] disables it).
    #[serde(default = "default_timeout_minutes")]
    pub timeout_minutes: i64,

    /// Maximum concurrent submissions per burst.
    #[serde(default = "default_fanout")]
    pub fanout: usize,

    /// Interval between submission window checks.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Submissions that can be queued per actor.
    #[serde(default = "default_mailbox_size")]
    pub mailbox_size: usize,

    /// Outputs per funding transaction.
    #[serde(default = "default_batch_size")]
    pub funding_batch_size: usize,

    /// Time allowed for tasks to stop after shutdown is signaled.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,

    /// If set, the faucet updates this global parameter before topics are created.
    #[serde(default)]
    pub max_samples_to_scale_scores: Option<u64>,

    #[serde(default)]
    pub retry: RetryConfig,

    pub nodes: NodesConfig,

    #[serde(default)]
    pub transfers: TransfersConfig,

    /// Port to serve metrics on.
    #[serde(default)]
    pub metrics_port: Option<u16>,
}

impl Config {
    /// Load a configuration from `path`, choosing the format by extension.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let raw = fs::read_to_string(path)?;
        let cfg: Self = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => serde_json::from_str(&raw)?,
            Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)?,
            other => {
                return Err(Error::Config(format!(
                    "unsupported config extension: {other:?}"
                )))
            }
        };
        cfg.validate()?;
        Ok(cfg)
    }

    /// Check invariants serde cannot express.
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |msg: &str| Err(Error::Config(msg.to_string()));
        if self.nodes.rpc.is_empty() {
            return invalid("at least one rpc endpoint is required");
        }
        if self.nodes.api.is_empty() {
            return invalid("api endpoint is required");
        }
        if self.prefix.is_empty() {
            return invalid("prefix is required");
        }
        if self.chain.is_empty() {
            return invalid("chain is required");
        }
        if self.epoch_length <= 0 {
            return invalid("epoch_length must be positive");
        }
        if self.fanout == 0 || self.mailbox_size == 0 || self.funding_batch_size == 0 {
            return invalid("fanout, mailbox_size, and funding_batch_size must be positive");
        }
        if self.poll_interval_ms == 0 || self.gas.price_interval_ms == 0 {
            return invalid("intervals must be positive");
        }
        if self.timeout_minutes != NO_TIMEOUT && self.timeout_minutes <= 0 {
            return invalid("timeout_minutes must be positive or -1");
        }
        if self.transfers.txs_per_round.min > self.transfers.txs_per_round.max
            || self.transfers.amount.min > self.transfers.amount.max
        {
            return invalid("transfer ranges must have min <= max");
        }
        Ok(())
    }

    /// Validate the topic workload parameters.
    pub fn validate_stress(&self) -> Result<(), Error> {
        if self.num_topics == 0 || self.workers_per_topic == 0 || self.reputers_per_topic == 0 {
            return Err(Error::Config(
                "num_topics, workers_per_topic, and reputers_per_topic must be positive".into(),
            ));
        }
        Ok(())
    }

    /// Validate the transfer workload parameters.
    pub fn validate_transfers(&self) -> Result<(), Error> {
        if self.transfers.num_actors < 2 {
            return Err(Error::Config("transfers need at least two actors".into()));
        }
        if self.transfers.amount.min == 0 {
            return Err(Error::Config("transfer amount must be positive".into()));
        }
        Ok(())
    }

    /// Global timeout, if enabled.
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.timeout_minutes)
            .ok()
            .map(|minutes| Duration::from_secs(minutes.saturating_mul(60)))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    /// Number of actors the topic workload needs.
    pub fn stress_actors(&self) -> usize {
        (self.workers_per_topic + self.reputers_per_topic) * self.num_topics
    }

    pub fn builder(&self) -> swarm_tx::builder::Config {
        swarm_tx::builder::Config {
            chain_id: self.chain.clone(),
            denom: self.denom.clone(),
            gas_per_byte: self.gas.per_byte,
            base_gas: self.gas.base,
            gas_adjustment: self.gas.adjustment,
        }
    }

    pub fn policy(&self) -> swarm_tx::retry::Policy {
        swarm_tx::retry::Policy {
            max_retries: self.retry.max_retries,
            base_delay: Duration::from_millis(self.retry.base_delay_ms),
        }
    }

    pub fn price(&self) -> swarm_tx::price::Config {
        swarm_tx::price::Config {
            denom: self.denom.clone(),
            interval: Duration::from_millis(self.gas.price_interval_ms),
        }
    }

    pub fn http(&self) -> swarm_chain::http::Config {
        swarm_chain::http::Config {
            rpc: self.nodes.rpc[0].clone(),
            api: self.nodes.api.clone(),
            timeout: swarm_chain::http::DEFAULT_TIMEOUT,
        }
    }
}
