//! Process-wide minimum gas price.

use crate::metrics::Metrics;
use std::{
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};
use swarm_chain::Client;
use swarm_utils::signal::Signal;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Shared handle to the current gas price.
///
/// Cloning is cheap and every clone observes the same value.
#[derive(Clone, Debug, Default)]
pub struct GasPrice {
    bits: Arc<AtomicU64>,
}

impl GasPrice {
    pub fn new(price: f64) -> Self {
        Self {
            bits: Arc::new(AtomicU64::new(price.to_bits())),
        }
    }

    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Acquire))
    }

    pub fn set(&self, price: f64) {
        self.bits.store(price.to_bits(), Ordering::Release);
    }
}

/// Configuration for the [Monitor].
#[derive(Clone, Debug)]
pub struct Config {
    /// Denomination fees are paid in.
    pub denom: String,

    /// Time between refreshes.
    pub interval: Duration,
}

/// Periodically refreshes a [GasPrice] from the chain.
pub struct Monitor<C: Client> {
    client: C,
    denom: String,
    interval: Duration,
    price: GasPrice,
    metrics: Metrics,
    shutdown: Signal,
}

impl<C: Client> Monitor<C> {
    pub fn new(client: C, cfg: Config, price: GasPrice, metrics: Metrics, shutdown: Signal) -> Self {
        Self {
            client,
            denom: cfg.denom,
            interval: cfg.interval,
            price,
            metrics,
            shutdown,
        }
    }

    /// Query the chain once and store the result.
    ///
    /// On failure the previous price is kept.
    pub async fn refresh(&self) -> Result<f64, swarm_chain::Error> {
        let price = self.client.gas_price(&self.denom).await?;
        if !price.is_finite() || price <= 0.0 {
            return Err(swarm_chain::Error::Malformed(format!(
                "invalid gas price: {price}"
            )));
        }
        self.price.set(price);
        self.metrics.gas_price.set(price);
        Ok(price)
    }

    /// Refresh on every interval until shutdown.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    debug!("shutdown");
                    return;
                },
                _ = tokio::time::sleep(self.interval) => {},
            }
            match self.refresh().await {
                Ok(price) => debug!(price, "refreshed gas price"),
                Err(err) => warn!(?err, previous = self.price.get(), "failed to refresh gas price"),
            }
        }
    }
}
