//! Submit a payload for every registered actor each time a topic opens a submission window.

use crate::{
    actor::Actor,
    metrics::{Metrics, RoleLabel},
    payload,
    registry::{Registry, Role},
    Error,
};
use rand::{rngs::StdRng, SeedableRng};
use std::{
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use swarm_chain::Client;
use swarm_tx::proto::{Any, Msg};
use swarm_utils::signal::Signal;
use tokio::{sync::Semaphore, time::Instant};
use tracing::{debug, info, trace, warn};

/// Completed submissions between progress reports.
pub const PROGRESS_INTERVAL: usize = 1_000;

/// Configuration for a [Loop].
#[derive(Clone, Debug)]
pub struct Config {
    pub topic: u64,
    pub role: Role,

    /// Time between window queries.
    pub poll_interval: Duration,

    /// Maximum concurrent submissions.
    pub fanout: usize,
}

/// Polls one (topic, role) for newly opened windows.
pub struct Loop<C: Client> {
    client: C,
    registry: Registry,
    topic: u64,
    role: Role,
    poll_interval: Duration,
    permits: Arc<Semaphore>,

    /// Height of the latest window acted upon.
    watermark: i64,
    rng: StdRng,

    metrics: Metrics,
    shutdown: Signal,
}

impl<C: Client> Loop<C> {
    pub fn new(
        client: C,
        registry: Registry,
        cfg: Config,
        metrics: Metrics,
        shutdown: Signal,
    ) -> Self {
        Self {
            client,
            registry,
            topic: cfg.topic,
            role: cfg.role,
            poll_interval: cfg.poll_interval,
            permits: Arc::new(Semaphore::new(cfg.fanout)),
            watermark: 0,
            rng: StdRng::from_entropy(),
            metrics,
            shutdown,
        }
    }

    /// Human-readable name of this loop.
    pub fn label(&self) -> String {
        format!("{} loop for topic {}", self.role, self.topic)
    }

    /// Poll until shutdown.
    ///
    /// Returns an error only if data needed for an opened window cannot be fetched.
    pub async fn run(mut self) -> Result<(), Error> {
        info!(topic = self.topic, role = %self.role, "starting loop");
        let mut shutdown = self.shutdown.clone();
        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!(topic = self.topic, role = %self.role, "shutdown");
                    return Ok(());
                },
                result = self.poll() => result?,
            }
            tokio::select! {
                _ = &mut shutdown => {
                    debug!(topic = self.topic, role = %self.role, "shutdown");
                    return Ok(());
                },
                _ = tokio::time::sleep(self.poll_interval) => {},
            }
        }
    }

    async fn window(&self) -> Result<Option<i64>, swarm_chain::Error> {
        match self.role {
            Role::Worker => self.client.worker_window(self.topic).await,
            Role::Reputer => self.client.reputer_window(self.topic).await,
        }
    }

    async fn poll(&mut self) -> Result<(), Error> {
        let (topic, role) = (self.topic, self.role);
        let height = match self.window().await {
            Ok(Some(height)) => height,
            Ok(None) => {
                trace!(topic, %role, "no open window");
                return Ok(());
            }
            Err(err) => {
                warn!(?err, topic, %role, "failed to query window");
                self.metrics
                    .poll_failures
                    .get_or_create(&RoleLabel { role })
                    .inc();
                return Ok(());
            }
        };
        if height <= self.watermark {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.watermark, height);
        self.metrics.windows.get_or_create(&RoleLabel { role }).inc();

        let members = self.registry.members(topic, role);
        info!(topic, %role, height, members = members.len(), "window opened");
        let payloads = match role {
            Role::Worker => {
                // Forecasts target whoever inferred in the previous window
                let inferers = if previous > 0 {
                    self.client.active_workers(topic, previous).await?
                } else {
                    Vec::new()
                };
                members
                    .into_iter()
                    .map(|actor| {
                        let msg = payload::worker(
                            &mut self.rng,
                            &actor.key,
                            &actor.address,
                            topic,
                            height,
                            &inferers,
                        );
                        (actor, msg.to_any())
                    })
                    .collect()
            }
            Role::Reputer => {
                let active = self.client.active_workers(topic, height).await?;
                let network = self.client.network_inferences(topic, height).await?;
                members
                    .into_iter()
                    .map(|actor| {
                        let msg = payload::reputer(
                            &mut self.rng,
                            &actor.key,
                            &actor.address,
                            topic,
                            height,
                            &active,
                            &network,
                        );
                        (actor, msg.to_any())
                    })
                    .collect()
            }
        };
        self.burst(height, payloads);
        Ok(())
    }

    /// Submit every payload without waiting for the submissions to complete.
    fn burst(&self, height: i64, payloads: Vec<(Actor, Any)>) {
        let (topic, role) = (self.topic, self.role);
        let total = payloads.len();
        if total == 0 {
            debug!(topic, %role, height, "no members to submit for");
            return;
        }
        let completed = Arc::new(AtomicUsize::new(0));
        let start = Instant::now();
        for (actor, msg) in payloads {
            let permits = self.permits.clone();
            let completed = completed.clone();
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                let Ok(_permit) = permits.acquire_owned().await else {
                    return;
                };
                let result = actor.submit(vec![msg], false).await;
                match &result {
                    Ok(submitted) => trace!(
                        name = %actor.name,
                        topic,
                        %role,
                        height,
                        sequence = submitted.sequence,
                        "submitted payload"
                    ),
                    Err(err) => warn!(
                        name = %actor.name,
                        ?err,
                        topic,
                        %role,
                        height,
                        "failed to submit payload"
                    ),
                }
                metrics.payload(role, result.is_ok());

                let count = completed.fetch_add(1, Ordering::Relaxed) + 1;
                if count % PROGRESS_INTERVAL == 0 || count == total {
                    info!(
                        topic,
                        %role,
                        height,
                        completed = count,
                        total,
                        elapsed = ?start.elapsed(),
                        "burst progress"
                    );
                }
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::tests::{identities, launcher};
    use prost::Message;
    use swarm_chain::{mocks, NetworkInferences};
    use swarm_tx::{
        msgs::emissions::{InsertReputerPayloadRequest, InsertWorkerPayloadRequest},
        proto::{TxBody, TxRaw},
    };
    use swarm_utils::signal::Signaler;

    const TOPIC: u64 = 1;

    async fn register(chain: &mocks::Chain, shutdown: &Signal, role: Role, count: usize) -> Registry {
        let launcher = launcher(chain, shutdown.clone());
        let registry = Registry::default();
        for identity in identities(chain, 0, count) {
            registry.add(TOPIC, role, launcher.launch(identity).await.unwrap());
        }
        registry
    }

    fn config(role: Role) -> Config {
        Config {
            topic: TOPIC,
            role,
            poll_interval: Duration::from_secs(4),
            fanout: 2,
        }
    }

    fn type_urls(chain: &mocks::Chain) -> Vec<String> {
        chain
            .broadcasts()
            .iter()
            .map(|tx| {
                let raw = TxRaw::decode(tx.as_ref()).unwrap();
                let body = TxBody::decode(raw.body_bytes.as_slice()).unwrap();
                body.messages[0].type_url.clone()
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_window_fanout_once() {
        let chain = mocks::Chain::new();
        let (signaler, signal) = Signaler::new();
        let registry = register(&chain, &signal, Role::Worker, 3).await;
        let metrics = Metrics::default();
        let topic = Loop::new(
            chain.clone(),
            registry,
            config(Role::Worker),
            metrics.clone(),
            signal.clone(),
        );
        assert_eq!(topic.label(), "worker loop for topic 1");
        let handle = tokio::spawn(topic.run());

        // Nothing open yet
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(chain.broadcasts().is_empty());

        // Window opens
        chain.set_worker_window(TOPIC, 10);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(chain.broadcasts().len(), 3);

        // Re-polling the same height does nothing
        tokio::time::sleep(Duration::from_secs(12)).await;
        assert_eq!(chain.broadcasts().len(), 3);

        // Next window
        chain.set_worker_window(TOPIC, 20);
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(chain.broadcasts().len(), 6);
        assert!(type_urls(&chain)
            .iter()
            .all(|url| url == InsertWorkerPayloadRequest::TYPE_URL));
        assert_eq!(
            metrics
                .windows
                .get_or_create(&RoleLabel { role: Role::Worker })
                .get(),
            2
        );

        drop(signal);
        let _completion = signaler.signal();
        handle.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_reputer_window() {
        let chain = mocks::Chain::new();
        let (_signaler, signal) = Signaler::new();
        let registry = register(&chain, &signal, Role::Reputer, 2).await;
        chain.set_reputer_window(TOPIC, 30);
        chain.set_active_workers(TOPIC, 30, vec!["allo1worker".into()]);
        chain.set_network_inferences(TOPIC, 30, NetworkInferences::default());
        let metrics = Metrics::default();
        tokio::spawn(
            Loop::new(
                chain.clone(),
                registry,
                config(Role::Reputer),
                metrics.clone(),
                signal,
            )
            .run(),
        );

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(
            type_urls(&chain),
            vec![InsertReputerPayloadRequest::TYPE_URL.to_string(); 2]
        );

        // Successful submissions are counted once each
        let successes = metrics
            .payloads
            .get_or_create(&crate::metrics::PayloadLabel {
                role: Role::Reputer,
                status: crate::metrics::Status::Success,
            })
            .get();
        assert_eq!(successes, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_window_query_failures_are_retried() {
        let chain = mocks::Chain::new();
        let (_signaler, signal) = Signaler::new();
        let registry = register(&chain, &signal, Role::Worker, 1).await;
        chain.set_worker_window(TOPIC, 10);
        chain.fail_windows(2);
        let metrics = Metrics::default();
        tokio::spawn(
            Loop::new(
                chain.clone(),
                registry,
                config(Role::Worker),
                metrics.clone(),
                signal,
            )
            .run(),
        );

        // Queries at 0s and 4s fail
        tokio::time::sleep(Duration::from_secs(6)).await;
        assert_eq!(chain.window_queries(), 2);
        assert!(chain.broadcasts().is_empty());
        assert_eq!(
            metrics
                .poll_failures
                .get_or_create(&RoleLabel { role: Role::Worker })
                .get(),
            2
        );

        // Query at 8s succeeds
        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(chain.window_queries(), 3);
        assert_eq!(chain.broadcasts().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_inference_query_failure_is_fatal() {
        let chain = mocks::Chain::new();
        let (_signaler, signal) = Signaler::new();
        let registry = register(&chain, &signal, Role::Reputer, 1).await;
        chain.set_reputer_window(TOPIC, 10);
        chain.fail_inferences(1);

        let result = Loop::new(
            chain.clone(),
            registry,
            config(Role::Reputer),
            Metrics::default(),
            signal,
        )
        .run()
        .await;
        assert!(matches!(result, Err(Error::Chain(_))));
        assert!(chain.broadcasts().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_two_topics_act_independently() {
        let chain = mocks::Chain::new();
        let (_signaler, signal) = Signaler::new();
        let launcher = launcher(&chain, signal.clone());
        let registry = Registry::default();
        for (index, identity) in identities(&chain, 5, 4).into_iter().enumerate() {
            let topic = if index < 2 { 1 } else { 2 };
            registry.add(topic, Role::Worker, launcher.launch(identity).await.unwrap());
        }
        chain.set_worker_window(1, 10);
        chain.set_worker_window(2, 10);
        for topic in [1, 2] {
            let cfg = Config {
                topic,
                ..config(Role::Worker)
            };
            tokio::spawn(
                Loop::new(
                    chain.clone(),
                    registry.clone(),
                    cfg,
                    Metrics::default(),
                    signal.clone(),
                )
                .run(),
            );
        }

        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(chain.broadcasts().len(), 4);
    }
}
