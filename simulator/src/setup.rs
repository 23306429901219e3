//! Bring a simulation to the point where workloads can start.
//!
//! The faucet funds freshly generated actors, creates and funds topics, and (for the topic
//! workload) every actor registers on the topic it was assigned to.

use crate::{
    actor::{Actor, Identity, Launcher},
    config::Config,
    metrics::{Metrics, RoleLabel},
    registry::{self, Role},
    telemetry, Error,
};
use futures::{stream, StreamExt, TryStreamExt};
use prometheus_client::registry::Registry;
use rand::Rng;
use std::{
    net::SocketAddr,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};
use swarm_chain::Client;
use swarm_tx::{
    broadcaster::Broadcaster,
    builder::Builder,
    msgs::{
        bank::MsgMultiSend,
        emissions::{
            AddStakeRequest, CreateNewTopicRequest, FundTopicRequest, OptionalParams,
            RegisterRequest, UpdateParamsRequest,
        },
    },
    price::{GasPrice, Monitor},
    proto::Msg,
    retry::{Coordinator, Submitted},
};
use swarm_utils::signal::Signal;
use tokio::{
    sync::Semaphore,
    task::{JoinHandle, JoinSet},
};
use tracing::{debug, info, warn};

/// Share of the faucet balance distributed to actors.
pub const FUNDING_DIVISOR: u128 = 10;

/// Amount each created topic is funded with.
pub const TOPIC_FUNDING: &str = "1000000";

/// Stake each reputer adds when registering.
pub const REPUTER_STAKE: &str = "90000";

/// Blocks a worker window stays open on created topics.
pub const WORKER_SUBMISSION_WINDOW: i64 = 10;

/// Bounds (in seconds) of the pause between topic creations.
pub const TOPIC_PAUSE: std::ops::RangeInclusive<u64> = 4..=20;

/// Registrations between progress reports.
const PROGRESS_INTERVAL: usize = 1_000;

/// Amount each of `actors` receives from a faucet holding `balance`.
pub fn prefund_amount(balance: u128, actors: usize) -> Result<u128, Error> {
    let amount = match actors {
        0 => 0,
        actors => balance / FUNDING_DIVISOR / actors as u128,
    };
    if amount == 0 {
        return Err(Error::InsufficientFunds { balance, actors });
    }
    Ok(amount)
}

/// Fail unless a transaction submitted with `wait` was included and executed.
pub(crate) fn executed(submitted: Submitted) -> Result<Submitted, Error> {
    match &submitted.included {
        Some(included) if included.code != 0 => Err(swarm_tx::Error::Rejected {
            code: included.code,
            codespace: String::new(),
            log: included.log.clone(),
            sequence: submitted.sequence,
        }
        .into()),
        Some(_) => Ok(submitted),
        None => Err(Error::Unobserved {
            hash: submitted.broadcast.hash,
        }),
    }
}

/// Shared components every workload starts from.
pub struct Environment<C: Client> {
    pub client: C,
    pub metrics: Metrics,
    pub launcher: Launcher<C>,
    pub faucet: Actor,

    /// Not started: the caller hands it to the orchestrator.
    pub monitor: Monitor<C>,

    /// Metrics server, if a port is configured.
    pub server: Option<JoinHandle<()>>,
}

impl<C: Client> Environment<C> {
    /// Register (and serve) metrics, fetch the initial gas price, and launch the faucet.
    pub async fn init(cfg: &Config, client: C, mnemonic: &str, shutdown: Signal) -> Result<Self, Error> {
        let mut registry = Registry::default();
        let metrics = Metrics::init(registry.sub_registry_with_prefix("simulator"));
        let tx_metrics = swarm_tx::metrics::Metrics::init(registry.sub_registry_with_prefix("tx"));
        let server = match cfg.metrics_port {
            Some(port) => {
                let address = SocketAddr::from(([0, 0, 0, 0], port));
                let (address, handle) = telemetry::serve(address, registry, shutdown.clone()).await?;
                info!(%address, "serving metrics");
                Some(handle)
            }
            None => None,
        };

        let price = GasPrice::default();
        let monitor = Monitor::new(
            client.clone(),
            cfg.price(),
            price.clone(),
            tx_metrics.clone(),
            shutdown.clone(),
        );
        let initial = monitor.refresh().await?;
        info!(price = initial, denom = %cfg.denom, "fetched gas price");

        let coordinator = Coordinator::new(
            Builder::new(cfg.builder(), price),
            Broadcaster::new(client.clone()),
            cfg.policy(),
            tx_metrics.clone(),
        );
        let launcher = Launcher::new(
            client.clone(),
            coordinator,
            tx_metrics,
            cfg.mailbox_size,
            shutdown,
        );
        let faucet = launcher
            .launch(Identity::faucet(mnemonic, &cfg.prefix)?)
            .await?;
        info!(address = %faucet.address, "launched faucet");

        Ok(Self {
            client,
            metrics,
            launcher,
            faucet,
            monitor,
            server,
        })
    }

    /// Fund `identities` from the faucet and launch them.
    pub async fn populate(&self, cfg: &Config, identities: Vec<Identity>) -> Result<Vec<Actor>, Error> {
        let balance = self.client.balance(&self.faucet.address, &cfg.denom).await?;
        let amount = prefund_amount(balance, identities.len())?;
        info!(balance, amount, actors = identities.len(), "funding actors");
        fund(
            &self.faucet,
            &identities,
            amount,
            &cfg.denom,
            cfg.funding_batch_size,
        )
        .await?;

        let actors = launch(&self.launcher, identities, cfg.fanout).await?;
        self.metrics.actors.set(actors.len() as i64);
        info!(actors = actors.len(), "launched actors");
        Ok(actors)
    }
}

/// Send `amount` to every target in batches of at most `batch_size` outputs.
///
/// Each batch waits for inclusion so that the accounts exist before they are launched.
pub async fn fund(
    faucet: &Actor,
    targets: &[Identity],
    amount: u128,
    denom: &str,
    batch_size: usize,
) -> Result<(), Error> {
    let mut funded = 0;
    for batch in targets.chunks(batch_size.max(1)) {
        let recipients: Vec<String> = batch
            .iter()
            .map(|identity| identity.address.clone())
            .collect();
        let msg = MsgMultiSend::uniform(&faucet.address, &recipients, denom, amount);
        let submitted = executed(faucet.submit(vec![msg.to_any()], true).await?)?;
        funded += batch.len();
        info!(
            funded,
            total = targets.len(),
            hash = %submitted.broadcast.hash,
            "funded batch"
        );
    }
    Ok(())
}

/// Start a sequencer for every identity, fetching up to `concurrency` accounts at once.
pub async fn launch<C: Client>(
    launcher: &Launcher<C>,
    identities: Vec<Identity>,
    concurrency: usize,
) -> Result<Vec<Actor>, Error> {
    stream::iter(identities)
        .map(|identity| launcher.launch(identity))
        .buffered(concurrency.max(1))
        .try_collect()
        .await
}

/// Set global parameters that must be in place before topics are created.
pub async fn update_params(faucet: &Actor, max_samples_to_scale_scores: u64) -> Result<(), Error> {
    let msg = UpdateParamsRequest {
        sender: faucet.address.clone(),
        params: Some(OptionalParams {
            max_samples_to_scale_scores: vec![max_samples_to_scale_scores],
        }),
    };
    executed(faucet.submit(vec![msg.to_any()], true).await?)?;
    info!(max_samples_to_scale_scores, "updated params");
    Ok(())
}

fn topic_request(creator: &str, index: usize, epoch_length: i64) -> CreateNewTopicRequest {
    CreateNewTopicRequest {
        creator: creator.to_string(),
        metadata: format!("Created topic {}", index + 1),
        loss_method: "mse".into(),
        epoch_length,
        ground_truth_lag: epoch_length,
        p_norm: "3".into(),
        alpha_regret: "0.1".into(),
        allow_negative: false,
        epsilon: "0.01".into(),
        worker_submission_window: WORKER_SUBMISSION_WINDOW,
        merit_sortition_alpha: "0.1".into(),
        active_inferer_quantile: "0.25".into(),
        active_forecaster_quantile: "0.25".into(),
        active_reputer_quantile: "0.25".into(),
    }
}

/// Create `cfg.num_topics` topics and return their identifiers.
///
/// Topics are either created in a single transaction or one transaction at a time with a
/// random pause in between.
pub async fn create_topics<C: Client, R: Rng>(
    client: &C,
    faucet: &Actor,
    cfg: &Config,
    rng: &mut R,
) -> Result<Vec<u64>, Error> {
    let first = client.next_topic_id().await?;
    let topics: Vec<u64> = (first..).take(cfg.num_topics).collect();
    let requests: Vec<_> = (0..cfg.num_topics)
        .map(|index| topic_request(&faucet.address, index, cfg.epoch_length).to_any())
        .collect();

    if cfg.create_topics_same_block {
        executed(faucet.submit(requests, true).await?)?;
        info!(first, count = topics.len(), "created topics in one transaction");
        return Ok(topics);
    }
    for (index, (topic, request)) in topics.iter().zip(requests).enumerate() {
        executed(faucet.submit(vec![request], true).await?)?;
        info!(topic, "created topic");
        if index + 1 < topics.len() {
            let pause = Duration::from_secs(rng.gen_range(TOPIC_PAUSE));
            debug!(?pause, "pausing before next topic");
            tokio::time::sleep(pause).await;
        }
    }
    Ok(topics)
}

/// Fund every topic from the faucet.
pub async fn fund_topics(faucet: &Actor, topics: &[u64]) -> Result<(), Error> {
    for &topic in topics {
        let msg = FundTopicRequest {
            sender: faucet.address.clone(),
            topic_id: topic,
            amount: TOPIC_FUNDING.into(),
        };
        executed(faucet.submit(vec![msg.to_any()], true).await?)?;
        info!(topic, amount = TOPIC_FUNDING, "funded topic");
    }
    Ok(())
}

/// Register `actors` on `topic` with at most `fanout` registrations in flight.
///
/// Reputers also add stake. Actors whose registration fails are logged and left out of the
/// registry. Returns the number of successful registrations.
pub async fn register(
    actors: Vec<Actor>,
    topic: u64,
    role: Role,
    registry: &registry::Registry,
    fanout: usize,
    metrics: &Metrics,
) -> usize {
    let total = actors.len();
    let permits = Arc::new(Semaphore::new(fanout.max(1)));
    let completed = Arc::new(AtomicUsize::new(0));
    let mut tasks = JoinSet::new();
    for actor in actors {
        let permits = permits.clone();
        let completed = completed.clone();
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await.ok()?;
            let mut msgs = vec![RegisterRequest {
                sender: actor.address.clone(),
                topic_id: topic,
                owner: actor.address.clone(),
                is_reputer: role == Role::Reputer,
            }
            .to_any()];
            if role == Role::Reputer {
                msgs.push(
                    AddStakeRequest {
                        sender: actor.address.clone(),
                        topic_id: topic,
                        amount: REPUTER_STAKE.into(),
                    }
                    .to_any(),
                );
            }
            let result = match actor.submit(msgs, true).await {
                Ok(submitted) => executed(submitted),
                Err(err) => Err(err.into()),
            };

            let count = completed.fetch_add(1, Ordering::Relaxed) + 1;
            if count % PROGRESS_INTERVAL == 0 || count == total {
                info!(topic, %role, completed = count, total, "registration progress");
            }
            match result {
                Ok(_) => Some(actor),
                Err(err) => {
                    warn!(name = %actor.name, ?err, topic, %role, "failed to register");
                    None
                }
            }
        });
    }

    let mut registered = 0;
    while let Some(result) = tasks.join_next().await {
        let Ok(Some(actor)) = result else {
            continue;
        };
        registry.add(topic, role, actor);
        metrics.registrations.get_or_create(&RoleLabel { role }).inc();
        registered += 1;
    }
    info!(topic, %role, registered, total, "registered actors");
    registered
}
