//! Topic workload: workers and reputers submitting payloads on every window.

use crate::{
    actor::{Actor, Identity},
    config::Config,
    orchestrator::{self, Orchestrator},
    registry::{Registry, Role},
    setup::{self, Environment},
    topic::{self, Loop},
    Error,
};
use rand::{
    rngs::{OsRng, StdRng},
    SeedableRng,
};
use swarm_chain::Client;
use swarm_utils::signal::Signaler;
use tracing::info;

/// Set up topics and actors, then run one loop per (topic, role) until the first fatal error
/// or the timeout.
pub async fn run<C: Client>(cfg: Config, client: C, mnemonic: &str) -> Result<(), Error> {
    cfg.validate_stress()?;
    let (signaler, shutdown) = Signaler::new();
    let env = Environment::init(&cfg, client.clone(), mnemonic, shutdown.clone()).await?;

    let identities = (0..cfg.stress_actors())
        .map(|index| Identity::generate(&mut OsRng, index, &cfg.prefix))
        .collect::<Result<Vec<_>, _>>()?;
    let actors = env.populate(&cfg, identities).await?;

    if let Some(value) = cfg.max_samples_to_scale_scores {
        setup::update_params(&env.faucet, value).await?;
    }
    let topics =
        setup::create_topics(&client, &env.faucet, &cfg, &mut StdRng::from_entropy()).await?;

    // Each topic gets its own slice of actors, reputers first
    let registry = Registry::default();
    let mut actors = actors.into_iter();
    for &topic in &topics {
        let reputers: Vec<Actor> = actors.by_ref().take(cfg.reputers_per_topic).collect();
        let workers: Vec<Actor> = actors.by_ref().take(cfg.workers_per_topic).collect();
        setup::register(
            reputers,
            topic,
            Role::Reputer,
            &registry,
            cfg.fanout,
            &env.metrics,
        )
        .await;
        setup::register(
            workers,
            topic,
            Role::Worker,
            &registry,
            cfg.fanout,
            &env.metrics,
        )
        .await;
    }
    setup::fund_topics(&env.faucet, &topics).await?;

    let mut orchestrator = Orchestrator::new(
        orchestrator::Config {
            timeout: cfg.timeout(),
            grace: cfg.grace(),
            capacity: 2 * topics.len(),
        },
        signaler,
    );
    orchestrator.watch(env.monitor.start());
    if let Some(server) = env.server {
        orchestrator.watch(server);
    }
    for &topic in &topics {
        for role in [Role::Worker, Role::Reputer] {
            let topic_loop = Loop::new(
                client.clone(),
                registry.clone(),
                topic::Config {
                    topic,
                    role,
                    poll_interval: cfg.poll_interval(),
                    fanout: cfg.fanout,
                },
                env.metrics.clone(),
                shutdown.clone(),
            );
            orchestrator.spawn(topic_loop.label(), topic_loop.run());
        }
    }
    info!(topics = topics.len(), "started loops");
    orchestrator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::tests::{chain, config, messages, MNEMONIC};
    use std::time::Duration;
    use swarm_tx::{
        msgs::emissions::{
            AddStakeRequest, CreateNewTopicRequest, FundTopicRequest, InsertReputerPayloadRequest,
            InsertWorkerPayloadRequest, RegisterRequest,
        },
        proto::Msg,
    };
    use tokio::time::Instant;

    fn count(chain: &swarm_chain::mocks::Chain, type_url: &str) -> usize {
        messages(chain)
            .iter()
            .flatten()
            .filter(|msg| msg.type_url == type_url)
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_stress_until_timeout() {
        let chain = chain(1_000_000);
        chain.set_auto_accounts(true);
        for topic in [1, 2] {
            chain.set_worker_window(topic, 24);
            chain.set_reputer_window(topic, 12);
        }
        let mut cfg = config();
        cfg.create_topics_same_block = true;
        cfg.timeout_minutes = 1;

        let start = Instant::now();
        let result = run(cfg, chain.clone(), MNEMONIC).await;
        assert!(matches!(result, Err(Error::Timeout(timeout)) if timeout == Duration::from_secs(60)));
        assert!(start.elapsed() >= Duration::from_secs(60));

        // Two topics with three workers and two reputers each
        assert_eq!(count(&chain, CreateNewTopicRequest::TYPE_URL), 2);
        assert_eq!(count(&chain, FundTopicRequest::TYPE_URL), 2);
        assert_eq!(count(&chain, RegisterRequest::TYPE_URL), 10);
        assert_eq!(count(&chain, AddStakeRequest::TYPE_URL), 4);

        // Each window is acted upon exactly once despite repeated polling
        assert_eq!(count(&chain, InsertWorkerPayloadRequest::TYPE_URL), 6);
        assert_eq!(count(&chain, InsertReputerPayloadRequest::TYPE_URL), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stress_setup_failure() {
        let chain = chain(1);
        chain.set_auto_accounts(true);
        let result = run(config(), chain.clone(), MNEMONIC).await;
        assert!(matches!(result, Err(Error::InsufficientFunds { .. })));
        assert!(chain.broadcasts().is_empty());
    }

    #[tokio::test]
    async fn test_stress_rejects_empty_topics() {
        let mut cfg = config();
        cfg.num_topics = 0;
        let result = run(cfg, chain(1_000_000), MNEMONIC).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
