//! Bank transfer workload: actors send random amounts to each other in rounds.

use crate::{
    actor::{Actor, Identity},
    config::{Config, Range, TransfersConfig},
    metrics::Metrics,
    orchestrator::{self, Orchestrator},
    setup::{self, Environment},
    Error,
};
use futures::future::join_all;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::time::Duration;
use swarm_chain::Client;
use swarm_tx::{
    msgs::bank::MsgSend,
    proto::{Coin, Msg},
};
use swarm_utils::signal::{Signal, Signaler};
use tracing::{debug, info, warn};

/// Pause before retrying when no actor can afford a transfer.
pub const IDLE: Duration = Duration::from_secs(10);

/// A planned transfer between two actors (by index).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Transfer {
    pub from: usize,
    pub to: usize,
    pub amount: u128,
}

/// Local view of actor balances.
///
/// Planned transfers are debited immediately and credited to the recipient once delivered, so a
/// round never spends funds that have not landed.
#[derive(Clone, Debug)]
pub struct Ledger {
    balances: Vec<u128>,
}

impl Ledger {
    pub fn new(balances: Vec<u128>) -> Self {
        Self { balances }
    }

    #[cfg(test)]
    pub fn balance(&self, actor: usize) -> u128 {
        self.balances[actor]
    }

    /// Sum of all balances, excluding funds in flight.
    #[cfg(test)]
    pub fn total(&self) -> u128 {
        self.balances.iter().sum()
    }

    /// Plan up to `count` transfers, each from a different sender holding more than the amount.
    pub fn plan<R: Rng>(&mut self, rng: &mut R, count: u64, amount: &Range) -> Vec<Transfer> {
        let actors = self.balances.len();
        if actors < 2 {
            return Vec::new();
        }
        let mut senders: Vec<usize> = (0..actors).collect();
        senders.shuffle(rng);

        let mut transfers = Vec::new();
        for _ in 0..count {
            let amount = u128::from(amount.sample(rng));
            let Some(position) = senders
                .iter()
                .position(|&sender| self.balances[sender] > amount)
            else {
                continue;
            };
            let from = senders.remove(position);
            let mut to = rng.gen_range(0..actors - 1);
            if to >= from {
                to += 1;
            }
            self.balances[from] -= amount;
            transfers.push(Transfer { from, to, amount });
        }
        transfers
    }

    /// Credit the recipient of a delivered transfer or refund the sender of a failed one.
    pub fn settle(&mut self, transfer: &Transfer, delivered: bool) {
        let actor = if delivered {
            transfer.to
        } else {
            transfer.from
        };
        self.balances[actor] = self.balances[actor].saturating_add(transfer.amount);
    }
}

/// Sends rounds of transfers until shutdown.
pub struct Workload {
    actors: Vec<Actor>,
    ledger: Ledger,
    rng: StdRng,
    cfg: TransfersConfig,
    denom: String,
    metrics: Metrics,
    shutdown: Signal,
}

impl Workload {
    pub fn new(
        actors: Vec<Actor>,
        ledger: Ledger,
        cfg: TransfersConfig,
        denom: String,
        metrics: Metrics,
        shutdown: Signal,
    ) -> Self {
        Self {
            actors,
            ledger,
            rng: StdRng::from_entropy(),
            cfg,
            denom,
            metrics,
            shutdown,
        }
    }

    pub async fn run(mut self) -> Result<(), Error> {
        info!(actors = self.actors.len(), "starting transfers");
        let mut shutdown = self.shutdown.clone();
        let mut round: u64 = 0;
        loop {
            let count = self.cfg.txs_per_round.sample(&mut self.rng);
            let transfers = self.ledger.plan(&mut self.rng, count, &self.cfg.amount);
            if transfers.is_empty() {
                warn!(count, "no actor can afford a transfer");
                tokio::select! {
                    _ = &mut shutdown => return Ok(()),
                    _ = tokio::time::sleep(IDLE) => continue,
                }
            }
            round += 1;

            let sends = transfers.iter().map(|transfer| {
                let sender = self.actors[transfer.from].clone();
                let msg = MsgSend {
                    from_address: sender.address.clone(),
                    to_address: self.actors[transfer.to].address.clone(),
                    amount: vec![Coin::new(&self.denom, transfer.amount)],
                };
                async move { sender.submit(vec![msg.to_any()], true).await }
            });
            let results = tokio::select! {
                _ = &mut shutdown => return Ok(()),
                results = join_all(sends) => results,
            };

            let mut delivered = 0;
            for (transfer, result) in transfers.iter().zip(results) {
                let result = match result {
                    Ok(submitted) => setup::executed(submitted),
                    Err(err) => Err(err.into()),
                };
                match result {
                    Ok(submitted) => {
                        debug!(
                            from = %self.actors[transfer.from].name,
                            to = %self.actors[transfer.to].name,
                            amount = transfer.amount,
                            hash = %submitted.broadcast.hash,
                            "transferred"
                        );
                        self.ledger.settle(transfer, true);
                        self.metrics.transfers.inc();
                        delivered += 1;
                    }
                    Err(err) => {
                        warn!(
                            from = %self.actors[transfer.from].name,
                            amount = transfer.amount,
                            ?err,
                            "transfer failed"
                        );
                        self.ledger.settle(transfer, false);
                    }
                }
            }
            info!(round, planned = transfers.len(), delivered, "completed round");
        }
    }
}

/// Fund a seeded set of actors, then run transfer rounds until the timeout.
pub async fn run<C: Client>(cfg: Config, client: C, mnemonic: &str) -> Result<(), Error> {
    cfg.validate_transfers()?;
    let (signaler, shutdown) = Signaler::new();
    let env = Environment::init(&cfg, client.clone(), mnemonic, shutdown.clone()).await?;

    let mut rng = StdRng::seed_from_u64(cfg.transfers.seed);
    let identities = (0..cfg.transfers.num_actors)
        .map(|index| Identity::generate(&mut rng, index, &cfg.prefix))
        .collect::<Result<Vec<_>, _>>()?;
    let actors = env.populate(&cfg, identities).await?;
    let mut balances = Vec::with_capacity(actors.len());
    for actor in &actors {
        balances.push(client.balance(&actor.address, &cfg.denom).await?);
    }

    let mut orchestrator = Orchestrator::new(
        orchestrator::Config {
            timeout: cfg.timeout(),
            grace: cfg.grace(),
            capacity: 2,
        },
        signaler,
    );
    orchestrator.watch(env.monitor.start());
    if let Some(server) = env.server {
        orchestrator.watch(server);
    }
    let workload = Workload::new(
        actors,
        Ledger::new(balances),
        cfg.transfers.clone(),
        cfg.denom.clone(),
        env.metrics.clone(),
        shutdown,
    );
    orchestrator.spawn("transfers".into(), workload.run());
    orchestrator.run().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setup::tests::{chain, config, messages, MNEMONIC};
    use prost::Message;

    fn fixed(amount: u64) -> Range {
        Range {
            min: amount,
            max: amount,
        }
    }

    #[test]
    fn test_plan_single_funded_actor() {
        let mut ledger = Ledger::new(vec![100, 0, 0]);
        let mut rng = StdRng::seed_from_u64(0);

        // Only one sender can afford a transfer, and each sender sends at most once per round
        let transfers = ledger.plan(&mut rng, 5, &fixed(10));
        assert_eq!(transfers.len(), 1);
        assert_eq!(transfers[0].from, 0);
        assert_ne!(transfers[0].to, 0);
        assert_eq!(ledger.balance(0), 90);

        // Funds are not spendable until delivered
        assert_eq!(ledger.total(), 90);
        ledger.settle(&transfers[0], true);
        assert_eq!(ledger.total(), 100);
        assert_eq!(ledger.balance(transfers[0].to), 10);
    }

    #[test]
    fn test_plan_requires_more_than_amount() {
        let mut ledger = Ledger::new(vec![10, 10]);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(ledger.plan(&mut rng, 3, &fixed(10)).is_empty());
        assert!(Ledger::new(vec![1_000])
            .plan(&mut rng, 3, &fixed(1))
            .is_empty());
    }

    #[test]
    fn test_failed_transfer_is_refunded() {
        let mut ledger = Ledger::new(vec![50, 50]);
        let mut rng = StdRng::seed_from_u64(2);
        let transfers = ledger.plan(&mut rng, 2, &fixed(20));
        assert_eq!(transfers.len(), 2);
        for transfer in &transfers {
            ledger.settle(transfer, false);
        }
        assert_eq!(ledger.balance(0), 50);
        assert_eq!(ledger.balance(1), 50);
    }

    #[test]
    fn test_plan_conserves_funds() {
        let mut ledger = Ledger::new(vec![1_000; 8]);
        let mut rng = StdRng::seed_from_u64(3);
        for round in 0..200 {
            let amount = Range { min: 1, max: 300 };
            for transfer in ledger.plan(&mut rng, 5, &amount) {
                assert_ne!(transfer.from, transfer.to);
                ledger.settle(&transfer, round % 3 != 0);
            }
            assert_eq!(ledger.total(), 8_000);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transfers_until_timeout() {
        let chain = chain(1_000_000);
        chain.set_auto_accounts(true);
        chain.set_inclusion_delay(1);
        let mut cfg = config();
        cfg.timeout_minutes = 1;
        cfg.transfers = TransfersConfig {
            num_actors: 3,
            seed: 9,
            txs_per_round: Range { min: 1, max: 3 },
            amount: Range { min: 1, max: 10 },
        };

        // Actors are derived from the seed, so their balances can be set up front
        let mut rng = StdRng::seed_from_u64(9);
        let mut addresses = Vec::new();
        for index in 0..3 {
            let identity = Identity::generate(&mut rng, index, "allo").unwrap();
            chain.set_balance(&identity.address, 1_000);
            addresses.push(identity.address);
        }

        let result = run(cfg, chain.clone(), MNEMONIC).await;
        assert!(matches!(result, Err(Error::Timeout(_))));

        let sends: Vec<MsgSend> = messages(&chain)
            .iter()
            .flatten()
            .filter(|msg| msg.type_url == MsgSend::TYPE_URL)
            .map(|msg| MsgSend::decode(msg.value.as_slice()).unwrap())
            .collect();
        assert!(!sends.is_empty());
        for send in sends {
            assert!(addresses.contains(&send.from_address));
            assert!(addresses.contains(&send.to_address));
            assert_ne!(send.from_address, send.to_address);
            let amount: u128 = send.amount[0].amount.parse().unwrap();
            assert!((1..=10).contains(&amount));
        }
    }

    #[tokio::test]
    async fn test_transfers_need_two_actors() {
        let mut cfg = config();
        cfg.transfers.num_actors = 1;
        let result = run(cfg, chain(1_000_000), MNEMONIC).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
