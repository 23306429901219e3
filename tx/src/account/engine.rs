use super::{
    ingress::{Mailbox, Message},
    AccountState, Config,
};
use crate::{
    metrics::{Metrics, Outcome},
    proto::Any,
    retry::{Coordinator, Submitted},
    Error,
};
use futures::{channel::mpsc, StreamExt};
use std::sync::Arc;
use swarm_chain::Client;
use swarm_keys::PrivateKey;
use swarm_utils::signal::Signal;
use tokio::{task::JoinHandle, time::Instant};
use tracing::{debug, warn};

/// Processes submissions for a single account, one at a time.
pub struct Engine<C: Client> {
    name: String,
    coordinator: Coordinator<C>,
    key: Arc<PrivateKey>,
    mailbox: mpsc::Receiver<Message>,
    shutdown: Signal,

    state: AccountState,

    metrics: Metrics,
}

impl<C: Client> Engine<C> {
    /// Creates a new engine for the account controlled by `key`, starting at `state`.
    ///
    /// Returns a tuple of the engine and the mailbox for submitting transactions.
    pub fn new(
        cfg: Config,
        coordinator: Coordinator<C>,
        key: Arc<PrivateKey>,
        state: AccountState,
        metrics: Metrics,
        shutdown: Signal,
    ) -> (Self, Mailbox) {
        let (sender, receiver) = mpsc::channel(cfg.mailbox_size);
        (
            Self {
                name: cfg.name,
                coordinator,
                key,
                mailbox: receiver,
                shutdown,
                state,
                metrics,
            },
            Mailbox::new(sender),
        )
    }

    /// Starts the engine.
    ///
    /// The engine exits once shutdown is signaled or every [Mailbox] is dropped.
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(mut self) {
        loop {
            tokio::select! {
                _ = &mut self.shutdown => {
                    debug!(name = %self.name, "shutdown");
                    return;
                },
                message = self.mailbox.next() => {
                    let Some(message) = message else {
                        debug!(name = %self.name, "mailbox closed");
                        return;
                    };
                    match message {
                        Message::Submit { msgs, wait, responder } => {
                            let result = self.submit(msgs, wait).await;
                            let _ = responder.send(result);
                        }
                        Message::State { responder } => {
                            let _ = responder.send(self.state);
                        }
                    }
                },
            }
        }
    }

    async fn submit(&mut self, msgs: Vec<Any>, wait: bool) -> Result<Submitted, Error> {
        let start = Instant::now();
        let result = self
            .coordinator
            .submit(&self.key, &msgs, self.state, wait, &mut self.shutdown)
            .await;
        self.metrics
            .latency
            .observe(start.elapsed().as_secs_f64());

        let outcome = match &result {
            Ok(submitted) => {
                self.state.sequence = submitted.next;
                Outcome::Success
            }
            Err(err) => {
                if let Some(sequence) = err.sequence() {
                    self.state.sequence = sequence;
                }
                warn!(name = %self.name, ?err, sequence = self.state.sequence, "submission failed");
                match err {
                    Error::Rejected { .. } => Outcome::Rejected,
                    Error::Exhausted { .. } => Outcome::Exhausted,
                    Error::Canceled | Error::Closed => Outcome::Canceled,
                    Error::Validation(_) | Error::Chain(_) => Outcome::Invalid,
                }
            }
        };
        self.metrics.outcome(outcome);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        broadcaster::Broadcaster,
        builder::{self, Builder},
        metrics::OutcomeLabel,
        msgs::bank::MsgSend,
        price::GasPrice,
        proto::{Coin, Msg, TxRaw},
        retry::Policy,
    };
    use rand::{rngs::StdRng, SeedableRng};
    use std::time::Duration;
    use swarm_chain::mocks;
    use swarm_utils::signal::Signaler;

    fn engine(
        chain: &mocks::Chain,
        sequence: u64,
        metrics: Metrics,
        shutdown: Signal,
    ) -> (Engine<mocks::Chain>, Mailbox) {
        let builder = Builder::new(
            builder::Config {
                chain_id: "testnet".into(),
                denom: "uallo".into(),
                gas_per_byte: 10,
                base_gas: 100_000,
                gas_adjustment: 0.0,
            },
            GasPrice::new(0.01),
        );
        let coordinator = Coordinator::new(
            builder,
            Broadcaster::new(chain.clone()),
            Policy::default(),
            metrics.clone(),
        );
        let key = PrivateKey::generate(&mut StdRng::seed_from_u64(7));
        Engine::new(
            Config {
                name: "run_actor1".into(),
                mailbox_size: 16,
            },
            coordinator,
            Arc::new(key),
            AccountState {
                account_number: 1,
                sequence,
            },
            metrics,
            shutdown,
        )
    }

    fn msgs() -> Vec<Any> {
        vec![MsgSend {
            from_address: "allo1from".into(),
            to_address: "allo1to".into(),
            amount: vec![Coin::new("uallo", 1)],
        }
        .to_any()]
    }

    fn sequences(chain: &mocks::Chain) -> Vec<u64> {
        chain
            .broadcasts()
            .iter()
            .map(|tx| TxRaw::sequence(tx).unwrap())
            .collect()
    }

    fn outcomes(metrics: &Metrics, outcome: Outcome) -> u64 {
        metrics
            .submissions
            .get_or_create(&OutcomeLabel { outcome })
            .get()
    }

    #[tokio::test]
    async fn test_concurrent_callers_are_serialized() {
        let chain = mocks::Chain::new();
        let metrics = Metrics::default();
        let (_signaler, signal) = Signaler::new();
        let (engine, mailbox) = engine(&chain, 3, metrics.clone(), signal);
        engine.start();

        let mut handles = Vec::new();
        for _ in 0..20 {
            let mut mailbox = mailbox.clone();
            handles.push(tokio::spawn(
                async move { mailbox.submit(msgs(), false).await },
            ));
        }
        let mut signed = Vec::new();
        for handle in handles {
            signed.push(handle.await.unwrap().unwrap().sequence);
        }
        signed.sort_unstable();
        assert_eq!(signed, (3..23).collect::<Vec<_>>());
        assert_eq!(sequences(&chain), (3..23).collect::<Vec<_>>());

        let mut mailbox = mailbox;
        assert_eq!(mailbox.state().await.unwrap().sequence, 23);
        assert_eq!(outcomes(&metrics, Outcome::Success), 20);
    }

    #[tokio::test]
    async fn test_adopts_corrected_sequence() {
        let chain = mocks::Chain::new();
        chain.respond(32, "sdk", "account sequence mismatch, expected 7, got 5");
        let (_signaler, signal) = Signaler::new();
        let (engine, mut mailbox) = engine(&chain, 5, Metrics::default(), signal);
        engine.start();

        mailbox.submit(msgs(), false).await.unwrap();
        assert_eq!(mailbox.state().await.unwrap().sequence, 8);
        mailbox.submit(msgs(), false).await.unwrap();
        assert_eq!(sequences(&chain), vec![5, 7, 8]);
    }

    #[tokio::test]
    async fn test_rejection_keeps_sequence() {
        let chain = mocks::Chain::new();
        chain.respond(13, "sdk", "insufficient fee");
        let metrics = Metrics::default();
        let (_signaler, signal) = Signaler::new();
        let (engine, mut mailbox) = engine(&chain, 2, metrics.clone(), signal);
        engine.start();

        let err = mailbox.submit(msgs(), false).await.unwrap_err();
        assert!(matches!(err, Error::Rejected { code: 13, .. }));
        assert_eq!(mailbox.state().await.unwrap().sequence, 2);
        assert_eq!(outcomes(&metrics, Outcome::Rejected), 1);

        // Next submission reuses the sequence
        let submitted = mailbox.submit(msgs(), false).await.unwrap();
        assert_eq!(submitted.sequence, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_counted() {
        let chain = mocks::Chain::new();
        for _ in 0..6 {
            chain.respond(20, "sdk", "mempool is full");
        }
        let metrics = Metrics::default();
        let (_signaler, signal) = Signaler::new();
        let (engine, mut mailbox) = engine(&chain, 0, metrics.clone(), signal);
        engine.start();

        let err = mailbox.submit(msgs(), false).await.unwrap_err();
        assert!(matches!(err, Error::Exhausted { attempts: 6, sequence: 0, .. }));
        assert_eq!(outcomes(&metrics, Outcome::Exhausted), 1);
        assert_eq!(mailbox.state().await.unwrap().sequence, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_closes_mailbox() {
        let chain = mocks::Chain::new();
        chain.respond(20, "sdk", "mempool is full");
        let (signaler, signal) = Signaler::new();
        let (engine, mailbox) = engine(&chain, 0, Metrics::default(), signal);
        let handle = engine.start();

        // Shutdown interrupts a submission waiting on backoff
        let pending = tokio::spawn({
            let mut mailbox = mailbox.clone();
            async move { mailbox.submit(msgs(), false).await }
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        let completion = signaler.signal();
        assert!(matches!(pending.await.unwrap(), Err(Error::Canceled)));
        handle.await.unwrap();
        completion.await.unwrap();

        let mut mailbox = mailbox;
        assert!(matches!(
            mailbox.submit(msgs(), false).await,
            Err(Error::Closed)
        ));
    }

    #[tokio::test]
    async fn test_exits_when_mailboxes_dropped() {
        let chain = mocks::Chain::new();
        let (_signaler, signal) = Signaler::new();
        let (engine, mailbox) = engine(&chain, 0, Metrics::default(), signal);
        let handle = engine.start();
        drop(mailbox);
        handle.await.unwrap();
    }
}
