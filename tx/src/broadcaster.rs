//! Submit signed transactions and wait for them to land in a block.

use crate::{builder::Signed, Error};
use std::time::Duration;
use swarm_chain::{Broadcast, Client, Failure, Included};
use swarm_utils::signal::Signal;
use tracing::{debug, trace};

/// Interval between block height checks while waiting for inclusion.
pub const BLOCK_INTERVAL: Duration = Duration::from_secs(1);

/// Broadcasts transactions through a [Client].
#[derive(Clone)]
pub struct Broadcaster<C: Client> {
    client: C,
    block_interval: Duration,
}

impl<C: Client> Broadcaster<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            block_interval: BLOCK_INTERVAL,
        }
    }

    /// Synchronously broadcast `tx`, returning the `CheckTx` result.
    pub async fn submit(&self, tx: &Signed) -> Result<Broadcast, swarm_chain::Error> {
        trace!(hash = %tx.hash, sequence = tx.sequence, "broadcasting");
        self.client.broadcast(tx.bytes.clone()).await
    }

    /// Wait until the transaction with `hash` is included in a block.
    ///
    /// Network errors while polling are retried after one block interval. Returns
    /// [Error::Canceled] if `shutdown` fires first.
    pub async fn wait(&self, hash: &str, shutdown: &mut Signal) -> Result<Included, Error> {
        loop {
            tokio::select! {
                _ = &mut *shutdown => {
                    debug!(hash, "stopped waiting for inclusion");
                    return Err(Error::Canceled);
                },
                result = self.lookup(hash) => {
                    if let Some(included) = result? {
                        debug!(hash, height = included.height, "included");
                        return Ok(included);
                    }
                },
            }
        }
    }

    /// Look up `hash` once, pausing for a block interval if the node is unreachable.
    async fn lookup(&self, hash: &str) -> Result<Option<Included>, swarm_chain::Error> {
        match self.poll(hash).await {
            Err(err) if err.failure() == Failure::Network => {
                debug!(?err, hash, "inclusion lookup failed");
                tokio::time::sleep(self.block_interval).await;
                Ok(None)
            }
            result => result,
        }
    }

    /// Look up `hash` once and, if it is not yet included, wait for the next block.
    async fn poll(&self, hash: &str) -> Result<Option<Included>, swarm_chain::Error> {
        if let Some(included) = self.client.transaction(hash).await? {
            return Ok(Some(included));
        }
        let start = self.client.latest_height().await?;
        loop {
            tokio::time::sleep(self.block_interval).await;
            if self.client.latest_height().await? > start {
                return Ok(None);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use swarm_chain::mocks;
    use swarm_utils::signal::Signaler;
    use tokio::time::Instant;

    fn signed(bytes: &'static [u8]) -> Signed {
        Signed {
            bytes: Bytes::from_static(bytes),
            hash: swarm_chain::tx_hash(bytes),
            sequence: 0,
            gas: 1,
            fee: 1,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_for_inclusion() {
        let chain = mocks::Chain::new();
        chain.set_inclusion_delay(3);
        let broadcaster = Broadcaster::new(chain.clone());
        let (_signaler, mut signal) = Signaler::new();

        let tx = signed(b"tx");
        let broadcast = broadcaster.submit(&tx).await.unwrap();
        assert!(broadcast.accepted());
        assert_eq!(broadcast.hash, tx.hash);

        // One block per unsuccessful lookup
        let start = Instant::now();
        broadcaster.wait(&tx.hash, &mut signal).await.unwrap();
        assert_eq!(start.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_canceled() {
        let chain = mocks::Chain::new();
        let broadcaster = Broadcaster::new(chain);
        let (signaler, mut signal) = Signaler::new();

        let waiter = tokio::spawn(async move {
            let result = broadcaster.wait("MISSING", &mut signal).await;
            drop(signal);
            result
        });
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert!(!waiter.is_finished());

        let completion = signaler.signal();
        assert!(matches!(waiter.await.unwrap(), Err(Error::Canceled)));
        completion.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_wait_survives_lookup_failures() {
        let chain = mocks::Chain::new();
        let broadcaster = Broadcaster::new(chain.clone());
        let (_signaler, mut signal) = Signaler::new();
        let tx = signed(b"tx");
        broadcaster.submit(&tx).await.unwrap();

        chain.fail_lookups(2);
        let start = Instant::now();
        let included = broadcaster.wait(&tx.hash, &mut signal).await.unwrap();
        assert_eq!(included.code, 0);
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_wait_malformed_lookup() {
        let chain = mocks::Chain::new();
        let broadcaster = Broadcaster::new(chain.clone());
        let (_signaler, mut signal) = Signaler::new();
        let tx = signed(b"tx");
        broadcaster.submit(&tx).await.unwrap();

        chain.fail_lookup(swarm_chain::Error::Malformed("eof".into()));
        assert!(matches!(
            broadcaster.wait(&tx.hash, &mut signal).await,
            Err(Error::Chain(swarm_chain::Error::Malformed(_)))
        ));
    }

    #[tokio::test]
    async fn test_submit_error() {
        let chain = mocks::Chain::new();
        chain.fail(swarm_chain::Error::Network("connection refused".into()));
        let broadcaster = Broadcaster::new(chain.clone());
        let err = broadcaster.submit(&signed(b"tx")).await.unwrap_err();
        assert_eq!(err.failure(), swarm_chain::Failure::Network);
        assert_eq!(chain.broadcasts().len(), 1);
    }
}
