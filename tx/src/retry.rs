//! Resubmit failed transactions according to how they failed.
//!
//! Every broadcast attempt ends in exactly one of:
//!
//! * accepted: the submission succeeds and the account continues at `sequence + 1`.
//! * [Failure::SequenceMismatch]: the chain reported the sequence it expects. The transaction is
//!   rebuilt at that sequence and resubmitted immediately, once per submission.
//! * [Failure::MempoolFull], [Failure::Network], or [Failure::Unknown]: the same transaction is
//!   retried at the same sequence after a linear backoff, up to [Policy::max_retries] times.
//! * [Failure::BusinessRejection]: the transaction broke a chain rule and is never retried.

use crate::{
    account::AccountState,
    broadcaster::Broadcaster,
    builder::Builder,
    metrics::Metrics,
    proto::Any,
    Error,
};
use std::time::Duration;
use swarm_chain::{Broadcast, Client, Failure, Included};
use swarm_keys::PrivateKey;
use swarm_utils::signal::Signal;
use tracing::{debug, info, warn};

/// Retry limits for transient failures.
#[derive(Clone, Copy, Debug)]
pub struct Policy {
    /// Number of retries after the first attempt.
    pub max_retries: u32,

    /// Delay before the first retry. Each subsequent retry waits one more multiple of it.
    pub base_delay: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(4),
        }
    }
}

impl Policy {
    /// Delay after the `n`th failed attempt (starting at 1).
    pub fn backoff(&self, n: u32) -> Duration {
        self.base_delay.saturating_mul(n)
    }
}

/// A submission accepted by the chain.
#[derive(Clone, Debug)]
pub struct Submitted {
    /// Response to the accepted broadcast.
    pub broadcast: Broadcast,
    /// Sequence the accepted transaction was signed at.
    pub sequence: u64,
    /// Sequence the account continues from.
    pub next: u64,
    /// Number of resubmissions (including a sequence correction) before acceptance.
    pub retries: u32,
    /// Block inclusion, if it was requested and observed.
    pub included: Option<Included>,
}

/// Drives a batch of messages from build to acceptance.
#[derive(Clone)]
pub struct Coordinator<C: Client> {
    builder: Builder,
    broadcaster: Broadcaster<C>,
    policy: Policy,
    metrics: Metrics,
}

impl<C: Client> Coordinator<C> {
    pub fn new(
        builder: Builder,
        broadcaster: Broadcaster<C>,
        policy: Policy,
        metrics: Metrics,
    ) -> Self {
        Self {
            builder,
            broadcaster,
            policy,
            metrics,
        }
    }

    /// Sign `msgs` as `key` starting at `state.sequence` and broadcast until accepted.
    ///
    /// If `wait` is set, also waits for block inclusion. A failed or canceled wait does not
    /// fail the submission since the sequence has already been consumed.
    pub async fn submit(
        &self,
        key: &PrivateKey,
        msgs: &[Any],
        state: AccountState,
        wait: bool,
        shutdown: &mut Signal,
    ) -> Result<Submitted, Error> {
        let mut sequence = state.sequence;
        let mut corrected = false;
        let mut retries = 0;
        let mut failed = 0;
        loop {
            let tx = self
                .builder
                .build(key, msgs, state.account_number, sequence)?;
            self.metrics.broadcasts.inc();
            let (failure, rejection) = match self.broadcaster.submit(&tx).await {
                Ok(broadcast) => match broadcast.failure() {
                    None => {
                        debug!(hash = %broadcast.hash, sequence, retries, "accepted");
                        let included = if wait {
                            self.included(&broadcast, shutdown).await
                        } else {
                            None
                        };
                        return Ok(Submitted {
                            broadcast,
                            sequence,
                            next: sequence + 1,
                            retries,
                            included,
                        });
                    }
                    Some(failure) => (failure, Some(broadcast)),
                },
                Err(err) => {
                    debug!(?err, sequence, "broadcast failed");
                    (err.failure(), None)
                }
            };
            self.metrics.failure(&failure);

            match failure {
                Failure::SequenceMismatch { expected } if !corrected => {
                    info!(sequence, expected, "correcting sequence");
                    self.metrics.corrections.inc();
                    corrected = true;
                    retries += 1;
                    sequence = expected;
                    continue;
                }
                Failure::SequenceMismatch { expected } => {
                    // Only one immediate correction per submission; later mismatches back off
                    warn!(sequence, expected, "sequence mismatch after correction");
                    sequence = expected;
                }
                Failure::BusinessRejection { code } => {
                    let (codespace, log) = rejection
                        .map(|broadcast| (broadcast.codespace, broadcast.log))
                        .unwrap_or_default();
                    warn!(code, %codespace, %log, sequence, "rejected");
                    return Err(Error::Rejected {
                        code,
                        codespace,
                        log,
                        sequence,
                    });
                }
                Failure::MempoolFull | Failure::Network | Failure::Unknown => {}
            }

            failed += 1;
            let delay = self.policy.backoff(failed);
            warn!(%failure, sequence, attempt = failed, ?delay, "retrying after backoff");
            tokio::select! {
                _ = &mut *shutdown => return Err(Error::Canceled),
                _ = tokio::time::sleep(delay) => {},
            }
            if failed > self.policy.max_retries {
                warn!(%failure, sequence, attempts = failed, "retries exhausted");
                return Err(Error::Exhausted {
                    attempts: failed,
                    last: failure,
                    sequence,
                });
            }
            retries += 1;
        }
    }

    async fn included(&self, broadcast: &Broadcast, shutdown: &mut Signal) -> Option<Included> {
        match self.broadcaster.wait(&broadcast.hash, shutdown).await {
            Ok(included) => {
                if included.code != 0 {
                    warn!(
                        hash = %broadcast.hash,
                        code = included.code,
                        log = %included.log,
                        "included with failure"
                    );
                }
                Some(included)
            }
            Err(err) => {
                warn!(?err, hash = %broadcast.hash, "failed to observe inclusion");
                None
            }
        }
    }
}
