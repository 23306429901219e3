//! Build, sign, broadcast, and retry transactions on behalf of simulated actors.
//!
//! # Overview
//!
//! Every actor owns an [account::Engine] (a sequencer) that holds its [account::AccountState] and
//! processes submissions one at a time. A submission flows through the [builder::Builder]
//! (gas estimation, fee at the current [price::GasPrice], signing), the
//! [broadcaster::Broadcaster] (synchronous broadcast and optional wait for inclusion), and the
//! [retry::Coordinator] (classification of failures into backoff, self-healing after a sequence
//! mismatch, or a terminal error). The sequencer then adopts the sequence the coordinator
//! returns.
//!
//! Because only the sequencer touches an account's sequence, concurrent callers holding clones
//! of the same [account::Mailbox] can never issue two transactions at the same sequence.

use swarm_chain::Failure;
use thiserror::Error;

pub mod account;
pub mod broadcaster;
pub mod builder;
pub mod gas;
pub mod metrics;
pub mod msgs;
pub mod price;
pub mod proto;
pub mod retry;

/// Errors that can occur when submitting a transaction.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("invalid transaction: {0}")]
    Validation(String),
    #[error("chain error: {0}")]
    Chain(#[from] swarm_chain::Error),
    #[error("rejected with code {code} ({codespace}): {log}")]
    Rejected {
        code: u32,
        codespace: String,
        log: String,
        /// Sequence to use for the next submission.
        sequence: u64,
    },
    #[error("retries exhausted after {attempts} attempts ({last})")]
    Exhausted {
        attempts: u32,
        last: Failure,
        /// Sequence to use for the next submission.
        sequence: u64,
    },
    #[error("canceled")]
    Canceled,
    #[error("sequencer closed")]
    Closed,
}

impl Error {
    /// Sequence the account should continue from after this error, if the error carries one.
    pub fn sequence(&self) -> Option<u64> {
        match self {
            Error::Rejected { sequence, .. } | Error::Exhausted { sequence, .. } => Some(*sequence),
            _ => None,
        }
    }
}
