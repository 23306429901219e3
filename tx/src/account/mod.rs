//! Per-actor sequencer that exclusively owns an account's sequence.
//!
//! Every submission for an account goes through its [Mailbox] and is handled by the [Engine]
//! one at a time, so the sequence a transaction is signed at is always the one the previous
//! submission left behind.

mod engine;
pub use engine::Engine;
mod ingress;
pub use ingress::{Mailbox, Message};

/// Auth state of an account, as tracked locally.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AccountState {
    pub account_number: u64,
    /// Sequence the next transaction must be signed at.
    pub sequence: u64,
}

impl From<swarm_chain::Account> for AccountState {
    fn from(account: swarm_chain::Account) -> Self {
        Self {
            account_number: account.account_number,
            sequence: account.sequence,
        }
    }
}

/// Configuration for the [Engine].
#[derive(Clone, Debug)]
pub struct Config {
    /// Name of the actor, used in logs.
    pub name: String,

    /// Number of submissions that can be queued before callers wait.
    pub mailbox_size: usize,
}
