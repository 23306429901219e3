//! Query and submit transactions to a Cosmos SDK chain.
//!
//! [Client] is the capability the rest of the simulator consumes: one synchronous broadcast
//! endpoint, transaction lookup by hash, and the handful of bank, auth, fee market, and
//! emissions queries needed to keep actors moving. Broadcast outcomes are classified into a
//! [Failure] at this boundary so that callers never inspect raw log text.
//!
//! [http::Http] talks to a CometBFT RPC node and a Cosmos REST gateway. [mocks::Chain] is a
//! scripted in-memory implementation for tests.

use bytes::Bytes;
use std::future::Future;
use thiserror::Error;

mod failure;
pub use failure::Failure;
pub mod http;
pub mod mocks;

/// Errors that can occur when interacting with the chain.
#[derive(Error, Debug, Clone)]
pub enum Error {
    #[error("network failure: {0}")]
    Network(String),
    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },
    #[error("rpc error {code}: {message} ({data})")]
    Rpc {
        code: i64,
        message: String,
        data: String,
    },
    #[error("malformed response: {0}")]
    Malformed(String),
}

impl Error {
    /// Classify this error for retry purposes.
    pub fn failure(&self) -> Failure {
        Failure::of_error(self)
    }
}

/// Response to a synchronous broadcast (the result of `CheckTx`).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Broadcast {
    /// Response code (`0` means accepted into the mempool).
    pub code: u32,
    /// Module that produced a non-zero code.
    pub codespace: String,
    /// Log text accompanying the response.
    pub log: String,
    /// Uppercase hex hash of the transaction.
    pub hash: String,
}

impl Broadcast {
    /// Whether the transaction was accepted.
    pub fn accepted(&self) -> bool {
        self.code == 0
    }

    /// Classify a rejected broadcast, or `None` if it was accepted.
    pub fn failure(&self) -> Option<Failure> {
        if self.accepted() {
            return None;
        }
        Some(Failure::of_rejection(self.code, &self.codespace, &self.log))
    }
}

/// A transaction found in a block.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Included {
    pub height: u64,
    /// Result code of `DeliverTx`.
    pub code: u32,
    pub log: String,
}

/// Auth module view of an account.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Account {
    pub account_number: u64,
    pub sequence: u64,
}

/// A value attributed to a single worker.
#[derive(Clone, Debug, PartialEq)]
pub struct Attributed {
    pub worker: String,
    pub value: f64,
}

/// Aggregated network inference for a topic at some height.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NetworkInferences {
    pub combined_value: f64,
    pub naive_value: f64,
    pub inferer_values: Vec<Attributed>,
}

/// Interface to a chain.
pub trait Client: Clone + Send + Sync + 'static {
    /// Submit encoded transaction bytes and wait for the `CheckTx` result.
    fn broadcast(&self, tx: Bytes) -> impl Future<Output = Result<Broadcast, Error>> + Send;

    /// Look up a transaction by hash, returning `None` if it is not (yet) in a block.
    fn transaction(
        &self,
        hash: &str,
    ) -> impl Future<Output = Result<Option<Included>, Error>> + Send;

    /// Height of the latest committed block.
    fn latest_height(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Account number and sequence of `address`.
    fn account(&self, address: &str) -> impl Future<Output = Result<Account, Error>> + Send;

    /// Balance of `address` in `denom` (zero if the account holds none).
    fn balance(
        &self,
        address: &str,
        denom: &str,
    ) -> impl Future<Output = Result<u128, Error>> + Send;

    /// Current minimum gas price in `denom`.
    fn gas_price(&self, denom: &str) -> impl Future<Output = Result<f64, Error>> + Send;

    /// Identifier the next created topic will receive.
    fn next_topic_id(&self) -> impl Future<Output = Result<u64, Error>> + Send;

    /// Height of the latest open worker submission window for `topic`, if any.
    fn worker_window(&self, topic: u64) -> impl Future<Output = Result<Option<i64>, Error>> + Send;

    /// Height of the latest open reputer submission window for `topic`, if any.
    fn reputer_window(&self, topic: u64)
        -> impl Future<Output = Result<Option<i64>, Error>> + Send;

    /// Workers that submitted an inference for `topic` at `height`.
    fn active_workers(
        &self,
        topic: u64,
        height: i64,
    ) -> impl Future<Output = Result<Vec<String>, Error>> + Send;

    /// Network inference bundle for `topic` at `height`.
    fn network_inferences(
        &self,
        topic: u64,
        height: i64,
    ) -> impl Future<Output = Result<NetworkInferences, Error>> + Send;
}

/// Uppercase hex SHA-256 of transaction bytes, the hash CometBFT indexes transactions by.
pub fn tx_hash(tx: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    swarm_utils::hex(&Sha256::digest(tx)).to_uppercase()
}
