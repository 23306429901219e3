//! A scripted in-memory [Client].

use crate::{tx_hash, Account, Broadcast, Client, Error, Included, NetworkInferences};
use bytes::Bytes;
use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
};

#[derive(Default)]
struct State {
    script: VecDeque<Result<Broadcast, Error>>,
    broadcasts: Vec<Bytes>,
    inclusion_delay: u32,
    lookups: HashMap<String, u32>,
    lookup_failures: VecDeque<Error>,
    height: u64,
    accounts: HashMap<String, Account>,
    auto_accounts: bool,
    balances: HashMap<String, u128>,
    gas_price: Option<f64>,
    gas_price_queries: u64,
    next_topic_id: u64,
    worker_windows: HashMap<u64, i64>,
    reputer_windows: HashMap<u64, i64>,
    window_queries: u64,
    window_failures: u32,
    inference_failures: u32,
    active_workers: HashMap<(u64, i64), Vec<String>>,
    network_inferences: HashMap<(u64, i64), NetworkInferences>,
}

/// Scripted chain.
///
/// Broadcasts return queued responses in order and are accepted once the script is
/// exhausted. Accepted transactions are found by [Client::transaction] after
/// `inclusion_delay` unsuccessful lookups. Every call to [Client::latest_height] advances
/// the chain by one block.
#[derive(Clone, Default)]
pub struct Chain {
    state: Arc<Mutex<State>>,
}

impl Chain {
    pub fn new() -> Self {
        let chain = Self::default();
        chain.state.lock().unwrap().next_topic_id = 1;
        chain
    }

    /// Queue a `CheckTx` response with the given code and log.
    pub fn respond(&self, code: u32, codespace: &str, log: &str) {
        let broadcast = Broadcast {
            code,
            codespace: codespace.to_string(),
            log: log.to_string(),
            hash: String::new(),
        };
        self.state.lock().unwrap().script.push_back(Ok(broadcast));
    }

    /// Queue a transport or RPC error.
    pub fn fail(&self, error: Error) {
        self.state.lock().unwrap().script.push_back(Err(error));
    }

    /// Raw bytes of every broadcast, in submission order.
    pub fn broadcasts(&self) -> Vec<Bytes> {
        self.state.lock().unwrap().broadcasts.clone()
    }

    /// Fail the next `count` transaction lookups with a network error.
    pub fn fail_lookups(&self, count: u32) {
        let mut state = self.state.lock().unwrap();
        for _ in 0..count {
            state
                .lookup_failures
                .push_back(Error::Network("connection reset by peer".into()));
        }
    }

    /// Fail the next transaction lookup with `error`.
    pub fn fail_lookup(&self, error: Error) {
        self.state.lock().unwrap().lookup_failures.push_back(error);
    }

    /// Number of not-found lookups before an accepted transaction is reported as included.
    pub fn set_inclusion_delay(&self, lookups: u32) {
        self.state.lock().unwrap().inclusion_delay = lookups;
    }

    pub fn set_account(&self, address: &str, account: Account) {
        self.state
            .lock()
            .unwrap()
            .accounts
            .insert(address.to_string(), account);
    }

    /// Create unknown accounts (with sequence `0`) on first lookup instead of returning 404.
    pub fn set_auto_accounts(&self, enabled: bool) {
        self.state.lock().unwrap().auto_accounts = enabled;
    }

    pub fn set_balance(&self, address: &str, amount: u128) {
        self.state
            .lock()
            .unwrap()
            .balances
            .insert(address.to_string(), amount);
    }

    /// Set the gas price (`None` makes queries fail).
    pub fn set_gas_price(&self, price: Option<f64>) {
        self.state.lock().unwrap().gas_price = price;
    }

    pub fn gas_price_queries(&self) -> u64 {
        self.state.lock().unwrap().gas_price_queries
    }

    pub fn set_worker_window(&self, topic: u64, height: i64) {
        self.state
            .lock()
            .unwrap()
            .worker_windows
            .insert(topic, height);
    }

    pub fn set_reputer_window(&self, topic: u64, height: i64) {
        self.state
            .lock()
            .unwrap()
            .reputer_windows
            .insert(topic, height);
    }

    /// Fail the next `count` window queries with a network error.
    pub fn fail_windows(&self, count: u32) {
        self.state.lock().unwrap().window_failures = count;
    }

    /// Number of window queries received, including failed ones.
    pub fn window_queries(&self) -> u64 {
        self.state.lock().unwrap().window_queries
    }

    /// Fail the next `count` inference queries (active workers or network inferences).
    pub fn fail_inferences(&self, count: u32) {
        self.state.lock().unwrap().inference_failures = count;
    }

    pub fn set_active_workers(&self, topic: u64, height: i64, workers: Vec<String>) {
        self.state
            .lock()
            .unwrap()
            .active_workers
            .insert((topic, height), workers);
    }

    pub fn set_network_inferences(&self, topic: u64, height: i64, inferences: NetworkInferences) {
        self.state
            .lock()
            .unwrap()
            .network_inferences
            .insert((topic, height), inferences);
    }

    fn window(&self, topic: u64, reputer: bool) -> Result<Option<i64>, Error> {
        let mut state = self.state.lock().unwrap();
        state.window_queries += 1;
        if state.window_failures > 0 {
            state.window_failures -= 1;
            return Err(Error::Network("connection refused".into()));
        }
        let windows = if reputer {
            &state.reputer_windows
        } else {
            &state.worker_windows
        };
        Ok(windows.get(&topic).copied())
    }

    fn inference_failure(&self) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap();
        if state.inference_failures > 0 {
            state.inference_failures -= 1;
            return Err(Error::Status {
                status: 500,
                body: "internal error".into(),
            });
        }
        Ok(())
    }
}

impl Client for Chain {
    async fn broadcast(&self, tx: Bytes) -> Result<Broadcast, Error> {
        let hash = tx_hash(&tx);
        let mut state = self.state.lock().unwrap();
        state.broadcasts.push(tx);
        let response = state.script.pop_front().unwrap_or_else(|| {
            Ok(Broadcast {
                code: 0,
                codespace: String::new(),
                log: String::new(),
                hash: String::new(),
            })
        });
        let broadcast = response.map(|broadcast| Broadcast {
            hash: hash.clone(),
            ..broadcast
        });
        if matches!(&broadcast, Ok(b) if b.accepted()) {
            state.lookups.insert(hash, 0);
        }
        broadcast
    }

    async fn transaction(&self, hash: &str) -> Result<Option<Included>, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.lookup_failures.pop_front() {
            return Err(error);
        }
        let delay = state.inclusion_delay;
        let height = state.height;
        let Some(lookups) = state.lookups.get_mut(hash) else {
            return Ok(None);
        };
        if *lookups < delay {
            *lookups += 1;
            return Ok(None);
        }
        Ok(Some(Included {
            height,
            code: 0,
            log: String::new(),
        }))
    }

    async fn latest_height(&self) -> Result<u64, Error> {
        let mut state = self.state.lock().unwrap();
        state.height += 1;
        Ok(state.height)
    }

    async fn account(&self, address: &str) -> Result<Account, Error> {
        let mut state = self.state.lock().unwrap();
        if let Some(account) = state.accounts.get(address) {
            return Ok(*account);
        }
        if !state.auto_accounts {
            return Err(Error::Status {
                status: 404,
                body: format!("account {address} not found"),
            });
        }
        let account = Account {
            account_number: state.accounts.len() as u64 + 1,
            sequence: 0,
        };
        state.accounts.insert(address.to_string(), account);
        Ok(account)
    }

    async fn balance(&self, address: &str, _denom: &str) -> Result<u128, Error> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .balances
            .get(address)
            .copied()
            .unwrap_or_default())
    }

    async fn gas_price(&self, _denom: &str) -> Result<f64, Error> {
        let mut state = self.state.lock().unwrap();
        state.gas_price_queries += 1;
        state
            .gas_price
            .ok_or_else(|| Error::Network("gas price unavailable".into()))
    }

    async fn next_topic_id(&self) -> Result<u64, Error> {
        Ok(self.state.lock().unwrap().next_topic_id)
    }

    async fn worker_window(&self, topic: u64) -> Result<Option<i64>, Error> {
        self.window(topic, false)
    }

    async fn reputer_window(&self, topic: u64) -> Result<Option<i64>, Error> {
        self.window(topic, true)
    }

    async fn active_workers(&self, topic: u64, height: i64) -> Result<Vec<String>, Error> {
        self.inference_failure()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .active_workers
            .get(&(topic, height))
            .cloned()
            .unwrap_or_default())
    }

    async fn network_inferences(&self, topic: u64, height: i64) -> Result<NetworkInferences, Error> {
        self.inference_failure()?;
        Ok(self
            .state
            .lock()
            .unwrap()
            .network_inferences
            .get(&(topic, height))
            .cloned()
            .unwrap_or_default())
    }
}
