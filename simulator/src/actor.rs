//! Simulated accounts and the sequencers that submit on their behalf.

use crate::Error;
use rand::{CryptoRng, RngCore};
use std::sync::Arc;
use swarm_chain::Client;
use swarm_keys::PrivateKey;
use swarm_tx::{
    account::{self, AccountState, Engine, Mailbox},
    metrics::Metrics,
    proto::Any,
    retry::{Coordinator, Submitted},
};
use swarm_utils::signal::Signal;
use tracing::debug;

/// Name of the funding actor.
pub const FAUCET: &str = "faucet";

/// Derivation index of the faucet key.
pub const FAUCET_INDEX: u32 = 0;

/// Name of the `index`th simulated actor.
pub fn name(index: usize) -> String {
    format!("run_actor{index}")
}

/// Key material and address of an actor that may not exist on-chain yet.
#[derive(Clone, Debug)]
pub struct Identity {
    pub name: String,
    pub address: String,
    pub key: Arc<PrivateKey>,
}

impl Identity {
    pub fn new(name: String, key: PrivateKey, prefix: &str) -> Result<Self, Error> {
        let address = key.public_key().address(prefix)?;
        Ok(Self {
            name,
            address,
            key: Arc::new(key),
        })
    }

    /// Generate a fresh identity for the `index`th actor.
    pub fn generate<R: CryptoRng + RngCore>(
        rng: &mut R,
        index: usize,
        prefix: &str,
    ) -> Result<Self, Error> {
        Self::new(name(index), PrivateKey::generate(rng), prefix)
    }

    /// Derive the faucet identity from a mnemonic.
    pub fn faucet(mnemonic: &str, prefix: &str) -> Result<Self, Error> {
        Self::new(
            FAUCET.to_string(),
            PrivateKey::derive(mnemonic, FAUCET_INDEX)?,
            prefix,
        )
    }
}

/// An on-chain actor with a running sequencer.
#[derive(Clone)]
pub struct Actor {
    pub name: String,
    pub address: String,
    pub key: Arc<PrivateKey>,
    mailbox: Mailbox,
}

impl Actor {
    /// Submit `msgs` through this actor's sequencer.
    pub async fn submit(&self, msgs: Vec<Any>, wait: bool) -> Result<Submitted, swarm_tx::Error> {
        self.mailbox.clone().submit(msgs, wait).await
    }

    /// Current account state, as tracked by the sequencer.
    pub async fn state(&self) -> Result<AccountState, swarm_tx::Error> {
        self.mailbox.clone().state().await
    }
}

/// Starts sequencers for actors that exist on-chain.
#[derive(Clone)]
pub struct Launcher<C: Client> {
    client: C,
    coordinator: Coordinator<C>,
    metrics: Metrics,
    mailbox_size: usize,
    shutdown: Signal,
}

impl<C: Client> Launcher<C> {
    pub fn new(
        client: C,
        coordinator: Coordinator<C>,
        metrics: Metrics,
        mailbox_size: usize,
        shutdown: Signal,
    ) -> Self {
        Self {
            client,
            coordinator,
            metrics,
            mailbox_size,
            shutdown,
        }
    }

    /// Fetch the account of `identity` and start its sequencer.
    ///
    /// The sequencer stops on shutdown or once every clone of the returned [Actor] is dropped.
    pub async fn launch(&self, identity: Identity) -> Result<Actor, Error> {
        let state = AccountState::from(self.client.account(&identity.address).await?);
        debug!(
            name = %identity.name,
            address = %identity.address,
            account_number = state.account_number,
            sequence = state.sequence,
            "launching actor"
        );
        let (engine, mailbox) = Engine::new(
            account::Config {
                name: identity.name.clone(),
                mailbox_size: self.mailbox_size,
            },
            self.coordinator.clone(),
            identity.key.clone(),
            state,
            self.metrics.clone(),
            self.shutdown.clone(),
        );
        engine.start();
        Ok(Actor {
            name: identity.name,
            address: identity.address,
            key: identity.key,
            mailbox,
        })
    }
}
