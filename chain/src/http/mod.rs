//! [Client] over a CometBFT RPC node and a Cosmos REST gateway.

use crate::{Account, Broadcast, Client, Error, Included, NetworkInferences};
use bytes::Bytes;
use serde::de::DeserializeOwned;
use std::{sync::Arc, time::Duration};
use tracing::debug;

mod rest;
mod rpc;

/// Prefix of the emissions module query routes.
const EMISSIONS_ROUTES: &str = "/emissions/v5";

/// Default timeout applied to every request.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration for [Http].
#[derive(Clone, Debug)]
pub struct Config {
    /// CometBFT RPC endpoint all broadcasts and block queries are sent to.
    pub rpc: String,

    /// Cosmos REST gateway used for module queries.
    pub api: String,

    /// Timeout applied to every request.
    pub timeout: Duration,
}

/// HTTP implementation of [Client].
#[derive(Clone)]
pub struct Http {
    client: reqwest::Client,
    cfg: Arc<Config>,
}

impl Http {
    /// Create a new client.
    pub fn new(cfg: Config) -> Result<Self, Error> {
        let client = reqwest::Client::builder()
            .timeout(cfg.timeout)
            .build()
            .map_err(from_reqwest)?;
        Ok(Self {
            client,
            cfg: Arc::new(Config {
                rpc: cfg.rpc.trim_end_matches('/').to_string(),
                api: cfg.api.trim_end_matches('/').to_string(),
                ..cfg
            }),
        })
    }

    async fn rpc<T: DeserializeOwned>(
        &self,
        method: &str,
        query: &[(&str, String)],
    ) -> Result<T, Error> {
        let url = format!("{}/{method}", self.cfg.rpc);
        let response = self
            .client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(from_reqwest)?;
        let status = response.status();
        let body = response.text().await.map_err(from_reqwest)?;

        // CometBFT reports RPC errors with a 500 and a JSON-RPC error body
        let envelope: rpc::Response<T> = match serde_json::from_str(&body) {
            Ok(envelope) => envelope,
            Err(err) if status.is_success() => return Err(Error::Malformed(err.to_string())),
            Err(_) => {
                return Err(Error::Status {
                    status: status.as_u16(),
                    body,
                })
            }
        };
        envelope.into_result()
    }

    async fn rest<T: DeserializeOwned>(&self, path: &str) -> Result<T, Error> {
        let url = format!("{}{path}", self.cfg.api);
        debug!(url = %url, "querying");
        let response = self.client.get(&url).send().await.map_err(from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Status {
                status: status.as_u16(),
                body,
            });
        }
        response.json().await.map_err(from_reqwest)
    }

    fn emissions(&self, route: &str) -> String {
        format!("{EMISSIONS_ROUTES}/{route}")
    }
}

/// Map a [reqwest::Error] into the transport or decoding variant.
fn from_reqwest(err: reqwest::Error) -> Error {
    if err.is_decode() {
        return Error::Malformed(err.to_string());
    }
    Error::Network(err.to_string())
}

impl Client for Http {
    async fn broadcast(&self, tx: Bytes) -> Result<Broadcast, Error> {
        let tx = format!("0x{}", swarm_utils::hex(&tx));
        let result: rpc::BroadcastResult = self.rpc("broadcast_tx_sync", &[("tx", tx)]).await?;
        Ok(result.into())
    }

    async fn transaction(&self, hash: &str) -> Result<Option<Included>, Error> {
        let hash = format!("0x{hash}");
        match self.rpc::<rpc::TxResult>("tx", &[("hash", hash)]).await {
            Ok(result) => Included::try_from(result).map(Some),
            Err(err) if rpc::is_not_found(&err) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn latest_height(&self) -> Result<u64, Error> {
        let status: rpc::StatusResult = self.rpc("status", &[]).await?;
        rpc::parse_number(&status.sync_info.latest_block_height)
    }

    async fn account(&self, address: &str) -> Result<Account, Error> {
        let response: rest::AccountResponse = self
            .rest(&format!("/cosmos/auth/v1beta1/accounts/{address}"))
            .await?;
        Account::try_from(response)
    }

    async fn balance(&self, address: &str, denom: &str) -> Result<u128, Error> {
        let response: rest::BalancesResponse = self
            .rest(&format!("/cosmos/bank/v1beta1/balances/{address}"))
            .await?;
        response.amount_of(denom)
    }

    async fn gas_price(&self, denom: &str) -> Result<f64, Error> {
        let response: rest::GasPriceResponse = self
            .rest(&format!("/feemarket/v1/gas_price/{denom}"))
            .await?;
        rpc::parse_number(&response.price.amount)
    }

    async fn next_topic_id(&self) -> Result<u64, Error> {
        let response: rest::NextTopicIdResponse = self.rest(&self.emissions("next_topic_id")).await?;
        rpc::parse_number(&response.next_topic_id)
    }

    async fn worker_window(&self, topic: u64) -> Result<Option<i64>, Error> {
        let response: rest::WorkerNoncesResponse = self
            .rest(&self.emissions(&format!("unfulfilled_worker_nonces/{topic}")))
            .await?;
        response.latest()
    }

    async fn reputer_window(&self, topic: u64) -> Result<Option<i64>, Error> {
        let response: rest::ReputerNoncesResponse = self
            .rest(&self.emissions(&format!("unfulfilled_reputer_nonces/{topic}")))
            .await?;
        response.latest()
    }

    async fn active_workers(&self, topic: u64, height: i64) -> Result<Vec<String>, Error> {
        let response: rest::InferencesResponse = self
            .rest(&self.emissions(&format!("inferences/{topic}/{height}")))
            .await?;
        Ok(response.inferers())
    }

    async fn network_inferences(&self, topic: u64, height: i64) -> Result<NetworkInferences, Error> {
        let response: rest::NetworkInferencesResponse = self
            .rest(&self.emissions(&format!(
                "network_inferences/{topic}/last_inference/{height}"
            )))
            .await?;
        NetworkInferences::try_from(response)
    }
}
