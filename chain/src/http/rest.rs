//! Cosmos REST gateway response types.

use super::rpc::parse_number;
use crate::{Account, Attributed, Error, NetworkInferences};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AccountResponse {
    pub account: AccountInfo,
}

#[derive(Debug, Deserialize)]
pub struct AccountInfo {
    #[serde(default)]
    pub account_number: String,
    #[serde(default)]
    pub sequence: String,
}

impl TryFrom<AccountResponse> for Account {
    type Error = Error;

    fn try_from(response: AccountResponse) -> Result<Self, Self::Error> {
        // A fresh account omits zero-valued fields
        let number = |value: &str| -> Result<u64, Error> {
            if value.is_empty() {
                return Ok(0);
            }
            parse_number(value)
        };
        Ok(Account {
            account_number: number(&response.account.account_number)?,
            sequence: number(&response.account.sequence)?,
        })
    }
}

#[derive(Debug, Deserialize)]
pub struct BalancesResponse {
    pub balances: Vec<Coin>,
}

#[derive(Debug, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: String,
}

impl BalancesResponse {
    /// Amount held in `denom`, zero if absent.
    pub fn amount_of(&self, denom: &str) -> Result<u128, Error> {
        match self.balances.iter().find(|coin| coin.denom == denom) {
            Some(coin) => parse_number(&coin.amount),
            None => Ok(0),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct GasPriceResponse {
    pub price: DecCoin,
}

#[derive(Debug, Deserialize)]
pub struct DecCoin {
    pub amount: String,
}

#[derive(Debug, Deserialize)]
pub struct NextTopicIdResponse {
    pub next_topic_id: String,
}

#[derive(Debug, Deserialize)]
pub struct WorkerNoncesResponse {
    pub nonces: Option<WorkerNonces>,
}

#[derive(Debug, Default, Deserialize)]
pub struct WorkerNonces {
    #[serde(default)]
    pub nonces: Vec<Nonce>,
}

#[derive(Debug, Deserialize)]
pub struct Nonce {
    pub block_height: String,
}

impl WorkerNoncesResponse {
    /// The most recently opened worker window (first entry).
    pub fn latest(&self) -> Result<Option<i64>, Error> {
        let Some(nonce) = self.nonces.as_ref().and_then(|n| n.nonces.first()) else {
            return Ok(None);
        };
        parse_number(&nonce.block_height).map(Some)
    }
}

#[derive(Debug, Deserialize)]
pub struct ReputerNoncesResponse {
    pub nonces: Option<ReputerNonces>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReputerNonces {
    #[serde(default)]
    pub nonces: Vec<ReputerRequestNonce>,
}

#[derive(Debug, Deserialize)]
pub struct ReputerRequestNonce {
    pub reputer_nonce: Nonce,
}

impl ReputerNoncesResponse {
    /// The oldest unfulfilled reputer window (last entry), which closes first.
    pub fn latest(&self) -> Result<Option<i64>, Error> {
        let Some(nonce) = self.nonces.as_ref().and_then(|n| n.nonces.last()) else {
            return Ok(None);
        };
        parse_number(&nonce.reputer_nonce.block_height).map(Some)
    }
}

#[derive(Debug, Deserialize)]
pub struct InferencesResponse {
    pub inferences: Option<Inferences>,
}

#[derive(Debug, Default, Deserialize)]
pub struct Inferences {
    #[serde(default)]
    pub inferences: Vec<Inference>,
}

#[derive(Debug, Deserialize)]
pub struct Inference {
    pub inferer: String,
}

impl InferencesResponse {
    pub fn inferers(self) -> Vec<String> {
        self.inferences
            .unwrap_or_default()
            .inferences
            .into_iter()
            .map(|inference| inference.inferer)
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub struct NetworkInferencesResponse {
    pub network_inferences: Option<ValueBundle>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ValueBundle {
    #[serde(default)]
    pub combined_value: String,
    #[serde(default)]
    pub naive_value: String,
    #[serde(default)]
    pub inferer_values: Vec<WorkerValue>,
}

#[derive(Debug, Deserialize)]
pub struct WorkerValue {
    pub worker: String,
    pub value: String,
}

impl TryFrom<NetworkInferencesResponse> for NetworkInferences {
    type Error = Error;

    fn try_from(response: NetworkInferencesResponse) -> Result<Self, Self::Error> {
        let bundle = response.network_inferences.unwrap_or_default();
        let decimal = |value: &str| -> Result<f64, Error> {
            if value.is_empty() {
                return Ok(0.0);
            }
            parse_number(value)
        };
        let inferer_values = bundle
            .inferer_values
            .iter()
            .map(|value| {
                Ok(Attributed {
                    worker: value.worker.clone(),
                    value: decimal(&value.value)?,
                })
            })
            .collect::<Result<Vec<_>, Error>>()?;
        Ok(NetworkInferences {
            combined_value: decimal(&bundle.combined_value)?,
            naive_value: decimal(&bundle.naive_value)?,
            inferer_values,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account() {
        let body = r#"{"account":{"@type":"/cosmos.auth.v1beta1.BaseAccount","address":"allo1x","pub_key":null,"account_number":"17","sequence":"3"}}"#;
        let response: AccountResponse = serde_json::from_str(body).unwrap();
        let account = Account::try_from(response).unwrap();
        assert_eq!(
            account,
            Account {
                account_number: 17,
                sequence: 3
            }
        );
    }

    #[test]
    fn test_account_fresh() {
        let body = r#"{"account":{"address":"allo1x","account_number":"4"}}"#;
        let response: AccountResponse = serde_json::from_str(body).unwrap();
        assert_eq!(Account::try_from(response).unwrap().sequence, 0);
    }

    #[test]
    fn test_balance() {
        let body = r#"{"balances":[{"denom":"foo","amount":"1"},{"denom":"uallo","amount":"340282366920938463463374607431768211455"}],"pagination":{"next_key":null,"total":"2"}}"#;
        let response: BalancesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.amount_of("uallo").unwrap(), u128::MAX);
        assert_eq!(response.amount_of("missing").unwrap(), 0);
    }

    #[test]
    fn test_worker_nonces() {
        let body = r#"{"nonces":{"nonces":[{"block_height":"120"},{"block_height":"100"}]}}"#;
        let response: WorkerNoncesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.latest().unwrap(), Some(120));

        let response: WorkerNoncesResponse = serde_json::from_str(r#"{"nonces":{}}"#).unwrap();
        assert_eq!(response.latest().unwrap(), None);
    }

    #[test]
    fn test_reputer_nonces() {
        let body = r#"{"nonces":{"nonces":[{"reputer_nonce":{"block_height":"120"}},{"reputer_nonce":{"block_height":"100"}}]}}"#;
        let response: ReputerNoncesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.latest().unwrap(), Some(100));
    }

    #[test]
    fn test_inferers() {
        let body = r#"{"inferences":{"inferences":[{"topic_id":"1","block_height":"5","inferer":"allo1a","value":"3100"},{"topic_id":"1","block_height":"5","inferer":"allo1b","value":"3200"}]}}"#;
        let response: InferencesResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.inferers(), vec!["allo1a".to_string(), "allo1b".to_string()]);
    }

    #[test]
    fn test_network_inferences() {
        let body = r#"{"network_inferences":{"topic_id":"1","combined_value":"3150.5","naive_value":"3100","inferer_values":[{"worker":"allo1a","value":"3101.25"}]}}"#;
        let response: NetworkInferencesResponse = serde_json::from_str(body).unwrap();
        let inferences = NetworkInferences::try_from(response).unwrap();
        assert_eq!(inferences.combined_value, 3150.5);
        assert_eq!(inferences.naive_value, 3100.0);
        assert_eq!(inferences.inferer_values[0].worker, "allo1a");
        assert_eq!(inferences.inferer_values[0].value, 3101.25);
    }
}
