//! CometBFT JSON-RPC response types.

use crate::{Broadcast, Error, Included};
use serde::Deserialize;

/// JSON-RPC envelope.
#[derive(Debug, Deserialize)]
pub struct Response<T> {
    pub result: Option<T>,
    pub error: Option<RpcError>,
}

impl<T> Response<T> {
    /// Unwrap the envelope into its result or a structured [Error::Rpc].
    pub fn into_result(self) -> Result<T, Error> {
        if let Some(error) = self.error {
            return Err(Error::Rpc {
                code: error.code,
                message: error.message,
                data: error.data.unwrap_or_default(),
            });
        }
        self.result
            .ok_or_else(|| Error::Malformed("response carries neither result nor error".into()))
    }
}

#[derive(Debug, Deserialize)]
pub struct RpcError {
    pub code: i64,
    pub message: String,
    #[serde(default)]
    pub data: Option<String>,
}

/// Result of `broadcast_tx_sync`.
#[derive(Debug, Deserialize)]
pub struct BroadcastResult {
    pub code: u32,
    #[serde(default)]
    pub codespace: String,
    #[serde(default)]
    pub log: String,
    pub hash: String,
}

impl From<BroadcastResult> for Broadcast {
    fn from(result: BroadcastResult) -> Self {
        Broadcast {
            code: result.code,
            codespace: result.codespace,
            log: result.log,
            hash: result.hash,
        }
    }
}

/// Result of `tx`.
#[derive(Debug, Deserialize)]
pub struct TxResult {
    pub height: String,
    pub tx_result: DeliverResult,
}

#[derive(Debug, Deserialize)]
pub struct DeliverResult {
    #[serde(default)]
    pub code: u32,
    #[serde(default)]
    pub log: String,
}

impl TryFrom<TxResult> for Included {
    type Error = Error;

    fn try_from(result: TxResult) -> Result<Self, Self::Error> {
        Ok(Included {
            height: parse_number(&result.height)?,
            code: result.tx_result.code,
            log: result.tx_result.log,
        })
    }
}

/// Result of `status`.
#[derive(Debug, Deserialize)]
pub struct StatusResult {
    pub sync_info: SyncInfo,
}

#[derive(Debug, Deserialize)]
pub struct SyncInfo {
    pub latest_block_height: String,
}

/// Whether an RPC error reports a transaction that has not been indexed yet.
pub fn is_not_found(error: &Error) -> bool {
    match error {
        Error::Rpc { message, data, .. } => {
            data.contains("not found") || message.contains("not found")
        }
        _ => false,
    }
}

/// Parse a decimal integer encoded as a JSON string.
pub fn parse_number<T: std::str::FromStr>(value: &str) -> Result<T, Error> {
    value
        .parse()
        .map_err(|_| Error::Malformed(format!("invalid number: {value:?}")))
}
