//! `cosmos.bank.v1beta1` messages.

use crate::proto::{Coin, Msg};
use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct MsgSend {
    #[prost(string, tag = "1")]
    pub from_address: String,
    #[prost(string, tag = "2")]
    pub to_address: String,
    #[prost(message, repeated, tag = "3")]
    pub amount: Vec<Coin>,
}

impl Msg for MsgSend {
    const TYPE_URL: &'static str = "/cosmos.bank.v1beta1.MsgSend";
}

#[derive(Clone, PartialEq, Message)]
pub struct Input {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, repeated, tag = "2")]
    pub coins: Vec<Coin>,
}

#[derive(Clone, PartialEq, Message)]
pub struct Output {
    #[prost(string, tag = "1")]
    pub address: String,
    #[prost(message, repeated, tag = "2")]
    pub coins: Vec<Coin>,
}

#[derive(Clone, PartialEq, Message)]
pub struct MsgMultiSend {
    #[prost(message, repeated, tag = "1")]
    pub inputs: Vec<Input>,
    #[prost(message, repeated, tag = "2")]
    pub outputs: Vec<Output>,
}

impl Msg for MsgMultiSend {
    const TYPE_URL: &'static str = "/cosmos.bank.v1beta1.MsgMultiSend";
}

impl MsgMultiSend {
    /// Send `amount` of `denom` from `sender` to each recipient.
    ///
    /// The single input carries the sum of all outputs, as the bank module requires.
    pub fn uniform(sender: &str, recipients: &[String], denom: &str, amount: u128) -> Self {
        let total = amount.saturating_mul(recipients.len() as u128);
        Self {
            inputs: vec![Input {
                address: sender.to_string(),
                coins: vec![Coin::new(denom, total)],
            }],
            outputs: recipients
                .iter()
                .map(|recipient| Output {
                    address: recipient.clone(),
                    coins: vec![Coin::new(denom, amount)],
                })
                .collect(),
        }
    }
}
