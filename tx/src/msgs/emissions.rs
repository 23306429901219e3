//! `emissions.v5` messages.
//!
//! Decimal quantities travel as their canonical string representation.

use crate::proto::Msg;
use prost::Message;

#[derive(Clone, PartialEq, Message)]
pub struct CreateNewTopicRequest {
    #[prost(string, tag = "1")]
    pub creator: String,
    #[prost(string, tag = "2")]
    pub metadata: String,
    #[prost(string, tag = "3")]
    pub loss_method: String,
    #[prost(int64, tag = "4")]
    pub epoch_length: i64,
    #[prost(int64, tag = "5")]
    pub ground_truth_lag: i64,
    #[prost(string, tag = "6")]
    pub p_norm: String,
    #[prost(string, tag = "7")]
    pub alpha_regret: String,
    #[prost(bool, tag = "8")]
    pub allow_negative: bool,
    #[prost(string, tag = "9")]
    pub epsilon: String,
    #[prost(int64, tag = "10")]
    pub worker_submission_window: i64,
    #[prost(string, tag = "11")]
    pub merit_sortition_alpha: String,
    #[prost(string, tag = "12")]
    pub active_inferer_quantile: String,
    #[prost(string, tag = "13")]
    pub active_forecaster_quantile: String,
    #[prost(string, tag = "14")]
    pub active_reputer_quantile: String,
}

impl Msg for CreateNewTopicRequest {
    const TYPE_URL: &'static str = "/emissions.v5.CreateNewTopicRequest";
}

#[derive(Clone, PartialEq, Message)]
pub struct FundTopicRequest {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(uint64, tag = "2")]
    pub topic_id: u64,
    #[prost(string, tag = "3")]
    pub amount: String,
}

impl Msg for FundTopicRequest {
    const TYPE_URL: &'static str = "/emissions.v5.FundTopicRequest";
}

#[derive(Clone, PartialEq, Message)]
pub struct RegisterRequest {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(uint64, tag = "2")]
    pub topic_id: u64,
    #[prost(string, tag = "3")]
    pub owner: String,
    #[prost(bool, tag = "4")]
    pub is_reputer: bool,
}

impl Msg for RegisterRequest {
    const TYPE_URL: &'static str = "/emissions.v5.RegisterRequest";
}

#[derive(Clone, PartialEq, Message)]
pub struct AddStakeRequest {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(uint64, tag = "2")]
    pub topic_id: u64,
    #[prost(string, tag = "3")]
    pub amount: String,
}

impl Msg for AddStakeRequest {
    const TYPE_URL: &'static str = "/emissions.v5.AddStakeRequest";
}

#[derive(Clone, PartialEq, Message)]
pub struct Nonce {
    #[prost(int64, tag = "1")]
    pub block_height: i64,
}

#[derive(Clone, PartialEq, Message)]
pub struct Inference {
    #[prost(uint64, tag = "1")]
    pub topic_id: u64,
    #[prost(int64, tag = "2")]
    pub block_height: i64,
    #[prost(string, tag = "3")]
    pub inferer: String,
    #[prost(string, tag = "4")]
    pub value: String,
    #[prost(bytes = "vec", tag = "5")]
    pub extra_data: Vec<u8>,
    #[prost(string, tag = "6")]
    pub proof: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct ForecastElement {
    #[prost(string, tag = "1")]
    pub inferer: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct Forecast {
    #[prost(uint64, tag = "1")]
    pub topic_id: u64,
    #[prost(int64, tag = "2")]
    pub block_height: i64,
    #[prost(string, tag = "3")]
    pub forecaster: String,
    #[prost(message, repeated, tag = "4")]
    pub forecast_elements: Vec<ForecastElement>,
    #[prost(bytes = "vec", tag = "5")]
    pub extra_data: Vec<u8>,
}

/// The payload a worker signs.
#[derive(Clone, PartialEq, Message)]
pub struct InferenceForecastBundle {
    #[prost(message, optional, tag = "1")]
    pub inference: Option<Inference>,
    #[prost(message, optional, tag = "2")]
    pub forecast: Option<Forecast>,
}

#[derive(Clone, PartialEq, Message)]
pub struct WorkerDataBundle {
    #[prost(string, tag = "1")]
    pub worker: String,
    #[prost(message, optional, tag = "2")]
    pub nonce: Option<Nonce>,
    #[prost(uint64, tag = "3")]
    pub topic_id: u64,
    #[prost(message, optional, tag = "4")]
    pub inference_forecasts_bundle: Option<InferenceForecastBundle>,
    #[prost(bytes = "vec", tag = "5")]
    pub inferences_forecasts_bundle_signature: Vec<u8>,
    /// Hex encoded compressed public key of the worker.
    #[prost(string, tag = "6")]
    pub pubkey: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct InsertWorkerPayloadRequest {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(message, optional, tag = "2")]
    pub worker_data_bundle: Option<WorkerDataBundle>,
}

impl Msg for InsertWorkerPayloadRequest {
    const TYPE_URL: &'static str = "/emissions.v5.InsertWorkerPayloadRequest";
}

#[derive(Clone, PartialEq, Message)]
pub struct ReputerRequestNonce {
    #[prost(message, optional, tag = "1")]
    pub reputer_nonce: Option<Nonce>,
}

#[derive(Clone, PartialEq, Message)]
pub struct WorkerAttributedValue {
    #[prost(string, tag = "1")]
    pub worker: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct WithheldWorkerAttributedValue {
    #[prost(string, tag = "1")]
    pub worker: String,
    #[prost(string, tag = "2")]
    pub value: String,
}

/// The payload a reputer signs: losses of the network and of each worker.
#[derive(Clone, PartialEq, Message)]
pub struct ValueBundle {
    #[prost(uint64, tag = "1")]
    pub topic_id: u64,
    #[prost(message, optional, tag = "2")]
    pub reputer_request_nonce: Option<ReputerRequestNonce>,
    #[prost(string, tag = "3")]
    pub reputer: String,
    #[prost(bytes = "vec", tag = "4")]
    pub extra_data: Vec<u8>,
    #[prost(string, tag = "5")]
    pub combined_value: String,
    #[prost(message, repeated, tag = "6")]
    pub inferer_values: Vec<WorkerAttributedValue>,
    #[prost(message, repeated, tag = "7")]
    pub forecaster_values: Vec<WorkerAttributedValue>,
    #[prost(string, tag = "8")]
    pub naive_value: String,
    #[prost(message, repeated, tag = "9")]
    pub one_out_inferer_values: Vec<WithheldWorkerAttributedValue>,
    #[prost(message, repeated, tag = "10")]
    pub one_out_forecaster_values: Vec<WithheldWorkerAttributedValue>,
    #[prost(message, repeated, tag = "11")]
    pub one_in_forecaster_values: Vec<WorkerAttributedValue>,
}

#[derive(Clone, PartialEq, Message)]
pub struct ReputerValueBundle {
    #[prost(message, optional, tag = "1")]
    pub value_bundle: Option<ValueBundle>,
    #[prost(bytes = "vec", tag = "2")]
    pub signature: Vec<u8>,
    /// Hex encoded compressed public key of the reputer.
    #[prost(string, tag = "3")]
    pub pubkey: String,
}

#[derive(Clone, PartialEq, Message)]
pub struct InsertReputerPayloadRequest {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(message, optional, tag = "2")]
    pub reputer_value_bundle: Option<ReputerValueBundle>,
}

impl Msg for InsertReputerPayloadRequest {
    const TYPE_URL: &'static str = "/emissions.v5.InsertReputerPayloadRequest";
}

/// Parameter overrides. Every field is repeated so that an empty list leaves the parameter as is.
#[derive(Clone, PartialEq, Message)]
pub struct OptionalParams {
    #[prost(uint64, repeated, tag = "33")]
    pub max_samples_to_scale_scores: Vec<u64>,
}

#[derive(Clone, PartialEq, Message)]
pub struct UpdateParamsRequest {
    #[prost(string, tag = "1")]
    pub sender: String,
    #[prost(message, optional, tag = "2")]
    pub params: Option<OptionalParams>,
}

impl Msg for UpdateParamsRequest {
    const TYPE_URL: &'static str = "/emissions.v5.UpdateParamsRequest";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_type_urls() {
        let register = RegisterRequest {
            sender: "allo1a".into(),
            topic_id: 3,
            owner: "allo1a".into(),
            is_reputer: true,
        };
        let any = register.to_any();
        assert_eq!(any.type_url, "/emissions.v5.RegisterRequest");
        assert_eq!(RegisterRequest::decode(any.value.as_slice()).unwrap(), register);
    }

    #[test]
    fn test_empty_optional_params() {
        let params = OptionalParams::default();
        assert!(params.encode_to_vec().is_empty());
    }
}
