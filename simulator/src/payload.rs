//! Worker and reputer payloads.
//!
//! Values are random but shaped like what real participants submit: inferences around 3000,
//! forecasts between 50 and 100 for every inferer active in the previous window, and losses
//! for every worker active in the window being reputed.

use prost::Message;
use rand::Rng;
use std::ops::{Range, RangeInclusive};
use swarm_chain::NetworkInferences;
use swarm_keys::PrivateKey;
use swarm_tx::msgs::emissions::{
    Forecast, ForecastElement, Inference, InferenceForecastBundle, InsertReputerPayloadRequest,
    InsertWorkerPayloadRequest, Nonce, ReputerRequestNonce, ReputerValueBundle, ValueBundle,
    WithheldWorkerAttributedValue, WorkerAttributedValue, WorkerDataBundle,
};
use swarm_utils::hex;

/// Range inferences are drawn from.
pub const INFERENCE: Range<i64> = 3_000..3_300;

/// Range forecasts are drawn from.
pub const FORECAST: RangeInclusive<i64> = 50..=100;

/// Range inferer losses are drawn from when the network has no value for an inferer.
pub const INFERER_LOSS: Range<i64> = 3_000..6_000;

/// Range every other loss is drawn from.
pub const LOSS: Range<i64> = 50..100;

/// Maximum relative perturbation applied to losses derived from network inferences.
pub const NOISE: f64 = 0.1;

/// Format a value as a decimal string with fixed precision.
fn dec(value: f64) -> String {
    format!("{value:.6}")
}

/// Build a signed worker payload for `height`.
///
/// A forecast is only included if some inferer was active in the previous window.
pub fn worker<R: Rng>(
    rng: &mut R,
    key: &PrivateKey,
    worker: &str,
    topic: u64,
    height: i64,
    previous_inferers: &[String],
) -> InsertWorkerPayloadRequest {
    let inference = Inference {
        topic_id: topic,
        block_height: height,
        inferer: worker.to_string(),
        value: rng.gen_range(INFERENCE).to_string(),
        extra_data: Vec::new(),
        proof: String::new(),
    };
    let forecast = (!previous_inferers.is_empty()).then(|| Forecast {
        topic_id: topic,
        block_height: height,
        forecaster: worker.to_string(),
        forecast_elements: previous_inferers
            .iter()
            .map(|inferer| ForecastElement {
                inferer: inferer.clone(),
                value: rng.gen_range(FORECAST).to_string(),
            })
            .collect(),
        extra_data: Vec::new(),
    });
    let bundle = InferenceForecastBundle {
        inference: Some(inference),
        forecast,
    };
    let signature = key.sign(&bundle.encode_to_vec());

    InsertWorkerPayloadRequest {
        sender: worker.to_string(),
        worker_data_bundle: Some(WorkerDataBundle {
            worker: worker.to_string(),
            nonce: Some(Nonce {
                block_height: height,
            }),
            topic_id: topic,
            inference_forecasts_bundle: Some(bundle),
            inferences_forecasts_bundle_signature: signature.to_vec(),
            pubkey: hex(&key.public_key().to_bytes()),
        }),
    }
}

/// Build a signed reputer payload for the window at `height`.
///
/// Losses of the combined value and of each inferer the network reports are measured against
/// the naive value and perturbed by up to [NOISE]. Everything else is drawn at random.
pub fn reputer<R: Rng>(
    rng: &mut R,
    key: &PrivateKey,
    reputer: &str,
    topic: u64,
    height: i64,
    active_workers: &[String],
    network: &NetworkInferences,
) -> InsertReputerPayloadRequest {
    let truth = network.naive_value;
    let loss = |value: f64, rng: &mut R| {
        let base = (value - truth).powi(2).max(1.0);
        base * (1.0 + rng.gen_range(-NOISE..=NOISE))
    };

    let combined_value = dec(loss(network.combined_value, rng));
    let naive_value = dec(loss(network.naive_value, rng));
    let inferer_values = active_workers
        .iter()
        .map(|worker| {
            let value = match network
                .inferer_values
                .iter()
                .find(|attributed| &attributed.worker == worker)
            {
                Some(attributed) => dec(loss(attributed.value, rng)),
                None => rng.gen_range(INFERER_LOSS).to_string(),
            };
            WorkerAttributedValue {
                worker: worker.clone(),
                value,
            }
        })
        .collect();
    let attributed = |rng: &mut R| -> Vec<WorkerAttributedValue> {
        active_workers
            .iter()
            .map(|worker| WorkerAttributedValue {
                worker: worker.clone(),
                value: rng.gen_range(LOSS).to_string(),
            })
            .collect()
    };
    let forecaster_values = attributed(rng);
    let one_in_forecaster_values = attributed(rng);
    let withheld = |rng: &mut R| -> Vec<WithheldWorkerAttributedValue> {
        active_workers
            .iter()
            .map(|worker| WithheldWorkerAttributedValue {
                worker: worker.clone(),
                value: rng.gen_range(LOSS).to_string(),
            })
            .collect()
    };
    let one_out_inferer_values = withheld(rng);
    let one_out_forecaster_values = withheld(rng);

    let bundle = ValueBundle {
        topic_id: topic,
        reputer_request_nonce: Some(ReputerRequestNonce {
            reputer_nonce: Some(Nonce {
                block_height: height,
            }),
        }),
        reputer: reputer.to_string(),
        extra_data: Vec::new(),
        combined_value,
        inferer_values,
        forecaster_values,
        naive_value,
        one_out_inferer_values,
        one_out_forecaster_values,
        one_in_forecaster_values,
    };
    let signature = key.sign(&bundle.encode_to_vec());

    InsertReputerPayloadRequest {
        sender: reputer.to_string(),
        reputer_value_bundle: Some(ReputerValueBundle {
            value_bundle: Some(bundle),
            signature: signature.to_vec(),
            pubkey: hex(&key.public_key().to_bytes()),
        }),
    }
}
