use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, gauge::Gauge, histogram::Histogram},
    registry::Registry,
};
use std::sync::atomic::AtomicU64;

/// Bucket sizes (in seconds) for submissions, which include retries and backoff.
pub const SUBMISSION_BUCKETS: [f64; 13] = [
    0.010, 0.020, 0.050, 0.100, 0.200, 0.500, 1.0, 2.0, 5.0, 10.0, 30.0, 60.0, 300.0,
];

/// Terminal outcome of a submission.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Outcome {
    /// Accepted by the chain (possibly after retries or a sequence correction).
    Success,
    /// Rejected by a chain rule.
    Rejected,
    /// Every attempt failed transiently.
    Exhausted,
    /// Could not be built.
    Invalid,
    /// Abandoned during shutdown.
    Canceled,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct OutcomeLabel {
    pub outcome: Outcome,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct FailureLabel {
    /// Classification of the failed attempt.
    pub failure: String,
}

/// Metrics shared by every sequencer and the gas price monitor.
#[derive(Clone, Debug)]
pub struct Metrics {
    /// Number of submissions by outcome
    pub submissions: Family<OutcomeLabel, Counter>,
    /// Number of failed broadcast attempts by classification
    pub failures: Family<FailureLabel, Counter>,
    /// Number of broadcast attempts
    pub broadcasts: Counter,
    /// Number of corrective resubmissions after a sequence mismatch
    pub corrections: Counter,
    /// Time from the first attempt to the terminal outcome of a submission
    pub latency: Histogram,
    /// Most recently observed minimum gas price
    pub gas_price: Gauge<f64, AtomicU64>,
}

impl Default for Metrics {
    fn default() -> Self {
        Self {
            submissions: Family::default(),
            failures: Family::default(),
            broadcasts: Counter::default(),
            corrections: Counter::default(),
            latency: Histogram::new(SUBMISSION_BUCKETS.into_iter()),
            gas_price: Gauge::default(),
        }
    }
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "submissions",
            "Number of submissions by outcome",
            metrics.submissions.clone(),
        );
        registry.register(
            "failures",
            "Number of failed broadcast attempts by classification",
            metrics.failures.clone(),
        );
        registry.register(
            "broadcasts",
            "Number of broadcast attempts",
            metrics.broadcasts.clone(),
        );
        registry.register(
            "corrections",
            "Number of corrective resubmissions after a sequence mismatch",
            metrics.corrections.clone(),
        );
        registry.register(
            "submission_duration",
            "Time from the first attempt to the terminal outcome of a submission",
            metrics.latency.clone(),
        );
        registry.register(
            "gas_price",
            "Most recently observed minimum gas price",
            metrics.gas_price.clone(),
        );
        metrics
    }

    /// Record the terminal outcome of a submission.
    pub fn outcome(&self, outcome: Outcome) {
        self.submissions
            .get_or_create(&OutcomeLabel { outcome })
            .inc();
    }

    /// Record a failed attempt.
    pub fn failure(&self, failure: &swarm_chain::Failure) {
        self.failures
            .get_or_create(&FailureLabel {
                failure: failure.label().to_string(),
            })
            .inc();
    }
}
