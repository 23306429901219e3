use crate::registry::Role;
use prometheus_client::{
    encoding::{EncodeLabelSet, EncodeLabelValue},
    metrics::{counter::Counter, family::Family, gauge::Gauge},
    registry::Registry,
};

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct RoleLabel {
    pub role: Role,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Status {
    Success,
    Failure,
}

#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct PayloadLabel {
    pub role: Role,
    pub status: Status,
}

/// Metrics for the workloads.
#[derive(Clone, Debug, Default)]
pub struct Metrics {
    /// Number of submission windows acted upon
    pub windows: Family<RoleLabel, Counter>,
    /// Number of failed window queries
    pub poll_failures: Family<RoleLabel, Counter>,
    /// Number of payload submissions by status
    pub payloads: Family<PayloadLabel, Counter>,
    /// Number of registrations by role
    pub registrations: Family<RoleLabel, Counter>,
    /// Number of funded actors
    pub actors: Gauge,
    /// Number of completed bank transfers
    pub transfers: Counter,
}

impl Metrics {
    /// Create and return a new set of metrics, registered with the given registry.
    pub fn init(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "windows",
            "Number of submission windows acted upon",
            metrics.windows.clone(),
        );
        registry.register(
            "poll_failures",
            "Number of failed window queries",
            metrics.poll_failures.clone(),
        );
        registry.register(
            "payloads",
            "Number of payload submissions by status",
            metrics.payloads.clone(),
        );
        registry.register(
            "registrations",
            "Number of registrations by role",
            metrics.registrations.clone(),
        );
        registry.register("actors", "Number of funded actors", metrics.actors.clone());
        registry.register(
            "transfers",
            "Number of completed bank transfers",
            metrics.transfers.clone(),
        );
        metrics
    }

    pub fn payload(&self, role: Role, success: bool) {
        let status = if success {
            Status::Success
        } else {
            Status::Failure
        };
        self.payloads
            .get_or_create(&PayloadLabel { role, status })
            .inc();
    }
}
