//! Topic membership by role.

use crate::actor::Actor;
use prometheus_client::encoding::EncodeLabelValue;
use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, RwLock},
};

/// Role an actor is registered for on a topic.
#[derive(Clone, Copy, Debug, Hash, PartialEq, Eq, EncodeLabelValue)]
pub enum Role {
    Worker,
    Reputer,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Worker => f.write_str("worker"),
            Role::Reputer => f.write_str("reputer"),
        }
    }
}

#[derive(Default)]
struct Members {
    workers: Vec<Actor>,
    reputers: Vec<Actor>,
}

/// Append-only record of which actors are registered on which topic.
///
/// Cloning is cheap and every clone shares the same record. Readers receive a snapshot, so the
/// lock is never held while submitting.
#[derive(Clone, Default)]
pub struct Registry {
    topics: Arc<RwLock<HashMap<u64, Members>>>,
}

impl Registry {
    /// Record that `actor` registered on `topic` as `role`.
    pub fn add(&self, topic: u64, role: Role, actor: Actor) {
        let mut topics = self.topics.write().unwrap_or_else(|err| err.into_inner());
        let members = topics.entry(topic).or_default();
        match role {
            Role::Worker => members.workers.push(actor),
            Role::Reputer => members.reputers.push(actor),
        }
    }

    /// Actors registered on `topic` as `role`, in registration order.
    pub fn members(&self, topic: u64, role: Role) -> Vec<Actor> {
        let topics = self.topics.read().unwrap_or_else(|err| err.into_inner());
        let Some(members) = topics.get(&topic) else {
            return Vec::new();
        };
        match role {
            Role::Worker => members.workers.clone(),
            Role::Reputer => members.reputers.clone(),
        }
    }
}
