// simulated.rs
use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::{
    error::GatewayError,
    models::{FixtureCommand, FixtureState},
};

/// In-memory fixture set. Stands in for the bridge on dry runs and in tests.
pub struct SimulatedFixtures {
    fixtures: RwLock<BTreeMap<String, FixtureState>>,
    // Fixtures an outside actor has taken over; they ignore our writes.
    held: RwLock<BTreeSet<String>>,
    failing: RwLock<BTreeSet<String>>,
    // Fixtures that reject writes but still report their state.
    rejecting: RwLock<BTreeSet<String>>,
    unreachable: RwLock<bool>,
    writes: RwLock<Vec<FixtureCommand>>,
}

impl SimulatedFixtures {
    pub fn new<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fixtures = ids
            .into_iter()
            .map(|id| {
                let id = id.into();
                let state = FixtureState {
                    id: id.clone(),
                    on: false,
                    brightness: 0,
                    x: 0.0,
                    y: 0.0,
                };
                (id, state)
            })
            .collect();
        Self {
            fixtures: RwLock::new(fixtures),
            held: RwLock::new(BTreeSet::new()),
            failing: RwLock::new(BTreeSet::new()),
            rejecting: RwLock::new(BTreeSet::new()),
            unreachable: RwLock::new(false),
            writes: RwLock::new(Vec::new()),
        }
    }
}

#[cfg(test)]
impl SimulatedFixtures {
    /// Applies `update` to a fixture and keeps it that way regardless of
    /// writes. `false` if there is no such fixture.
    pub async fn hold(&self, id: &str, update: impl FnOnce(&mut FixtureState)) -> bool {
        // Lock order: held, failing, rejecting, fixtures.
        let mut held = self.held.write().await;
        let mut fixtures = self.fixtures.write().await;
        let Some(fixture) = fixtures.get_mut(id) else {
            return false;
        };
        update(fixture);
        held.insert(id.to_string());
        true
    }

    pub async fn release(&self, id: &str) {
        self.held.write().await.remove(id);
    }

    /// Makes a single fixture fail both reads and writes.
    pub async fn set_failing(&self, id: &str, failing: bool) {
        let mut set = self.failing.write().await;
        if failing {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    /// Makes a single fixture reject writes while staying readable.
    pub async fn set_rejecting(&self, id: &str, rejecting: bool) {
        let mut set = self.rejecting.write().await;
        if rejecting {
            set.insert(id.to_string());
        } else {
            set.remove(id);
        }
    }

    pub async fn set_unreachable(&self, unreachable: bool) {
        *self.unreachable.write().await = unreachable;
    }

    /// Every command passed to `write_all`, reachable or not.
    pub async fn writes(&self) -> Vec<FixtureCommand> {
        self.writes.read().await.clone()
    }

    pub async fn state(&self, id: &str) -> Option<FixtureState> {
        self.fixtures.read().await.get(id).cloned()
    }
}

#[async_trait]
impl super::FixtureGateway for SimulatedFixtures {
    async fn write_all(&self, command: &FixtureCommand) -> Result<Vec<String>, GatewayError> {
        self.writes.write().await.push(*command);
        if *self.unreachable.read().await {
            return Err(GatewayError::Unavailable);
        }

        let held = self.held.read().await;
        let failing = self.failing.read().await;
        let rejecting = self.rejecting.read().await;
        let mut fixtures = self.fixtures.write().await;
        let mut missed = Vec::new();
        let mut written = 0;
        for (id, fixture) in fixtures.iter_mut() {
            if failing.contains(id) || rejecting.contains(id) {
                missed.push(id.clone());
                continue;
            }
            written += 1;
            if held.contains(id) {
                continue;
            }
            fixture.on = command.on;
            if command.on {
                fixture.brightness = command.brightness;
                fixture.x = command.x;
                fixture.y = command.y;
            }
        }
        debug!(?command, written, ?missed, "Simulated write");

        if written == 0 && !fixtures.is_empty() {
            return Err(GatewayError::Unavailable);
        }
        Ok(missed)
    }

    async fn read_all(&self) -> Result<Vec<FixtureState>, GatewayError> {
        if *self.unreachable.read().await {
            return Err(GatewayError::Unavailable);
        }
        let failing = self.failing.read().await;
        Ok(self
            .fixtures
            .read()
            .await
            .values()
            .filter(|fixture| !failing.contains(&fixture.id))
            .cloned()
            .collect())
    }
}
