// devices/mod.rs
mod hue;
mod simulated;

pub use hue::HueBridge;
pub use simulated::SimulatedFixtures;

use crate::{
    error::GatewayError,
    models::{FixtureCommand, FixtureState},
};

/// Access to the whole fixture set. Writes are best effort and may land on
/// some fixtures but not others.
#[async_trait::async_trait]
pub trait FixtureGateway: Send + Sync {
    /// Returns the ids of fixtures the write did not reach. Fails only when
    /// none was reached.
    async fn write_all(&self, command: &FixtureCommand) -> Result<Vec<String>, GatewayError>;

    /// Returns the fixtures that could be read. Missing fixtures are not an
    /// error; a failure to reach any of them is.
    async fn read_all(&self) -> Result<Vec<FixtureState>, GatewayError>;
}
