// sequence/mod.rs
mod controller;
pub mod ramp;

pub use controller::SequenceController;

use std::time::Duration;

/// Ramp parameters, fixed for the lifetime of the process.
#[derive(Debug, Clone, PartialEq)]
pub struct SequenceConfig {
    pub duration: Duration,
    pub start_kelvin: f64,
    pub end_kelvin: f64,
    pub tick_interval: Duration,
    /// Largest xy deviation still read back as our own write.
    pub override_sensitivity: f64,
    pub idle_poll: Duration,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(30 * 60),
            start_kelvin: 2000.0,
            end_kelvin: 6500.0,
            tick_interval: Duration::from_secs(3),
            override_sensitivity: 0.05,
            idle_poll: Duration::from_secs(1),
        }
    }
}
