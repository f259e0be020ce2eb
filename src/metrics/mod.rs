// metrics/mod.rs
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};
use std::net::SocketAddr;

pub const SEQUENCES_STARTED: &str = "wakeup_sequences_started_total";
pub const SEQUENCES_ENDED: &str = "wakeup_sequences_ended_total";
pub const RAMP_TICKS: &str = "wakeup_ramp_ticks_total";
pub const GATEWAY_ERRORS: &str = "wakeup_gateway_errors_total";
pub const FEED_MESSAGES: &str = "wakeup_feed_messages_total";
pub const BRIGHTNESS: &str = "wakeup_commanded_brightness";

pub fn setup_metrics(port: u16) -> Result<(), BuildError> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new().with_http_listener(addr).install()
}
