// config/mod.rs
use std::{path::PathBuf, time::Duration};

use config::Config;
use serde::Deserialize;
use validator::Validate;

use crate::{error::AppError, sequence::SequenceConfig};

#[derive(Debug, Deserialize, Validate)]
pub struct Settings {
    #[validate(nested)]
    pub wake_up_sequence: WakeUpSettings,
    #[validate(nested)]
    pub hue: HueSettings,
    #[validate(nested)]
    pub adafruit_io: AdafruitIoSettings,
    pub server: ServerSettings,
    pub metrics: MetricsSettings,
}

#[derive(Debug, Deserialize, Validate)]
pub struct WakeUpSettings {
    /// Minutes.
    #[validate(range(exclusive_min = 0.0))]
    pub duration: f64,
    #[validate(range(min = 1000.0, max = 25000.0))]
    pub starting_temperature: f64,
    #[validate(range(min = 1000.0, max = 25000.0))]
    pub end_temperature: f64,
    pub x_bias: f64,
    pub y_bias: f64,
    /// Seconds.
    #[validate(range(exclusive_min = 0.0))]
    pub tick_interval: f64,
    pub chromaticity_table: PathBuf,
}

#[derive(Debug, Deserialize, Validate)]
pub struct HueSettings {
    pub ip_address: Option<String>,
    pub username: String,
    #[validate(range(min = 0.0))]
    pub xy_noise_detection_sensitivity: f64,
    #[validate(range(min = 1))]
    pub request_timeout_ms: u64,
}

#[derive(Debug, Deserialize, Validate)]
pub struct AdafruitIoSettings {
    pub username: Option<String>,
    pub key: Option<String>,
    pub feed: String,
    #[validate(range(min = 100))]
    pub poll_interval_ms: u64,
}

#[derive(Debug, Deserialize)]
pub struct ServerSettings {
    pub enabled: bool,
    pub address: String,
}

#[derive(Debug, Deserialize)]
pub struct MetricsSettings {
    pub enabled: bool,
    pub port: u16,
}

impl Settings {
    pub fn new() -> Result<Self, AppError> {
        Self::from_builder(
            Config::builder()
                .add_source(config::File::with_name("config/config").required(false))
                .add_source(config::Environment::with_prefix("APP").separator("__")),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self, AppError> {
        let settings: Settings = builder
            .set_default("wake_up_sequence.duration", 30.0)?
            .set_default("wake_up_sequence.starting_temperature", 2000.0)?
            .set_default("wake_up_sequence.end_temperature", 6500.0)?
            .set_default("wake_up_sequence.x_bias", 0.0)?
            .set_default("wake_up_sequence.y_bias", 0.0)?
            .set_default("wake_up_sequence.tick_interval", 3.0)?
            .set_default("wake_up_sequence.chromaticity_table", "config/cct_xy.tsv")?
            .set_default("hue.username", "")?
            .set_default("hue.xy_noise_detection_sensitivity", 0.05)?
            .set_default("hue.request_timeout_ms", 2000)?
            .set_default("adafruit_io.feed", "ifttt")?
            .set_default("adafruit_io.poll_interval_ms", 500)?
            .set_default("server.enabled", false)?
            .set_default("server.address", "127.0.0.1:3000")?
            .set_default("metrics.enabled", false)?
            .set_default("metrics.port", 9000)?
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        settings.sequence()?;
        Ok(settings)
    }

    pub fn sequence(&self) -> Result<SequenceConfig, AppError> {
        let wake = &self.wake_up_sequence;
        Ok(SequenceConfig {
            duration: seconds("wake_up_sequence.duration", wake.duration * 60.0)?,
            start_kelvin: wake.starting_temperature,
            end_kelvin: wake.end_temperature,
            tick_interval: seconds("wake_up_sequence.tick_interval", wake.tick_interval)?,
            override_sensitivity: self.hue.xy_noise_detection_sensitivity,
            ..SequenceConfig::default()
        })
    }
}

// Range validation lets infinity and NaN through.
fn seconds(field: &'static str, secs: f64) -> Result<Duration, AppError> {
    Duration::try_from_secs_f64(secs).map_err(|source| AppError::Duration { field, source })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn from_toml(toml: &str) -> Result<Settings, AppError> {
        Settings::from_builder(
            Config::builder().add_source(config::File::from_str(toml, config::FileFormat::Toml)),
        )
    }

    #[test]
    fn defaults_fill_an_empty_file() {
        let settings = from_toml("").unwrap();
        assert_eq!(settings.wake_up_sequence.duration, 30.0);
        assert_eq!(settings.adafruit_io.feed, "ifttt");
        assert!(settings.hue.ip_address.is_none());
        assert!(!settings.server.enabled);

        let sequence = settings.sequence().unwrap();
        assert_eq!(sequence.duration, Duration::from_secs(30 * 60));
        assert_eq!(sequence.tick_interval, Duration::from_secs(3));
        assert_eq!(sequence.start_kelvin, 2000.0);
        assert_eq!(sequence.override_sensitivity, 0.05);
    }

    #[test]
    fn file_values_override_defaults() {
        let settings = from_toml(
            r#"
            [wake_up_sequence]
            duration = 1.5
            end_temperature = 5000
            x_bias = 0.01

            [hue]
            ip_address = "192.168.1.2"
            username = "abc"
            "#,
        )
        .unwrap();
        assert_eq!(settings.sequence().unwrap().duration, Duration::from_secs(90));
        assert_eq!(settings.wake_up_sequence.end_temperature, 5000.0);
        assert_eq!(settings.wake_up_sequence.x_bias, 0.01);
        assert_eq!(settings.hue.ip_address.as_deref(), Some("192.168.1.2"));
    }

    #[test]
    fn rejects_non_positive_duration() {
        let err = from_toml("[wake_up_sequence]\nduration = 0").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn rejects_non_finite_durations() {
        let err = from_toml("[wake_up_sequence]\nduration = inf").unwrap_err();
        assert!(matches!(
            err,
            AppError::Duration {
                field: "wake_up_sequence.duration",
                ..
            }
        ));

        let err = from_toml("[wake_up_sequence]\ntick_interval = inf").unwrap_err();
        assert!(matches!(
            err,
            AppError::Duration {
                field: "wake_up_sequence.tick_interval",
                ..
            }
        ));

        for toml in [
            "[wake_up_sequence]\nduration = nan",
            "[wake_up_sequence]\ntick_interval = nan",
        ] {
            let err = from_toml(toml).unwrap_err();
            assert!(matches!(
                err,
                AppError::Validation(_) | AppError::Duration { .. }
            ));
        }
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let err = from_toml("[wake_up_sequence]\nstarting_temperature = 50").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
