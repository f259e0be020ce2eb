// ramp.rs
use std::time::Duration;

use crate::{chromaticity::ChromaticityTable, error::EmptyTableError, models::FixtureCommand};

use super::SequenceConfig;

pub const MIN_BRIGHTNESS: u8 = 1;
pub const MAX_BRIGHTNESS: u8 = 254;

/// Share of the ramp covered after `elapsed`, in percent.
pub fn progress(elapsed: Duration, duration: Duration) -> f64 {
    if duration.is_zero() {
        return 100.0;
    }
    (100.0 * elapsed.as_secs_f64() / duration.as_secs_f64()).clamp(0.0, 100.0)
}

/// Never 0 while running; 0 would read back as off.
pub fn brightness(percent: f64) -> u8 {
    (percent * f64::from(MAX_BRIGHTNESS) / 100.0)
        .round()
        .clamp(f64::from(MIN_BRIGHTNESS), f64::from(MAX_BRIGHTNESS)) as u8
}

pub fn kelvin(start: f64, end: f64, percent: f64) -> f64 {
    start + (end - start) * percent / 100.0
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Fixture state the ramp asks for at `percent`.
pub fn target(
    config: &SequenceConfig,
    table: &ChromaticityTable,
    percent: f64,
) -> Result<FixtureCommand, EmptyTableError> {
    let (x, y) = table.nearest(kelvin(config.start_kelvin, config.end_kelvin, percent))?;
    Ok(FixtureCommand {
        on: true,
        brightness: brightness(percent),
        x: round2(x),
        y: round2(y),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chromaticity::ChromaticityEntry;

    #[test]
    fn brightness_is_monotonic_and_bounded() {
        let mut previous = 0;
        for step in 0..=10_000 {
            let value = brightness(step as f64 / 100.0);
            assert!((MIN_BRIGHTNESS..=MAX_BRIGHTNESS).contains(&value));
            assert!(value >= previous);
            previous = value;
        }
        assert_eq!(brightness(0.0), 1);
        assert_eq!(brightness(50.0), 127);
        assert_eq!(brightness(100.0), 254);
    }

    #[test]
    fn progress_is_clamped() {
        let minute = Duration::from_secs(60);
        assert_eq!(progress(Duration::ZERO, minute), 0.0);
        assert_eq!(progress(Duration::from_secs(30), minute), 50.0);
        assert_eq!(progress(Duration::from_secs(600), minute), 100.0);
        assert_eq!(progress(Duration::from_secs(1), Duration::ZERO), 100.0);
    }

    #[test]
    fn kelvin_interpolates_both_directions() {
        assert_eq!(kelvin(2000.0, 6000.0, 50.0), 4000.0);
        assert_eq!(kelvin(6000.0, 2000.0, 25.0), 5000.0);
        assert_eq!(kelvin(2000.0, 6000.0, 100.0), 6000.0);
    }

    #[test]
    fn target_rounds_coordinates() {
        let table = ChromaticityTable::from_entries(vec![
            ChromaticityEntry {
                kelvin: 2000.0,
                x: 0.52671,
                y: 0.41329,
            },
            ChromaticityEntry {
                kelvin: 6500.0,
                x: 0.31352,
                y: 0.32367,
            },
        ]);
        let config = SequenceConfig {
            start_kelvin: 2000.0,
            end_kelvin: 6500.0,
            ..SequenceConfig::default()
        };

        let first = target(&config, &table, 0.0).unwrap();
        assert_eq!(
            first,
            FixtureCommand {
                on: true,
                brightness: 1,
                x: 0.53,
                y: 0.41,
            }
        );
        let last = target(&config, &table, 100.0).unwrap();
        assert_eq!((last.brightness, last.x, last.y), (254, 0.31, 0.32));
    }
}
