/// Sample routing into the channel buffers
use std::fmt;
use std::str::FromStr;

use log::debug;
use time::OffsetDateTime;

use crate::models::Sample;
use crate::telemetry::store::TelemetryStore;

/// What to push for a channel whose field is absent from a sample
///
/// Every channel gets an entry on every tick so all buffers share one time
/// axis. `Zero` is the default but makes a real zero reading
/// look the same as missing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MissingValuePolicy {
    #[default]
    Zero,
    /// Repeat the channel's previous value, zero if there is none
    HoldLast,
    /// Push NaN; renderers break the line there
    Gap,
}

impl fmt::Display for MissingValuePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MissingValuePolicy::Zero => write!(f, "zero"),
            MissingValuePolicy::HoldLast => write!(f, "hold"),
            MissingValuePolicy::Gap => write!(f, "gap"),
        }
    }
}

impl FromStr for MissingValuePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "zero" => Ok(MissingValuePolicy::Zero),
            "hold" | "hold-last" | "hold_last" => Ok(MissingValuePolicy::HoldLast),
            "gap" | "null" => Ok(MissingValuePolicy::Gap),
            other => Err(format!("unknown missing-value policy '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteOutcome {
    /// One entry appended to every channel and the time axis
    Routed,
    /// Not connected; nothing changed
    Gated,
}

/// Write one sample into every channel buffer at `now`
///
/// Dropped entirely unless the store is connected. Otherwise each channel
/// gets exactly one entry and the time axis gets `now`, so every buffer
/// keeps the same length as the axis.
pub fn route(store: &mut TelemetryStore, sample: Sample, now: OffsetDateTime) -> RouteOutcome {
    if !store.connection.routing_enabled() {
        debug!("Dropping sample while {}", store.connection.state());
        return RouteOutcome::Gated;
    }

    let policy = store.policy;
    for (channel, ring) in store.channels.iter_mut() {
        let value = match sample.value(*channel) {
            Some(value) => value,
            None => match policy {
                MissingValuePolicy::Zero => 0.0,
                MissingValuePolicy::HoldLast => ring
                    .latest()
                    .map(|p| p.value)
                    .filter(|v| !v.is_nan())
                    .unwrap_or(0.0),
                MissingValuePolicy::Gap => f64::NAN,
            },
        };
        ring.push_point(now, value);
    }
    store.time_axis.push(now);
    store.latest = Some(sample);

    RouteOutcome::Routed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Channel, Vector3};
    use time::Duration;

    fn t(secs: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    fn connected(capacity: usize, policy: MissingValuePolicy) -> TelemetryStore {
        let mut store = TelemetryStore::create(capacity, &Channel::ALL, policy);
        let link = store.connection.request_connect().unwrap();
        store.connection.link_established(link);
        store
    }

    fn pressure(value: f64, at: OffsetDateTime) -> Sample {
        Sample {
            pressure: Some(value),
            ..Sample::empty(at)
        }
    }

    fn assert_synchronized(store: &TelemetryStore) {
        for channel in store.channels() {
            assert_eq!(store.channel(channel).unwrap().len(), store.time_axis().len());
        }
    }

    #[test]
    fn test_rolling_window_keeps_latest_values() {
        let mut store = connected(20, MissingValuePolicy::Zero);
        for i in 1..=25 {
            assert_eq!(route(&mut store, pressure(i as f64, t(i)), t(i)), RouteOutcome::Routed);
        }
        let values = store.channel(Channel::Pressure).unwrap().values();
        let expected: Vec<f64> = (6..=25).map(|i| i as f64).collect();
        assert_eq!(values, expected);
        assert_eq!(store.time_axis().snapshot().first(), Some(&t(6)));
        assert_synchronized(&store);
    }

    #[test]
    fn test_axis_synchrony_with_mixed_samples() {
        let mut store = connected(7, MissingValuePolicy::Zero);
        for i in 0..30 {
            let mut sample = Sample::empty(t(i));
            if i % 2 == 0 {
                sample.acceleration = Some(Vector3 {
                    x: Some(1.0),
                    ..Vector3::default()
                });
            }
            if i % 3 == 0 {
                sample.temperature = Some(20.0);
            }
            route(&mut store, sample, t(i));
            assert_synchronized(&store);
            assert!(store.len() <= 7);
        }
    }

    #[test]
    fn test_gate_blocks_when_not_connected() {
        let mut store = TelemetryStore::create(10, &Channel::ALL, MissingValuePolicy::Zero);
        assert_eq!(route(&mut store, pressure(1.0, t(0)), t(0)), RouteOutcome::Gated);
        assert!(store.is_empty());
        assert!(store.latest().is_none());

        store.connection.request_connect().unwrap();
        assert_eq!(route(&mut store, pressure(1.0, t(1)), t(1)), RouteOutcome::Gated);
        assert!(store.is_empty());
    }

    #[test]
    fn test_partial_sample_zero_fills() {
        let mut store = connected(10, MissingValuePolicy::Zero);
        let sample = Sample {
            temperature: Some(23.25),
            ..Sample::empty(t(0))
        };
        route(&mut store, sample, t(0));
        for channel in Channel::ALL {
            let expected = if channel == Channel::Temperature { 23.25 } else { 0.0 };
            assert_eq!(store.channel(channel).unwrap().values(), vec![expected]);
        }
        assert_eq!(store.latest().and_then(|s| s.temperature), Some(23.25));
    }

    #[test]
    fn test_hold_last_repeats_previous_value() {
        let mut store = connected(10, MissingValuePolicy::HoldLast);
        route(&mut store, Sample::empty(t(0)), t(0));
        route(&mut store, pressure(300.0, t(1)), t(1));
        route(&mut store, Sample::empty(t(2)), t(2));
        assert_eq!(
            store.channel(Channel::Pressure).unwrap().values(),
            vec![0.0, 300.0, 300.0]
        );
    }

    #[test]
    fn test_gap_pushes_nan_marker() {
        let mut store = connected(10, MissingValuePolicy::Gap);
        route(&mut store, pressure(5.0, t(0)), t(0));
        route(&mut store, Sample::empty(t(1)), t(1));
        let values = store.channel(Channel::Pressure).unwrap().values();
        assert_eq!(values[0], 5.0);
        assert!(values[1].is_nan());
        assert!(store.channel(Channel::GyroY).unwrap().values()[0].is_nan());
        assert_synchronized(&store);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!("zero".parse(), Ok(MissingValuePolicy::Zero));
        assert_eq!(" HOLD ".parse(), Ok(MissingValuePolicy::HoldLast));
        assert_eq!("gap".parse(), Ok(MissingValuePolicy::Gap));
        assert!("interpolate".parse::<MissingValuePolicy>().is_err());
    }
}
