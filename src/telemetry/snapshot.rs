use time::OffsetDateTime;

use crate::models::{Channel, Sample};
use crate::telemetry::ring::ChannelPoint;
use crate::telemetry::state::ConnectionState;
use crate::telemetry::store::TelemetryStore;

/// Contents of one channel buffer, oldest first
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSeries {
    pub channel: Channel,
    pub points: Vec<ChannelPoint>,
}

impl ChannelSeries {
    pub fn values(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.value).collect()
    }
}

/// Read-only copy of the store for the renderer
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub series: Vec<ChannelSeries>,
    pub time_axis: Vec<OffsetDateTime>,
    pub latest: Option<Sample>,
    pub connection: ConnectionState,
    pub can_connect: bool,
    pub routing_enabled: bool,
}

impl Snapshot {
    /// Copy the whole store; the caller holds the store lock for the duration
    pub fn capture(store: &TelemetryStore) -> Self {
        Snapshot {
            series: store
                .channels
                .iter()
                .map(|(channel, ring)| ChannelSeries {
                    channel: *channel,
                    points: ring.snapshot(),
                })
                .collect(),
            time_axis: store.time_axis().snapshot(),
            latest: store.latest().cloned(),
            connection: store.connection().state().clone(),
            can_connect: store.connection().can_connect(),
            routing_enabled: store.connection().routing_enabled(),
        }
    }

    pub fn series(&self, channel: Channel) -> Option<&ChannelSeries> {
        self.series.iter().find(|s| s.channel == channel)
    }

    pub fn len(&self) -> usize {
        self.time_axis.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time_axis.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::router::{route, MissingValuePolicy};

    #[test]
    fn test_capture_reflects_store() {
        let mut store = TelemetryStore::create(3, &Channel::ALL, MissingValuePolicy::Zero);
        let link = store.connection.request_connect().unwrap();
        store.connection.link_established(link);

        let at = OffsetDateTime::UNIX_EPOCH;
        let sample = Sample {
            pressure: Some(42.0),
            ..Sample::empty(at)
        };
        route(&mut store, sample.clone(), at);

        let snapshot = Snapshot::capture(&store);
        assert_eq!(snapshot.len(), 1);
        assert_eq!(snapshot.series.len(), 8);
        assert_eq!(snapshot.series(Channel::Pressure).unwrap().values(), vec![42.0]);
        assert_eq!(snapshot.latest, Some(sample));
        assert_eq!(snapshot.connection, ConnectionState::Connected);
        assert!(snapshot.routing_enabled);
        assert!(!snapshot.can_connect);
    }

    #[test]
    fn test_capture_of_empty_store() {
        let store = TelemetryStore::create(3, &[Channel::Temperature], MissingValuePolicy::Zero);
        let snapshot = Snapshot::capture(&store);
        assert!(snapshot.is_empty());
        assert!(snapshot.latest.is_none());
        assert!(snapshot.can_connect);
        assert!(snapshot.series(Channel::Pressure).is_none());
    }
}
