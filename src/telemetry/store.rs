use log::{debug, info};
use time::OffsetDateTime;

use crate::models::{Channel, Sample};
use crate::telemetry::ring::{ChannelRing, RingBuffer};
use crate::telemetry::router::MissingValuePolicy;
use crate::telemetry::state::ConnectionMachine;

/// Everything one session owns: channel buffers, time axis, link state
///
/// Only the router writes the buffers, and only `reset` clears them.
#[derive(Debug)]
pub struct TelemetryStore {
    pub(crate) channels: Vec<(Channel, ChannelRing)>,
    pub(crate) time_axis: RingBuffer<OffsetDateTime>,
    pub(crate) connection: ConnectionMachine,
    pub(crate) latest: Option<Sample>,
    pub(crate) policy: MissingValuePolicy,
}

impl TelemetryStore {
    /// Create one buffer per channel; duplicate channels are collapsed
    pub fn create(capacity: usize, channels: &[Channel], policy: MissingValuePolicy) -> Self {
        let mut unique: Vec<Channel> = Vec::with_capacity(channels.len());
        for &channel in channels {
            if !unique.contains(&channel) {
                unique.push(channel);
            }
        }

        let time_axis = RingBuffer::new(capacity);
        let capacity = time_axis.capacity();
        info!(
            "Telemetry store: {} channels, {} points, missing values: {}",
            unique.len(),
            capacity,
            policy
        );

        TelemetryStore {
            channels: unique
                .into_iter()
                .map(|c| (c, ChannelRing::new(capacity)))
                .collect(),
            time_axis,
            connection: ConnectionMachine::new(),
            latest: None,
            policy,
        }
    }

    /// Clear every buffer and the time axis, whatever the connection state
    pub fn reset(&mut self) {
        for (_, ring) in self.channels.iter_mut() {
            ring.reset();
        }
        self.time_axis.reset();
        info!("Telemetry buffers cleared");
    }

    /// End of session
    pub fn teardown(mut self) {
        self.connection.request_disconnect();
        if !self.is_empty() {
            debug!("Discarding {} buffered points", self.len());
        }
    }

    #[cfg(test)]
    pub fn channel(&self, channel: Channel) -> Option<&ChannelRing> {
        self.channels
            .iter()
            .find(|(c, _)| *c == channel)
            .map(|(_, ring)| ring)
    }

    #[cfg(test)]
    pub fn channels(&self) -> impl Iterator<Item = Channel> + '_ {
        self.channels.iter().map(|(c, _)| *c)
    }

    pub fn time_axis(&self) -> &RingBuffer<OffsetDateTime> {
        &self.time_axis
    }

    pub fn connection(&self) -> &ConnectionMachine {
        &self.connection
    }

    pub fn latest(&self) -> Option<&Sample> {
        self.latest.as_ref()
    }

    /// Length of the time axis, which every channel matches
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

    #[test]
    fn test_create_one_buffer_per_channel() {
        let store = TelemetryStore::create(20, &Channel::ALL, MissingValuePolicy::Zero);
        assert_eq!(store.channels().count(), 8);
        for channel in Channel::ALL {
            let ring = store.channel(channel).unwrap();
            assert!(ring.is_empty());
            assert_eq!(ring.capacity(), 20);
        }
        assert!(store.is_empty());
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_channel_subset_and_duplicates() {
        let store = TelemetryStore::create(
            5,
            &[Channel::Temperature, Channel::Pressure, Channel::Temperature],
            MissingValuePolicy::Zero,
        );
        let channels: Vec<_> = store.channels().collect();
        assert_eq!(channels, vec![Channel::Temperature, Channel::Pressure]);
        assert!(store.channel(Channel::AccelX).is_none());
    }
}
