use std::collections::VecDeque;

use time::OffsetDateTime;

/// One buffered channel entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChannelPoint {
    pub at: OffsetDateTime,
    /// NaN marks a gap when the gap policy is in use
    pub value: f64,
}

/// Fixed-capacity FIFO
///
/// Holds at most `capacity` entries; pushing past that drops the oldest one.
/// Used for every channel buffer and for the shared time axis.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

/// Per-channel buffer of `(timestamp, value)` entries
pub type ChannelRing = RingBuffer<ChannelPoint>;

impl<T: Copy> RingBuffer<T> {
    /// Capacity is clamped to at least one entry
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Append an entry, evicting the oldest one if the buffer overflows
    pub fn push(&mut self, entry: T) -> Option<T> {
        self.entries.push_back(entry);
        self.evict_if_full()
    }

    /// Drop the single oldest entry if length exceeds capacity
    pub fn evict_if_full(&mut self) -> Option<T> {
        if self.entries.len() > self.capacity {
            self.entries.pop_front()
        } else {
            None
        }
    }

    /// Copy of the contents, oldest first
    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().copied().collect()
    }

    pub fn reset(&mut self) {
        self.entries.clear();
    }

    pub fn latest(&self) -> Option<T> {
        self.entries.back().copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ChannelRing {
    pub fn push_point(&mut self, at: OffsetDateTime, value: f64) -> Option<ChannelPoint> {
        self.push(ChannelPoint { at, value })
    }

    #[cfg(test)]
    pub fn values(&self) -> Vec<f64> {
        self.entries.iter().map(|p| p.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    fn t(secs: i64) -> OffsetDateTime {
        OffsetDateTime::UNIX_EPOCH + Duration::seconds(secs)
    }

    #[test]
    fn test_never_exceeds_capacity() {
        let mut ring = ChannelRing::new(5);
        for i in 0..37 {
            ring.push_point(t(i), i as f64);
            assert!(ring.len() <= 5);
        }
        assert_eq!(ring.len(), 5);
    }

    #[test]
    fn test_fifo_eviction_keeps_last_n() {
        let mut ring = ChannelRing::new(4);
        let evicted: Vec<_> = (1..=5)
            .filter_map(|i| ring.push_point(t(i), i as f64))
            .collect();
        assert_eq!(evicted.len(), 1);
        assert_eq!(evicted[0].value, 1.0);
        assert_eq!(ring.values(), vec![2.0, 3.0, 4.0, 5.0]);
        let times: Vec<_> = ring.snapshot().iter().map(|p| p.at).collect();
        assert_eq!(times, vec![t(2), t(3), t(4), t(5)]);
    }

    #[test]
    fn test_evict_if_full_is_noop_under_capacity() {
        let mut ring: RingBuffer<u32> = RingBuffer::new(3);
        ring.push(1);
        assert_eq!(ring.evict_if_full(), None);
        assert_eq!(ring.snapshot(), vec![1]);
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ring = ChannelRing::new(3);
        ring.push_point(t(0), 1.0);
        ring.push_point(t(1), 2.0);
        ring.reset();
        assert!(ring.is_empty());
        assert_eq!(ring.latest(), None);
        assert_eq!(ring.capacity(), 3);
    }

    #[test]
    fn test_zero_capacity_clamped() {
        let mut ring: RingBuffer<u8> = RingBuffer::new(0);
        ring.push(1);
        ring.push(2);
        assert_eq!(ring.snapshot(), vec![2]);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let mut ring = ChannelRing::new(2);
        ring.push_point(t(0), 7.0);
        let copy = ring.snapshot();
        ring.push_point(t(1), 8.0);
        assert_eq!(copy.len(), 1);
        assert_eq!(copy[0].value, 7.0);
    }
}
