//! Translation of byte/time/buffer-count limits into queue indices
//!
//! All scans start at index 0 (newest) and walk toward older data. Time is
//! measured as the timestamp of the first timestamped chunk seen minus the
//! timestamp of the current chunk; chunks without a timestamp do not move
//! the time accumulator.

use std::fmt;
use std::time::Duration;

use super::chunk::Chunk;
use super::queue::BufferQueue;

/// A limit expressed in one of the three supported units
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Limit {
    /// Number of chunks
    Buffers(usize),
    /// Payload bytes
    Bytes(u64),
    /// Timestamp span
    Time(Duration),
}

impl Limit {
    /// Compare two limits of the same unit; `None` if the units differ
    pub fn exceeds(&self, other: &Limit) -> Option<bool> {
        match (self, other) {
            (Limit::Buffers(a), Limit::Buffers(b)) => Some(a > b),
            (Limit::Bytes(a), Limit::Bytes(b)) => Some(a > b),
            (Limit::Time(a), Limit::Time(b)) => Some(a > b),
            _ => None,
        }
    }
}

impl fmt::Display for Limit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Limit::Buffers(n) => write!(f, "{} buffers", n),
            Limit::Bytes(n) => write!(f, "{} bytes", n),
            Limit::Time(d) => write!(f, "{:?}", d),
        }
    }
}

/// A set of optional thresholds, one per unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Thresholds {
    pub bytes: Option<u64>,
    pub buffers: Option<usize>,
    pub time: Option<Duration>,
}

impl Thresholds {
    /// Thresholds with only the unit of `limit` set
    pub fn from_limit(limit: Option<Limit>) -> Self {
        let mut thresholds = Self::default();
        match limit {
            Some(Limit::Buffers(n)) => thresholds.buffers = Some(n),
            Some(Limit::Bytes(n)) => thresholds.bytes = Some(n),
            Some(Limit::Time(d)) => thresholds.time = Some(d),
            None => {}
        }
        thresholds
    }

    /// Whether no threshold is set
    pub fn is_unset(&self) -> bool {
        self.bytes.is_none() && self.buffers.is_none() && self.time.is_none()
    }
}

/// Result of [`find_limits`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FoundLimits {
    /// Smallest index at which every minimum is satisfied
    pub min_idx: usize,
    /// Index at which a maximum was reached, else the oldest index
    pub max_idx: usize,
    /// Whether a maximum was actually reached inside the queue
    pub max_hit: bool,
    /// Whether the minimums could be satisfied with the current queue
    pub satisfied: bool,
}

/// Direction of a sync-point scan
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward older data (increasing index)
    Older,
    /// Toward newer data (decreasing index, toward 0)
    Newer,
}

/// Index at which `limit` is exceeded, scanning from the newest chunk
///
/// Buffer limits map to themselves. Byte and time limits return `i + 1`
/// for the first index `i` whose accumulated value exceeds the limit, or
/// `len + 1` if the queue never exceeds it.
pub fn resolve_unit_limit(queue: &BufferQueue, limit: Limit) -> usize {
    match limit {
        Limit::Buffers(n) => n,
        Limit::Bytes(max) => {
            let mut acc = 0u64;
            for (i, chunk) in queue.iter().enumerate() {
                acc += chunk.size() as u64;
                if acc > max {
                    return i + 1;
                }
            }
            queue.len() + 1
        }
        Limit::Time(max) => {
            let mut first = None;
            for (i, chunk) in queue.iter().enumerate() {
                if let Some(span) = time_span(&mut first, chunk) {
                    if span > max {
                        return i + 1;
                    }
                }
            }
            queue.len() + 1
        }
    }
}

/// Combined scan for the minimum and maximum ranges
///
/// Returns `None` for an empty queue. When the queue holds fewer chunks
/// than the minimum buffer count both indices collapse to `len - 1` and the
/// result is reported as not satisfied.
pub fn find_limits(queue: &BufferQueue, min: &Thresholds, max: &Thresholds) -> Option<FoundLimits> {
    let len = queue.len();
    if len == 0 {
        return None;
    }

    if min.buffers.is_some_and(|n| len < n) {
        return Some(FoundLimits {
            min_idx: len - 1,
            max_idx: len - 1,
            max_hit: false,
            satisfied: false,
        });
    }

    let mut bytes_ok = min.bytes.is_none();
    let mut buffers_ok = min.buffers.is_none();
    let mut time_ok = min.time.is_none();

    let mut min_idx = None;
    let mut max_idx = None;
    let mut bytes = 0u64;
    let mut first = None;

    for (i, chunk) in queue.iter().enumerate() {
        bytes += chunk.size() as u64;
        let count = i + 1;
        let span = time_span(&mut first, chunk);

        bytes_ok = bytes_ok || min.bytes.is_some_and(|b| bytes >= b);
        buffers_ok = buffers_ok || min.buffers.is_some_and(|n| count >= n);
        time_ok = time_ok || matches!((min.time, span), (Some(t), Some(s)) if s >= t);

        if min_idx.is_none() && bytes_ok && buffers_ok && time_ok {
            min_idx = Some(i);
        }

        let max_reached = max.bytes.is_some_and(|b| bytes >= b)
            || max.buffers.is_some_and(|n| count >= n)
            || matches!((max.time, span), (Some(t), Some(s)) if s >= t);

        if max_reached {
            max_idx = Some(i);
            break;
        }
    }

    let max_hit = max_idx.is_some();
    let max_idx = max_idx.unwrap_or(len - 1);
    let satisfied = min_idx.is_some();

    Some(FoundLimits {
        min_idx: min_idx.unwrap_or(max_idx),
        max_idx,
        max_hit,
        satisfied,
    })
}

/// Nearest sync point starting at `from` (inclusive) in `direction`
pub fn find_sync_frame(queue: &BufferQueue, from: usize, direction: Direction) -> Option<usize> {
    let len = queue.len();
    if len == 0 {
        return None;
    }

    match direction {
        Direction::Older => (from..len).find(|&i| is_sync(queue, i)),
        Direction::Newer => (0..=from.min(len - 1)).rev().find(|&i| is_sync(queue, i)),
    }
}

fn is_sync(queue: &BufferQueue, index: usize) -> bool {
    queue.get(index).is_some_and(|c| c.is_sync_point)
}

/// Span between the first timestamped chunk and `chunk`, if it has a timestamp
fn time_span(first: &mut Option<Duration>, chunk: &Chunk) -> Option<Duration> {
    let ts = chunk.timestamp?;
    let first = *first.get_or_insert(ts);
    Some(first.saturating_sub(ts))
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Queue built oldest-first from `(timestamp_ms, size, sync)` triples
    fn queue_of(entries: &[(u64, usize, bool)]) -> BufferQueue {
        let mut queue = BufferQueue::new();
        for &(ts, size, sync) in entries {
            let mut chunk = Chunk::new(vec![0u8; size]).with_timestamp(Duration::from_millis(ts));
            chunk.is_sync_point = sync;
            queue.push(chunk);
        }
        queue
    }

    fn uniform(count: u64) -> BufferQueue {
        let entries: Vec<_> = (0..count).map(|i| (i * 10, 100, false)).collect();
        queue_of(&entries)
    }

    #[test]
    fn test_resolve_buffers() {
        let queue = uniform(3);
        assert_eq!(resolve_unit_limit(&queue, Limit::Buffers(5)), 5);
    }

    #[test]
    fn test_resolve_bytes() {
        let queue = uniform(10);
        // 100 bytes each: exceeding 250 happens at index 2
        assert_eq!(resolve_unit_limit(&queue, Limit::Bytes(250)), 3);
        // Exactly 300 is not exceeded until index 3
        assert_eq!(resolve_unit_limit(&queue, Limit::Bytes(300)), 4);
        // Never exceeded
        assert_eq!(resolve_unit_limit(&queue, Limit::Bytes(5000)), 11);
    }

    #[test]
    fn test_resolve_time_skips_untimed() {
        let mut queue = uniform(5); // timestamps 0..40ms, newest = 40
        queue.push(Chunk::new(vec![0u8; 1])); // untimed newest chunk
        // Spans from index 1: 0, 10, 20, 30, 40
        assert_eq!(resolve_unit_limit(&queue, Limit::Time(Duration::from_millis(15))), 4);
        assert_eq!(
            resolve_unit_limit(&queue, Limit::Time(Duration::from_secs(1))),
            queue.len() + 1
        );
    }

    #[test]
    fn test_find_limits_buffers() {
        let queue = uniform(10);
        let min = Thresholds::from_limit(Some(Limit::Buffers(4)));
        let limits = find_limits(&queue, &min, &Thresholds::default()).unwrap();

        assert_eq!(limits.min_idx, 3);
        assert_eq!(limits.max_idx, 9);
        assert!(!limits.max_hit);
        assert!(limits.satisfied);
    }

    #[test]
    fn test_find_limits_exact_queue_length() {
        let queue = uniform(4);
        let min = Thresholds::from_limit(Some(Limit::Buffers(4)));
        let limits = find_limits(&queue, &min, &Thresholds::default()).unwrap();
        assert_eq!(limits.min_idx, 3);
        assert!(limits.satisfied);
    }

    #[test]
    fn test_find_limits_not_enough_buffers() {
        let queue = uniform(3);
        let min = Thresholds::from_limit(Some(Limit::Buffers(5)));
        let limits = find_limits(&queue, &min, &Thresholds::default()).unwrap();

        assert_eq!(limits.min_idx, 2);
        assert_eq!(limits.max_idx, 2);
        assert!(!limits.satisfied);
    }

    #[test]
    fn test_find_limits_max_before_min() {
        let queue = uniform(10);
        let min = Thresholds::from_limit(Some(Limit::Buffers(5)));
        let max = Thresholds::from_limit(Some(Limit::Buffers(3)));
        let limits = find_limits(&queue, &min, &max).unwrap();

        assert_eq!(limits.max_idx, 2);
        assert!(limits.max_hit);
        // Minimum never reached before the scan stopped
        assert!(!limits.satisfied);
        assert_eq!(limits.min_idx, 2);
    }

    #[test]
    fn test_find_limits_bytes_and_time() {
        let queue = uniform(10); // 100 bytes, 10ms apart
        let min = Thresholds {
            bytes: Some(250),
            time: Some(Duration::from_millis(40)),
            buffers: None,
        };
        let max = Thresholds::from_limit(Some(Limit::Bytes(800)));
        let limits = find_limits(&queue, &min, &max).unwrap();

        // Bytes satisfied at index 2, time at index 4
        assert_eq!(limits.min_idx, 4);
        // 800 bytes reached at index 7
        assert_eq!(limits.max_idx, 7);
        assert!(limits.max_hit);
        assert!(limits.satisfied);
    }

    #[test]
    fn test_find_limits_unset_min() {
        let queue = uniform(3);
        let limits = find_limits(&queue, &Thresholds::default(), &Thresholds::default()).unwrap();
        assert_eq!(limits.min_idx, 0);
        assert!(limits.satisfied);
    }

    #[test]
    fn test_find_limits_empty() {
        let queue = BufferQueue::new();
        assert!(find_limits(&queue, &Thresholds::default(), &Thresholds::default()).is_none());
    }

    #[test]
    fn test_find_sync_frame() {
        // Oldest-first: index after push = 4,3,2,1,0
        let queue = queue_of(&[
            (0, 1, true),
            (10, 1, false),
            (20, 1, true),
            (30, 1, false),
            (40, 1, false),
        ]);

        assert_eq!(find_sync_frame(&queue, 0, Direction::Older), Some(2));
        assert_eq!(find_sync_frame(&queue, 3, Direction::Older), Some(4));
        assert_eq!(find_sync_frame(&queue, 1, Direction::Newer), None);
        assert_eq!(find_sync_frame(&queue, 3, Direction::Newer), Some(2));
        // Out-of-range start clamps to the oldest chunk
        assert_eq!(find_sync_frame(&queue, 99, Direction::Newer), Some(4));
        assert_eq!(find_sync_frame(&queue, 99, Direction::Older), None);
    }

    #[test]
    fn test_limit_exceeds() {
        assert_eq!(Limit::Buffers(5).exceeds(&Limit::Buffers(3)), Some(true));
        assert_eq!(Limit::Bytes(5).exceeds(&Limit::Bytes(30)), Some(false));
        assert_eq!(Limit::Buffers(5).exceeds(&Limit::Bytes(3)), None);
    }
}
