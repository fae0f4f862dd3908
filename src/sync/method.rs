//! Initial position selection for newly attached clients
//!
//! Evaluated every time a new client gets a write opportunity until it
//! returns a position. Searching "older" means increasing index, "newer"
//! means decreasing index toward the head of the queue.

use std::fmt;
use std::str::FromStr;

use crate::buffer::{find_limits, find_sync_frame, BufferQueue, Direction, Limit, Thresholds};

/// Rule for choosing where a new client starts in the buffer history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SyncMethod {
    /// Start with the newest data, no keyframe wait
    #[default]
    Latest,
    /// Wait for the next sync point pushed after attaching
    NextKeyframe,
    /// Start at the most recent buffered sync point
    LatestKeyframe,
    /// Send a bounded amount of history
    Burst,
    /// Burst, but start on a sync point even if the window is violated
    BurstKeyframe,
    /// Burst, starting on a sync point only if one fits the window
    BurstWithKeyframe,
}

impl SyncMethod {
    /// Whether this method relies on sync points being buffered
    pub fn needs_keyframe(&self) -> bool {
        matches!(self, SyncMethod::LatestKeyframe | SyncMethod::BurstKeyframe)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SyncMethod::Latest => "latest",
            SyncMethod::NextKeyframe => "next-keyframe",
            SyncMethod::LatestKeyframe => "latest-keyframe",
            SyncMethod::Burst => "burst",
            SyncMethod::BurstKeyframe => "burst-keyframe",
            SyncMethod::BurstWithKeyframe => "burst-with-keyframe",
        }
    }
}

impl fmt::Display for SyncMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "latest" => Ok(SyncMethod::Latest),
            "next-keyframe" => Ok(SyncMethod::NextKeyframe),
            "latest-keyframe" => Ok(SyncMethod::LatestKeyframe),
            "burst" => Ok(SyncMethod::Burst),
            "burst-keyframe" => Ok(SyncMethod::BurstKeyframe),
            "burst-with-keyframe" => Ok(SyncMethod::BurstWithKeyframe),
            other => Err(format!("unknown sync method: {}", other)),
        }
    }
}

/// Pick the starting index for a new client
///
/// `position` is the client's current index (`None` = no data assigned
/// yet). `method` may be switched to `NextKeyframe` when the keyframe
/// methods find nothing usable. Returns `None` while the client has to keep
/// waiting; the caller then drops its position so only chunks pushed from
/// now on are considered.
pub fn initial_position(
    queue: &BufferQueue,
    position: Option<usize>,
    method: &mut SyncMethod,
    burst_min: Option<Limit>,
    burst_max: Option<Limit>,
) -> Option<usize> {
    match *method {
        SyncMethod::Latest => position,
        SyncMethod::NextKeyframe => next_keyframe(queue, position),
        SyncMethod::LatestKeyframe => {
            if let Some(found) = find_sync_frame(queue, 0, Direction::Older) {
                tracing::debug!(position = found, "Latest keyframe found");
                return Some(found);
            }
            tracing::debug!("No keyframe buffered, switching to next-keyframe");
            *method = SyncMethod::NextKeyframe;
            next_keyframe(queue, position)
        }
        SyncMethod::Burst => {
            let (min_idx, max_idx, max_hit) = burst_window(queue, burst_min, burst_max)?;
            if max_hit && max_idx <= min_idx {
                // Maximum reached before the minimum: send what fits under it
                let clamped = max_idx.saturating_sub(1);
                tracing::debug!(min_idx, max_idx, position = clamped, "Burst clamped by maximum");
                Some(clamped)
            } else {
                Some(min_idx)
            }
        }
        SyncMethod::BurstKeyframe => {
            let (min_idx, max_idx, _) = burst_window(queue, burst_min, burst_max)?;

            if let Some(found) = find_sync_frame(queue, min_idx, Direction::Older) {
                if found <= max_idx {
                    return Some(found);
                }
            }

            if let Some(found) = find_sync_frame(queue, min_idx, Direction::Newer) {
                tracing::warn!(
                    min_idx,
                    max_idx,
                    position = found,
                    "No keyframe in burst window, starting at a newer keyframe"
                );
                return Some(found);
            }

            tracing::debug!("No keyframe for burst, switching to next-keyframe");
            *method = SyncMethod::NextKeyframe;
            next_keyframe(queue, position)
        }
        SyncMethod::BurstWithKeyframe => {
            let (min_idx, max_idx, _) = burst_window(queue, burst_min, burst_max)?;

            match find_sync_frame(queue, min_idx, Direction::Older) {
                Some(found) if found <= max_idx => Some(found),
                _ => Some(min_idx),
            }
        }
    }
}

fn next_keyframe(queue: &BufferQueue, position: Option<usize>) -> Option<usize> {
    let position = position?;
    find_sync_frame(queue, position, Direction::Newer)
}

fn burst_window(
    queue: &BufferQueue,
    burst_min: Option<Limit>,
    burst_max: Option<Limit>,
) -> Option<(usize, usize, bool)> {
    let limits = find_limits(
        queue,
        &Thresholds::from_limit(burst_min),
        &Thresholds::from_limit(burst_max),
    )?;
    if !limits.satisfied {
        tracing::debug!(
            min_idx = limits.min_idx,
            max_idx = limits.max_idx,
            "Burst minimum not satisfiable yet"
        );
    }
    Some((limits.min_idx, limits.max_idx, limits.max_hit))
}
