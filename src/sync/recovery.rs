//! Recovery of clients lagging past the soft maximum

use std::fmt;
use std::str::FromStr;

use crate::buffer::{resolve_unit_limit, BufferQueue, Limit};

/// Rule for repositioning a lagging client instead of removing it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoverPolicy {
    /// Leave the client alone; it catches up or hits the hard maximum
    #[default]
    None,
    /// Jump to the newest data
    ResyncLatest,
    /// Jump to the soft maximum
    ResyncSoftLimit,
    /// Jump to the closest sync point inside the soft maximum
    ResyncKeyframe,
}

impl RecoverPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecoverPolicy::None => "none",
            RecoverPolicy::ResyncLatest => "resync-latest",
            RecoverPolicy::ResyncSoftLimit => "resync-soft-limit",
            RecoverPolicy::ResyncKeyframe => "resync-keyframe",
        }
    }
}

impl fmt::Display for RecoverPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecoverPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(RecoverPolicy::None),
            "resync-latest" => Ok(RecoverPolicy::ResyncLatest),
            "resync-soft-limit" => Ok(RecoverPolicy::ResyncSoftLimit),
            "resync-keyframe" => Ok(RecoverPolicy::ResyncKeyframe),
            other => Err(format!("unknown recover policy: {}", other)),
        }
    }
}

/// Outcome of a recovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recovery {
    /// New position (`None` = wait for the next chunk)
    pub position: Option<usize>,
    /// Chunks skipped by the jump
    pub dropped: u64,
}

/// Compute the recovery position for a client at `position`
///
/// Returns `None` when the policy leaves the client where it is. The new
/// position never lies beyond the old one.
pub fn recover(
    queue: &BufferQueue,
    policy: RecoverPolicy,
    soft_max: Limit,
    position: usize,
) -> Option<Recovery> {
    let new_position = match policy {
        RecoverPolicy::None => return None,
        RecoverPolicy::ResyncLatest => None,
        RecoverPolicy::ResyncSoftLimit => {
            let soft_idx = resolve_unit_limit(queue, soft_max);
            Some(soft_idx.min(queue.len().saturating_sub(1)))
        }
        RecoverPolicy::ResyncKeyframe => {
            let soft_idx = resolve_unit_limit(queue, soft_max);
            let start = queue.len().saturating_sub(1).min(soft_idx.saturating_sub(1));
            (0..=start)
                .rev()
                .find(|&i| queue.get(i).is_some_and(|c| c.is_sync_point))
        }
    };

    let new_position = new_position.map(|p| p.min(position));
    if new_position == Some(position) {
        return None;
    }

    // A cleared position sits conceptually at -1
    let dropped = (position + 1 - new_position.map_or(0, |p| p + 1)) as u64;
    Some(Recovery {
        position: new_position,
        dropped,
    })
}
