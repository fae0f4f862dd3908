//! Buffer history shared by all clients
//!
//! This module provides:
//! - `Chunk`, the immutable unit of producer data
//! - `BufferQueue`, the newest-first history plus the header set
//! - Limit math translating buffer/byte/time limits into queue indices

pub mod chunk;
pub mod limits;
pub mod queue;

pub use chunk::Chunk;
pub use limits::{find_limits, find_sync_frame, resolve_unit_limit, Direction, FoundLimits, Limit, Thresholds};
pub use queue::BufferQueue;
