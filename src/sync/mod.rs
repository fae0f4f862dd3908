//! Client positioning
//!
//! Pure functions over the buffer queue deciding where a client reads:
//! - `method`: the first position of a newly attached client
//! - `recovery`: the new position of a client lagging past the soft maximum

pub mod method;
pub mod recovery;

pub use method::{initial_position, SyncMethod};
pub use recovery::{recover, RecoverPolicy, Recovery};
