//! Statistics for clients and the sink as a whole

pub mod metrics;

pub use metrics::{ClientStats, SinkStats};
