//! Fan-out sink engine
//!
//! This module provides:
//! - `FanoutSink`, the handle the producer pushes chunks into
//! - `SinkConfig`, limits, recovery and sync defaults
//! - `SinkEvent`, client lifecycle notifications
//! - The mio event loop writing to attached clients

pub mod config;
pub mod events;
pub mod sink;

mod event_loop;
mod state;

pub use config::SinkConfig;
pub use events::{EventReceiver, SinkEvent};
pub use sink::FanoutSink;
