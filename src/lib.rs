//! Fan-out broadcast buffer
//!
//! One producer pushes [`Chunk`]s into a shared, newest-first history. Any
//! number of non-blocking stream handles read from that history, each at its
//! own position, written to by a dedicated mio event loop.
//!
//! # Features
//!
//! - Start positions for late joiners: latest, next or latest keyframe, and
//!   burst windows measured in buffers, bytes or time
//! - Hard maximum lag (slow clients are dropped) and soft maximum with
//!   configurable recovery
//! - Header chunks resent ahead of the first data chunk
//! - Flushing detach that drains what a client was already assigned
//! - Per-client and sink-wide statistics
//!
//! # Example
//!
//! ```no_run
//! use fanout_rs::{Chunk, FanoutSink, Limit, SinkConfig, SinkEvent, SyncMethod};
//! use mio::net::TcpStream;
//!
//! # fn main() -> fanout_rs::Result<()> {
//! let config = SinkConfig::default()
//!     .max(Limit::Buffers(500))
//!     .sync_method(SyncMethod::LatestKeyframe);
//! let (sink, mut events) = FanoutSink::<TcpStream>::start(config)?;
//!
//! sink.push(Chunk::sync_point(&b"keyframe"[..]))?;
//!
//! // Handles come back to the caller once removed
//! while let Ok(event) = events.try_recv() {
//!     if let SinkEvent::HandleReleased { key, .. } = event {
//!         println!("client {} released", key);
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod buffer;
pub mod error;
pub mod registry;
pub mod server;
pub mod stats;
pub mod sync;
pub mod transport;

pub use buffer::{BufferQueue, Chunk, Limit};
pub use error::{Error, Result};
pub use registry::{AttachError, ClientSettings, ClientStatus};
pub use server::{EventReceiver, FanoutSink, SinkConfig, SinkEvent};
pub use stats::{ClientStats, SinkStats};
pub use sync::{RecoverPolicy, SyncMethod};
pub use transport::{FdHandle, HandleKey, StreamHandle};
