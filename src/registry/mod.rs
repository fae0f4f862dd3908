//! Client registry
//!
//! The registry holds every attached client, keyed by its stream handle.
//! Each client carries a cursor into the shared buffer queue plus its own
//! send queue of `Chunk`s being written out.
//!
//! # Architecture
//!
//! ```text
//!                        Mutex<SinkState>
//!                  ┌───────────────────────────┐
//!                  │ queue: BufferQueue        │
//!                  │ clients: ClientRegistry { │
//!                  │   Token -> Client {       │
//!                  │     position,             │
//!                  │     send_queue,           │
//!                  │   }                       │
//!                  │ }                         │
//!                  └─────────────┬─────────────┘
//!                                │
//!         ┌──────────────────────┼──────────────────────┐
//!         │                      │                      │
//!         ▼                      ▼                      ▼
//!     [Producer]            [EventLoop]            [Any thread]
//!     push()                writable -> write      attach()/detach()
//! ```
//!
//! # Zero-Copy Design
//!
//! `Chunk` payloads are `bytes::Bytes`, so the queue and every client send
//! queue share one allocation per chunk.

pub mod entry;
pub mod error;
pub mod store;

pub use entry::{Client, ClientSettings, ClientStatus};
pub use error::AttachError;
pub use store::ClientRegistry;
