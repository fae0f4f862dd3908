//! Notifications emitted by the sink
//!
//! Events arrive on an unbounded channel so emitting never blocks the
//! producer or the event loop. Receivers see them asynchronously: by the
//! time `ClientRemoving` is read the client is usually gone, which is why
//! it carries a statistics snapshot.

use std::fmt;

use tokio::sync::mpsc;

use crate::registry::ClientStatus;
use crate::stats::ClientStats;
use crate::transport::HandleKey;

/// Sender half used inside the sink
pub(crate) type EventSender<H> = mpsc::UnboundedSender<SinkEvent<H>>;

/// Receiver half handed to the owner of the sink
pub type EventReceiver<H> = mpsc::UnboundedReceiver<SinkEvent<H>>;

/// Events from the sink
pub enum SinkEvent<H> {
    /// A handle was attached
    ClientAdded { key: HandleKey },

    /// A client is being removed (or an attach was rejected as duplicate)
    ClientRemoving {
        key: HandleKey,
        status: ClientStatus,
        stats: ClientStats,
    },

    /// A client is gone; ownership of its handle returns to the caller
    HandleReleased { key: HandleKey, handle: H },

    /// The event loop failed and stopped
    Fatal { message: String },
}

impl<H> SinkEvent<H> {
    /// Key of the client the event refers to
    pub fn key(&self) -> Option<HandleKey> {
        match self {
            SinkEvent::ClientAdded { key }
            | SinkEvent::ClientRemoving { key, .. }
            | SinkEvent::HandleReleased { key, .. } => Some(*key),
            SinkEvent::Fatal { .. } => None,
        }
    }
}

impl<H> fmt::Debug for SinkEvent<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SinkEvent::ClientAdded { key } => f.debug_struct("ClientAdded").field("key", key).finish(),
            SinkEvent::ClientRemoving { key, status, stats } => f
                .debug_struct("ClientRemoving")
                .field("key", key)
                .field("status", status)
                .field("stats", stats)
                .finish(),
            SinkEvent::HandleReleased { key, .. } => {
                f.debug_struct("HandleReleased").field("key", key).finish_non_exhaustive()
            }
            SinkEvent::Fatal { message } => f.debug_struct("Fatal").field("message", message).finish(),
        }
    }
}

/// Send an event; a dropped receiver is not an error for the sink
pub(crate) fn emit<H>(tx: &EventSender<H>, event: SinkEvent<H>) {
    if tx.send(event).is_err() {
        tracing::trace!("Event receiver dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_key() {
        let event: SinkEvent<()> = SinkEvent::ClientAdded { key: HandleKey(4) };
        assert_eq!(event.key(), Some(HandleKey(4)));

        let event: SinkEvent<()> = SinkEvent::Fatal {
            message: "poll failed".into(),
        };
        assert_eq!(event.key(), None);
    }

    #[test]
    fn test_emit_without_receiver() {
        let (tx, rx) = mpsc::unbounded_channel::<SinkEvent<()>>();
        drop(rx);
        // Must not panic
        emit(&tx, SinkEvent::ClientAdded { key: HandleKey(1) });
    }

    #[test]
    fn test_debug_hides_handle() {
        let event = SinkEvent::HandleReleased {
            key: HandleKey(9),
            handle: (),
        };
        assert!(format!("{:?}", event).contains("HandleReleased"));
    }
}
