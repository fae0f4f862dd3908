//! Chunk type shared between the buffer queue and client send queues

use std::time::Duration;

use bytes::Bytes;

/// One immutable unit of producer data
///
/// Cheap to clone: the payload is a reference-counted `Bytes`, so the
/// queue and every client send queue share the same allocation.
#[derive(Debug, Clone)]
pub struct Chunk {
    /// Payload (zero-copy via reference counting)
    pub data: Bytes,
    /// Presentation timestamp, if known
    pub timestamp: Option<Duration>,
    /// Whether a new consumer can start decoding here
    pub is_sync_point: bool,
    /// Whether this is format/header metadata rather than stream data
    pub is_header: bool,
}

impl Chunk {
    /// Create a plain data chunk (not a sync point)
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            timestamp: None,
            is_sync_point: false,
            is_header: false,
        }
    }

    /// Create a sync-point (keyframe) chunk
    pub fn sync_point(data: impl Into<Bytes>) -> Self {
        Self {
            is_sync_point: true,
            ..Self::new(data)
        }
    }

    /// Create a header/metadata chunk
    pub fn header(data: impl Into<Bytes>) -> Self {
        Self {
            is_header: true,
            ..Self::new(data)
        }
    }

    /// Attach a timestamp
    pub fn with_timestamp(mut self, timestamp: Duration) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    /// Size of the payload in bytes
    pub fn size(&self) -> usize {
        self.data.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constructors() {
        let chunk = Chunk::new(&b"abc"[..]);
        assert_eq!(chunk.size(), 3);
        assert!(!chunk.is_sync_point);
        assert!(!chunk.is_header);
        assert!(chunk.timestamp.is_none());

        let key = Chunk::sync_point(vec![0u8; 10]).with_timestamp(Duration::from_millis(40));
        assert!(key.is_sync_point);
        assert_eq!(key.timestamp, Some(Duration::from_millis(40)));

        assert!(Chunk::header(Bytes::from_static(b"hdr")).is_header);
    }

    #[test]
    fn test_clone_shares_payload() {
        let chunk = Chunk::new(vec![7u8; 1024]);
        let copy = chunk.clone();
        assert_eq!(chunk.data.as_ptr(), copy.data.as_ptr());
    }
}
