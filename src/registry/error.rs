//! Attach error types
//!
//! Every variant hands the rejected handle back to the caller, who stays
//! responsible for closing it.

use std::fmt;
use std::io;

/// Error returned when a handle cannot be attached
pub enum AttachError<H> {
    /// A client with the same handle key is already attached
    Duplicate(H),
    /// Burst minimum above burst maximum
    InvalidBurst(H),
    /// The poller refused the handle
    Register(H, io::Error),
    /// The sink has been stopped
    Stopped(H),
}

impl<H> AttachError<H> {
    /// Take back the rejected handle
    pub fn into_handle(self) -> H {
        match self {
            AttachError::Duplicate(h)
            | AttachError::InvalidBurst(h)
            | AttachError::Register(h, _)
            | AttachError::Stopped(h) => h,
        }
    }
}

impl<H> fmt::Debug for AttachError<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::Duplicate(_) => f.write_str("Duplicate"),
            AttachError::InvalidBurst(_) => f.write_str("InvalidBurst"),
            AttachError::Register(_, e) => f.debug_tuple("Register").field(e).finish(),
            AttachError::Stopped(_) => f.write_str("Stopped"),
        }
    }
}

impl<H> fmt::Display for AttachError<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttachError::Duplicate(_) => write!(f, "Handle already attached"),
            AttachError::InvalidBurst(_) => write!(f, "Burst minimum exceeds burst maximum"),
            AttachError::Register(_, e) => write!(f, "Failed to register handle: {}", e),
            AttachError::Stopped(_) => write!(f, "Sink is stopped"),
        }
    }
}

impl<H> std::error::Error for AttachError<H> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AttachError::Register(_, e) => Some(e),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_handle() {
        assert_eq!(AttachError::Duplicate(7u32).into_handle(), 7);
        let err = AttachError::Register(3u32, io::ErrorKind::Other.into());
        assert_eq!(err.into_handle(), 3);
    }

    #[test]
    fn test_display() {
        assert_eq!(AttachError::Duplicate(()).to_string(), "Handle already attached");
        assert_eq!(format!("{:?}", AttachError::Stopped(())), "Stopped");
    }
}
