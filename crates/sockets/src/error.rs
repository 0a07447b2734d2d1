use std::io;
use thiserror::Error;

/// Failure outcome delivered to operations suspended on a selectable.
///
/// Stored by value inside the selectable so every waiter resumed by the same
/// failure observes it, which is why the io error is flattened into a kind and
/// a reason instead of being kept as an [`io::Error`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SelectError {
    #[error("channel closed")]
    Closed,

    #[error("selector closed, operation cancelled")]
    Cancelled,

    #[error("selector registration failed: {reason}")]
    Registration { kind: io::ErrorKind, reason: String },
}

impl SelectError {
    pub fn registration(e: &io::Error) -> Self {
        Self::Registration { kind: e.kind(), reason: e.to_string() }
    }

    /// Returns true if the io error was produced by a closed socket or a
    /// closed selector, i.e. retrying the operation can never succeed.
    pub fn is_terminal(e: &io::Error) -> bool {
        matches!(Self::from_io(e), Some(Self::Closed | Self::Cancelled))
    }

    /// Recovers the select failure carried by an io error, if any.
    pub fn from_io(e: &io::Error) -> Option<&Self> {
        e.get_ref().and_then(|inner| inner.downcast_ref::<Self>())
    }
}

impl From<SelectError> for io::Error {
    fn from(e: SelectError) -> Self {
        let kind = match &e {
            SelectError::Closed => io::ErrorKind::NotConnected,
            SelectError::Cancelled => io::ErrorKind::ConnectionAborted,
            SelectError::Registration { kind, .. } => *kind,
        };
        io::Error::new(kind, e)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("pool capacity should be positive but it is {capacity}")]
    ZeroCapacity { capacity: usize },

    #[error("pool capacity should be less or equal to {max} but it is {capacity}")]
    TooLargeCapacity { capacity: usize, max: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_errors_survive_io_conversion() {
        let closed: io::Error = SelectError::Closed.into();
        assert_eq!(closed.kind(), io::ErrorKind::NotConnected);
        assert!(SelectError::is_terminal(&closed));

        let cancelled: io::Error = SelectError::Cancelled.into();
        assert!(SelectError::is_terminal(&cancelled));

        let registration: io::Error = SelectError::registration(&io::Error::from(io::ErrorKind::InvalidInput)).into();
        assert_eq!(registration.kind(), io::ErrorKind::InvalidInput);
        assert!(!SelectError::is_terminal(&registration));

        assert!(!SelectError::is_terminal(&io::Error::from(io::ErrorKind::WouldBlock)));
    }
}
