//! Error types for token-bounded operations.

use core::fmt;

/// Why a blocking operation gave up.
///
/// A token whose deadline passes and a token that is cancelled explicitly
/// travel the same path; only the reported cause differs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interrupted {
    /// [`Token::cancel`](crate::Token::cancel) was called.
    Cancelled,
    /// The token's deadline passed.
    DeadlineExceeded,
}

impl Interrupted {
    /// Returns `true` if this is the `Cancelled` variant.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Interrupted::Cancelled)
    }

    /// Returns `true` if this is the `DeadlineExceeded` variant.
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Interrupted::DeadlineExceeded)
    }
}

impl fmt::Display for Interrupted {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Interrupted::Cancelled => write!(f, "operation cancelled"),
            Interrupted::DeadlineExceeded => write!(f, "deadline exceeded"),
        }
    }
}

impl std::error::Error for Interrupted {}

/// Error returned when [`BlockingQueue::enqueue`](crate::BlockingQueue::enqueue)
/// is interrupted.
///
/// Contains the value that was not enqueued, allowing it to be retried with a
/// fresh token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnqueueError<T> {
    /// The value that was not enqueued.
    pub value: T,
    /// Why the enqueue gave up.
    pub cause: Interrupted,
}

impl<T> EnqueueError<T> {
    /// Returns the value that was not enqueued.
    pub fn into_inner(self) -> T {
        self.value
    }

    /// Returns why the enqueue gave up.
    pub fn cause(&self) -> Interrupted {
        self.cause
    }
}

impl<T> fmt::Display for EnqueueError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "enqueue interrupted: {}", self.cause)
    }
}

impl<T: fmt::Debug> std::error::Error for EnqueueError<T> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.cause)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        assert_eq!(Interrupted::Cancelled.to_string(), "operation cancelled");
        assert_eq!(Interrupted::DeadlineExceeded.to_string(), "deadline exceeded");

        let err = EnqueueError {
            value: 7,
            cause: Interrupted::DeadlineExceeded,
        };
        assert_eq!(err.to_string(), "enqueue interrupted: deadline exceeded");
        assert_eq!(err.into_inner(), 7);
    }

    #[test]
    fn source_is_cause() {
        use std::error::Error;

        let err = EnqueueError {
            value: (),
            cause: Interrupted::Cancelled,
        };
        let source = err.source().unwrap();
        assert_eq!(source.to_string(), "operation cancelled");
    }
}
