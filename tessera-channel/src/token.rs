//! Operation tokens carrying a deadline and a cancellation signal.
//!
//! A [`Token`] is handed to every blocking call. The call consults it at its
//! suspension points and gives up with [`Interrupted`] once the token is done.
//!
//! Threads blocked on a token register their [`Unparker`] with it, so
//! [`Token::cancel`] wakes them immediately instead of waiting for a deadline
//! that may never come:
//!
//! ```text
//! Waiter:                          Canceller:
//! ─────────────────────            ─────────────────────
//! watch(unparker)   [lock]
//! check() -> Ok                    store(cancelled, true)
//! park()                           [lock] unpark every watcher
//! check() -> Cancelled
//! ```
//!
//! Registration and the unpark sweep share a lock, so a waiter either sees
//! the flag on its check or is in the list when the sweep runs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam_utils::sync::Unparker;
use parking_lot::Mutex;

use crate::error::Interrupted;

struct Inner {
    deadline: Option<Instant>,
    cancelled: AtomicBool,
    next_watch: AtomicU64,
    watchers: Mutex<Vec<(u64, Unparker)>>,
}

/// Deadline and cancellation carrier for blocking operations.
///
/// Cloning is cheap and every clone observes the same cancellation.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tessera_channel::{Interrupted, Token};
///
/// let token = Token::with_timeout(Duration::from_secs(1));
/// assert_eq!(token.check(), Ok(()));
///
/// let shared = token.clone();
/// shared.cancel();
/// assert_eq!(token.check(), Err(Interrupted::Cancelled));
///
/// // A zero timeout is already expired: use it for non-blocking attempts.
/// let now = Token::with_timeout(Duration::ZERO);
/// assert_eq!(now.check(), Err(Interrupted::DeadlineExceeded));
/// ```
#[derive(Clone)]
pub struct Token {
    inner: Arc<Inner>,
}

impl Token {
    fn from_deadline(deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                deadline,
                cancelled: AtomicBool::new(false),
                next_watch: AtomicU64::new(0),
                watchers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Creates a token with no deadline. It is done only once cancelled.
    pub fn background() -> Self {
        Self::from_deadline(None)
    }

    /// Creates a token that expires at `deadline`.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::from_deadline(Some(deadline))
    }

    /// Creates a token that expires `timeout` from now.
    ///
    /// A timeout too large to represent is treated as no deadline.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self::from_deadline(Instant::now().checked_add(timeout))
    }

    /// Returns the deadline, if any.
    #[inline]
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    /// Cancels the token and wakes every thread blocked on it.
    ///
    /// Idempotent.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);

        let watchers = self.inner.watchers.lock();
        for (_, unparker) in watchers.iter() {
            unparker.unpark();
        }
    }

    /// Returns `Ok(())` while the token is live.
    ///
    /// # Errors
    ///
    /// [`Interrupted::Cancelled`] once cancelled, otherwise
    /// [`Interrupted::DeadlineExceeded`] once the deadline has passed.
    /// Cancellation wins when both hold.
    pub fn check(&self) -> Result<(), Interrupted> {
        if self.inner.cancelled.load(Ordering::SeqCst) {
            return Err(Interrupted::Cancelled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Err(Interrupted::DeadlineExceeded),
            _ => Ok(()),
        }
    }

    /// Returns `true` once the token is cancelled or expired.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.check().is_err()
    }

    /// Registers `unparker` to be woken by [`cancel`](Self::cancel) until the
    /// returned guard is dropped.
    pub(crate) fn watch(&self, unparker: &Unparker) -> Watch<'_> {
        let id = self.inner.next_watch.fetch_add(1, Ordering::Relaxed);
        self.inner.watchers.lock().push((id, unparker.clone()));
        Watch { token: self, id }
    }
}

impl Default for Token {
    fn default() -> Self {
        Self::background()
    }
}

impl core::fmt::Debug for Token {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Token")
            .field("deadline", &self.inner.deadline)
            .field("cancelled", &self.inner.cancelled.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}

/// Deregisters a watcher on drop.
pub(crate) struct Watch<'a> {
    token: &'a Token,
    id: u64,
}

impl Drop for Watch<'_> {
    fn drop(&mut self) {
        let mut watchers = self.token.inner.watchers.lock();
        if let Some(pos) = watchers.iter().position(|(id, _)| *id == self.id) {
            watchers.swap_remove(pos);
        }
    }
}
