//! Counting permit pool with token-bounded acquisition.
//!
//! Waiters park on their own [`Parker`] and queue their [`Unparker`] behind
//! the permit count. [`Semaphore::release`] adds a permit and wakes the
//! oldest waiter; a cancelled token wakes its waiters directly.
//!
//! A woken waiter is not handed the permit. It re-takes the lock and competes
//! for it, and goes back to the end of the queue if another thread got there
//! first. Fairness is therefore best-effort.

use std::collections::VecDeque;

use crossbeam_utils::sync::{Parker, Unparker};
use parking_lot::Mutex;

use crate::error::Interrupted;
use crate::token::Token;

struct Waiter {
    id: u64,
    unparker: Unparker,
}

struct State {
    permits: usize,
    waiters: VecDeque<Waiter>,
    next_id: u64,
}

impl State {
    fn is_queued(&self, id: u64) -> bool {
        self.waiters.iter().any(|w| w.id == id)
    }

    fn dequeue(&mut self, id: u64) {
        if let Some(pos) = self.waiters.iter().position(|w| w.id == id) {
            self.waiters.remove(pos);
        }
    }
}

/// A counting semaphore.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use tessera_channel::{Interrupted, Semaphore, Token};
///
/// let sem = Semaphore::new(1);
/// let token = Token::with_timeout(Duration::from_millis(10));
///
/// sem.acquire(&token).unwrap();
/// assert_eq!(sem.available(), 0);
///
/// // No permit left: waits out the token.
/// assert_eq!(sem.acquire(&token), Err(Interrupted::DeadlineExceeded));
///
/// sem.release();
/// assert_eq!(sem.available(), 1);
/// ```
pub struct Semaphore {
    state: Mutex<State>,
}

impl Semaphore {
    /// Creates a semaphore holding `permits` permits.
    pub fn new(permits: usize) -> Self {
        Self {
            state: Mutex::new(State {
                permits,
                waiters: VecDeque::new(),
                next_id: 0,
            }),
        }
    }

    /// Takes one permit, blocking until one is available or `token` is done.
    ///
    /// A token that is already done fails without taking a permit, even if
    /// one is available.
    ///
    /// # Errors
    ///
    /// The token's [`Interrupted`] cause. No permit is held on error.
    pub fn acquire(&self, token: &Token) -> Result<(), Interrupted> {
        token.check()?;

        // Fast path
        let id = {
            let mut state = self.state.lock();
            if state.permits > 0 {
                state.permits -= 1;
                return Ok(());
            }
            state.next_id += 1;
            state.next_id
        };

        // Park path
        let parker = Parker::new();
        let _watch = token.watch(parker.unparker());

        loop {
            {
                let mut state = self.state.lock();

                if state.permits > 0 {
                    state.permits -= 1;
                    state.dequeue(id);
                    return Ok(());
                }

                if let Err(cause) = token.check() {
                    state.dequeue(id);
                    return Err(cause);
                }

                // Not queued on the first pass, or popped by a release whose
                // permit someone else took.
                if !state.is_queued(id) {
                    state.waiters.push_back(Waiter {
                        id,
                        unparker: parker.unparker().clone(),
                    });
                }
            }

            match token.deadline() {
                Some(deadline) => parker.park_deadline(deadline),
                None => parker.park(),
            }
        }
    }

    /// Takes one permit if one is available, without blocking.
    pub fn try_acquire(&self) -> bool {
        let mut state = self.state.lock();
        if state.permits > 0 {
            state.permits -= 1;
            true
        } else {
            false
        }
    }

    /// Returns one permit and wakes the oldest waiter, if any.
    pub fn release(&self) {
        let mut state = self.state.lock();
        state.permits += 1;
        if let Some(waiter) = state.waiters.pop_front() {
            waiter.unparker.unpark();
        }
    }

    /// Returns the number of permits available right now.
    pub fn available(&self) -> usize {
        self.state.lock().permits
    }

    /// Returns the number of threads queued for a permit right now.
    pub fn waiting(&self) -> usize {
        self.state.lock().waiters.len()
    }
}

impl core::fmt::Debug for Semaphore {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Semaphore")
            .field("permits", &state.permits)
            .field("waiting", &state.waiters.len())
            .finish()
    }
}
