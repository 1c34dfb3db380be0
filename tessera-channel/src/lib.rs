//! A bounded MPMC blocking queue with cooperative cancellation.
//!
//! [`BlockingQueue`] is a fixed-capacity ring buffer shared between any
//! number of producers and consumers. Producers block while it is full,
//! consumers block while it is empty, and every blocking call is bounded by a
//! [`Token`] carrying a deadline and a cancel switch.
//!
//! # Architecture
//!
//! ```text
//!   enqueue(token, v)                          dequeue(token)
//!          │                                         │
//!          ▼                                         ▼
//!   free.acquire(token) ──┐                ┌── filled.acquire(token)
//!          │  (may park)  │                │  (may park)  │
//!          ▼              │                │              ▼
//!   ring.write()          │                │       ring.write()
//!   token.check()?  ──────┼─ on error: ────┼────── token.check()?
//!   slots[tail] = v       │  release the   │       v = slots[head].take()
//!          │              │  permit taken  │              │
//!          ▼              │                │              ▼
//!   filled.release() ─────┘                └────── free.release()
//! ```
//!
//! The ring lock is held only for slot bookkeeping, never across a park.
//!
//! # Cancellation
//!
//! A token is done once its deadline passes or [`Token::cancel`] is called;
//! both surface as an [`Interrupted`] value. Cancelling wakes every thread
//! parked on that token right away. A cancelled operation leaves the queue
//! exactly as it found it, including the permit counts, so capacity never
//! leaks.
//!
//! There is no "full" or "empty" error. For a non-blocking attempt pass an
//! already-expired token:
//!
//! ```
//! use std::time::Duration;
//! use tessera_channel::{BlockingQueue, Interrupted, Token};
//!
//! let queue = BlockingQueue::new(1);
//! let now = Token::with_timeout(Duration::ZERO);
//!
//! queue.enqueue(&Token::background(), 'a').unwrap();
//!
//! let err = queue.enqueue(&now, 'b').unwrap_err();
//! assert_eq!(err.cause, Interrupted::DeadlineExceeded);
//! assert_eq!(err.into_inner(), 'b');
//! assert_eq!(queue.as_slice(), vec!['a']);
//! ```
//!
//! # Feature Flags
//!
//! - `tracing` (default) - emit `debug!` when an interrupted operation returns
//!   its permit and `trace!` for slot bookkeeping

#![warn(missing_docs)]

pub mod error;
pub mod queue;
pub mod semaphore;
pub mod token;

pub use error::{EnqueueError, Interrupted};
pub use queue::BlockingQueue;
pub use semaphore::Semaphore;
pub use token::Token;
