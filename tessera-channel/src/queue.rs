//! Bounded multi-producer multi-consumer blocking queue.
//!
//! # Design
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ free: Semaphore(capacity)        filled: Semaphore(0)        │
//! ├──────────────────────────────────────────────────────────────┤
//! │ RwLock<Ring>                                                 │
//! │   slots: [Option<T>; capacity]                               │
//! │   head ─► next slot to dequeue                               │
//! │   tail ─► next slot to enqueue                               │
//! │   count   occupied slots from head, wrapping                 │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! An enqueue takes a `free` permit, then the ring lock, writes the tail
//! slot, and hands a `filled` permit to the consumers. A dequeue mirrors it.
//! The lock is held only for slot bookkeeping; all blocking happens on the
//! permit pools.
//!
//! A token may expire between the permit and the lock. The operation then
//! gives the permit back before reporting the error, so
//! `free + filled + in-flight == capacity` holds whatever the callers do.

use crossbeam_utils::CachePadded;
use parking_lot::RwLock;

use crate::error::{EnqueueError, Interrupted};
use crate::semaphore::Semaphore;
use crate::token::Token;

struct Ring<T> {
    slots: Box<[Option<T>]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl<T> Ring<T> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: (0..capacity).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    #[inline]
    fn advance(&self, index: usize) -> usize {
        let next = index + 1;
        if next == self.slots.len() { 0 } else { next }
    }

    fn push(&mut self, value: T) {
        debug_assert!(self.slots[self.tail].is_none(), "tail slot occupied");
        self.slots[self.tail] = Some(value);
        self.tail = self.advance(self.tail);
        self.count += 1;
    }

    fn pop(&mut self) -> T {
        let value = self.slots[self.head].take().expect("head slot empty");
        self.head = self.advance(self.head);
        self.count -= 1;
        value
    }
}

/// A fixed-capacity FIFO queue whose operations block until they can proceed
/// or their [`Token`] is done.
///
/// Share it between threads with [`Arc`](std::sync::Arc).
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::thread;
/// use std::time::Duration;
/// use tessera_channel::{BlockingQueue, Interrupted, Token};
///
/// let queue = Arc::new(BlockingQueue::new(2));
/// let token = Token::background();
///
/// let producer = {
///     let queue = Arc::clone(&queue);
///     let token = token.clone();
///     thread::spawn(move || {
///         for i in 0..10 {
///             queue.enqueue(&token, i).unwrap();
///         }
///     })
/// };
///
/// for i in 0..10 {
///     assert_eq!(queue.dequeue(&token), Ok(i));
/// }
/// producer.join().unwrap();
///
/// // Nothing left: an expired token returns immediately.
/// let now = Token::with_timeout(Duration::ZERO);
/// assert_eq!(queue.dequeue(&now), Err(Interrupted::DeadlineExceeded));
/// ```
pub struct BlockingQueue<T> {
    free: CachePadded<Semaphore>,
    filled: CachePadded<Semaphore>,
    ring: RwLock<Ring<T>>,
    capacity: usize,
}

impl<T> BlockingQueue<T> {
    /// Creates a queue holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be non-zero");

        Self {
            free: CachePadded::new(Semaphore::new(capacity)),
            filled: CachePadded::new(Semaphore::new(0)),
            ring: RwLock::new(Ring::with_capacity(capacity)),
            capacity,
        }
    }

    /// Appends `value` at the tail, blocking while the queue is full.
    ///
    /// # Errors
    ///
    /// Returns the value together with the token's [`Interrupted`] cause if
    /// the token is done before a slot is secured. The queue is unchanged.
    pub fn enqueue(&self, token: &Token, value: T) -> Result<(), EnqueueError<T>> {
        if let Err(cause) = self.free.acquire(token) {
            return Err(EnqueueError { value, cause });
        }

        let mut ring = self.ring.write();

        if let Err(cause) = token.check() {
            drop(ring);
            self.free.release();
            #[cfg(feature = "tracing")]
            tracing::debug!(%cause, "enqueue interrupted after permit; permit returned");
            return Err(EnqueueError { value, cause });
        }

        ring.push(value);
        #[cfg(feature = "tracing")]
        tracing::trace!(tail = ring.tail, count = ring.count, "enqueued");
        drop(ring);

        self.filled.release();
        Ok(())
    }

    /// Removes and returns the head element, blocking while the queue is
    /// empty.
    ///
    /// # Errors
    ///
    /// The token's [`Interrupted`] cause if it is done before an element is
    /// secured. The queue is unchanged.
    pub fn dequeue(&self, token: &Token) -> Result<T, Interrupted> {
        self.filled.acquire(token)?;

        let mut ring = self.ring.write();

        if let Err(cause) = token.check() {
            drop(ring);
            self.filled.release();
            #[cfg(feature = "tracing")]
            tracing::debug!(%cause, "dequeue interrupted after permit; permit returned");
            return Err(cause);
        }

        let value = ring.pop();
        #[cfg(feature = "tracing")]
        tracing::trace!(head = ring.head, count = ring.count, "dequeued");
        drop(ring);

        self.free.release();
        Ok(value)
    }

    /// Returns the number of queued elements.
    pub fn len(&self) -> usize {
        self.ring.read().count
    }

    /// Returns `true` if no elements are queued.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the fixed capacity.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of free-slot permits not currently held.
    pub fn free_permits(&self) -> usize {
        self.free.available()
    }

    /// Returns the number of filled-slot permits not currently held.
    pub fn filled_permits(&self) -> usize {
        self.filled.available()
    }
}

impl<T: Clone> BlockingQueue<T> {
    /// Returns a snapshot of the queued elements, head first.
    pub fn as_slice(&self) -> Vec<T> {
        let ring = self.ring.read();
        (0..ring.count)
            .map(|i| {
                let slot = (ring.head + i) % self.capacity;
                ring.slots[slot].clone().expect("occupied slot")
            })
            .collect()
    }
}

impl<T> core::fmt::Debug for BlockingQueue<T> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BlockingQueue")
            .field("len", &self.len())
            .field("capacity", &self.capacity)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;
    use std::time::{Duration, Instant};

    fn live() -> Token {
        Token::with_timeout(Duration::from_secs(1))
    }

    fn expired() -> Token {
        Token::with_timeout(Duration::ZERO)
    }

    fn queue_with(values: &[i32]) -> BlockingQueue<i32> {
        let q = BlockingQueue::new(3);
        for &v in values {
            q.enqueue(&live(), v).unwrap();
        }
        q
    }

    fn slots(q: &BlockingQueue<i32>) -> Vec<Option<i32>> {
        q.ring.read().slots.to_vec()
    }

    fn head_tail(q: &BlockingQueue<i32>) -> (usize, usize) {
        let ring = q.ring.read();
        (ring.head, ring.tail)
    }

    fn spin_until(mut cond: impl FnMut() -> bool) {
        let start = Instant::now();
        while !cond() {
            assert!(start.elapsed() < Duration::from_secs(5), "condition never held");
            thread::sleep(Duration::from_millis(1));
        }
    }

    // ============================================================================
    // Basic Operations
    // ============================================================================

    #[test]
    fn new_queue_is_empty() {
        let q: BlockingQueue<i32> = BlockingQueue::new(3);
        assert!(q.is_empty());
        assert_eq!(q.capacity(), 3);
        assert_eq!(q.free_permits(), 3);
        assert_eq!(q.filled_permits(), 0);
        assert_eq!(q.as_slice(), Vec::<i32>::new());
    }

    #[test]
    #[should_panic(expected = "capacity must be non-zero")]
    fn zero_capacity_panics() {
        let _ = BlockingQueue::<i32>::new(0);
    }

    #[test]
    fn enqueue_into_empty() {
        let q = queue_with(&[]);
        q.enqueue(&live(), 123).unwrap();

        assert_eq!(slots(&q), vec![Some(123), None, None]);
        assert_eq!(q.as_slice(), vec![123]);
        assert_eq!(q.len(), 1);
        assert_eq!(head_tail(&q), (0, 1));
    }

    #[test]
    fn enqueue_with_expired_token() {
        let q = queue_with(&[]);
        let err = q.enqueue(&expired(), 123).unwrap_err();

        assert_eq!(err.cause, Interrupted::DeadlineExceeded);
        assert_eq!(err.into_inner(), 123);
        assert_eq!(slots(&q), vec![None, None, None]);
        assert!(q.as_slice().is_empty());
        assert_eq!(head_tail(&q), (0, 0));
        assert_eq!(q.free_permits(), 3);
    }

    #[test]
    fn fill_to_last_slot() {
        let q = queue_with(&[123, 234]);
        q.enqueue(&live(), 345).unwrap();

        assert_eq!(slots(&q), vec![Some(123), Some(234), Some(345)]);
        assert_eq!(q.as_slice(), vec![123, 234, 345]);
        assert_eq!(q.len(), 3);
        assert_eq!(head_tail(&q), (0, 0));
    }

    #[test]
    fn fill_wrapping_to_first_slot() {
        let q = queue_with(&[123, 234, 345]);
        assert_eq!(q.dequeue(&live()), Ok(123));
        q.enqueue(&live(), 456).unwrap();

        assert_eq!(slots(&q), vec![Some(456), Some(234), Some(345)]);
        assert_eq!(q.as_slice(), vec![234, 345, 456]);
        assert_eq!(q.len(), 3);
        assert_eq!(head_tail(&q), (1, 1));
    }

    #[test]
    fn fill_wrapping_to_middle_slot() {
        let q = queue_with(&[123, 234, 345]);
        assert_eq!(q.dequeue(&live()), Ok(123));
        assert_eq!(q.dequeue(&live()), Ok(234));
        q.enqueue(&live(), 456).unwrap();
        q.enqueue(&live(), 567).unwrap();

        assert_eq!(slots(&q), vec![Some(456), Some(567), Some(345)]);
        assert_eq!(q.as_slice(), vec![345, 456, 567]);
        assert_eq!(q.len(), 3);
        assert_eq!(head_tail(&q), (2, 2));
    }

    #[test]
    fn zero_values_are_elements() {
        let q = queue_with(&[0, 0]);
        q.enqueue(&live(), 0).unwrap();

        assert_eq!(q.as_slice(), vec![0, 0, 0]);
        assert_eq!(q.len(), 3);
    }

    #[test]
    fn dequeue_clears_slot() {
        let q = queue_with(&[1, 2]);
        assert_eq!(q.dequeue(&live()), Ok(1));

        assert_eq!(slots(&q), vec![None, Some(2), None]);
        assert_eq!(head_tail(&q), (1, 2));
        assert_eq!(q.free_permits(), 2);
        assert_eq!(q.filled_permits(), 1);
    }

    #[test]
    fn dequeue_empty_with_expired_token() {
        let q = queue_with(&[]);

        assert_eq!(q.dequeue(&expired()), Err(Interrupted::DeadlineExceeded));
        assert!(q.is_empty());
        assert_eq!(head_tail(&q), (0, 0));
        assert_eq!(q.free_permits(), 3);
    }

    #[test]
    fn dequeued_value_is_dropped_from_queue() {
        let q = BlockingQueue::new(2);
        let value = Arc::new(());

        q.enqueue(&live(), Arc::clone(&value)).unwrap();
        assert_eq!(Arc::strong_count(&value), 2);

        let out = q.dequeue(&live()).unwrap();
        drop(out);
        assert_eq!(Arc::strong_count(&value), 1);
    }

    #[test]
    fn queued_values_drop_with_queue() {
        let value = Arc::new(());
        {
            let q = BlockingQueue::new(4);
            q.enqueue(&live(), Arc::clone(&value)).unwrap();
            q.enqueue(&live(), Arc::clone(&value)).unwrap();
            assert_eq!(Arc::strong_count(&value), 3);
        }
        assert_eq!(Arc::strong_count(&value), 1);
    }

    // ============================================================================
    // Blocking Behaviour
    // ============================================================================

    #[test]
    fn enqueue_full_times_out() {
        let q = queue_with(&[123, 234, 345]);
        let token = Token::with_timeout(Duration::from_millis(100));

        let start = Instant::now();
        let err = q.enqueue(&token, 456).unwrap_err();

        assert!(start.elapsed() >= Duration::from_millis(100));
        assert_eq!(err.cause, Interrupted::DeadlineExceeded);
        assert_eq!(err.value, 456);
        assert_eq!(slots(&q), vec![Some(123), Some(234), Some(345)]);
        assert_eq!(q.len(), 3);
        assert_eq!(q.free_permits(), 0);
        assert_eq!(q.filled_permits(), 3);
    }

    #[test]
    fn blocked_enqueue_proceeds_after_dequeue() {
        let q = Arc::new(queue_with(&[123, 234, 345]));

        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                thread::sleep(Duration::from_millis(100));
                q.dequeue(&live())
            })
        };

        q.enqueue(&live(), 456).unwrap();

        assert_eq!(consumer.join().unwrap(), Ok(123));
        assert_eq!(q.as_slice(), vec![234, 345, 456]);
    }

    #[test]
    fn blocked_dequeue_proceeds_after_enqueue() {
        let q: Arc<BlockingQueue<i32>> = Arc::new(BlockingQueue::new(1));

        let consumer = {
            let q = Arc::clone(&q);
            thread::spawn(move || q.dequeue(&Token::background()))
        };

        thread::sleep(Duration::from_millis(50));
        q.enqueue(&live(), 7).unwrap();

        assert_eq!(consumer.join().unwrap(), Ok(7));
        assert!(q.is_empty());
    }

    #[test]
    fn cancel_wakes_blocked_enqueue() {
        let q = Arc::new(queue_with(&[1, 2, 3]));
        let token = Token::background();

        let producer = {
            let q = Arc::clone(&q);
            let token = token.clone();
            thread::spawn(move || q.enqueue(&token, 4))
        };

        spin_until(|| q.free.waiting() == 1);
        token.cancel();

        let err = producer.join().unwrap().unwrap_err();
        assert_eq!(err.cause, Interrupted::Cancelled);
        assert_eq!(err.value, 4);
        assert_eq!(q.as_slice(), vec![1, 2, 3]);
    }

    #[test]
    fn cancel_wakes_blocked_dequeue() {
        let q: Arc<BlockingQueue<i32>> = Arc::new(BlockingQueue::new(3));
        let token = Token::background();

        let consumer = {
            let q = Arc::clone(&q);
            let token = token.clone();
            thread::spawn(move || q.dequeue(&token))
        };

        spin_until(|| q.filled.waiting() == 1);
        token.cancel();

        assert_eq!(consumer.join().unwrap(), Err(Interrupted::Cancelled));
        assert_eq!(q.filled_permits(), 0);
    }

    // ============================================================================
    // Permit Accounting
    // ============================================================================

    #[test]
    fn enqueue_cancelled_after_permit_returns_it() {
        let q = Arc::new(queue_with(&[1]));
        let token = Token::background();

        // Hold the ring so the producer stalls between permit and lock.
        let guard = q.ring.write();

        let producer = {
            let q = Arc::clone(&q);
            let token = token.clone();
            thread::spawn(move || q.enqueue(&token, 2))
        };

        spin_until(|| q.free_permits() == 1);
        token.cancel();
        drop(guard);

        let err = producer.join().unwrap().unwrap_err();
        assert_eq!(err.cause, Interrupted::Cancelled);
        assert_eq!(q.free_permits(), 2);
        assert_eq!(q.filled_permits(), 1);
        assert_eq!(q.as_slice(), vec![1]);
    }

    #[test]
    fn dequeue_cancelled_after_permit_returns_it() {
        let q = Arc::new(queue_with(&[1]));
        let token = Token::background();

        let guard = q.ring.write();

        let consumer = {
            let q = Arc::clone(&q);
            let token = token.clone();
            thread::spawn(move || q.dequeue(&token))
        };

        spin_until(|| q.filled_permits() == 0);
        token.cancel();
        drop(guard);

        assert_eq!(consumer.join().unwrap(), Err(Interrupted::Cancelled));
        assert_eq!(q.filled_permits(), 1);
        assert_eq!(q.free_permits(), 2);
        assert_eq!(q.as_slice(), vec![1]);
    }

    // ============================================================================
    // Stress Tests
    // ============================================================================

    #[test]
    fn stress_mpmc_delivers_everything_once() {
        const PRODUCERS: usize = 4;
        const CONSUMERS: usize = 4;
        const PER_PRODUCER: usize = 2_000;

        let q: Arc<BlockingQueue<usize>> = Arc::new(BlockingQueue::new(8));
        let sum = Arc::new(AtomicUsize::new(0));
        let received = Arc::new(AtomicUsize::new(0));

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    let token = Token::background();
                    for i in 0..PER_PRODUCER {
                        q.enqueue(&token, p * PER_PRODUCER + i).unwrap();
                    }
                })
            })
            .collect();

        let consumers: Vec<_> = (0..CONSUMERS)
            .map(|_| {
                let q = Arc::clone(&q);
                let sum = Arc::clone(&sum);
                let received = Arc::clone(&received);
                thread::spawn(move || {
                    let token = Token::background();
                    for _ in 0..(PRODUCERS * PER_PRODUCER / CONSUMERS) {
                        let v = q.dequeue(&token).unwrap();
                        sum.fetch_add(v, Ordering::Relaxed);
                        received.fetch_add(1, Ordering::Relaxed);
                    }
                })
            })
            .collect();

        for h in producers {
            h.join().unwrap();
        }
        for h in consumers {
            h.join().unwrap();
        }

        let n = PRODUCERS * PER_PRODUCER;
        assert_eq!(received.load(Ordering::Relaxed), n);
        assert_eq!(sum.load(Ordering::Relaxed), n * (n - 1) / 2);
        assert!(q.is_empty());
        assert_eq!(q.free_permits(), 8);
        assert_eq!(q.filled_permits(), 0);
    }

    #[test]
    fn stress_single_producer_fifo() {
        const COUNT: u64 = 10_000;

        let q: Arc<BlockingQueue<u64>> = Arc::new(BlockingQueue::new(4));

        let producer = {
            let q = Arc::clone(&q);
            thread::spawn(move || {
                let token = Token::background();
                for i in 0..COUNT {
                    q.enqueue(&token, i).unwrap();
                }
            })
        };

        let token = Token::background();
        for expected in 0..COUNT {
            assert_eq!(q.dequeue(&token), Ok(expected));
        }

        producer.join().unwrap();
    }

    #[test]
    fn stress_capacity_conserved_under_timeouts() {
        const CAPACITY: usize = 3;
        const THREADS: usize = 6;
        const ROUNDS: usize = 300;

        let q: Arc<BlockingQueue<usize>> = Arc::new(BlockingQueue::new(CAPACITY));

        let handles: Vec<_> = (0..THREADS)
            .map(|t| {
                let q = Arc::clone(&q);
                thread::spawn(move || {
                    for round in 0..ROUNDS {
                        let token = Token::with_timeout(Duration::from_micros(20));
                        if (t + round) % 2 == 0 {
                            let _ = q.enqueue(&token, round);
                        } else {
                            let _ = q.dequeue(&token);
                        }
                    }
                })
            })
            .collect();

        for h in handles {
            h.join().unwrap();
        }

        let len = q.len();
        assert!(len <= CAPACITY);
        assert_eq!(q.free_permits() + q.filled_permits(), CAPACITY);
        assert_eq!(q.filled_permits(), len);
        assert_eq!(q.as_slice().len(), len);
    }
}
