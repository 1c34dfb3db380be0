//! Skip list - a probabilistic sorted multiset over a node arena.
//!
//! A skip list provides O(log n) expected time for search, insert and
//! removal with no rebalancing: each node is linked into a random number of
//! levels, and higher levels act as express lanes during search.
//!
//! # Design
//!
//! Nodes live in a [`slab::Slab`] and link to each other by slab key. The head
//! sentinel is key `0`; it carries no value and owns [`MAX_LEVEL`] links.
//! Relinking a node at several levels is a set of key writes.
//!
//! ```text
//! Level 2:  HEAD ─────────────────────► 5 ───────────────────► NIL
//!             │                          │
//! Level 1:  HEAD ─────────► 2 ──────────► 5 ──────────► 7 ────► NIL
//!             │             │             │             │
//! Level 0:  HEAD ──► 1 ──► 2 ──► 3 ──► 5 ──► 6 ──► 7 ──► 9 ──► NIL
//! ```
//!
//! Ordering comes from a caller-supplied comparison function rather than an
//! `Ord` bound, and equal values may appear more than once.
//!
//! # Example
//!
//! ```
//! use rand::SeedableRng;
//! use rand::rngs::SmallRng;
//! use tessera_collections::SkipList;
//!
//! let mut list = SkipList::new(|a: &i32, b: &i32| a.cmp(b), SmallRng::seed_from_u64(1));
//!
//! for v in [1, 3, 5, 6, 7, 2, 9] {
//!     list.insert(v);
//! }
//!
//! assert_eq!(list.as_slice(), vec![1, 2, 3, 5, 6, 7, 9]);
//! assert!(list.search(&2));
//! assert!(!list.search(&10));
//! assert_eq!(list.get(0), Ok(&1));
//! assert_eq!(list.peek(), Ok(&1));
//! ```

use core::cmp::Ordering;
use core::fmt;

use rand_core::RngCore;
use slab::Slab;

use crate::error::{Empty, OutOfRange, check_index};
use crate::level::{LevelGenerator, MAX_LEVEL};

/// Key of the head sentinel. Allocated at construction, never freed.
const HEAD: usize = 0;

/// Link value meaning "no next node".
const NIL: usize = usize::MAX;

/// Skip list ordered by `Ord`.
pub type OrdSkipList<T, R> = SkipList<T, fn(&T, &T) -> Ordering, R>;

// ============================================================================
// SkipNode
// ============================================================================

/// A node holding one value and its forward links.
///
/// `forward[i]` is the next node at level `i`. The node participates in
/// levels `0..forward.len()`.
struct SkipNode<T> {
    /// `None` only for the head sentinel.
    value: Option<T>,
    forward: Box<[usize]>,
}

impl<T> SkipNode<T> {
    fn head() -> Self {
        Self {
            value: None,
            forward: vec![NIL; MAX_LEVEL].into_boxed_slice(),
        }
    }

    fn new(value: T, level: usize) -> Self {
        Self {
            value: Some(value),
            forward: vec![NIL; level].into_boxed_slice(),
        }
    }
}

// ============================================================================
// SkipList
// ============================================================================

/// A probabilistic sorted multiset.
///
/// # Type Parameters
///
/// - `T`: element type
/// - `C`: comparison function, `Fn(&T, &T) -> Ordering`, must be a total order
/// - `R`: random source for level assignment
///
/// The list has no internal synchronization. Callers that share it across
/// threads must wrap it in a lock.
pub struct SkipList<T, C, R> {
    nodes: Slab<SkipNode<T>>,
    /// Number of levels in use, `1..=MAX_LEVEL`.
    level: usize,
    len: usize,
    compare: C,
    levels: LevelGenerator<R>,
}

impl<T, C, R> SkipList<T, C, R>
where
    C: Fn(&T, &T) -> Ordering,
    R: RngCore,
{
    /// Creates an empty skip list.
    pub fn new(compare: C, rng: R) -> Self {
        Self::with_level_generator(compare, LevelGenerator::new(rng))
    }

    /// Creates an empty skip list drawing node levels from `levels`.
    pub fn with_level_generator(compare: C, levels: LevelGenerator<R>) -> Self {
        let mut nodes = Slab::new();
        let head = nodes.insert(SkipNode::head());
        debug_assert_eq!(head, HEAD);

        Self {
            nodes,
            level: 1,
            len: 0,
            compare,
            levels,
        }
    }

    /// Creates a skip list holding every element of `iter`.
    ///
    /// ```
    /// use rand::SeedableRng;
    /// use rand::rngs::SmallRng;
    /// use tessera_collections::SkipList;
    ///
    /// let list = SkipList::from_iter_with(
    ///     [3, 1, 2],
    ///     |a: &u8, b: &u8| b.cmp(a),
    ///     SmallRng::seed_from_u64(1),
    /// );
    /// assert_eq!(list.as_slice(), vec![3, 2, 1]);
    /// ```
    pub fn from_iter_with<I>(iter: I, compare: C, rng: R) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut list = Self::new(compare, rng);
        list.extend(iter);
        list
    }

    /// Returns the number of elements.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns the capacity, which is always the length: the list is unbounded.
    #[inline]
    pub fn cap(&self) -> usize {
        self.len
    }

    /// Returns `true` if the list holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the number of levels currently in use.
    #[inline]
    pub fn level(&self) -> usize {
        self.level
    }

    /// Returns the element at rank `index` in sorted order.
    ///
    /// Walks the base level, so this is O(index).
    ///
    /// # Errors
    ///
    /// [`OutOfRange`] when `index < 0` or `index >= len`.
    pub fn get(&self, index: isize) -> Result<&T, OutOfRange> {
        let rank = check_index(index, self.len)?;

        let mut current = self.next(HEAD, 0);
        for _ in 0..rank {
            current = self.next(current, 0);
        }
        Ok(self.value(current))
    }

    /// Returns `true` if an element comparing equal to `value` is present.
    pub fn search(&self, value: &T) -> bool {
        let mut update = [HEAD; MAX_LEVEL];
        let pred = self.traverse(value, &mut update);
        self.is_match(self.next(pred, 0), value)
    }

    /// Returns the smallest element.
    ///
    /// # Errors
    ///
    /// [`Empty`] when the list holds no elements.
    pub fn peek(&self) -> Result<&T, Empty> {
        let first = self.next(HEAD, 0);
        if first == NIL {
            return Err(Empty);
        }
        Ok(self.value(first))
    }

    /// Inserts `value`. Always succeeds.
    ///
    /// A value equal to existing elements is placed before them. The relative
    /// order of equal elements is not meaningful.
    pub fn insert(&mut self, value: T) {
        // Slots at or above the current level already point at head, which
        // is the predecessor for any level the new node opens.
        let mut update = [HEAD; MAX_LEVEL];
        self.traverse(&value, &mut update);

        let level = self.levels.next_level();
        if level > self.level {
            #[cfg(feature = "tracing")]
            tracing::trace!(from = self.level, to = level, "skip list level raised");
            self.level = level;
        }

        let idx = self.nodes.insert(SkipNode::new(value, level));

        for (i, &pred) in update.iter().enumerate().take(level) {
            let succ = self.next(pred, i);
            self.node_mut(idx).forward[i] = succ;
            self.node_mut(pred).forward[i] = idx;
        }

        self.len += 1;
    }

    /// Removes one element equal to `target`.
    ///
    /// Returns `true` whether or not a matching element existed: an absent
    /// target leaves the list untouched and still reports `true`. Compare
    /// [`len`](Self::len) before and after, or call [`search`](Self::search)
    /// first, to tell the two apart.
    pub fn delete_element(&mut self, target: &T) -> bool {
        let mut update = [HEAD; MAX_LEVEL];
        let pred = self.traverse(target, &mut update);

        let idx = self.next(pred, 0);
        if !self.is_match(idx, target) {
            return true;
        }

        for (i, &pred) in update.iter().enumerate().take(self.level) {
            if self.next(pred, i) != idx {
                break;
            }
            let succ = self.next(idx, i);
            self.node_mut(pred).forward[i] = succ;
        }

        self.nodes.remove(idx);
        self.shrink_level();
        self.len -= 1;
        true
    }

    /// Removes all elements.
    pub fn clear(&mut self) {
        self.nodes.clear();
        let head = self.nodes.insert(SkipNode::head());
        debug_assert_eq!(head, HEAD);

        self.level = 1;
        self.len = 0;
    }

    /// Returns an iterator over the elements in ascending order.
    #[inline]
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            nodes: &self.nodes,
            current: self.next(HEAD, 0),
            remaining: self.len,
        }
    }

    /// Copies the elements, in ascending order and with duplicates, into a `Vec`.
    pub fn as_slice(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.iter().cloned().collect()
    }

    // ========================================================================
    // Internal helpers
    // ========================================================================

    #[inline]
    fn node(&self, idx: usize) -> &SkipNode<T> {
        self.nodes.get(idx).expect("dangling skip list key")
    }

    #[inline]
    fn node_mut(&mut self, idx: usize) -> &mut SkipNode<T> {
        self.nodes.get_mut(idx).expect("dangling skip list key")
    }

    #[inline]
    fn next(&self, idx: usize, level: usize) -> usize {
        self.node(idx).forward[level]
    }

    #[inline]
    fn value(&self, idx: usize) -> &T {
        self.node(idx)
            .value
            .as_ref()
            .expect("head sentinel has no value")
    }

    /// `true` if `idx` is a real node comparing equal to `target`.
    #[inline]
    fn is_match(&self, idx: usize, target: &T) -> bool {
        idx != NIL && (self.compare)(self.value(idx), target) == Ordering::Equal
    }

    /// Descends from the top level, recording in `update[i]` the last node at
    /// level `i` whose value is strictly less than `target`.
    ///
    /// Returns `update[0]`.
    fn traverse(&self, target: &T, update: &mut [usize; MAX_LEVEL]) -> usize {
        let mut current = HEAD;

        for i in (0..self.level).rev() {
            let mut next = self.next(current, i);
            while next != NIL && (self.compare)(self.value(next), target) == Ordering::Less {
                current = next;
                next = self.next(current, i);
            }
            update[i] = current;
        }

        current
    }

    /// Drops empty top levels, keeping at least one.
    fn shrink_level(&mut self) {
        #[cfg(feature = "tracing")]
        let before = self.level;

        while self.level > 1 && self.next(HEAD, self.level - 1) == NIL {
            self.level -= 1;
        }

        #[cfg(feature = "tracing")]
        if self.level != before {
            tracing::trace!(from = before, to = self.level, "skip list level lowered");
        }
    }
}

impl<T: Ord, R: RngCore> SkipList<T, fn(&T, &T) -> Ordering, R> {
    /// Creates an empty skip list ordered by `T`'s `Ord` impl.
    ///
    /// ```
    /// use rand::SeedableRng;
    /// use rand::rngs::SmallRng;
    /// use tessera_collections::OrdSkipList;
    ///
    /// let mut list: OrdSkipList<&str, _> = OrdSkipList::ordered(SmallRng::seed_from_u64(1));
    /// list.insert("b");
    /// list.insert("a");
    /// assert_eq!(list.peek(), Ok(&"a"));
    /// ```
    pub fn ordered(rng: R) -> Self {
        Self::new(T::cmp, rng)
    }
}

impl<T, C, R> Extend<T> for SkipList<T, C, R>
where
    C: Fn(&T, &T) -> Ordering,
    R: RngCore,
{
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.insert(value);
        }
    }
}

impl<'a, T, C, R> IntoIterator for &'a SkipList<T, C, R>
where
    C: Fn(&T, &T) -> Ordering,
    R: RngCore,
{
    type Item = &'a T;
    type IntoIter = Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T, C, R> fmt::Debug for SkipList<T, C, R>
where
    T: fmt::Debug,
    C: Fn(&T, &T) -> Ordering,
    R: RngCore,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

// ============================================================================
// Iterator
// ============================================================================

/// An iterator over the elements of a [`SkipList`] in ascending order.
pub struct Iter<'a, T> {
    nodes: &'a Slab<SkipNode<T>>,
    current: usize,
    remaining: usize,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        if self.current == NIL {
            return None;
        }
        let node = self.nodes.get(self.current).expect("dangling skip list key");
        self.current = node.forward[0];
        self.remaining -= 1;
        node.value.as_ref()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<T> ExactSizeIterator for Iter<'_, T> {}
