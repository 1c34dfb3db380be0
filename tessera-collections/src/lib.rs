//! Sorted collections over a slab-backed node arena.
//!
//! The centrepiece is [`SkipList`], a probabilistic sorted multiset ordered by
//! a caller-supplied comparison function. Its nodes live in a
//! [`slab::Slab`] and link to each other by slab key, so multi-level
//! relinking is a handful of index writes with no aliased references.
//!
//! # Quick Start
//!
//! ```
//! use rand::SeedableRng;
//! use rand::rngs::SmallRng;
//! use tessera_collections::{Empty, OrdSkipList, OutOfRange};
//!
//! // The random source is explicit: a fixed seed gives a reproducible shape.
//! let mut list: OrdSkipList<u32, _> = OrdSkipList::ordered(SmallRng::seed_from_u64(42));
//!
//! assert_eq!(list.peek(), Err(Empty));
//!
//! list.extend([30, 10, 20, 10]);
//! assert_eq!(list.as_slice(), vec![10, 10, 20, 30]);
//!
//! assert_eq!(list.get(2), Ok(&20));
//! assert_eq!(list.get(4), Err(OutOfRange { index: 4, len: 4 }));
//!
//! assert!(list.delete_element(&10));
//! assert_eq!(list.len(), 3);
//! ```
//!
//! # Deleting absent values
//!
//! [`SkipList::delete_element`] returns `true` even when nothing matched.
//! Use [`SkipList::search`] or compare [`SkipList::len`] to detect a miss.
//!
//! # Error Vocabulary
//!
//! | Error | Raised by | Carries |
//! |-------|-----------|---------|
//! | [`OutOfRange`] | positional access | attempted index, length |
//! | [`Empty`] | [`SkipList::peek`] | nothing |
//!
//! # Feature Flags
//!
//! - `tracing` (default) - emit `trace!` events when the level count changes

#![warn(missing_docs)]

pub mod error;
pub mod level;
pub mod skiplist;

pub use error::{Empty, OutOfRange, check_index};
pub use level::{FACTOR_P, LevelGenerator, MAX_LEVEL};
pub use skiplist::{Iter, OrdSkipList, SkipList};
