//! Error types shared by the index-addressable collections.

use core::fmt;

/// Index outside `[0, len - 1]`.
///
/// Carries the attempted index and the collection length at the time of the
/// call, so the valid inclusive range can be reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutOfRange {
    /// The index that was requested.
    pub index: isize,
    /// Collection length when the call was made.
    pub len: usize,
}

impl OutOfRange {
    /// Upper bound of the valid inclusive range, `len - 1`.
    ///
    /// `-1` for an empty collection, where no index is valid.
    #[inline]
    pub fn max_index(&self) -> isize {
        self.len as isize - 1
    }
}

impl fmt::Display for OutOfRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "index out of range: valid range is [0, {}], got {}",
            self.max_index(),
            self.index
        )
    }
}

impl std::error::Error for OutOfRange {}

/// Operation needs at least one element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Empty;

impl fmt::Display for Empty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection is empty")
    }
}

impl std::error::Error for Empty {}

/// Validates `index` against `len`, returning it as a `usize` on success.
///
/// # Example
///
/// ```
/// use tessera_collections::{OutOfRange, check_index};
///
/// assert_eq!(check_index(2, 3), Ok(2));
/// assert_eq!(check_index(3, 3), Err(OutOfRange { index: 3, len: 3 }));
/// assert_eq!(check_index(-1, 3), Err(OutOfRange { index: -1, len: 3 }));
/// ```
#[inline]
pub fn check_index(index: isize, len: usize) -> Result<usize, OutOfRange> {
    match usize::try_from(index) {
        Ok(i) if i < len => Ok(i),
        _ => Err(OutOfRange { index, len }),
    }
}
