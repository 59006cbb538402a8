//! Error types for the sorted collections.
//!
//! Structural operations (insert, remove, lookup) are total and never fail
//! for well-formed input; errors are reserved for accessors that have no
//! answer on an empty collection and for range restrictions handed inverted
//! bounds.

/// Returned by non-optional accessors called on an empty collection.
///
/// `first_key`, `last_key`, `first`, `last` and `tail` have no answer when
/// the collection holds nothing. Callers that prefer a non-failing variant
/// should use the optional accessors (`min`, `max`, `head`) instead.
///
/// # Examples
///
/// ```rust
/// use canopy::{EmptyCollectionError, SortedMap};
///
/// let empty: SortedMap<i32, i32> = SortedMap::new();
/// let error = empty.first_key().unwrap_err();
/// assert_eq!(
///     format!("{}", error),
///     "first_key: the collection is empty"
/// );
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EmptyCollectionError {
    /// The name of the accessor that was called.
    pub operation: &'static str,
}

impl std::fmt::Display for EmptyCollectionError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}: the collection is empty", self.operation)
    }
}

impl std::error::Error for EmptyCollectionError {}

/// Returned by `sub_map`/`sub_set` when the lower bound sorts after the
/// upper bound under the active comparator.
///
/// # Examples
///
/// ```rust
/// use canopy::{InvalidRangeError, SortedMap};
///
/// let map: SortedMap<i32, i32> = SortedMap::new().insert(1, 10);
/// assert_eq!(map.sub_map(&9, &1), Err(InvalidRangeError));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidRangeError;

impl std::fmt::Display for InvalidRangeError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            formatter,
            "invalid range: the lower bound is greater than the upper bound"
        )
    }
}

impl std::error::Error for InvalidRangeError {}

// =============================================================================
// Tests
// =============================================================================
