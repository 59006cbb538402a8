//! # canopy
//!
//! Persistent (immutable) sorted collections with structural sharing.
//!
//! ## Overview
//!
//! This library provides ordered collections that are never modified in
//! place. Every "mutation" returns a new collection and leaves the original
//! untouched; unchanged subtrees are shared by reference between the old and
//! new versions, so creating a new version costs O(log N) allocations, not a
//! full copy.
//!
//! - [`SortedMap`]: a persistent ordered map backed by a red-black tree
//! - [`SortedSet`]: a persistent ordered set adapting the map
//! - [`Comparator`]: pluggable total-order strategies, with [`Natural`]
//!   ordering as the default and [`Descending`] as a ready-made adaptor
//!
//! ## Structural Sharing
//!
//! ```rust
//! use canopy::SortedMap;
//!
//! let original = SortedMap::new()
//!     .insert(5, "five")
//!     .insert(3, "three")
//!     .insert(8, "eight");
//!
//! let updated = original.insert(5, "FIVE");
//!
//! assert_eq!(original.get(&5), Some(&"five")); // Original unchanged
//! assert_eq!(updated.get(&5), Some(&"FIVE"));  // New version
//! ```
//!
//! ## Ordering
//!
//! Entries are always kept in comparator order, which makes ordered
//! iteration, range queries and restriction to a sub-range cheap:
//!
//! ```rust
//! use canopy::SortedMap;
//!
//! let map: SortedMap<i32, i32> = (1..=9).step_by(2).map(|key| (key, key * 10)).collect();
//!
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &3, &5, &7, &9]);
//!
//! let window = map.sub_map(&3, &7).unwrap();
//! let keys: Vec<&i32> = window.keys().collect();
//! assert_eq!(keys, vec![&3, &5]);
//! ```
//!
//! ## Feature Flags
//!
//! - `arc`: share subtrees with `Arc` instead of `Rc`, making every
//!   collection `Send + Sync`. Readers never need a lock either way, because
//!   nothing is ever mutated after construction.
//! - `serde`: `Serialize`/`Deserialize` implementations for both collections.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

// =============================================================================
// Reference Counter Type Alias
// =============================================================================

/// Reference-counted smart pointer type.
///
/// When the `arc` feature is enabled, this is `std::sync::Arc`,
/// which is thread-safe but has slightly higher overhead.
///
/// When the `arc` feature is disabled (default), this is `std::rc::Rc`,
/// which is faster but not thread-safe.
#[cfg(feature = "arc")]
pub(crate) type ReferenceCounter<T> = std::sync::Arc<T>;

#[cfg(not(feature = "arc"))]
pub(crate) type ReferenceCounter<T> = std::rc::Rc<T>;

mod comparator;
mod error;
mod iter;
mod map;
mod node;
mod set;

pub use comparator::Comparator;
pub use comparator::Descending;
pub use comparator::FnComparator;
pub use comparator::Natural;
pub use error::EmptyCollectionError;
pub use error::InvalidRangeError;
pub use iter::IntoIter;
pub use iter::Iter;
pub use iter::Range;
pub use map::SortedMap;
pub use set::SetIntoIter;
pub use set::SetIter;
pub use set::SetRange;
pub use set::SortedSet;

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod reference_counter_tests {
    use super::ReferenceCounter;
    use rstest::rstest;

    #[rstest]
    fn test_reference_counter_clone() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(*reference_counter, *reference_counter_clone);
    }

    #[rstest]
    fn test_reference_counter_strong_count() {
        let reference_counter: ReferenceCounter<i32> = ReferenceCounter::new(42);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
        let reference_counter_clone = reference_counter.clone();
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 2);
        drop(reference_counter_clone);
        assert_eq!(ReferenceCounter::strong_count(&reference_counter), 1);
    }
}
