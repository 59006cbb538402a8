//! Persistent (immutable) sorted set adapting the sorted map.
//!
//! [`SortedSet`] stores each element as a key of a [`SortedMap`] with the
//! unit value, which is never inspected. All ordering, balancing and
//! structural sharing live in the map; the set contributes key-only
//! semantics on top: idempotent insertion, membership, ordered element
//! traversal and the usual set algebra.
//!
//! # Examples
//!
//! ```rust
//! use canopy::SortedSet;
//!
//! let set = SortedSet::new().insert(1).insert(2).insert(1);
//! assert_eq!(set.len(), 2);
//! assert!(set.contains(&1));
//! assert!(!set.contains(&3));
//! ```

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::iter::FusedIterator;
use std::ops::RangeBounds;

use crate::comparator::{Comparator, Natural};
use crate::error::{EmptyCollectionError, InvalidRangeError};
use crate::iter::{Iter, Range};
use crate::map::SortedMap;

/// A persistent (immutable) ordered set based on [`SortedMap`].
///
/// Every "mutating" operation returns a new set sharing all untouched
/// structure with the original. Membership and ordering are defined by the
/// comparator, [`Natural`] by default.
///
/// # Examples
///
/// ```rust
/// use canopy::SortedSet;
///
/// let set = SortedSet::new().insert(3).insert(1).insert(2);
///
/// // Elements are always in comparator order
/// let elements: Vec<&i32> = set.iter().collect();
/// assert_eq!(elements, vec![&1, &2, &3]);
///
/// // The original survives later versions unchanged
/// let smaller = set.remove(&2);
/// assert_eq!(set.len(), 3);
/// assert_eq!(smaller.len(), 2);
/// ```
#[derive(Clone)]
pub struct SortedSet<E, C = Natural> {
    map: SortedMap<E, (), C>,
}

impl<E> SortedSet<E> {
    /// Creates a new empty set with natural element ordering.
    ///
    /// The empty set owns no nodes and allocates nothing.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            map: SortedMap::new(),
        }
    }

    /// Creates a set containing a single element.
    #[must_use]
    pub fn singleton(element: E) -> Self
    where
        E: Clone + Ord,
    {
        Self::new().insert(element)
    }
}

impl<E, C> SortedSet<E, C> {
    /// Creates a new empty set ordered by the given comparator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::{Descending, Natural, SortedSet};
    ///
    /// let set = SortedSet::with_comparator(Descending(Natural))
    ///     .insert(1)
    ///     .insert(2)
    ///     .insert(3);
    ///
    /// let elements: Vec<&i32> = set.iter().collect();
    /// assert_eq!(elements, vec![&3, &2, &1]);
    /// ```
    #[inline]
    #[must_use]
    pub const fn with_comparator(comparator: C) -> Self {
        Self {
            map: SortedMap::with_comparator(comparator),
        }
    }

    /// Returns the number of elements in the set.
    ///
    /// # Complexity
    ///
    /// O(1)
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the set contains no elements.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Returns the comparator that orders this set.
    #[inline]
    #[must_use]
    pub const fn comparator(&self) -> &C {
        self.map.comparator()
    }

    /// Returns `true` if the set contains the element.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn contains<Q>(&self, element: &Q) -> bool
    where
        E: Borrow<Q>,
        Q: ?Sized,
        C: Comparator<Q>,
    {
        self.map.contains_key(element)
    }

    /// Returns an iterator over the elements in comparator order.
    ///
    /// The walk is bounded and always terminates; it visits each element
    /// exactly once using O(log N) auxiliary memory.
    #[must_use]
    pub fn iter(&self) -> SetIter<'_, E> {
        SetIter {
            entries: self.map.iter(),
        }
    }

    /// Returns the first element, if any.
    ///
    /// This is the non-failing variant of [`first`](Self::first).
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedSet;
    ///
    /// let set = SortedSet::new().insert(2).insert(1);
    /// assert_eq!(set.head(), Some(&1));
    ///
    /// let empty: SortedSet<i32> = SortedSet::new();
    /// assert_eq!(empty.head(), None);
    /// ```
    #[must_use]
    pub fn head(&self) -> Option<&E> {
        self.map.min().map(|(element, ())| element)
    }

    /// Returns the first element.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyCollectionError`] when the set is empty; callers that
    /// prefer an option should use [`head`](Self::head).
    pub fn first(&self) -> Result<&E, EmptyCollectionError> {
        self.head()
            .ok_or(EmptyCollectionError { operation: "first" })
    }

    /// Returns the last element.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyCollectionError`] when the set is empty.
    pub fn last(&self) -> Result<&E, EmptyCollectionError> {
        self.map
            .max()
            .map(|(element, ())| element)
            .ok_or(EmptyCollectionError { operation: "last" })
    }

    /// Returns an iterator over the elements within the given bounds.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedSet;
    ///
    /// let set: SortedSet<i32> = (1..=9).collect();
    /// let middle: Vec<&i32> = set.range(4..=6).collect();
    /// assert_eq!(middle, vec![&4, &5, &6]);
    /// ```
    pub fn range<Q, R>(&self, range: R) -> SetRange<'_, E>
    where
        E: Borrow<Q>,
        Q: ?Sized,
        C: Comparator<Q>,
        R: RangeBounds<Q>,
    {
        SetRange {
            entries: self.map.range(range),
        }
    }
}

impl<E, C> SortedSet<E, C>
where
    E: Clone,
    C: Comparator<E> + Clone,
{
    /// Inserts an element, returning the new set.
    ///
    /// Inserting an element that is already present builds no new tree: the
    /// returned set shares the original's root.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedSet;
    ///
    /// let set = SortedSet::new().insert(1).insert(2).insert(1);
    /// assert_eq!(set.len(), 2);
    /// ```
    #[must_use]
    pub fn insert(&self, element: E) -> Self {
        if self.map.contains_key(&element) {
            return self.clone();
        }
        Self {
            map: self.map.insert(element, ()),
        }
    }

    /// Removes an element, returning the new set.
    ///
    /// When the element is absent the returned set shares the original's
    /// root; no new tree is built.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn remove<Q>(&self, element: &Q) -> Self
    where
        E: Borrow<Q>,
        Q: ?Sized,
        C: Comparator<Q>,
    {
        Self {
            map: self.map.remove(element),
        }
    }

    /// Returns the set without its first element.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyCollectionError`] when the set is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedSet;
    ///
    /// let set = SortedSet::new().insert(1).insert(2).insert(3);
    /// let rest = set.tail().unwrap();
    ///
    /// let elements: Vec<&i32> = rest.iter().collect();
    /// assert_eq!(elements, vec![&2, &3]);
    /// ```
    pub fn tail(&self) -> Result<Self, EmptyCollectionError> {
        match self.head() {
            Some(first) => Ok(Self {
                map: self.map.remove(first),
            }),
            None => Err(EmptyCollectionError { operation: "tail" }),
        }
    }

    /// Restricts the set to elements in `[from, to)`, returning a new set.
    ///
    /// Subtrees entirely inside the bounds are shared with the original.
    /// `from == to` yields the empty set.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRangeError`] when `from` sorts after `to` under the
    /// set's comparator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedSet;
    ///
    /// let set: SortedSet<i32> = [1, 3, 5, 7, 9].into_iter().collect();
    /// let window = set.sub_set(&3, &7).unwrap();
    ///
    /// let elements: Vec<&i32> = window.iter().collect();
    /// assert_eq!(elements, vec![&3, &5]);
    /// ```
    pub fn sub_set(&self, from: &E, to: &E) -> Result<Self, InvalidRangeError> {
        Ok(Self {
            map: self.map.sub_map(from, to)?,
        })
    }

    /// Returns the union of two sets.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedSet;
    ///
    /// let left: SortedSet<i32> = [1, 2, 3].into_iter().collect();
    /// let right: SortedSet<i32> = [3, 4].into_iter().collect();
    /// assert_eq!(left.union(&right).len(), 4);
    /// ```
    #[must_use]
    pub fn union(&self, other: &Self) -> Self {
        Self {
            map: self.map.merge(&other.map),
        }
    }

    /// Returns the intersection of two sets.
    #[must_use]
    pub fn intersection(&self, other: &Self) -> Self {
        let mut result = Self::with_comparator(self.comparator().clone());
        for element in self.iter() {
            if other.contains(element) {
                result = result.insert(element.clone());
            }
        }
        result
    }

    /// Returns the elements of `self` that are not in `other`.
    #[must_use]
    pub fn difference(&self, other: &Self) -> Self {
        let mut result = Self::with_comparator(self.comparator().clone());
        for element in self.iter() {
            if !other.contains(element) {
                result = result.insert(element.clone());
            }
        }
        result
    }

    /// Returns `true` if every element of `self` is in `other`.
    #[must_use]
    pub fn is_subset(&self, other: &Self) -> bool {
        self.len() <= other.len() && self.iter().all(|element| other.contains(element))
    }
}

// =============================================================================
// Iterators
// =============================================================================

/// An iterator over the elements of a [`SortedSet`] in comparator order.
#[derive(Clone)]
pub struct SetIter<'a, E> {
    entries: Iter<'a, E, ()>,
}

impl<'a, E> Iterator for SetIter<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|(element, ())| element)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.entries.size_hint()
    }
}

impl<E> ExactSizeIterator for SetIter<'_, E> {
    fn len(&self) -> usize {
        self.entries.len()
    }
}

impl<E> FusedIterator for SetIter<'_, E> {}

/// An owning iterator over the elements of a [`SortedSet`].
pub struct SetIntoIter<E> {
    elements: std::vec::IntoIter<E>,
}

impl<E> Iterator for SetIntoIter<E> {
    type Item = E;

    fn next(&mut self) -> Option<Self::Item> {
        self.elements.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.elements.size_hint()
    }
}

impl<E> ExactSizeIterator for SetIntoIter<E> {
    fn len(&self) -> usize {
        self.elements.len()
    }
}

impl<E> FusedIterator for SetIntoIter<E> {}

/// An iterator over the elements of a [`SortedSet`] within bounds.
#[derive(Clone)]
pub struct SetRange<'a, E> {
    entries: Range<'a, E, ()>,
}

impl<'a, E> Iterator for SetRange<'a, E> {
    type Item = &'a E;

    fn next(&mut self) -> Option<Self::Item> {
        self.entries.next().map(|(element, ())| element)
    }
}

impl<E> FusedIterator for SetRange<'_, E> {}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<E, C: Default> Default for SortedSet<E, C> {
    #[inline]
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<E, C> FromIterator<E> for SortedSet<E, C>
where
    E: Clone,
    C: Comparator<E> + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = E>>(iter: I) -> Self {
        let mut set = Self::with_comparator(C::default());
        for element in iter {
            set = set.insert(element);
        }
        set
    }
}

impl<E: Clone, C> IntoIterator for SortedSet<E, C> {
    type Item = E;
    type IntoIter = SetIntoIter<E>;

    fn into_iter(self) -> Self::IntoIter {
        let elements: Vec<E> = self.iter().cloned().collect();
        SetIntoIter {
            elements: elements.into_iter(),
        }
    }
}

impl<'a, E, C> IntoIterator for &'a SortedSet<E, C> {
    type Item = &'a E;
    type IntoIter = SetIter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<E, C> PartialEq for SortedSet<E, C>
where
    C: Comparator<E>,
{
    /// Two sets are equal when they have the same length and pairwise
    /// comparator-equal elements in order.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self
                .iter()
                .zip(other.iter())
                .all(|(left, right)| self.comparator().compare(left, right) == Ordering::Equal)
    }
}

impl<E, C> Eq for SortedSet<E, C> where C: Comparator<E> {}

/// Hashes the length, then each element in comparator order, so insertion
/// order never affects the hash and equal sets hash equal.
impl<E: Hash, C> Hash for SortedSet<E, C> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.len().hash(state);
        for element in self.iter() {
            element.hash(state);
        }
    }
}

impl<E: fmt::Debug, C> fmt::Debug for SortedSet<E, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_set().entries(self.iter()).finish()
    }
}

impl<E: fmt::Display, C> fmt::Display for SortedSet<E, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for element in self.iter() {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{element}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<E, C> serde::Serialize for SortedSet<E, C>
where
    E: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeSeq;
        let mut sequence = serializer.serialize_seq(Some(self.len()))?;
        for element in self.iter() {
            sequence.serialize_element(element)?;
        }
        sequence.end()
    }
}

#[cfg(feature = "serde")]
struct SortedSetVisitor<E, C> {
    marker: std::marker::PhantomData<(E, C)>,
}

#[cfg(feature = "serde")]
impl<'de, E, C> serde::de::Visitor<'de> for SortedSetVisitor<E, C>
where
    E: serde::Deserialize<'de> + Clone,
    C: Comparator<E> + Clone + Default,
{
    type Value = SortedSet<E, C>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a sequence of elements")
    }

    fn visit_seq<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::SeqAccess<'de>,
    {
        let mut set = SortedSet::with_comparator(C::default());
        while let Some(element) = access.next_element()? {
            set = set.insert(element);
        }
        Ok(set)
    }
}

#[cfg(feature = "serde")]
impl<'de, E, C> serde::Deserialize<'de> for SortedSet<E, C>
where
    E: serde::Deserialize<'de> + Clone,
    C: Comparator<E> + Clone + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_seq(SortedSetVisitor {
            marker: std::marker::PhantomData,
        })
    }
}

// =============================================================================
// Tests
// =============================================================================


// =============================================================================
// Send + Sync Tests (arc feature only)
// =============================================================================


// =============================================================================
// Serde Tests
// =============================================================================
