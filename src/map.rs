//! Persistent (immutable) sorted map based on a red-black tree.
//!
//! This module provides [`SortedMap`], an immutable ordered map that uses
//! structural sharing for efficient operations.
//!
//! # Overview
//!
//! `SortedMap` is a persistent red-black tree: a self-balancing binary
//! search tree in which every update builds new nodes only along the search
//! path and shares everything else with the previous version.
//!
//! - O(log N) get
//! - O(log N) insert
//! - O(log N) remove
//! - O(log N) min/max
//! - O(log N) restriction to a key range, sharing interior subtrees
//! - O(1) len and `is_empty`
//!
//! All operations return new maps without modifying the original. Because no
//! map is ever mutated after construction, any number of threads may read
//! any number of versions concurrently without locks (enable the `arc`
//! feature for `Send + Sync` collections).
//!
//! # Examples
//!
//! ```rust
//! use canopy::SortedMap;
//!
//! let map = SortedMap::new()
//!     .insert(3, "three")
//!     .insert(1, "one")
//!     .insert(2, "two");
//!
//! // Entries are always in comparator order
//! let keys: Vec<&i32> = map.keys().collect();
//! assert_eq!(keys, vec![&1, &2, &3]);
//! ```
//!
//! # Ordering
//!
//! The comparator defines both ordering and key equality. The default is
//! [`Natural`] ordering via `Ord`; any comparator value (including a wrapped
//! ordering closure) can be supplied with [`SortedMap::with_comparator`].

use std::borrow::Borrow;
use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::RangeBounds;

use crate::ReferenceCounter;
use crate::comparator::{Comparator, Natural};
use crate::error::{EmptyCollectionError, InvalidRangeError};
use crate::iter::{IntoIter, Iter, Range};
use crate::node::{Color, Link, Node, balance, fix_left_deficit, fix_right_deficit, is_red};
use crate::set::SortedSet;

/// A persistent (immutable) ordered map based on a red-black tree.
///
/// Every "mutating" operation is a pure function from the old map to a new
/// one; the old map stays valid and unchanged, and the two share all
/// subtrees the operation did not touch.
///
/// # Time Complexity
///
/// | Operation      | Complexity        |
/// |----------------|-------------------|
/// | `new`          | O(1)              |
/// | `get`          | O(log N)          |
/// | `insert`       | O(log N)          |
/// | `remove`       | O(log N)          |
/// | `contains_key` | O(log N)          |
/// | `min`/`max`    | O(log N)          |
/// | `sub_map`      | O(log N + k)      |
/// | `range`        | O(log N + k)      |
/// | `len`          | O(1)              |
/// | `is_empty`     | O(1)              |
///
/// # Examples
///
/// ```rust
/// use canopy::SortedMap;
///
/// let map = SortedMap::singleton(42, "answer");
/// assert_eq!(map.get(&42), Some(&"answer"));
///
/// let updated = map.insert(42, "ANSWER");
/// assert_eq!(map.get(&42), Some(&"answer"));     // Original unchanged
/// assert_eq!(updated.get(&42), Some(&"ANSWER")); // New version
/// ```
#[derive(Clone)]
pub struct SortedMap<K, V, C = Natural> {
    /// Root node of the tree
    pub(crate) root: Link<K, V>,
    /// Number of entries, maintained incrementally
    length: usize,
    /// The total-order strategy for keys
    comparator: C,
}

impl<K, V> SortedMap<K, V> {
    /// Creates a new empty map with natural key ordering.
    ///
    /// The empty map owns no nodes and allocates nothing.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map: SortedMap<i32, String> = SortedMap::new();
    /// assert!(map.is_empty());
    /// ```
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            root: None,
            length: 0,
            comparator: Natural,
        }
    }

    /// Creates a map containing a single key-value pair.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map = SortedMap::singleton(42, "answer");
    /// assert_eq!(map.len(), 1);
    /// ```
    #[must_use]
    pub fn singleton(key: K, value: V) -> Self
    where
        K: Clone + Ord,
        V: Clone,
    {
        Self::new().insert(key, value)
    }
}

impl<K, V, C> SortedMap<K, V, C> {
    /// Creates a new empty map ordered by the given comparator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::{Descending, Natural, SortedMap};
    ///
    /// let map = SortedMap::with_comparator(Descending(Natural))
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// let keys: Vec<&i32> = map.keys().collect();
    /// assert_eq!(keys, vec![&2, &1]);
    /// ```
    #[inline]
    #[must_use]
    pub const fn with_comparator(comparator: C) -> Self {
        Self {
            root: None,
            length: 0,
            comparator,
        }
    }

    /// Returns the number of entries in the map.
    ///
    /// # Complexity
    ///
    /// O(1): the count is maintained across operations, never recomputed by
    /// traversal.
    #[inline]
    #[must_use]
    pub const fn len(&self) -> usize {
        self.length
    }

    /// Returns `true` if the map contains no entries.
    #[inline]
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Returns the comparator that orders this map.
    #[inline]
    #[must_use]
    pub const fn comparator(&self) -> &C {
        &self.comparator
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, as long as
    /// the comparator covers the borrowed form; the default [`Natural`]
    /// comparator covers every `Ord` type.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map = SortedMap::new().insert("hello".to_string(), 42);
    ///
    /// // Can use &str to look up String keys
    /// assert_eq!(map.get("hello"), Some(&42));
    /// assert_eq!(map.get("world"), None);
    /// ```
    #[must_use]
    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Comparator<Q>,
    {
        let mut current = self.root.as_deref();
        while let Some(node_ref) = current {
            match self.comparator.compare(key, node_ref.key.borrow()) {
                Ordering::Less => current = node_ref.left.as_deref(),
                Ordering::Greater => current = node_ref.right.as_deref(),
                Ordering::Equal => return Some(&node_ref.value),
            }
        }
        None
    }

    /// Returns `true` if the map contains a value for the specified key.
    ///
    /// # Complexity
    ///
    /// O(log N)
    #[must_use]
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Comparator<Q>,
    {
        self.get(key).is_some()
    }

    /// Returns the entry with the minimum key.
    ///
    /// Returns `None` on an empty map; see [`first_key`](Self::first_key)
    /// for the failing variant.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map = SortedMap::new().insert(3, "three").insert(1, "one");
    /// assert_eq!(map.min(), Some((&1, &"one")));
    /// ```
    #[must_use]
    pub fn min(&self) -> Option<(&K, &V)> {
        let mut current = self.root.as_deref()?;
        while let Some(left) = current.left.as_deref() {
            current = left;
        }
        Some((&current.key, &current.value))
    }

    /// Returns the entry with the maximum key.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map = SortedMap::new().insert(3, "three").insert(1, "one");
    /// assert_eq!(map.max(), Some((&3, &"three")));
    /// ```
    #[must_use]
    pub fn max(&self) -> Option<(&K, &V)> {
        let mut current = self.root.as_deref()?;
        while let Some(right) = current.right.as_deref() {
            current = right;
        }
        Some((&current.key, &current.value))
    }

    /// Returns the first entry, if any. Alias of [`min`](Self::min).
    #[inline]
    #[must_use]
    pub fn head(&self) -> Option<(&K, &V)> {
        self.min()
    }

    /// Returns the minimum key.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyCollectionError`] when the map is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map = SortedMap::new().insert(2, "two").insert(1, "one");
    /// assert_eq!(map.first_key(), Ok(&1));
    ///
    /// let empty: SortedMap<i32, &str> = SortedMap::new();
    /// assert!(empty.first_key().is_err());
    /// ```
    pub fn first_key(&self) -> Result<&K, EmptyCollectionError> {
        self.min().map(|(key, _)| key).ok_or(EmptyCollectionError {
            operation: "first_key",
        })
    }

    /// Returns the maximum key.
    ///
    /// # Errors
    ///
    /// Returns [`EmptyCollectionError`] when the map is empty.
    pub fn last_key(&self) -> Result<&K, EmptyCollectionError> {
        self.max().map(|(key, _)| key).ok_or(EmptyCollectionError {
            operation: "last_key",
        })
    }

    /// Returns an iterator over entries in key order.
    ///
    /// The cursor holds the current spine on an explicit stack, so it uses
    /// O(log N) memory however large the tree is, and any number of cursors
    /// may be live over the same map at once.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map = SortedMap::new()
    ///     .insert(3, "three")
    ///     .insert(1, "one")
    ///     .insert(2, "two");
    ///
    /// for (key, value) in map.iter() {
    ///     println!("{key}: {value}");
    /// }
    /// ```
    #[must_use]
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self.root.as_deref(), self.length)
    }

    /// Returns an iterator over keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.iter().map(|(key, _)| key)
    }

    /// Returns an iterator over values in key order.
    pub fn values(&self) -> impl Iterator<Item = &V> {
        self.iter().map(|(_, value)| value)
    }

    /// Returns an iterator over the entries whose keys fall within `range`.
    ///
    /// Endpoints are resolved once against the tree; the cursor then walks
    /// the shared structure lazily without copying. A range that can hold no
    /// key (including an inverted one) yields nothing. For a restriction
    /// that is itself a map, see [`sub_map`](Self::sub_map).
    ///
    /// # Complexity
    ///
    /// O(log N + k) where k is the number of entries yielded
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map: SortedMap<i32, i32> = (1..=5).map(|key| (key, key * 10)).collect();
    ///
    /// let keys: Vec<&i32> = map.range(2..=4).map(|(key, _)| key).collect();
    /// assert_eq!(keys, vec![&2, &3, &4]);
    /// ```
    pub fn range<Q, R>(&self, range: R) -> Range<'_, K, V>
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Comparator<Q>,
        R: RangeBounds<Q>,
    {
        Range::new(self.root.as_deref(), &self.comparator, &range)
    }
}

impl<K, V, C> SortedMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Comparator<K> + Clone,
{
    /// Inserts a key-value pair, returning the new map.
    ///
    /// If the map already contains a comparator-equal key, its value is
    /// replaced. The original map is never modified; the new map shares
    /// every subtree off the insertion path with it.
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map1 = SortedMap::new().insert(1, "one");
    /// let map2 = map1.insert(1, "ONE");
    ///
    /// assert_eq!(map1.get(&1), Some(&"one")); // Original unchanged
    /// assert_eq!(map2.get(&1), Some(&"ONE")); // New version
    /// ```
    #[must_use]
    pub fn insert(&self, key: K, value: V) -> Self {
        let (new_root, added) = Self::insert_node(self.root.as_ref(), &self.comparator, key, value);
        let black_root = if new_root.is_red() {
            ReferenceCounter::new(new_root.with_color(Color::Black))
        } else {
            new_root
        };
        Self {
            root: Some(black_root),
            length: if added { self.length + 1 } else { self.length },
            comparator: self.comparator.clone(),
        }
    }

    /// Recursive helper for insert.
    /// Returns (`new_node`, `was_added`) where `was_added` is false when an
    /// existing entry was replaced.
    fn insert_node(
        node: Option<&ReferenceCounter<Node<K, V>>>,
        comparator: &C,
        key: K,
        value: V,
    ) -> (ReferenceCounter<Node<K, V>>, bool) {
        let Some(node_ref) = node else {
            return (ReferenceCounter::new(Node::new_red(key, value)), true);
        };
        match comparator.compare(&key, &node_ref.key) {
            Ordering::Less => {
                let (new_left, added) =
                    Self::insert_node(node_ref.left.as_ref(), comparator, key, value);
                let rebuilt = node_ref.with_children(Some(new_left), node_ref.right.clone());
                (ReferenceCounter::new(balance(rebuilt)), added)
            }
            Ordering::Greater => {
                let (new_right, added) =
                    Self::insert_node(node_ref.right.as_ref(), comparator, key, value);
                let rebuilt = node_ref.with_children(node_ref.left.clone(), Some(new_right));
                (ReferenceCounter::new(balance(rebuilt)), added)
            }
            Ordering::Equal => {
                let replaced = Node {
                    key,
                    value,
                    color: node_ref.color,
                    left: node_ref.left.clone(),
                    right: node_ref.right.clone(),
                };
                (ReferenceCounter::new(replaced), false)
            }
        }
    }

    /// Removes a key, returning the new map.
    ///
    /// When the key is absent no new tree is built: the returned map shares
    /// the original's root, which callers may rely on (and observe through
    /// pointer identity).
    ///
    /// # Complexity
    ///
    /// O(log N)
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map = SortedMap::new().insert(1, "one").insert(2, "two");
    /// let removed = map.remove(&1);
    ///
    /// assert_eq!(map.len(), 2);     // Original unchanged
    /// assert_eq!(removed.len(), 1); // New version
    /// assert_eq!(removed.get(&1), None);
    /// ```
    #[must_use]
    pub fn remove<Q>(&self, key: &Q) -> Self
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Comparator<Q>,
    {
        if !self.contains_key(key) {
            return self.clone();
        }
        let (new_root, _) = Self::remove_node(self.root.as_ref(), &self.comparator, key);
        let black_root = new_root.map(|node_ref| {
            if node_ref.is_red() {
                ReferenceCounter::new(node_ref.with_color(Color::Black))
            } else {
                node_ref
            }
        });
        Self {
            root: black_root,
            length: self.length - 1,
            comparator: self.comparator.clone(),
        }
    }

    /// Recursive helper for remove. Returns the replacement subtree and
    /// whether it is one black node short.
    fn remove_node<Q>(
        node: Option<&ReferenceCounter<Node<K, V>>>,
        comparator: &C,
        key: &Q,
    ) -> (Link<K, V>, bool)
    where
        K: Borrow<Q>,
        Q: ?Sized,
        C: Comparator<Q>,
    {
        let Some(node_ref) = node else {
            return (None, false);
        };
        match comparator.compare(key, node_ref.key.borrow()) {
            Ordering::Less => {
                let (new_left, deficit) =
                    Self::remove_node(node_ref.left.as_ref(), comparator, key);
                let rebuilt = node_ref.with_children(new_left, node_ref.right.clone());
                if deficit {
                    let (repaired, still_short) = fix_left_deficit(rebuilt);
                    (Some(repaired), still_short)
                } else {
                    (Some(ReferenceCounter::new(rebuilt)), false)
                }
            }
            Ordering::Greater => {
                let (new_right, deficit) =
                    Self::remove_node(node_ref.right.as_ref(), comparator, key);
                let rebuilt = node_ref.with_children(node_ref.left.clone(), new_right);
                if deficit {
                    let (repaired, still_short) = fix_right_deficit(rebuilt);
                    (Some(repaired), still_short)
                } else {
                    (Some(ReferenceCounter::new(rebuilt)), false)
                }
            }
            Ordering::Equal => Self::remove_found(node_ref),
        }
    }

    /// Unlinks the located node. A node with two children swaps in its
    /// in-order successor and deletes that from the right subtree instead; a
    /// single child must be red and is recolored into place; removing a
    /// childless black node reports a deficit.
    fn remove_found(node_ref: &ReferenceCounter<Node<K, V>>) -> (Link<K, V>, bool) {
        match (node_ref.left.as_ref(), node_ref.right.as_ref()) {
            (None, None) => (None, node_ref.color == Color::Black),
            (Some(child), None) | (None, Some(child)) => {
                (Some(ReferenceCounter::new(child.with_color(Color::Black))), false)
            }
            (Some(_), Some(right)) => {
                let (new_right, deficit, successor_key, successor_value) =
                    Self::remove_min_node(right);
                let rebuilt = Node {
                    key: successor_key,
                    value: successor_value,
                    color: node_ref.color,
                    left: node_ref.left.clone(),
                    right: new_right,
                };
                if deficit {
                    let (repaired, still_short) = fix_right_deficit(rebuilt);
                    (Some(repaired), still_short)
                } else {
                    (Some(ReferenceCounter::new(rebuilt)), false)
                }
            }
        }
    }

    /// Removes the minimum node of a subtree, handing its entry back up.
    fn remove_min_node(node_ref: &ReferenceCounter<Node<K, V>>) -> (Link<K, V>, bool, K, V) {
        match node_ref.left.as_ref() {
            None => {
                let key = node_ref.key.clone();
                let value = node_ref.value.clone();
                match node_ref.right.as_ref() {
                    Some(child) => (
                        Some(ReferenceCounter::new(child.with_color(Color::Black))),
                        false,
                        key,
                        value,
                    ),
                    None => (None, node_ref.color == Color::Black, key, value),
                }
            }
            Some(left) => {
                let (new_left, deficit, key, value) = Self::remove_min_node(left);
                let rebuilt = node_ref.with_children(new_left, node_ref.right.clone());
                if deficit {
                    let (repaired, still_short) = fix_left_deficit(rebuilt);
                    (Some(repaired), still_short, key, value)
                } else {
                    (Some(ReferenceCounter::new(rebuilt)), false, key, value)
                }
            }
        }
    }

    /// Restricts the map to keys in `[from, to)`, returning a new map.
    ///
    /// The restriction is built by splitting the tree at both bounds, so
    /// every subtree lying entirely inside the range is shared with the
    /// original by reference; only the two boundary paths are rebuilt.
    /// `from == to` yields the empty map.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidRangeError`] when `from` sorts after `to` under the
    /// map's comparator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map: SortedMap<i32, i32> =
    ///     [1, 3, 5, 7, 9].into_iter().map(|key| (key, key)).collect();
    ///
    /// let window = map.sub_map(&3, &7).unwrap();
    /// let keys: Vec<&i32> = window.keys().collect();
    /// assert_eq!(keys, vec![&3, &5]);
    ///
    /// assert!(map.sub_map(&7, &3).is_err());
    /// ```
    pub fn sub_map(&self, from: &K, to: &K) -> Result<Self, InvalidRangeError> {
        match self.comparator.compare(from, to) {
            Ordering::Greater => Err(InvalidRangeError),
            Ordering::Equal => Ok(Self::with_comparator(self.comparator.clone())),
            Ordering::Less => {
                let (below_to, _, _) = Self::split(self.root.clone(), &self.comparator, to);
                let (_, at_from, between) = Self::split(below_to, &self.comparator, from);
                let root = match at_from {
                    Some((key, value)) => Some(Self::join(None, key, value, between)),
                    None => between,
                };
                let black_root = root.map(|node_ref| {
                    if node_ref.is_red() {
                        ReferenceCounter::new(node_ref.with_color(Color::Black))
                    } else {
                        node_ref
                    }
                });
                let length = Self::count(black_root.as_deref());
                Ok(Self {
                    root: black_root,
                    length,
                    comparator: self.comparator.clone(),
                })
            }
        }
    }

    /// Returns the set of keys, ordered by the same comparator.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map = SortedMap::new().insert(2, "two").insert(1, "one");
    /// let keys = map.key_set();
    /// assert!(keys.contains(&1));
    /// assert!(keys.contains(&2));
    /// assert_eq!(keys.len(), 2);
    /// ```
    #[must_use]
    pub fn key_set(&self) -> SortedSet<K, C> {
        let mut keys = SortedSet::with_comparator(self.comparator.clone());
        for (key, _) in self.iter() {
            keys = keys.insert(key.clone());
        }
        keys
    }

    /// Merges two maps, with entries from `other` winning on key conflicts.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use canopy::SortedMap;
    ///
    /// let map1 = SortedMap::new().insert(1, "one").insert(2, "two");
    /// let map2 = SortedMap::new().insert(2, "TWO").insert(3, "three");
    /// let merged = map1.merge(&map2);
    ///
    /// assert_eq!(merged.get(&1), Some(&"one"));
    /// assert_eq!(merged.get(&2), Some(&"TWO"));
    /// assert_eq!(merged.get(&3), Some(&"three"));
    /// ```
    #[must_use]
    pub fn merge(&self, other: &Self) -> Self {
        let mut result = self.clone();
        for (key, value) in other.iter() {
            result = result.insert(key.clone(), value.clone());
        }
        result
    }

    // =========================================================================
    // Split / Join
    // =========================================================================

    /// Number of black nodes on the path to the leftmost empty position.
    /// Valid trees have the same count on every path.
    fn black_height(node: Option<&Node<K, V>>) -> usize {
        let mut height = 0;
        let mut current = node;
        while let Some(node_ref) = current {
            if node_ref.color == Color::Black {
                height += 1;
            }
            current = node_ref.left.as_deref();
        }
        height
    }

    fn count(node: Option<&Node<K, V>>) -> usize {
        node.map_or(0, |node_ref| {
            1 + Self::count(node_ref.left.as_deref()) + Self::count(node_ref.right.as_deref())
        })
    }

    /// Joins two trees around a middle entry, given that every key in `left`
    /// sorts before `key` and every key in `right` sorts after it. The
    /// shorter tree is attached along the taller tree's spine so that both
    /// inputs are reused wholesale wherever possible.
    fn join(
        left: Link<K, V>,
        key: K,
        value: V,
        right: Link<K, V>,
    ) -> ReferenceCounter<Node<K, V>> {
        let left_height = Self::black_height(left.as_deref());
        let right_height = Self::black_height(right.as_deref());
        match left_height.cmp(&right_height) {
            Ordering::Greater => {
                let joined = Self::join_right(left, key, value, right, left_height, right_height);
                if joined.is_red() && is_red(joined.right.as_ref()) {
                    ReferenceCounter::new(joined.with_color(Color::Black))
                } else {
                    joined
                }
            }
            Ordering::Less => {
                let joined = Self::join_left(left, key, value, right, left_height, right_height);
                if joined.is_red() && is_red(joined.left.as_ref()) {
                    ReferenceCounter::new(joined.with_color(Color::Black))
                } else {
                    joined
                }
            }
            Ordering::Equal => {
                let color = if is_red(left.as_ref()) || is_red(right.as_ref()) {
                    Color::Black
                } else {
                    Color::Red
                };
                ReferenceCounter::new(Node {
                    key,
                    value,
                    color,
                    left,
                    right,
                })
            }
        }
    }

    /// Descends the right spine of the taller left tree until the black
    /// heights meet, attaches a red node there, and repairs any red-red pair
    /// created on the way back up.
    fn join_right(
        left: Link<K, V>,
        key: K,
        value: V,
        right: Link<K, V>,
        left_height: usize,
        right_height: usize,
    ) -> ReferenceCounter<Node<K, V>> {
        if left_height == right_height && !is_red(left.as_ref()) {
            return ReferenceCounter::new(Node {
                key,
                value,
                color: Color::Red,
                left,
                right,
            });
        }
        let Some(left_node) = left else {
            return ReferenceCounter::new(Node::new_red(key, value));
        };
        let lowered_height = if left_node.color == Color::Black {
            left_height - 1
        } else {
            left_height
        };
        let attached = Self::join_right(
            left_node.right.clone(),
            key,
            value,
            right,
            lowered_height,
            right_height,
        );
        let rebuilt = left_node.with_children(left_node.left.clone(), Some(attached));
        ReferenceCounter::new(Self::fix_right_spine(rebuilt))
    }

    /// Mirror of [`join_right`](Self::join_right) for a taller right tree.
    fn join_left(
        left: Link<K, V>,
        key: K,
        value: V,
        right: Link<K, V>,
        left_height: usize,
        right_height: usize,
    ) -> ReferenceCounter<Node<K, V>> {
        if left_height == right_height && !is_red(right.as_ref()) {
            return ReferenceCounter::new(Node {
                key,
                value,
                color: Color::Red,
                left,
                right,
            });
        }
        let Some(right_node) = right else {
            return ReferenceCounter::new(Node::new_red(key, value));
        };
        let lowered_height = if right_node.color == Color::Black {
            right_height - 1
        } else {
            right_height
        };
        let attached = Self::join_left(
            left,
            key,
            value,
            right_node.left.clone(),
            left_height,
            lowered_height,
        );
        let rebuilt = right_node.with_children(Some(attached), right_node.right.clone());
        ReferenceCounter::new(Self::fix_left_spine(rebuilt))
    }

    /// Rotates away a red child with a red right grandchild on the right
    /// spine of a black node.
    fn fix_right_spine(node: Node<K, V>) -> Node<K, V> {
        if node.color == Color::Black {
            if let Some(right) = node.right.clone() {
                if right.is_red() && is_red(right.right.as_ref()) {
                    if let Some(right_right) = right.right.clone() {
                        let new_left = Node {
                            key: node.key,
                            value: node.value,
                            color: Color::Black,
                            left: node.left,
                            right: right.left.clone(),
                        };
                        return Node {
                            key: right.key.clone(),
                            value: right.value.clone(),
                            color: Color::Red,
                            left: Some(ReferenceCounter::new(new_left)),
                            right: Some(ReferenceCounter::new(
                                right_right.with_color(Color::Black),
                            )),
                        };
                    }
                }
            }
        }
        node
    }

    /// Mirror of [`fix_right_spine`](Self::fix_right_spine).
    fn fix_left_spine(node: Node<K, V>) -> Node<K, V> {
        if node.color == Color::Black {
            if let Some(left) = node.left.clone() {
                if left.is_red() && is_red(left.left.as_ref()) {
                    if let Some(left_left) = left.left.clone() {
                        let new_right = Node {
                            key: node.key,
                            value: node.value,
                            color: Color::Black,
                            left: left.right.clone(),
                            right: node.right,
                        };
                        return Node {
                            key: left.key.clone(),
                            value: left.value.clone(),
                            color: Color::Red,
                            left: Some(ReferenceCounter::new(left_left.with_color(Color::Black))),
                            right: Some(ReferenceCounter::new(new_right)),
                        };
                    }
                }
            }
        }
        node
    }

    /// Splits a tree at `key` into the entries below it, the entry for the
    /// key itself if present, and the entries above it.
    fn split(
        node: Link<K, V>,
        comparator: &C,
        key: &K,
    ) -> (Link<K, V>, Option<(K, V)>, Link<K, V>) {
        let Some(node_ref) = node else {
            return (None, None, None);
        };
        match comparator.compare(key, &node_ref.key) {
            Ordering::Equal => (
                node_ref.left.clone(),
                Some((node_ref.key.clone(), node_ref.value.clone())),
                node_ref.right.clone(),
            ),
            Ordering::Less => {
                let (below, at, above) = Self::split(node_ref.left.clone(), comparator, key);
                let rejoined = Self::join(
                    above,
                    node_ref.key.clone(),
                    node_ref.value.clone(),
                    node_ref.right.clone(),
                );
                (below, at, Some(rejoined))
            }
            Ordering::Greater => {
                let (below, at, above) = Self::split(node_ref.right.clone(), comparator, key);
                let rejoined = Self::join(
                    node_ref.left.clone(),
                    node_ref.key.clone(),
                    node_ref.value.clone(),
                    below,
                );
                (Some(rejoined), at, above)
            }
        }
    }
}

// =============================================================================
// Standard Trait Implementations
// =============================================================================

impl<K, V, C: Default> Default for SortedMap<K, V, C> {
    #[inline]
    fn default() -> Self {
        Self::with_comparator(C::default())
    }
}

impl<K, V, C> FromIterator<(K, V)> for SortedMap<K, V, C>
where
    K: Clone,
    V: Clone,
    C: Comparator<K> + Clone + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::with_comparator(C::default());
        for (key, value) in iter {
            map = map.insert(key, value);
        }
        map
    }
}

impl<K: Clone, V: Clone, C> IntoIterator for SortedMap<K, V, C> {
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;

    fn into_iter(self) -> Self::IntoIter {
        let entries: Vec<(K, V)> = self
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        IntoIter::new(entries)
    }
}

impl<'a, K, V, C> IntoIterator for &'a SortedMap<K, V, C> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<K, V, C> PartialEq for SortedMap<K, V, C>
where
    V: PartialEq,
    C: Comparator<K>,
{
    /// Two maps are equal when they have the same length and their ordered
    /// entry sequences match pairwise: comparator-equal keys, `==`-equal
    /// values.
    fn eq(&self, other: &Self) -> bool {
        self.length == other.length
            && self
                .iter()
                .zip(other.iter())
                .all(|((left_key, left_value), (right_key, right_value))| {
                    self.comparator.compare(left_key, right_key) == Ordering::Equal
                        && left_value == right_value
                })
    }
}

impl<K, V, C> Eq for SortedMap<K, V, C>
where
    V: Eq,
    C: Comparator<K>,
{
}

/// Hashes the length, then each entry in key order. Iteration order is
/// comparator order, so insertion order never affects the hash and equal
/// maps hash equal.
impl<K, V, C> Hash for SortedMap<K, V, C>
where
    K: Hash,
    V: Hash,
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.length.hash(state);
        for (key, value) in self.iter() {
            key.hash(state);
            value.hash(state);
        }
    }
}

impl<K: fmt::Debug, V: fmt::Debug, C> fmt::Debug for SortedMap<K, V, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_map().entries(self.iter()).finish()
    }
}

impl<K: fmt::Display, V: fmt::Display, C> fmt::Display for SortedMap<K, V, C> {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{{")?;
        let mut first = true;
        for (key, value) in self.iter() {
            if first {
                first = false;
            } else {
                write!(formatter, ", ")?;
            }
            write!(formatter, "{key}: {value}")?;
        }
        write!(formatter, "}}")
    }
}

// =============================================================================
// Serde Support
// =============================================================================

#[cfg(feature = "serde")]
impl<K, V, C> serde::Serialize for SortedMap<K, V, C>
where
    K: serde::Serialize,
    V: serde::Serialize,
{
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeMap;
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (key, value) in self.iter() {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

#[cfg(feature = "serde")]
struct SortedMapVisitor<K, V, C> {
    marker: std::marker::PhantomData<(K, V, C)>,
}

#[cfg(feature = "serde")]
impl<'de, K, V, C> serde::de::Visitor<'de> for SortedMapVisitor<K, V, C>
where
    K: serde::Deserialize<'de> + Clone,
    V: serde::Deserialize<'de> + Clone,
    C: Comparator<K> + Clone + Default,
{
    type Value = SortedMap<K, V, C>;

    fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
        formatter.write_str("a map")
    }

    fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
    where
        A: serde::de::MapAccess<'de>,
    {
        let mut map = SortedMap::with_comparator(C::default());
        while let Some((key, value)) = access.next_entry()? {
            map = map.insert(key, value);
        }
        Ok(map)
    }
}

#[cfg(feature = "serde")]
impl<'de, K, V, C> serde::Deserialize<'de> for SortedMap<K, V, C>
where
    K: serde::Deserialize<'de> + Clone,
    V: serde::Deserialize<'de> + Clone,
    C: Comparator<K> + Clone + Default,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        deserializer.deserialize_map(SortedMapVisitor {
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

#[cfg(all(test, feature = "arc"))]
mod send_sync_tests {
    use super::*;
    use rstest::rstest;

    const fn assert_send<T: Send>() {}
    const fn assert_sync<T: Sync>() {}

    #[rstest]
    fn test_map_is_send_and_sync() {
        assert_send::<SortedMap<i32, String>>();
        assert_sync::<SortedMap<i32, String>>();
    }
}

// =============================================================================
// Multithread Tests (arc feature only)
// =============================================================================

#[cfg(all(test, feature = "arc"))]
mod multithread_tests {
    use super::*;
    use rstest::rstest;
    use std::sync::Arc;
    use std::thread;

    #[rstest]
    fn test_versions_are_independent_across_threads() {
        let base = Arc::new(SortedMap::new().insert(0, "base"));

        let handles: Vec<_> = (1..=4)
            .map(|index| {
                let shared = Arc::clone(&base);
                thread::spawn(move || {
                    let version = shared.insert(index, "new");
                    assert_eq!(version.len(), 2);
                    assert_eq!(shared.len(), 1);
                    assert_eq!(version.get(&index), Some(&"new"));
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread panicked");
        }
        assert_eq!(base.len(), 1);
    }

    #[rstest]
    fn test_concurrent_readers_see_sorted_order() {
        let map = Arc::new(
            SortedMap::new()
                .insert(3, "three")
                .insert(1, "one")
                .insert(2, "two"),
        );

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let shared = Arc::clone(&map);
                thread::spawn(move || {
                    let keys: Vec<i32> = shared.keys().copied().collect();
                    assert_eq!(keys, vec![1, 2, 3]);
                })
            })
            .collect();

        for handle in handles {
            handle.join().expect("thread panicked");
        }
    }
}

// =============================================================================
// Serde Tests
// =============================================================================
