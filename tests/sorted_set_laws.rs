//! Property-based tests for `SortedSet`.
//!
//! These tests verify that `SortedSet` satisfies the expected laws and
//! invariants using proptest.

use canopy::SortedSet;
use proptest::prelude::*;

// =============================================================================
// Strategies for Generating Test Data
// =============================================================================

/// Strategy for generating a `SortedSet` from a vector of elements.
fn arbitrary_set(max_size: usize) -> impl Strategy<Value = SortedSet<i32>> {
    prop::collection::vec(any::<i32>(), 0..max_size)
        .prop_map(|elements| elements.into_iter().collect::<SortedSet<i32>>())
}

// =============================================================================
// Membership Laws
// =============================================================================

proptest! {
    /// Law: contains after insert is true.
    #[test]
    fn prop_contains_after_insert(set in arbitrary_set(20), element: i32) {
        prop_assert!(set.insert(element).contains(&element));
    }

    /// Law: contains after remove is false.
    #[test]
    fn prop_not_contains_after_remove(set in arbitrary_set(20), element: i32) {
        prop_assert!(!set.remove(&element).contains(&element));
    }

    /// Law: insert of a present element keeps the length; remove of an
    /// absent element keeps it too.
    #[test]
    fn prop_idempotent_membership_changes(set in arbitrary_set(20), element: i32) {
        let inserted_once = set.insert(element);
        let inserted_twice = inserted_once.insert(element);
        prop_assert_eq!(inserted_once.len(), inserted_twice.len());

        let without = set.remove(&element);
        let without_again = without.remove(&element);
        prop_assert_eq!(without.len(), without_again.len());
    }
}

// =============================================================================
// Ordering Laws
// =============================================================================

proptest! {
    /// Law: iteration is strictly increasing, so it is also duplicate-free
    /// and terminates after exactly len() elements.
    #[test]
    fn prop_iter_is_sorted_and_bounded(set in arbitrary_set(50)) {
        let elements: Vec<i32> = set.iter().copied().collect();
        prop_assert_eq!(elements.len(), set.len());
        for window in elements.windows(2) {
            prop_assert!(window[0] < window[1]);
        }
    }

    /// Law: head is the first element of iteration.
    #[test]
    fn prop_head_is_first(set in arbitrary_set(30)) {
        prop_assert_eq!(set.head(), set.iter().next());
    }

    /// Law: tail drops exactly the first element.
    #[test]
    fn prop_tail_drops_first(set in arbitrary_set(30)) {
        prop_assume!(!set.is_empty());
        let rest = set.tail().expect("non-empty");
        let expected: Vec<i32> = set.iter().skip(1).copied().collect();
        let actual: Vec<i32> = rest.iter().copied().collect();
        prop_assert_eq!(actual, expected);
    }
}

// =============================================================================
// Persistence Laws
// =============================================================================

proptest! {
    /// Law: insert and remove leave the original set unchanged.
    #[test]
    fn prop_operations_do_not_modify_original(set in arbitrary_set(20), element: i32) {
        let before: Vec<i32> = set.iter().copied().collect();
        let _ = set.insert(element);
        let _ = set.remove(&element);
        let after: Vec<i32> = set.iter().copied().collect();
        prop_assert_eq!(before, after);
    }
}

// =============================================================================
// Sub-Set Laws
// =============================================================================

proptest! {
    /// Law: sub_set keeps exactly the elements in [from, to).
    #[test]
    fn prop_sub_set_matches_filtered_iter(set in arbitrary_set(30), from: i32, to: i32) {
        prop_assume!(from <= to);
        let window = set.sub_set(&from, &to).expect("valid range");
        let actual: Vec<i32> = window.iter().copied().collect();
        let expected: Vec<i32> = set
            .iter()
            .copied()
            .filter(|element| (from..to).contains(element))
            .collect();
        prop_assert_eq!(actual, expected);
    }

    /// Law: inverted bounds are an error.
    #[test]
    fn prop_sub_set_rejects_inverted_bounds(set in arbitrary_set(20), from: i32, to: i32) {
        prop_assume!(from > to);
        prop_assert!(set.sub_set(&from, &to).is_err());
    }
}

// =============================================================================
// Set Algebra Laws
// =============================================================================

proptest! {
    /// Law: the union contains every element of both sets and nothing else.
    #[test]
    fn prop_union_membership(
        left_elements in prop::collection::vec(-100_i32..100, 0..20),
        right_elements in prop::collection::vec(-100_i32..100, 0..20),
        probe in -100_i32..100
    ) {
        let left: SortedSet<i32> = left_elements.iter().copied().collect();
        let right: SortedSet<i32> = right_elements.iter().copied().collect();
        let combined = left.union(&right);
        prop_assert_eq!(
            combined.contains(&probe),
            left.contains(&probe) || right.contains(&probe)
        );
    }

    /// Law: the intersection contains exactly the shared elements.
    #[test]
    fn prop_intersection_membership(
        left_elements in prop::collection::vec(-100_i32..100, 0..20),
        right_elements in prop::collection::vec(-100_i32..100, 0..20),
        probe in -100_i32..100
    ) {
        let left: SortedSet<i32> = left_elements.iter().copied().collect();
        let right: SortedSet<i32> = right_elements.iter().copied().collect();
        let shared = left.intersection(&right);
        prop_assert_eq!(
            shared.contains(&probe),
            left.contains(&probe) && right.contains(&probe)
        );
    }

    /// Law: the difference contains exactly the exclusive elements.
    #[test]
    fn prop_difference_membership(
        left_elements in prop::collection::vec(-100_i32..100, 0..20),
        right_elements in prop::collection::vec(-100_i32..100, 0..20),
        probe in -100_i32..100
    ) {
        let left: SortedSet<i32> = left_elements.iter().copied().collect();
        let right: SortedSet<i32> = right_elements.iter().copied().collect();
        let exclusive = left.difference(&right);
        prop_assert_eq!(
            exclusive.contains(&probe),
            left.contains(&probe) && !right.contains(&probe)
        );
    }

    /// Law: intersection and difference partition the left set.
    #[test]
    fn prop_intersection_difference_partition(
        left_elements in prop::collection::vec(-100_i32..100, 0..20),
        right_elements in prop::collection::vec(-100_i32..100, 0..20)
    ) {
        let left: SortedSet<i32> = left_elements.iter().copied().collect();
        let right: SortedSet<i32> = right_elements.iter().copied().collect();
        let shared = left.intersection(&right);
        let exclusive = left.difference(&right);
        prop_assert_eq!(shared.len() + exclusive.len(), left.len());
        prop_assert!(shared.is_subset(&left));
        prop_assert!(exclusive.is_subset(&left));
    }
}

// =============================================================================
// Equality and Hash Laws
// =============================================================================

use std::hash::{DefaultHasher, Hash, Hasher};

/// Helper function: calculate the hash value of a set.
fn calculate_hash<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

proptest! {
    /// Law: sets built in different insertion orders from the same elements
    /// are equal and hash equal.
    #[test]
    fn prop_eq_hash_insertion_order_independent(
        elements in prop::collection::vec(any::<i32>(), 0..30)
    ) {
        let forward: SortedSet<i32> = elements.iter().copied().collect();
        let mut shuffled = elements;
        shuffled.reverse();
        let backward: SortedSet<i32> = shuffled.iter().copied().collect();

        prop_assert_eq!(&forward, &backward);
        prop_assert_eq!(calculate_hash(&forward), calculate_hash(&backward));
    }

    /// Law: round-trip through the owning iterator rebuilds an equal set.
    #[test]
    fn prop_roundtrip_through_iterators(set in arbitrary_set(30)) {
        let elements: Vec<i32> = set.clone().into_iter().collect();
        let rebuilt: SortedSet<i32> = elements.into_iter().collect();
        prop_assert_eq!(set, rebuilt);
    }
}
