//! Tree nodes and node-level rebalancing.
//!
//! A [`Node`] is immutable once constructed. "Mutating" the tree means
//! building new nodes along the path from the affected position up to the
//! root while every subtree off that path is shared by reference with the
//! previous version. The rebalancing primitives here therefore never touch
//! an existing node: they take the freshly rebuilt (still exclusively owned)
//! node for the current level and return a replacement for it.
//!
//! The red-black invariants maintained across every operation:
//! 1. Every node is either red or black
//! 2. The root is black
//! 3. All empty positions count as black
//! 4. Red nodes have only black children
//! 5. Every path from the root to an empty position has the same number of
//!    black nodes

use crate::ReferenceCounter;

/// The color of a red-black tree node.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum Color {
    Red,
    Black,
}

/// An optional shared subtree.
pub(crate) type Link<K, V> = Option<ReferenceCounter<Node<K, V>>>;

/// Internal node structure for the red-black tree.
#[derive(Clone)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) color: Color,
    pub(crate) left: Link<K, V>,
    pub(crate) right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    /// Creates a new red node with no children.
    pub(crate) const fn new_red(key: K, value: V) -> Self {
        Self {
            key,
            value,
            color: Color::Red,
            left: None,
            right: None,
        }
    }

    /// Creates a copy of this node with a new color.
    pub(crate) fn with_color(&self, color: Color) -> Self
    where
        K: Clone,
        V: Clone,
    {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            color,
            left: self.left.clone(),
            right: self.right.clone(),
        }
    }

    /// Creates a copy of this node with new children.
    pub(crate) fn with_children(&self, left: Link<K, V>, right: Link<K, V>) -> Self
    where
        K: Clone,
        V: Clone,
    {
        Self {
            key: self.key.clone(),
            value: self.value.clone(),
            color: self.color,
            left,
            right,
        }
    }

    /// Checks if this node is red.
    pub(crate) fn is_red(&self) -> bool {
        self.color == Color::Red
    }
}

/// Checks if an optional node is red. Empty positions count as black.
pub(crate) fn is_red<K, V>(node: Option<&ReferenceCounter<Node<K, V>>>) -> bool {
    node.is_some_and(|node_ref| node_ref.is_red())
}

// =============================================================================
// Insertion Rebalancing
// =============================================================================

/// Repairs a red-red violation directly below a black node after insertion.
///
/// Insertion attaches a red leaf and rebuilds the search path bottom-up; the
/// only invariant that can break is a red node gaining a red child. At the
/// black grandparent the four possible shapes (left-left, left-right,
/// right-right, right-left) all resolve the same way: the middle key of the
/// three becomes a red parent of two black children. Called on nodes that
/// show no violation, this returns them unchanged.
pub(crate) fn balance<K: Clone, V: Clone>(node: Node<K, V>) -> Node<K, V> {
    if node.color != Color::Black {
        return node;
    }

    if let Some(left) = node.left.clone() {
        if left.is_red() {
            // Left-left: the left child and its left child are both red
            if let Some(left_left) = left.left.clone() {
                if left_left.is_red() {
                    let lifted_right = Node {
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
                        right: Some(ReferenceCounter::new(lifted_right)),
                    };
                }
            }
            // Left-right: the left child and its right child are both red
            if let Some(left_right) = left.right.clone() {
                if left_right.is_red() {
                    let new_left = Node {
                        key: left.key.clone(),
                        value: left.value.clone(),
                        color: Color::Black,
                        left: left.left.clone(),
                        right: left_right.left.clone(),
                    };
                    let new_right = Node {
                        key: node.key,
                        value: node.value,
                        color: Color::Black,
                        left: left_right.right.clone(),
                        right: node.right,
                    };
                    return Node {
                        key: left_right.key.clone(),
                        value: left_right.value.clone(),
                        color: Color::Red,
                        left: Some(ReferenceCounter::new(new_left)),
                        right: Some(ReferenceCounter::new(new_right)),
                    };
                }
            }
        }
    }

    if let Some(right) = node.right.clone() {
        if right.is_red() {
            // Right-right: the right child and its right child are both red
            if let Some(right_right) = right.right.clone() {
                if right_right.is_red() {
                    let lifted_left = Node {
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
                        left: Some(ReferenceCounter::new(lifted_left)),
                        right: Some(ReferenceCounter::new(right_right.with_color(Color::Black))),
                    };
                }
            }
            // Right-left: the right child and its left child are both red
            if let Some(right_left) = right.left.clone() {
                if right_left.is_red() {
                    let new_left = Node {
                        key: node.key,
                        value: node.value,
                        color: Color::Black,
                        left: node.left,
                        right: right_left.left.clone(),
                    };
                    let new_right = Node {
                        key: right.key.clone(),
                        value: right.value.clone(),
                        color: Color::Black,
                        left: right_left.right.clone(),
                        right: right.right.clone(),
                    };
                    return Node {
                        key: right_left.key.clone(),
                        value: right_left.value.clone(),
                        color: Color::Red,
                        left: Some(ReferenceCounter::new(new_left)),
                        right: Some(ReferenceCounter::new(new_right)),
                    };
                }
            }
        }
    }

    node
}

// =============================================================================
// Deletion Rebalancing
// =============================================================================

/// Repairs a subtree whose left child is one black node short.
///
/// Removing a black node leaves a "deficit" on the path it was on. The
/// deficit is resolved by looking at the sibling of the short side:
/// a red sibling is rotated up first (which turns it into one of the black
/// sibling cases one level down); a black sibling with a red nephew donates
/// a node through one or two rotations; a black sibling with black nephews
/// is recolored red, which either absorbs the deficit at a red parent or
/// pushes it one level up. Returns the replacement subtree and whether the
/// deficit still needs to propagate.
pub(crate) fn fix_left_deficit<K: Clone, V: Clone>(
    node: Node<K, V>,
) -> (ReferenceCounter<Node<K, V>>, bool) {
    let color = node.color;
    let Some(sibling) = node.right.clone() else {
        return (ReferenceCounter::new(node), false);
    };

    if sibling.is_red() {
        // Red sibling: the parent is black. Lift the sibling, leaving a red
        // parent whose deficit resolves locally against a black sibling.
        let lowered = Node {
            key: node.key,
            value: node.value,
            color: Color::Red,
            left: node.left,
            right: sibling.left.clone(),
        };
        let (repaired, _) = fix_left_deficit(lowered);
        let root = Node {
            key: sibling.key.clone(),
            value: sibling.value.clone(),
            color: Color::Black,
            left: Some(repaired),
            right: sibling.right.clone(),
        };
        return (ReferenceCounter::new(root), false);
    }

    // Black sibling with a red far nephew: one rotation ends it
    if let Some(far_nephew) = sibling.right.clone() {
        if far_nephew.is_red() {
            let new_left = Node {
                key: node.key,
                value: node.value,
                color: Color::Black,
                left: node.left,
                right: sibling.left.clone(),
            };
            let root = Node {
                key: sibling.key.clone(),
                value: sibling.value.clone(),
                color,
                left: Some(ReferenceCounter::new(new_left)),
                right: Some(ReferenceCounter::new(far_nephew.with_color(Color::Black))),
            };
            return (ReferenceCounter::new(root), false);
        }
    }

    // Black sibling with a red near nephew: double rotation ends it
    if let Some(near_nephew) = sibling.left.clone() {
        if near_nephew.is_red() {
            let new_left = Node {
                key: node.key,
                value: node.value,
                color: Color::Black,
                left: node.left,
                right: near_nephew.left.clone(),
            };
            let new_right = Node {
                key: sibling.key.clone(),
                value: sibling.value.clone(),
                color: Color::Black,
                left: near_nephew.right.clone(),
                right: sibling.right.clone(),
            };
            let root = Node {
                key: near_nephew.key.clone(),
                value: near_nephew.value.clone(),
                color,
                left: Some(ReferenceCounter::new(new_left)),
                right: Some(ReferenceCounter::new(new_right)),
            };
            return (ReferenceCounter::new(root), false);
        }
    }

    // Black sibling, black nephews: recolor and push the deficit upward
    let still_short = color == Color::Black;
    let recolored = Node {
        key: node.key,
        value: node.value,
        color: Color::Black,
        left: node.left,
        right: Some(ReferenceCounter::new(sibling.with_color(Color::Red))),
    };
    (ReferenceCounter::new(recolored), still_short)
}

/// Mirror of [`fix_left_deficit`] for a right child one black node short.
pub(crate) fn fix_right_deficit<K: Clone, V: Clone>(
    node: Node<K, V>,
) -> (ReferenceCounter<Node<K, V>>, bool) {
    let color = node.color;
    let Some(sibling) = node.left.clone() else {
        return (ReferenceCounter::new(node), false);
    };

    if sibling.is_red() {
        let lowered = Node {
            key: node.key,
            value: node.value,
            color: Color::Red,
            left: sibling.right.clone(),
            right: node.right,
        };
        let (repaired, _) = fix_right_deficit(lowered);
        let root = Node {
            key: sibling.key.clone(),
            value: sibling.value.clone(),
            color: Color::Black,
            left: sibling.left.clone(),
            right: Some(repaired),
        };
        return (ReferenceCounter::new(root), false);
    }

    if let Some(far_nephew) = sibling.left.clone() {
        if far_nephew.is_red() {
            let new_right = Node {
                key: node.key,
                value: node.value,
                color: Color::Black,
                left: sibling.right.clone(),
                right: node.right,
            };
            let root = Node {
                key: sibling.key.clone(),
                value: sibling.value.clone(),
                color,
                left: Some(ReferenceCounter::new(far_nephew.with_color(Color::Black))),
                right: Some(ReferenceCounter::new(new_right)),
            };
            return (ReferenceCounter::new(root), false);
        }
    }

    if let Some(near_nephew) = sibling.right.clone() {
        if near_nephew.is_red() {
            let new_left = Node {
                key: sibling.key.clone(),
                value: sibling.value.clone(),
                color: Color::Black,
                left: sibling.left.clone(),
                right: near_nephew.left.clone(),
            };
            let new_right = Node {
                key: node.key,
                value: node.value,
                color: Color::Black,
                left: near_nephew.right.clone(),
                right: node.right,
            };
            let root = Node {
                key: near_nephew.key.clone(),
                value: near_nephew.value.clone(),
                color,
                left: Some(ReferenceCounter::new(new_left)),
                right: Some(ReferenceCounter::new(new_right)),
            };
            return (ReferenceCounter::new(root), false);
        }
    }

    let still_short = color == Color::Black;
    let recolored = Node {
        key: node.key,
        value: node.value,
        color: Color::Black,
        left: Some(ReferenceCounter::new(sibling.with_color(Color::Red))),
        right: node.right,
    };
    (ReferenceCounter::new(recolored), still_short)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn leaf(key: i32, color: Color) -> ReferenceCounter<Node<i32, ()>> {
        ReferenceCounter::new(Node {
            key,
            value: (),
            color,
            left: None,
            right: None,
        })
    }

    #[rstest]
    fn test_balance_resolves_left_left() {
        let violating = Node {
            key: 3,
            value: (),
            color: Color::Black,
            left: Some(ReferenceCounter::new(Node {
                key: 2,
                value: (),
                color: Color::Red,
                left: Some(leaf(1, Color::Red)),
                right: None,
            })),
            right: None,
        };
        let repaired = balance(violating);
        assert_eq!(repaired.key, 2);
        assert_eq!(repaired.color, Color::Red);
        assert!(!is_red(repaired.left.as_ref()));
        assert!(!is_red(repaired.right.as_ref()));
    }

    #[rstest]
    fn test_balance_resolves_right_left() {
        let violating = Node {
            key: 1,
            value: (),
            color: Color::Black,
            left: None,
            right: Some(ReferenceCounter::new(Node {
                key: 3,
                value: (),
                color: Color::Red,
                left: Some(leaf(2, Color::Red)),
                right: None,
            })),
        };
        let repaired = balance(violating);
        assert_eq!(repaired.key, 2);
        assert_eq!(repaired.color, Color::Red);
        assert!(!is_red(repaired.left.as_ref()));
        assert!(!is_red(repaired.right.as_ref()));
    }

    #[rstest]
    fn test_balance_leaves_valid_node_untouched() {
        let valid = Node {
            key: 2,
            value: (),
            color: Color::Black,
            left: Some(leaf(1, Color::Red)),
            right: Some(leaf(3, Color::Red)),
        };
        let unchanged = balance(valid);
        assert_eq!(unchanged.key, 2);
        assert_eq!(unchanged.color, Color::Black);
    }

    #[rstest]
    fn test_fix_left_deficit_recolors_black_sibling() {
        // The left side lost its only black node; the black sibling turns
        // red and the deficit propagates past the black parent.
        let short = Node {
            key: 10,
            value: (),
            color: Color::Black,
            left: None,
            right: Some(leaf(15, Color::Black)),
        };
        let (repaired, still_short) = fix_left_deficit(short);
        assert!(still_short);
        assert!(is_red(repaired.right.as_ref()));
    }

    #[rstest]
    fn test_fix_left_deficit_absorbs_at_red_parent() {
        let short = Node {
            key: 10,
            value: (),
            color: Color::Red,
            left: None,
            right: Some(leaf(15, Color::Black)),
        };
        let (repaired, still_short) = fix_left_deficit(short);
        assert!(!still_short);
        assert_eq!(repaired.color, Color::Black);
    }

    #[rstest]
    fn test_fix_left_deficit_borrows_from_red_far_nephew() {
        let sibling = Node {
            key: 20,
            value: (),
            color: Color::Black,
            left: None,
            right: Some(leaf(25, Color::Red)),
        };
        let short = Node {
            key: 10,
            value: (),
            color: Color::Black,
            left: None,
            right: Some(ReferenceCounter::new(sibling)),
        };
        let (repaired, still_short) = fix_left_deficit(short);
        assert!(!still_short);
        assert_eq!(repaired.key, 20);
        assert!(!is_red(repaired.left.as_ref()));
        assert!(!is_red(repaired.right.as_ref()));
    }
}
