//! Ordered Map Engine: a Randomized Treap
//!
//! This module implements the ordered container behind the store. A treap is
//! a binary search tree on keys that is also a max-heap on randomly drawn
//! priorities. Random priorities keep the expected depth logarithmic without
//! any explicit rebalancing.
//!
//! ## Split / Merge
//!
//! Every structural change goes through two primitives:
//!
//! ```text
//!   split_before(t, k)  ->  ( keys <  k , keys >= k )
//!   split_after(t, k)   ->  ( keys <= k , keys >  k )
//!   merge(a, b)         ->  a ++ b      (all keys of a < all keys of b)
//! ```
//!
//! Splitting at `k` and then splitting the right part after `k` isolates the
//! node holding `k` (if any) in one pass. `set` reuses that node in place, so a
//! key keeps its node (and priority) for as long as it lives.
//!
//! ## Arena Layout
//!
//! Nodes live in a `Vec` and link to each other by index. Parent links make
//! the in-order successor reachable without a stack, which is what the range
//! iterator walks. Removing a node moves the last node of the arena into its
//! slot, so the arena stays dense and `len()` is just the arena length.

use crate::config::StoreConfig;
use crate::storage::entry::{Entry, Expiration};
use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cmp::Ordering;

/// Index of a node in the arena.
type NodeId = usize;

#[derive(Debug)]
struct Node {
    entry: Entry,
    /// Heap priority, only used for balancing
    priority: u32,
    /// Number of nodes in this subtree, including this one
    size: usize,
    left: Option<NodeId>,
    right: Option<NodeId>,
    parent: Option<NodeId>,
}

/// An ordered map from byte-string keys to entries.
///
/// # Example
///
/// ```
/// use treapkv::{Expiration, Treap};
/// use bytes::Bytes;
///
/// let mut treap = Treap::with_seed(7);
/// treap.set(Bytes::from("c"), Bytes::from("3"), Expiration::Never);
/// treap.set(Bytes::from("a"), Bytes::from("1"), Expiration::Never);
/// treap.set(Bytes::from("b"), Bytes::from("2"), Expiration::At(10));
///
/// assert_eq!(treap.find(b"b").map(|e| e.expires_at), Some(Expiration::At(10)));
/// assert_eq!(
///     treap.range(b"b", 5),
///     vec![
///         (Bytes::from("b"), Bytes::from("2")),
///         (Bytes::from("c"), Bytes::from("3")),
///     ]
/// );
/// ```
pub struct Treap {
    nodes: Vec<Node>,
    root: Option<NodeId>,
    /// Priority source owned by this treap alone
    rng: StdRng,
}

impl std::fmt::Debug for Treap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Treap")
            .field("len", &self.nodes.len())
            .field("root", &self.root)
            .finish()
    }
}

impl Default for Treap {
    fn default() -> Self {
        Self::new()
    }
}

impl Treap {
    /// Creates an empty treap with entropy-seeded priorities.
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy(), 0)
    }

    /// Creates an empty treap whose priorities come from a fixed seed.
    ///
    /// Two treaps built with the same seed and the same sequence of inserts
    /// have the same shape.
    pub fn with_seed(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed), 0)
    }

    /// Creates an empty treap from store configuration.
    pub fn with_config(config: &StoreConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self::from_rng(rng, config.initial_capacity)
    }

    fn from_rng(rng: StdRng, capacity: usize) -> Self {
        Self {
            nodes: Vec::with_capacity(capacity),
            root: None,
            rng,
        }
    }

    /// Returns the number of entries. O(1).
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the treap holds no entries.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
    }

    /// Inserts an entry, or overwrites the value and expiration of an
    /// existing one in place.
    ///
    /// # Returns
    ///
    /// Returns `true` if a new key was created, `false` if an existing key was updated.
    pub fn set(&mut self, key: Bytes, value: Bytes, expires_at: Expiration) -> bool {
        let root = self.root;
        let (less, rest) = self.split_before(root, &key);
        let (found, greater) = self.split_after(rest, &key);

        let (middle, created) = match found {
            Some(id) => {
                let entry = &mut self.nodes[id].entry;
                entry.value = value;
                entry.expires_at = expires_at;
                (id, false)
            }
            None => (self.alloc(key, value, expires_at), true),
        };

        let right = self.merge(Some(middle), greater);
        let root = self.merge(less, right);
        self.set_root(root);
        created
    }

    /// Looks up the entry for a key.
    pub fn find(&self, key: &[u8]) -> Option<&Entry> {
        let mut cur = self.root;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            match Ord::cmp(key, &node.entry.key[..]) {
                Ordering::Less => cur = node.left,
                Ordering::Greater => cur = node.right,
                Ordering::Equal => return Some(&node.entry),
            }
        }
        None
    }

    /// Deletes a key.
    ///
    /// # Returns
    ///
    /// Returns `true` if the key was deleted, `false` if it didn't exist.
    pub fn remove(&mut self, key: &[u8]) -> bool {
        self.take(key).is_some()
    }

    /// Deletes a key and hands back its entry.
    pub fn take(&mut self, key: &[u8]) -> Option<Entry> {
        let root = self.root;
        let (less, rest) = self.split_before(root, key);
        let (found, greater) = self.split_after(rest, key);
        let root = self.merge(less, greater);
        self.set_root(root);

        found.map(|id| self.release(id))
    }

    /// Returns up to `count` key-value pairs with keys `>= key`, in
    /// ascending key order.
    pub fn range(&self, key: &[u8], count: usize) -> Vec<(Bytes, Bytes)> {
        self.iter_from(key)
            .take(count)
            .map(|entry| (entry.key.clone(), entry.value.clone()))
            .collect()
    }

    /// Returns the entry with the smallest key.
    pub fn first(&self) -> Option<&Entry> {
        self.root
            .map(|root| self.leftmost(root))
            .map(|id| &self.nodes[id].entry)
    }

    /// Iterates over all entries in ascending key order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            treap: self,
            next: self.root.map(|root| self.leftmost(root)),
        }
    }

    /// Iterates over the entries with keys `>= key`, in ascending key order.
    pub fn iter_from(&self, key: &[u8]) -> Iter<'_> {
        Iter {
            treap: self,
            next: self.lower_bound(key),
        }
    }

    /// First node whose key is `>= key`.
    fn lower_bound(&self, key: &[u8]) -> Option<NodeId> {
        let mut cur = self.root;
        let mut best = None;
        while let Some(id) = cur {
            let node = &self.nodes[id];
            if &node.entry.key[..] >= key {
                best = Some(id);
                cur = node.left;
            } else {
                cur = node.right;
            }
        }
        best
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        id
    }

    /// In-order successor: down-left from the right child if there is one,
    /// otherwise up until we arrive from a left child.
    fn successor(&self, id: NodeId) -> Option<NodeId> {
        if let Some(right) = self.nodes[id].right {
            return Some(self.leftmost(right));
        }

        let mut child = id;
        let mut parent = self.nodes[id].parent;
        while let Some(p) = parent {
            if self.nodes[p].right != Some(child) {
                return Some(p);
            }
            child = p;
            parent = self.nodes[p].parent;
        }
        None
    }

    /// Partitions `node` into keys strictly less than `key` and keys
    /// greater than or equal to it.
    fn split_before(
        &mut self,
        node: Option<NodeId>,
        key: &[u8],
    ) -> (Option<NodeId>, Option<NodeId>) {
        let Some(id) = node else {
            return (None, None);
        };

        if &self.nodes[id].entry.key[..] >= key {
            let left = self.nodes[id].left;
            let (less, rest) = self.split_before(left, key);
            self.attach_left(id, rest);
            (less, Some(id))
        } else {
            let right = self.nodes[id].right;
            let (rest, greater) = self.split_before(right, key);
            self.attach_right(id, rest);
            (Some(id), greater)
        }
    }

    /// Partitions `node` into keys less than or equal to `key` and keys
    /// strictly greater than it.
    fn split_after(
        &mut self,
        node: Option<NodeId>,
        key: &[u8],
    ) -> (Option<NodeId>, Option<NodeId>) {
        let Some(id) = node else {
            return (None, None);
        };

        if &self.nodes[id].entry.key[..] > key {
            let left = self.nodes[id].left;
            let (less, rest) = self.split_after(left, key);
            self.attach_left(id, rest);
            (less, Some(id))
        } else {
            let right = self.nodes[id].right;
            let (rest, greater) = self.split_after(right, key);
            self.attach_right(id, rest);
            (Some(id), greater)
        }
    }

    /// Joins two treaps. Every key in `left` must be less than every key in `right`.
    fn merge(&mut self, left: Option<NodeId>, right: Option<NodeId>) -> Option<NodeId> {
        match (left, right) {
            (None, other) | (other, None) => other,
            (Some(l), Some(r)) => {
                if self.nodes[l].priority > self.nodes[r].priority {
                    let inner = self.nodes[l].right;
                    let merged = self.merge(inner, Some(r));
                    self.attach_right(l, merged);
                    Some(l)
                } else {
                    let inner = self.nodes[r].left;
                    let merged = self.merge(Some(l), inner);
                    self.attach_left(r, merged);
                    Some(r)
                }
            }
        }
    }

    fn attach_left(&mut self, id: NodeId, child: Option<NodeId>) {
        if let Some(child) = child {
            self.nodes[child].parent = Some(id);
        }
        self.nodes[id].left = child;
        self.update_size(id);
    }

    fn attach_right(&mut self, id: NodeId, child: Option<NodeId>) {
        if let Some(child) = child {
            self.nodes[child].parent = Some(id);
        }
        self.nodes[id].right = child;
        self.update_size(id);
    }

    #[inline]
    fn size_of(&self, node: Option<NodeId>) -> usize {
        node.map_or(0, |id| self.nodes[id].size)
    }

    fn update_size(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        let size = 1 + self.size_of(node.left) + self.size_of(node.right);
        self.nodes[id].size = size;
    }

    fn set_root(&mut self, root: Option<NodeId>) {
        if let Some(id) = root {
            self.nodes[id].parent = None;
        }
        self.root = root;
    }

    fn alloc(&mut self, key: Bytes, value: Bytes, expires_at: Expiration) -> NodeId {
        let id = self.nodes.len();
        self.nodes.push(Node {
            entry: Entry::new(key, value, expires_at),
            priority: self.rng.gen(),
            size: 1,
            left: None,
            right: None,
            parent: None,
        });
        id
    }

    /// Frees a node that is already detached from the tree.
    ///
    /// The last node of the arena moves into the freed slot, and every link
    /// that pointed at its old index is rewritten.
    fn release(&mut self, id: NodeId) -> Entry {
        let node = self.nodes.swap_remove(id);
        let moved_from = self.nodes.len();

        if id < moved_from {
            let (parent, left, right) = {
                let moved = &self.nodes[id];
                (moved.parent, moved.left, moved.right)
            };

            match parent {
                Some(p) if self.nodes[p].left == Some(moved_from) => {
                    self.nodes[p].left = Some(id);
                }
                Some(p) => self.nodes[p].right = Some(id),
                None => self.root = Some(id),
            }
            for child in [left, right].into_iter().flatten() {
                self.nodes[child].parent = Some(id);
            }
        }

        node.entry
    }
}

/// In-order iterator over a [`Treap`], driven by the successor function.
#[derive(Debug, Clone)]
pub struct Iter<'a> {
    treap: &'a Treap,
    next: Option<NodeId>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = &'a Entry;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        self.next = self.treap.successor(id);
        Some(&self.treap.nodes[id].entry)
    }
}

impl<'a> IntoIterator for &'a Treap {
    type Item = &'a Entry;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
