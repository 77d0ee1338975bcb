//! AvlTree: height-balanced ordered container stored in a slot arena.
//!
//! Nodes live in a `SlotMap` owned by the tree. Child links are the owning
//! structure; the parent link and the cached minimum are plain arena keys
//! used only for navigation, and every structural change goes through
//! `attach`, which rewrites the forward link, the back-reference and the
//! parent's cached height together.

use crate::cursor::{Cursor, InOrder, Iter, Keys, Values};
use crate::error::{Error, Result};
use core::borrow::Borrow;
use core::cmp::Ordering;
use core::fmt;
use core::mem;
use slotmap::{new_key_type, SlotMap};
use tracing::trace;

new_key_type! {
    /// Arena key of a tree node.
    pub(crate) struct NodeId;
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Side {
    Left,
    Right,
}

impl Side {
    fn toward(ord: Ordering) -> Side {
        match ord {
            Ordering::Less => Side::Left,
            _ => Side::Right,
        }
    }

    fn opposite(self) -> Side {
        match self {
            Side::Left => Side::Right,
            Side::Right => Side::Left,
        }
    }
}

#[derive(Clone, Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) key: K,
    pub(crate) value: V,
    pub(crate) left: Option<NodeId>,
    pub(crate) right: Option<NodeId>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) left_height: u32,
    pub(crate) right_height: u32,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(key: K, value: V) -> Self {
        Self {
            key,
            value,
            left: None,
            right: None,
            parent: None,
            left_height: 0,
            right_height: 0,
        }
    }

    pub(crate) fn height(&self) -> u32 {
        self.left_height.max(self.right_height) + 1
    }

    /// Left height minus right height.
    pub(crate) fn balance(&self) -> i32 {
        self.left_height as i32 - self.right_height as i32
    }

    pub(crate) fn is_leaf(&self) -> bool {
        self.left.is_none() && self.right.is_none()
    }

    fn child(&self, side: Side) -> Option<NodeId> {
        match side {
            Side::Left => self.left,
            Side::Right => self.right,
        }
    }

    fn link_mut(&mut self, side: Side) -> (&mut Option<NodeId>, &mut u32) {
        match side {
            Side::Left => (&mut self.left, &mut self.left_height),
            Side::Right => (&mut self.right, &mut self.right_height),
        }
    }
}

/// An ordered map from `K` to `V` kept height-balanced after every mutation.
///
/// Duplicate keys are rejected. The minimum entry is cached and available
/// in O(1).
#[derive(Clone)]
pub struct AvlTree<K, V> {
    pub(crate) nodes: SlotMap<NodeId, Node<K, V>>,
    pub(crate) root: Option<NodeId>,
    pub(crate) minimal: Option<NodeId>,
}

impl<K, V> AvlTree<K, V> {
    pub fn new() -> Self {
        Self {
            nodes: SlotMap::with_key(),
            root: None,
            minimal: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.is_none()
    }

    /// Number of levels; 0 for an empty tree.
    pub fn height(&self) -> u32 {
        self.root.map_or(0, |id| self.nodes[id].height())
    }

    /// True when no node's balance factor reaches magnitude 2.
    pub fn is_balanced(&self) -> bool {
        self.nodes.values().all(|node| node.balance().abs() < 2)
    }

    /// Cursor at the root node, if any.
    pub fn root(&self) -> Option<Cursor<'_, K, V>> {
        self.root.map(|id| Cursor::new(self, id))
    }

    /// Cursor at the node holding the smallest key.
    pub fn minimum(&self) -> Result<Cursor<'_, K, V>> {
        self.minimal
            .map(|id| Cursor::new(self, id))
            .ok_or(Error::KeyNotFound)
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.root = None;
        self.minimal = None;
    }

    /// In-order iterator over `(key, value)` pairs.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter::new(self)
    }

    pub fn keys(&self) -> Keys<'_, K, V> {
        Keys::new(self)
    }

    pub fn values(&self) -> Values<'_, K, V> {
        Values::new(self)
    }

    /// Mutable access to every value, in arena order rather than key order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.nodes.values_mut().map(|node| &mut node.value)
    }

    /// All values in ascending key order.
    pub fn in_order_extract(&self) -> Vec<&V> {
        self.values().collect()
    }

    /// All keys in ascending order.
    pub fn in_order_keys(&self) -> Vec<&K> {
        self.keys().collect()
    }

    /// Moves every entry out in ascending key order, leaving the tree empty.
    pub fn drain_sorted(&mut self) -> Vec<(K, V)> {
        let order: Vec<NodeId> = InOrder::new(self).collect();
        self.root = None;
        self.minimal = None;
        let mut out = Vec::with_capacity(order.len());
        for id in order {
            if let Some(node) = self.nodes.remove(id) {
                out.push((node.key, node.value));
            }
        }
        out
    }

    fn leftmost(&self, mut id: NodeId) -> NodeId {
        while let Some(left) = self.nodes[id].left {
            id = left;
        }
        id
    }

    pub(crate) fn refresh_minimal(&mut self) {
        self.minimal = self.root.map(|root| self.leftmost(root));
    }

    /// The slot that currently holds `id`: its parent and the side it hangs
    /// from. The side is meaningless when the parent is `None`.
    fn slot_of(&self, id: NodeId) -> (Option<NodeId>, Side) {
        match self.nodes[id].parent {
            Some(parent) if self.nodes[parent].left == Some(id) => (Some(parent), Side::Left),
            Some(parent) => (Some(parent), Side::Right),
            None => (None, Side::Left),
        }
    }

    /// Hangs `child` under `parent` on `side` (or makes it the root when
    /// `parent` is `None`), updating the back-reference and the parent's
    /// cached height for that side.
    fn attach(&mut self, parent: Option<NodeId>, side: Side, child: Option<NodeId>) {
        match parent {
            Some(parent) => {
                let height = child.map_or(0, |c| self.nodes[c].height());
                let (link, cached) = self.nodes[parent].link_mut(side);
                *link = child;
                *cached = height;
            }
            None => self.root = child,
        }
        if let Some(child) = child {
            self.nodes[child].parent = parent;
        }
    }

    fn refresh_heights(&mut self, id: NodeId) {
        let (left, right) = {
            let node = &self.nodes[id];
            (node.left, node.right)
        };
        let left_height = left.map_or(0, |c| self.nodes[c].height());
        let right_height = right.map_or(0, |c| self.nodes[c].height());
        let node = &mut self.nodes[id];
        node.left_height = left_height;
        node.right_height = right_height;
    }

    /// Lifts the `heavy` child of `top` into its place and returns it.
    /// `Side::Left` is a right rotation, `Side::Right` a left rotation.
    fn rotate(&mut self, top: NodeId, heavy: Side) -> NodeId {
        let Some(pivot) = self.nodes[top].child(heavy) else {
            return top;
        };
        let (parent, side) = self.slot_of(top);
        let inner = self.nodes[pivot].child(heavy.opposite());
        self.attach(Some(top), heavy, inner);
        self.attach(Some(pivot), heavy.opposite(), Some(top));
        self.attach(parent, side, Some(pivot));
        pivot
    }

    /// Restores the balance of `id` if its factor reached magnitude 2 and
    /// returns the root of the (possibly rotated) subtree.
    fn rebalance(&mut self, id: NodeId) -> NodeId {
        let node = &self.nodes[id];
        let heavy = match node.balance() {
            b if b >= 2 => Side::Left,
            b if b <= -2 => Side::Right,
            _ => return id,
        };
        let Some(child) = node.child(heavy) else {
            return id;
        };
        let child_balance = self.nodes[child].balance();
        let zigzag = match heavy {
            Side::Left => child_balance < 0,
            Side::Right => child_balance > 0,
        };
        let kind = match (heavy, zigzag) {
            (Side::Left, false) => "LL",
            (Side::Left, true) => "LR",
            (Side::Right, false) => "RR",
            (Side::Right, true) => "RL",
        };
        trace!(kind, pivot = ?id, "avl rotation");
        if zigzag {
            self.rotate(child, heavy.opposite());
        }
        self.rotate(id, heavy)
    }

    /// Walks from `from` up to the root refreshing cached heights and
    /// rebalancing every ancestor on the way.
    fn retrace(&mut self, from: Option<NodeId>) {
        let mut current = from;
        while let Some(id) = current {
            self.refresh_heights(id);
            let top = self.rebalance(id);
            current = self.nodes[top].parent;
        }
    }

    fn swap_entries(&mut self, a: NodeId, b: NodeId) {
        if let Some([x, y]) = self.nodes.get_disjoint_mut([a, b]) {
            mem::swap(&mut x.key, &mut y.key);
            mem::swap(&mut x.value, &mut y.value);
        }
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    pub(crate) fn find_id<Q>(&self, key: &Q) -> Option<NodeId>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let mut current = self.root;
        while let Some(id) = current {
            let node = &self.nodes[id];
            match key.cmp(node.key.borrow()) {
                Ordering::Less => current = node.left,
                Ordering::Greater => current = node.right,
                Ordering::Equal => return Some(id),
            }
        }
        None
    }

    /// Cursor at the node holding `key`.
    pub fn find<Q>(&self, key: &Q) -> Result<Cursor<'_, K, V>>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.find_id(key)
            .map(|id| Cursor::new(self, id))
            .ok_or(Error::KeyNotFound)
    }

    pub fn get<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let id = self.find_id(key).ok_or(Error::KeyNotFound)?;
        Ok(&self.nodes[id].value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let id = self.find_id(key).ok_or(Error::KeyNotFound)?;
        Ok(&mut self.nodes[id].value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        self.find_id(key).is_some()
    }

    /// Inserts a new entry; an existing key is rejected with
    /// `KeyAlreadyExists` and leaves the tree untouched.
    pub fn insert(&mut self, key: K, value: V) -> Result<()> {
        self.insert_node(key, value).map(drop)
    }

    /// `insert`, handing back the arena key of the new node. Node keys are
    /// stable across the rebalancing the insert performs.
    pub(crate) fn insert_node(&mut self, key: K, value: V) -> Result<NodeId> {
        if self.find_id(&key).is_some() {
            return Err(Error::KeyAlreadyExists);
        }
        let Some(mut current) = self.root else {
            let id = self.nodes.insert(Node::new(key, value));
            self.root = Some(id);
            self.minimal = Some(id);
            return Ok(id);
        };

        // Descend until the side the key belongs on is empty.
        let (parent, side) = loop {
            let node = &self.nodes[current];
            let side = Side::toward(key.cmp(&node.key));
            match node.child(side) {
                Some(next) => current = next,
                None => break (current, side),
            }
        };

        let id = self.nodes.insert(Node::new(key, value));
        self.attach(Some(parent), side, Some(id));
        self.retrace(Some(parent));
        self.refresh_minimal();
        Ok(id)
    }

    /// Removes `key` and returns its entry.
    ///
    /// A node with two children trades its entry with its in-order
    /// successor, and the successor's old position is the one unlinked.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
    {
        let id = self.find_id(key).ok_or(Error::KeyNotFound)?;
        let target = match (self.nodes[id].left, self.nodes[id].right) {
            (Some(_), Some(right)) => {
                let successor = self.leftmost(right);
                self.swap_entries(id, successor);
                successor
            }
            _ => id,
        };

        let (parent, side) = self.slot_of(target);
        let node = self.nodes.remove(target).ok_or(Error::KeyNotFound)?;
        self.attach(parent, side, node.left.or(node.right));
        self.retrace(parent);
        self.refresh_minimal();
        Ok((node.key, node.value))
    }

    /// Asserts every structural invariant of the tree.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) {
        fn subtree<K: Ord, V>(
            tree: &AvlTree<K, V>,
            id: NodeId,
            parent: Option<NodeId>,
            seen: &mut usize,
        ) -> u32 {
            let node = &tree.nodes[id];
            assert_eq!(node.parent, parent, "parent back-reference is stale");
            *seen += 1;
            let left = node.left.map_or(0, |c| subtree(tree, c, Some(id), seen));
            let right = node.right.map_or(0, |c| subtree(tree, c, Some(id), seen));
            assert_eq!(node.left_height, left, "cached left height is stale");
            assert_eq!(node.right_height, right, "cached right height is stale");
            assert!(node.balance().abs() < 2, "balance factor out of range");
            left.max(right) + 1
        }

        let mut seen = 0;
        if let Some(root) = self.root {
            subtree(self, root, None, &mut seen);
        }
        assert_eq!(seen, self.len(), "unreachable nodes in the arena");

        let keys = self.in_order_keys();
        assert!(keys.windows(2).all(|w| w[0] < w[1]), "keys out of order");
        assert!(
            self.minimal.map(|id| &self.nodes[id].key) == keys.first().copied(),
            "cached minimum is stale"
        );
    }
}

impl<K, V> Default for AvlTree<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

/// In-order keys, each followed by a comma.
impl<K: fmt::Display, V> fmt::Display for AvlTree<K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for key in self.keys() {
            write!(f, "{},", key)?;
        }
        Ok(())
    }
}

impl<K, V> IntoIterator for AvlTree<K, V> {
    type Item = (K, V);
    type IntoIter = std::vec::IntoIter<(K, V)>;

    fn into_iter(mut self) -> Self::IntoIter {
        self.drain_sorted().into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a AvlTree<K, V> {
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
