//! Position handles and in-order iterators over an `AvlTree`.

use crate::avl_tree::{AvlTree, Node, NodeId};
use crate::error::{Error, Result};
use core::fmt;
use core::iter::FusedIterator;

/// A position inside a particular tree.
///
/// A cursor always points at a live node: a move that would leave the
/// structure fails with `IteratorPastEnd` (missing child) or
/// `IteratorAtRoot` (no parent) and keeps the cursor where it was.
/// Two cursors are equal when they point at the same node of the same
/// tree instance.
pub struct Cursor<'a, K, V> {
    tree: &'a AvlTree<K, V>,
    node: NodeId,
}

impl<'a, K, V> Cursor<'a, K, V> {
    pub(crate) fn new(tree: &'a AvlTree<K, V>, node: NodeId) -> Self {
        Self { tree, node }
    }

    fn node(&self) -> &'a Node<K, V> {
        &self.tree.nodes[self.node]
    }

    fn step(&self, to: Option<NodeId>, err: Error) -> Result<Self> {
        to.map(|node| Self::new(self.tree, node)).ok_or(err)
    }

    pub fn key(&self) -> &'a K {
        &self.node().key
    }

    pub fn value(&self) -> &'a V {
        &self.node().value
    }

    /// Height of the subtree rooted here; a leaf has height 1.
    pub fn height(&self) -> u32 {
        self.node().height()
    }

    /// Left subtree height minus right subtree height.
    pub fn balance_factor(&self) -> i32 {
        self.node().balance()
    }

    pub fn is_leaf(&self) -> bool {
        self.node().is_leaf()
    }

    pub fn is_root(&self) -> bool {
        self.node().parent.is_none()
    }

    pub fn left(&self) -> Result<Self> {
        self.step(self.node().left, Error::IteratorPastEnd)
    }

    pub fn right(&self) -> Result<Self> {
        self.step(self.node().right, Error::IteratorPastEnd)
    }

    pub fn parent(&self) -> Result<Self> {
        self.step(self.node().parent, Error::IteratorAtRoot)
    }

    pub fn move_left(&mut self) -> Result<&mut Self> {
        *self = self.left()?;
        Ok(self)
    }

    pub fn move_right(&mut self) -> Result<&mut Self> {
        *self = self.right()?;
        Ok(self)
    }

    pub fn move_to_parent(&mut self) -> Result<&mut Self> {
        *self = self.parent()?;
        Ok(self)
    }
}

impl<K, V> Clone for Cursor<'_, K, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K, V> Copy for Cursor<'_, K, V> {}

impl<K, V> PartialEq for Cursor<'_, K, V> {
    fn eq(&self, other: &Self) -> bool {
        core::ptr::eq(self.tree, other.tree) && self.node == other.node
    }
}

impl<K, V> Eq for Cursor<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug> fmt::Debug for Cursor<'_, K, V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Cursor")
            .field("key", self.key())
            .field("value", self.value())
            .finish()
    }
}

/// In-order walk over node ids with an explicit stack.
pub(crate) struct InOrder<'a, K, V> {
    tree: &'a AvlTree<K, V>,
    stack: Vec<NodeId>,
    remaining: usize,
}

impl<'a, K, V> InOrder<'a, K, V> {
    pub(crate) fn new(tree: &'a AvlTree<K, V>) -> Self {
        let mut walk = Self {
            tree,
            stack: Vec::new(),
            remaining: tree.len(),
        };
        walk.descend(tree.root);
        walk
    }

    fn descend(&mut self, mut link: Option<NodeId>) {
        while let Some(id) = link {
            self.stack.push(id);
            link = self.tree.nodes[id].left;
        }
    }
}

impl<K, V> Iterator for InOrder<'_, K, V> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let id = self.stack.pop()?;
        self.descend(self.tree.nodes[id].right);
        self.remaining -= 1;
        Some(id)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

/// Iterator over `(key, value)` pairs in ascending key order.
pub struct Iter<'a, K, V> {
    walk: InOrder<'a, K, V>,
}

impl<'a, K, V> Iter<'a, K, V> {
    pub(crate) fn new(tree: &'a AvlTree<K, V>) -> Self {
        Self {
            walk: InOrder::new(tree),
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let tree = self.walk.tree;
        self.walk.next().map(|id| {
            let node = &tree.nodes[id];
            (&node.key, &node.value)
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.walk.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}
impl<K, V> FusedIterator for Iter<'_, K, V> {}

pub struct Keys<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Keys<'a, K, V> {
    pub(crate) fn new(tree: &'a AvlTree<K, V>) -> Self {
        Self {
            inner: Iter::new(tree),
        }
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;

    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.inner.next().map(|(k, _)| k)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Keys<'_, K, V> {}

pub struct Values<'a, K, V> {
    inner: Iter<'a, K, V>,
}

impl<'a, K, V> Values<'a, K, V> {
    pub(crate) fn new(tree: &'a AvlTree<K, V>) -> Self {
        Self {
            inner: Iter::new(tree),
        }
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;

    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.inner.next().map(|(_, v)| v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<K, V> ExactSizeIterator for Values<'_, K, V> {}
