//! Generate-in-order: linear-time rebuild of an `AvlTree` from sorted data.
//!
//! The shape is decided before any entry is touched. A perfect tree of the
//! minimal sufficient height is laid out in heap order (children of slot
//! `i` at `2i + 1` and `2i + 2`), surplus leaves are cut in an in-order
//! walk, and the surviving slots receive the sorted entries in order.
//! The result is balanced without a single rotation.

use crate::avl_tree::{AvlTree, Node, NodeId};
use crate::error::{Error, Result};
use tracing::debug;

/// Smallest height whose perfect tree holds at least `count` nodes.
pub(crate) fn height_for(count: usize) -> u32 {
    let mut height = 0u32;
    while (1u128 << height) - 1 < count as u128 {
        height += 1;
    }
    height
}

/// Blank tree shape in heap layout; a slot is either live or cut.
struct Skeleton {
    live: Vec<bool>,
    remaining: usize,
}

impl Skeleton {
    fn perfect(height: u32) -> Self {
        let slots = (1usize << height) - 1;
        Self {
            live: vec![true; slots],
            remaining: slots,
        }
    }

    fn is_live(&self, slot: usize) -> bool {
        self.live.get(slot).copied().unwrap_or(false)
    }

    fn is_leaf(&self, slot: usize) -> bool {
        !self.is_live(2 * slot + 1) && !self.is_live(2 * slot + 2)
    }

    /// Cuts leaves in in-order position until `target` slots remain.
    /// Recursion depth is the skeleton height.
    fn trim(&mut self, slot: usize, target: usize) {
        if self.remaining == target || !self.is_live(slot) {
            return;
        }
        self.trim(2 * slot + 1, target);
        if self.remaining > target && self.is_leaf(slot) {
            self.live[slot] = false;
            self.remaining -= 1;
            return;
        }
        self.trim(2 * slot + 2, target);
    }

    fn in_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.remaining);
        let mut stack = Vec::new();
        let mut slot = 0;
        loop {
            while self.is_live(slot) {
                stack.push(slot);
                slot = 2 * slot + 1;
            }
            let Some(top) = stack.pop() else {
                break;
            };
            order.push(top);
            slot = 2 * top + 2;
        }
        order
    }
}

impl<K: Ord, V> AvlTree<K, V> {
    /// Discards the current contents and rebuilds from entries whose keys
    /// are strictly ascending. Out-of-order or repeated keys are rejected
    /// with `InvalidArgument` before the tree is modified.
    pub fn rebuild_from_sorted<I>(&mut self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (K, V)>,
    {
        let entries: Vec<(K, V)> = entries.into_iter().collect();
        if entries.windows(2).any(|w| w[0].0 >= w[1].0) {
            return Err(Error::InvalidArgument);
        }
        self.build(entries);
        Ok(())
    }

    /// Buffer-style bulk load of the first `count` keys and values.
    ///
    /// A negative `count`, a buffer shorter than `count` or unsorted keys
    /// give `InvalidArgument`; a missing buffer gives `NullArgument`. A
    /// `count` of zero empties the tree rather than leaving it untouched,
    /// so the tree always holds exactly the loaded pairs afterwards.
    pub fn generate_in_order(
        &mut self,
        keys: Option<&[K]>,
        values: Option<&[V]>,
        count: isize,
    ) -> Result<()>
    where
        K: Clone,
        V: Clone,
    {
        let count = usize::try_from(count).map_err(|_| Error::InvalidArgument)?;
        if count == 0 {
            self.clear();
            return Ok(());
        }
        let (Some(keys), Some(values)) = (keys, values) else {
            return Err(Error::NullArgument);
        };
        if keys.len() < count || values.len() < count {
            return Err(Error::InvalidArgument);
        }
        let entries = keys[..count].iter().cloned().zip(values[..count].iter().cloned());
        self.rebuild_from_sorted(entries)
    }

    fn build(&mut self, entries: Vec<(K, V)>) {
        self.clear();
        let count = entries.len();
        if count == 0 {
            return;
        }

        let height = height_for(count);
        let mut skeleton = Skeleton::perfect(height);
        skeleton.trim(0, count);

        let mut ids: Vec<Option<NodeId>> = vec![None; skeleton.live.len()];
        for (slot, (key, value)) in skeleton.in_order().into_iter().zip(entries) {
            ids[slot] = Some(self.nodes.insert(Node::new(key, value)));
        }

        // Children sit at higher slots, so a reverse sweep sees them first.
        for slot in (0..ids.len()).rev() {
            let Some(id) = ids[slot] else {
                continue;
            };
            let left = ids.get(2 * slot + 1).copied().flatten();
            let right = ids.get(2 * slot + 2).copied().flatten();
            let left_height = left.map_or(0, |c| self.nodes[c].height());
            let right_height = right.map_or(0, |c| self.nodes[c].height());
            for child in [left, right].into_iter().flatten() {
                self.nodes[child].parent = Some(id);
            }
            let node = &mut self.nodes[id];
            node.left = left;
            node.right = right;
            node.left_height = left_height;
            node.right_height = right_height;
        }

        self.root = ids[0];
        self.refresh_minimal();
        debug!(count, height, "rebuilt tree from sorted entries");
    }
}
