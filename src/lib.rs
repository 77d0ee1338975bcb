//! avl-chained-map: an AVL tree and a chained hash map whose collision
//! buckets are AVL trees.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a height-balanced ordered container and a hash map built on it,
//!   with every structural invariant restored before a call returns.
//! - Layers:
//!   - AvlTree<K, V>: ordered map in a slot arena. Insert, remove, find,
//!     cached minimum, ordered extraction, linear-time bulk rebuild and a
//!     navigable `Cursor`.
//!   - ChainedMap<K, V, P>: bucket array of `AvlTree<K, Box<V>>` indexed by
//!     an integral projection of the key; grows and shrinks to keep the
//!     load factor inside (0.25, 0.75).
//!
//! Constraints
//! - Single-threaded: `ChainedMap` is `!Send`/`!Sync`; callers serialize.
//! - Unique keys; duplicate inserts fail with `KeyAlreadyExists`.
//! - Validation happens before any link is rewired, so a failed call leaves
//!   the structure as it was.
//! - No unsafe code.
//!
//! Node ownership
//! - The arena owns every node. Child links define the tree; the parent
//!   link and the cached minimum are arena keys used for navigation only
//!   and are rewritten together with the forward link on every relink.
//! - Cached subtree heights are refreshed on every structural change, and
//!   every ancestor of a change is rebalanced on the way back to the root.
//!
//! Payload ownership in the map
//! - Each value lives in its own `Box`. Resizing drains bucket trees in key
//!   order and moves the boxes into the new bucket array; payloads are never
//!   cloned, and deleting a key drops exactly one payload.
//!
//! Projection
//! - The bucket index is `project(key) mod capacity`, shifted by the
//!   capacity when negative. `Truncate` (default) uses the key's integer
//!   value; `Hashed` and `FnProject` cover other key types. One projection
//!   instance is used for every capacity, so rehashing stays consistent.
//!
//! Reentrancy
//! - Map entry points hold a debug-only guard; user `Ord` or projection
//!   code that calls back into the same map panics in debug builds.
//! - Removed keys and payloads are dropped after the guard is released, so
//!   their destructors may use the map.

mod avl_tree;
mod bulk_build;
pub mod chained_map;
pub mod cursor;
mod error;
pub mod projection;
mod reentrancy;

#[cfg(test)]
mod avl_tree_proptest;

// Public surface
pub use avl_tree::AvlTree;
pub use chained_map::ChainedMap;
pub use cursor::Cursor;
pub use error::{Error, Result};
pub use projection::{FnProject, Hashed, IntegralKey, Project, Truncate};
