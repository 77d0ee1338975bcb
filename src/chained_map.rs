//! ChainedMap: hash chaining with `AvlTree` buckets.
//!
//! Each bucket is a balanced tree keyed by `K` whose values are boxed
//! payloads owned by the map. The bucket array doubles when the load factor
//! reaches `GROW_THRESHOLD` and halves when it falls to `SHRINK_THRESHOLD`,
//! never going below the floor capacity. Rehashing moves the boxes into the
//! new array; payloads are never cloned.

use crate::avl_tree::AvlTree;
use crate::error::{Error, Result};
use crate::projection::{bucket_index, Project, Truncate};
use crate::reentrancy::ExclusiveAccess;
use core::borrow::Borrow;
use core::fmt;
use core::iter::Flatten;
use core::mem;
use core::slice;
use tracing::debug;

/// Bucket count of a map built with `new` or `with_projection`, and its
/// floor.
pub const INITIAL_CAPACITY: usize = 10;
/// Load factor at or above which the bucket array grows.
pub const GROW_THRESHOLD: f64 = 0.75;
/// Load factor at or below which the bucket array shrinks.
pub const SHRINK_THRESHOLD: f64 = 0.25;
const RESIZE_FACTOR: usize = 2;

type Bucket<K, V> = AvlTree<K, Box<V>>;

fn empty_buckets<K, V>(capacity: usize) -> Vec<Bucket<K, V>> {
    (0..capacity).map(|_| AvlTree::new()).collect()
}

/// Bucket array plus bookkeeping. Kept apart from the projection and the
/// access guard so entry points can borrow them disjointly.
struct Table<K, V> {
    buckets: Vec<Bucket<K, V>>,
    count: usize,
    floor: usize,
}

impl<K: Ord, V> Table<K, V> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buckets: empty_buckets(capacity),
            count: 0,
            floor: capacity,
        }
    }

    fn load_factor(&self) -> f64 {
        self.load_with(self.count)
    }

    fn load_with(&self, count: usize) -> f64 {
        count as f64 / self.buckets.len() as f64
    }

    fn index_of<Q, P>(&self, projection: &P, key: &Q) -> usize
    where
        Q: ?Sized,
        P: Project<Q>,
    {
        bucket_index(projection.project(key), self.buckets.len())
    }

    fn bucket<Q, P>(&self, projection: &P, key: &Q) -> &Bucket<K, V>
    where
        Q: ?Sized,
        P: Project<Q>,
    {
        &self.buckets[self.index_of(projection, key)]
    }

    fn bucket_mut<Q, P>(&mut self, projection: &P, key: &Q) -> &mut Bucket<K, V>
    where
        Q: ?Sized,
        P: Project<Q>,
    {
        let index = self.index_of(projection, key);
        &mut self.buckets[index]
    }

    /// Resizes if `count` entries would put the load factor on or past a
    /// threshold.
    fn fit_load<P: Project<K>>(&mut self, projection: &P, count: usize) -> Result<()> {
        let load = self.load_with(count);
        if load >= GROW_THRESHOLD {
            self.resize(true, projection, count)
        } else if load <= SHRINK_THRESHOLD {
            self.resize(false, projection, count)
        } else {
            Ok(())
        }
    }

    /// Rehashes every entry into a new bucket array. Shrinking at the floor
    /// is a no-op.
    fn resize<P: Project<K>>(&mut self, grow: bool, projection: &P, count: usize) -> Result<()> {
        let old_capacity = self.buckets.len();
        if !grow && old_capacity <= self.floor {
            return Ok(());
        }
        let new_capacity = if grow {
            old_capacity * RESIZE_FACTOR
        } else {
            (old_capacity / RESIZE_FACTOR).max(self.floor)
        };

        let old = mem::replace(&mut self.buckets, empty_buckets(new_capacity));
        for bucket in old {
            for (key, cell) in bucket {
                let index = bucket_index(projection.project(&key), new_capacity);
                self.buckets[index].insert(key, cell)?;
            }
        }
        debug!(
            old_capacity,
            new_capacity,
            count,
            "resized bucket array"
        );
        Ok(())
    }
}

/// A map whose collision chains are AVL trees.
///
/// Keys must be totally ordered and have an integral projection `P`
/// (the key's own integer value by default). Duplicate keys are rejected.
pub struct ChainedMap<K, V, P = Truncate> {
    table: Table<K, V>,
    projection: P,
    access: ExclusiveAccess,
}

impl<K, V> ChainedMap<K, V>
where
    K: Ord,
    Truncate: Project<K>,
{
    pub fn new() -> Self {
        Self::with_projection(Truncate)
    }
}

impl<K, V> Default for ChainedMap<K, V>
where
    K: Ord,
    Truncate: Project<K>,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, P> ChainedMap<K, V, P>
where
    K: Ord,
    P: Project<K>,
{
    pub fn with_projection(projection: P) -> Self {
        Self {
            table: Table::with_capacity(INITIAL_CAPACITY),
            projection,
            access: ExclusiveAccess::new(),
        }
    }

    /// Starts at `floor` buckets and never shrinks below it. A zero floor
    /// is rejected with `InvalidArgument`.
    pub fn with_floor(floor: usize, projection: P) -> Result<Self> {
        if floor == 0 {
            return Err(Error::InvalidArgument);
        }
        Ok(Self {
            table: Table::with_capacity(floor),
            projection,
            access: ExclusiveAccess::new(),
        })
    }

    pub fn len(&self) -> usize {
        self.table.count
    }

    pub fn is_empty(&self) -> bool {
        self.table.count == 0
    }

    /// Current number of buckets.
    pub fn capacity(&self) -> usize {
        self.table.buckets.len()
    }

    pub fn floor(&self) -> usize {
        self.table.floor
    }

    pub fn load_factor(&self) -> f64 {
        self.table.load_factor()
    }

    pub fn projection(&self) -> &P {
        &self.projection
    }

    /// Inserts `value` into its own heap cell under `key` and returns a
    /// reference to the stored payload.
    ///
    /// The bucket array is resized for the new count before the entry is
    /// linked, so the returned cell is already in its final bucket.
    pub fn insert(&mut self, key: K, value: V) -> Result<&mut V> {
        let _g = self.access.enter();
        if self.table.bucket(&self.projection, &key).contains(&key) {
            return Err(Error::KeyAlreadyExists);
        }
        self.table.fit_load(&self.projection, self.table.count + 1)?;
        let index = self.table.index_of(&self.projection, &key);
        let bucket = &mut self.table.buckets[index];
        let id = bucket.insert_node(key, Box::new(value))?;
        self.table.count += 1;
        Ok(&mut *self.table.buckets[index].nodes[id].value)
    }

    /// Removes `key` and hands back its payload.
    pub fn remove<Q>(&mut self, key: &Q) -> Result<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
        P: Project<Q>,
    {
        let (removed, cell) = {
            let _g = self.access.enter();
            let entry = self.table.bucket_mut(&self.projection, key).remove(key)?;
            self.table.count -= 1;
            self.table.fit_load(&self.projection, self.table.count)?;
            entry
        };
        // The key's destructor may call back into the map.
        drop(removed);
        Ok(*cell)
    }

    /// Removes `key` and drops its payload.
    pub fn delete<Q>(&mut self, key: &Q) -> Result<()>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
        P: Project<Q>,
    {
        self.remove(key).map(drop)
    }

    pub fn find<Q>(&self, key: &Q) -> Result<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
        P: Project<Q>,
    {
        let _g = self.access.enter();
        self.table
            .bucket(&self.projection, key)
            .get(key)
            .map(|cell| &**cell)
    }

    pub fn find_mut<Q>(&mut self, key: &Q) -> Result<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
        P: Project<Q>,
    {
        let _g = self.access.enter();
        self.table
            .bucket_mut(&self.projection, key)
            .get_mut(key)
            .map(|cell| &mut **cell)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Ord,
        P: Project<Q>,
    {
        let _g = self.access.enter();
        self.table.bucket(&self.projection, key).contains(key)
    }

    /// Entries bucket by bucket; ascending key order within a bucket.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            inner: self.table.buckets.iter().flatten(),
            remaining: self.table.count,
        }
    }

    /// Mutable access to every payload, in no particular order.
    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut V> + '_ {
        self.table
            .buckets
            .iter_mut()
            .flat_map(|bucket| bucket.values_mut())
            .map(|cell| &mut **cell)
    }

    /// Number of entries per bucket, in bucket order.
    pub fn bucket_lens(&self) -> Vec<usize> {
        self.table.buckets.iter().map(AvlTree::len).collect()
    }
}

/// Iterator over `(key, value)` pairs of a `ChainedMap`.
pub struct Iter<'a, K, V> {
    inner: Flatten<slice::Iter<'a, Bucket<K, V>>>,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let (key, cell) = self.inner.next()?;
        self.remaining -= 1;
        Some((key, &**cell))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<K, V> ExactSizeIterator for Iter<'_, K, V> {}

impl<K: fmt::Debug, V: fmt::Debug, P> fmt::Debug for ChainedMap<K, V, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let entries = self
            .table
            .buckets
            .iter()
            .flatten()
            .map(|(key, cell)| (key, &**cell));
        f.debug_map().entries(entries).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projection::FnProject;
    use std::cell::Cell;
    use std::rc::Rc;

    fn filled(n: i32) -> ChainedMap<i32, String> {
        let mut m = ChainedMap::new();
        for k in 0..n {
            m.insert(k, format!("v{k}")).unwrap();
        }
        m
    }

    /// Invariant: crossing 0.75 doubles the bucket array and every key
    /// stays reachable.
    #[test]
    fn eighth_insert_grows_to_twenty() {
        let mut m = filled(7);
        assert_eq!(m.capacity(), INITIAL_CAPACITY);
        m.insert(7, "v7".to_string()).unwrap();
        assert_eq!(m.capacity(), 20);
        assert_eq!(m.len(), 8);
        assert!(m.load_factor() > SHRINK_THRESHOLD && m.load_factor() < GROW_THRESHOLD);
        for k in 0..8 {
            assert_eq!(m.find(&k), Ok(&format!("v{k}")));
        }
    }

    /// Invariant: shrinking halves the array but stops at the floor.
    #[test]
    fn shrink_stops_at_floor() {
        let mut m = filled(8);
        assert_eq!(m.capacity(), 20);
        for k in 0..6 {
            m.delete(&k).unwrap();
        }
        assert_eq!(m.len(), 2);
        assert_eq!(m.capacity(), INITIAL_CAPACITY);
        m.delete(&6).unwrap();
        assert_eq!(m.capacity(), INITIAL_CAPACITY);
        assert!(m.contains(&7));
        assert!(!m.contains(&6));
    }

    #[test]
    fn duplicate_insert_rejected_and_map_unchanged() {
        let mut m = filled(3);
        assert_eq!(m.insert(1, "other".into()), Err(Error::KeyAlreadyExists));
        assert_eq!(m.len(), 3);
        assert_eq!(m.find(&1), Ok(&"v1".to_string()));
    }

    #[test]
    fn missing_keys_report_not_found() {
        let mut m = filled(3);
        assert_eq!(m.find(&42), Err(Error::KeyNotFound));
        assert_eq!(m.find_mut(&42), Err(Error::KeyNotFound));
        assert_eq!(m.remove(&42), Err(Error::KeyNotFound));
        assert_eq!(m.delete(&42), Err(Error::KeyNotFound));
        assert!(!m.contains(&42));
        assert_eq!(m.len(), 3);
    }

    /// Invariant: negative projections land in `[0, capacity)`, and keys
    /// congruent modulo the capacity share a bucket tree.
    #[test]
    fn negative_keys_share_buckets_with_congruent_keys() {
        let mut m = ChainedMap::new();
        for k in [-13, -3, 7, 17] {
            m.insert(k, k).unwrap();
        }
        let lens = m.bucket_lens();
        assert_eq!(lens[7], 4);
        assert_eq!(lens.iter().sum::<usize>(), 4);
        let keys: Vec<i32> = m.iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![-13, -3, 7, 17]);
    }

    /// Invariant: lookups stay correct when every key collides; the
    /// bucket tree resolves them by order.
    #[test]
    fn all_keys_in_one_bucket() {
        let mut m = ChainedMap::with_projection(FnProject(|_: &u32| 0i64));
        for k in 0..100u32 {
            m.insert(k, k * 3).unwrap();
        }
        assert_eq!(m.bucket_lens()[0], 100);
        for k in 0..100u32 {
            assert_eq!(m.find(&k), Ok(&(k * 3)));
        }
        for k in (0..100u32).step_by(3) {
            assert_eq!(m.remove(&k), Ok(k * 3));
        }
        assert_eq!(m.len(), 66);
    }

    /// Invariant: rehashing moves payload cells; no payload is cloned or
    /// dropped early, and each delete drops exactly one payload.
    #[test]
    fn resize_moves_payloads_without_dropping() {
        struct Tracked(Rc<Cell<usize>>);
        impl Drop for Tracked {
            fn drop(&mut self) {
                self.0.set(self.0.get() + 1);
            }
        }

        let drops = Rc::new(Cell::new(0));
        let mut m = ChainedMap::new();
        for k in 0..40i64 {
            m.insert(k, Tracked(drops.clone())).unwrap();
        }
        assert_eq!(drops.get(), 0);
        for k in 0..35i64 {
            m.delete(&k).unwrap();
        }
        assert_eq!(drops.get(), 35);
        drop(m);
        assert_eq!(drops.get(), 40);
    }

    #[test]
    fn with_floor_rejects_zero_and_honours_custom_floor() {
        assert!(matches!(
            ChainedMap::<i32, (), _>::with_floor(0, Truncate),
            Err(Error::InvalidArgument)
        ));
        let mut m = ChainedMap::with_floor(4, Truncate).unwrap();
        for k in 0..3 {
            m.insert(k, ()).unwrap();
        }
        assert_eq!(m.capacity(), 8);
        for k in 0..3 {
            m.delete(&k).unwrap();
        }
        assert_eq!(m.capacity(), 4);
        assert_eq!(m.floor(), 4);
    }

    /// Invariant: insert hands back the stored payload, also when the
    /// insert grows the bucket array and the cell changes bucket.
    #[test]
    fn insert_returns_payload_in_its_final_bucket() {
        let mut m = filled(7);
        let stored = m.insert(7, "v7".to_string()).unwrap();
        stored.push_str("-edited");
        assert_eq!(m.capacity(), 20);
        assert_eq!(m.find(&7), Ok(&"v7-edited".to_string()));

        *m.insert(-20, String::new()).unwrap() = "neg".into();
        assert_eq!(m.find(&-20), Ok(&"neg".to_string()));
        assert_eq!(m.len(), 9);
    }

    /// Invariant: a removed key is dropped once the map is consistent and
    /// released, so its destructor may read the map.
    #[test]
    fn removed_key_drop_can_read_the_map() {
        #[derive(PartialEq, Eq, PartialOrd, Ord)]
        struct Watcher(i32);

        thread_local! {
            static MAP: Cell<*const ChainedMap<Watcher, ()>> = const { Cell::new(std::ptr::null()) };
            static SAW_OTHER: Cell<Option<bool>> = const { Cell::new(None) };
        }

        impl Borrow<i32> for Watcher {
            fn borrow(&self) -> &i32 {
                &self.0
            }
        }

        impl crate::projection::IntegralKey for Watcher {
            fn to_integral(&self) -> i64 {
                i64::from(self.0)
            }
        }

        impl Drop for Watcher {
            fn drop(&mut self) {
                let map = MAP.with(Cell::get);
                if self.0 == 1 && !map.is_null() {
                    // The map outlives every key; only a shared read is made.
                    let found = unsafe { (*map).contains(&2i32) };
                    SAW_OTHER.with(|s| s.set(Some(found)));
                }
            }
        }

        let map: *mut ChainedMap<Watcher, ()> = Box::into_raw(Box::new(ChainedMap::new()));
        unsafe {
            (*map).insert(Watcher(1), ()).unwrap();
            (*map).insert(Watcher(2), ()).unwrap();
        }
        MAP.with(|m| m.set(map));
        let removed = unsafe { (*map).remove(&1i32) };
        MAP.with(|m| m.set(std::ptr::null()));

        assert_eq!(removed, Ok(()));
        assert_eq!(SAW_OTHER.with(Cell::get), Some(true));
        let map = unsafe { Box::from_raw(map) };
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn find_mut_and_values_mut_update_payloads() {
        let mut m = filled(5);
        m.find_mut(&2).unwrap().push('!');
        assert_eq!(m.find(&2), Ok(&"v2!".to_string()));
        for v in m.values_mut() {
            v.insert(0, '_');
        }
        assert_eq!(m.find(&0), Ok(&"_v0".to_string()));
        assert_eq!(m.iter().len(), 5);
    }
}
