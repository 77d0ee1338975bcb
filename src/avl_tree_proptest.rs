#![cfg(test)]

// Property tests for AvlTree kept inside the crate so they can assert the
// cached heights, parent links and minimum directly.

use crate::avl_tree::AvlTree;
use crate::bulk_build::height_for;
use crate::error::Error;
use proptest::prelude::*;
use std::collections::BTreeMap;

#[derive(Clone, Debug)]
enum Op {
    Insert(i16, u32),
    Remove(i16),
    RemoveNth(usize),
    Find(i16),
    Min,
}

fn arb_op() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => (-64i16..64, any::<u32>()).prop_map(|(k, v)| Op::Insert(k, v)),
        2 => (-64i16..64).prop_map(Op::Remove),
        2 => any::<usize>().prop_map(Op::RemoveNth),
        1 => (-64i16..64).prop_map(Op::Find),
        1 => Just(Op::Min),
    ]
}

// Property: state-machine equivalence against BTreeMap.
// Invariants checked after every operation:
// - in-order keys strictly ascending and as many as `len()`;
// - cached heights equal true heights and every balance factor is < 2;
// - parent back-references agree with child links;
// - the cached minimum is the first in-order key, absent iff empty;
// - duplicate inserts and missing removals fail without side effects.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_state_machine(ops in proptest::collection::vec(arb_op(), 1..200)) {
        let mut sut: AvlTree<i16, u32> = AvlTree::new();
        let mut model: BTreeMap<i16, u32> = BTreeMap::new();

        for op in ops {
            match op {
                Op::Insert(k, v) => {
                    let res = sut.insert(k, v);
                    if let std::collections::btree_map::Entry::Vacant(e) = model.entry(k) {
                        prop_assert_eq!(res, Ok(()));
                        e.insert(v);
                    } else {
                        prop_assert_eq!(res, Err(Error::KeyAlreadyExists));
                    }
                }
                Op::Remove(k) => {
                    let res = sut.remove(&k);
                    match model.remove(&k) {
                        Some(v) => prop_assert_eq!(res, Ok((k, v))),
                        None => prop_assert_eq!(res, Err(Error::KeyNotFound)),
                    }
                }
                Op::RemoveNth(n) => {
                    if !model.is_empty() {
                        let k = *model.keys().nth(n % model.len()).unwrap();
                        let v = model.remove(&k).unwrap();
                        prop_assert_eq!(sut.remove(&k), Ok((k, v)));
                    }
                }
                Op::Find(k) => {
                    match model.get(&k) {
                        Some(v) => {
                            let c = sut.find(&k).unwrap();
                            prop_assert_eq!(c.key(), &k);
                            prop_assert_eq!(c.value(), v);
                        }
                        None => prop_assert_eq!(sut.find(&k).err(), Some(Error::KeyNotFound)),
                    }
                }
                Op::Min => {
                    let expected = model.keys().next();
                    prop_assert_eq!(sut.minimum().ok().map(|c| c.key()), expected);
                }
            }

            sut.check_invariants();
            prop_assert_eq!(sut.len(), model.len());
            prop_assert!(sut.is_balanced());
            let pairs: Vec<(i16, u32)> = sut.iter().map(|(k, v)| (*k, *v)).collect();
            let expected: Vec<(i16, u32)> = model.iter().map(|(k, v)| (*k, *v)).collect();
            prop_assert_eq!(pairs, expected);
        }
    }
}

// Property: bulk rebuild reproduces the input pairs in order at minimal
// height, whatever the tree held before.
proptest! {
    #[test]
    fn prop_rebuild_from_sorted(
        before in proptest::collection::btree_map(any::<i32>(), any::<u8>(), 0..40),
        after in proptest::collection::btree_map(any::<i32>(), any::<u8>(), 0..300),
    ) {
        let mut t = AvlTree::new();
        for (k, v) in before {
            t.insert(k, v).unwrap();
        }
        let input: Vec<(i32, u8)> = after.into_iter().collect();
        t.rebuild_from_sorted(input.clone()).unwrap();

        t.check_invariants();
        prop_assert_eq!(t.len(), input.len());
        prop_assert_eq!(t.height(), height_for(input.len()));
        let pairs: Vec<(i32, u8)> = t.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(pairs, input);
    }
}

// Property: AVL height bound, h < 1.45 * log2(n + 2).
proptest! {
    #[test]
    fn prop_height_is_logarithmic(keys in proptest::collection::vec(any::<u16>(), 1..500)) {
        let mut t = AvlTree::new();
        for k in keys {
            let _ = t.insert(k, ());
        }
        let bound = 1.45 * ((t.len() + 2) as f64).log2();
        prop_assert!((t.height() as f64) < bound);
    }
}
