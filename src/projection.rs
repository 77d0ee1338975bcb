//! Integral key projection: how `ChainedMap` turns a key into a bucket.
//!
//! The map only needs an `i64` per key; the bucket is that value modulo
//! the current capacity, corrected into `[0, capacity)` when negative. The
//! same projection instance serves every capacity the map passes through,
//! so entries rehash consistently on resize.

use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// Maps a key to the integer domain used for bucket selection.
pub trait Project<K: ?Sized> {
    fn project(&self, key: &K) -> i64;
}

/// Keys that truncate to an integer with an `as` cast.
pub trait IntegralKey {
    fn to_integral(&self) -> i64;
}

macro_rules! integral_key {
    ($($t:ty),*) => {
        $(
            impl IntegralKey for $t {
                #[inline]
                fn to_integral(&self) -> i64 {
                    *self as i64
                }
            }
        )*
    };
}

integral_key!(i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);

impl IntegralKey for char {
    #[inline]
    fn to_integral(&self) -> i64 {
        i64::from(u32::from(*self))
    }
}

impl IntegralKey for bool {
    #[inline]
    fn to_integral(&self) -> i64 {
        i64::from(*self)
    }
}

impl<T: IntegralKey + ?Sized> IntegralKey for &T {
    #[inline]
    fn to_integral(&self) -> i64 {
        (**self).to_integral()
    }
}

/// Default projection: the key's own integer value.
#[derive(Copy, Clone, Debug, Default)]
pub struct Truncate;

impl<K: IntegralKey + ?Sized> Project<K> for Truncate {
    #[inline]
    fn project(&self, key: &K) -> i64 {
        key.to_integral()
    }
}

/// Projection through a `BuildHasher`, for keys without an integer value.
#[derive(Clone, Debug, Default)]
pub struct Hashed<S = DefaultHashBuilder>(pub S);

impl<K, S> Project<K> for Hashed<S>
where
    K: ?Sized + Hash,
    S: BuildHasher,
{
    #[inline]
    fn project(&self, key: &K) -> i64 {
        self.0.hash_one(key) as i64
    }
}

/// Projection through a caller-supplied function.
#[derive(Copy, Clone, Debug)]
pub struct FnProject<F>(pub F);

impl<K, F> Project<K> for FnProject<F>
where
    K: ?Sized,
    F: Fn(&K) -> i64,
{
    #[inline]
    fn project(&self, key: &K) -> i64 {
        (self.0)(key)
    }
}

/// `projected mod capacity`, shifted into `[0, capacity)` when the
/// remainder is negative. `capacity` must be non-zero.
pub(crate) fn bucket_index(projected: i64, capacity: usize) -> usize {
    let capacity = capacity as i64;
    let raw = projected % capacity;
    if raw < 0 {
        (raw + capacity) as usize
    } else {
        raw as usize
    }
}
