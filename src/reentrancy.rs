//! Debug-only exclusive-access guard.
//!
//! `ChainedMap` calls into user code (`Ord` on keys and the key projection)
//! while its bucket array may be half rebuilt. Each public entry point
//! marks the map busy for its duration; in debug builds a nested entry from
//! such user code panics instead of observing a torn structure. Release
//! builds compile the guard away.

#[cfg(debug_assertions)]
use core::cell::Cell;
use core::marker::PhantomData;

/// Busy flag embedded in a container. Also makes the container
/// `!Send + !Sync`.
#[derive(Debug, Default)]
pub(crate) struct ExclusiveAccess {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    _single_threaded: PhantomData<*mut ()>,
}

impl ExclusiveAccess {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _single_threaded: PhantomData,
        }
    }

    /// Marks the container busy until the returned guard drops.
    #[inline]
    pub(crate) fn enter(&self) -> AccessGuard<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "reentrant call into a container that is mid-operation"
            );
        }
        AccessGuard { owner: self }
    }
}

pub(crate) struct AccessGuard<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    owner: &'a ExclusiveAccess,
}

impl Drop for AccessGuard<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        self.owner.busy.set(false);
    }
}
