//! Busy flag that catches a bucket hasher calling back into its own table.
//!
//! The hasher is the only user code a table runs, and it runs while a chain
//! may be mid-relink. Debug builds mark the table busy for the length of
//! each public call and panic on a nested call. Release builds keep only
//! the thread-safety marker.

use core::cell::Cell;
use core::marker::PhantomData;

/// Embedded in each table; public entry points open a section with
/// `let _g = self.reentrancy.enter();`.
#[derive(Debug, Default)]
pub(crate) struct DebugReentrancy {
    #[cfg(debug_assertions)]
    busy: Cell<bool>,
    // `Send` but `!Sync` in every profile, not only when `busy` exists.
    _unsync: PhantomData<Cell<()>>,
}

impl DebugReentrancy {
    pub(crate) const fn new() -> Self {
        Self {
            #[cfg(debug_assertions)]
            busy: Cell::new(false),
            _unsync: PhantomData,
        }
    }

    #[inline]
    pub(crate) fn enter(&self) -> Section<'_> {
        #[cfg(debug_assertions)]
        {
            assert!(
                !self.busy.replace(true),
                "reentrancy detected: nested entry into chain table"
            );
        }
        Section { owner: self }
    }
}

/// Marks the owner idle again when dropped.
pub(crate) struct Section<'a> {
    #[cfg_attr(not(debug_assertions), allow(dead_code))]
    owner: &'a DebugReentrancy,
}

impl Drop for Section<'_> {
    fn drop(&mut self) {
        #[cfg(debug_assertions)]
        {
            debug_assert!(self.owner.busy.get());
            self.owner.busy.set(false);
        }
    }
}
