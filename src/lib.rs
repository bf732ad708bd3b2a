//! chain-table: a fixed-bucket chained hash table mapping byte keys to
//! byte values, with two value-ownership modes.
//!
//! Internal Design:
//!
//! Summary
//! - Goal: a small associative container whose ownership rules are
//!   checked by the type system instead of by convention.
//! - Layers:
//!   - `bucket_hash`: routes a key to one of 256 buckets. The default
//!     `LeadingWordHasher` reads the first four key bytes as an integer and
//!     adds the key length; any `BuildHasher` can be plugged in instead.
//!   - `element`: one key/value record with a forward link. The value
//!     carries its own ownership tag (`StoredValue::Owned` or
//!     `StoredValue::Borrowed`), so destroying an element can never free
//!     caller memory.
//!   - `ChainTable`: 256 chain heads over a slot arena, the table mode, and
//!     the live-element count.
//!
//! Constraints
//! - Fixed capacity of 256 buckets; no rehashing and no resizing.
//! - New elements are appended at the tail of their chain; chain order is
//!   insertion order.
//! - Duplicate keys are allowed. Lookup and removal reach the earliest
//!   live insertion of a key.
//! - `len()` always equals the number of elements reachable from the
//!   bucket heads.
//! - A failed insert leaves the table exactly as it was.
//!
//! Ownership modes
//! - `Mode::Copy`: keys and values are duplicated into table-owned buffers.
//! - `Mode::ValueRef`: keys are duplicated, values are borrowed for `'v`.
//!   `lookup` returns the caller's own slice.
//! - `add` takes `&'v [u8]` in both modes. `add_copy` accepts a value that
//!   only lives for the call, and is for `Copy` tables only: calling it on a
//!   `ValueRef` table panics, since such a table must never own a value.
//!   Check `mode()` first when the table's mode is not known statically.
//!
//! Allocation failure
//! - The arena slot, the key buffer and (in `Copy` mode) the value buffer
//!   are all obtained fallibly. Any failure returns
//!   `InsertError::OutOfMemory` with the table unchanged; buffers already
//!   built for that insert are released first.
//!
//! Threading
//! - Single-threaded and synchronous. `ChainTable` is `Send` but not
//!   `Sync` in any build profile; share it through a lock that serializes
//!   every call.
//! - A debug-only reentrancy guard catches a bucket hasher that calls back
//!   into the table it serves.
//!
//! Linking
//! - Elements live in a `slotmap::SlotMap`; bucket heads and `next` links
//!   are generational slot keys. An element is unlinked before it is
//!   removed from the arena, and removed exactly once.

pub mod bucket_hash;
mod chain_table;
#[cfg(test)]
mod chain_table_proptest;
mod element;
mod error;
mod reentrancy;

// Public surface
pub use bucket_hash::{
    BucketHasher, DefaultBuckets, HashedBuckets, LeadingWordHasher, BUCKET_COUNT,
};
pub use chain_table::{ChainTable, Iter, TableConfig};
pub use element::{Mode, StoredValue};
pub use error::{InsertError, KeyNotFound};
