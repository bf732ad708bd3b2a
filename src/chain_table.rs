//! ChainTable: fixed-bucket chained hash table over byte keys.

use crate::bucket_hash::{BucketHasher, LeadingWordHasher, BUCKET_COUNT};
use crate::element::{Element, ElementKey, Mode, StoredValue};
use crate::error::{InsertError, KeyNotFound};
use crate::reentrancy::DebugReentrancy;
use core::fmt;
use core::iter::FusedIterator;
use log::{debug, trace, warn};
use slotmap::SlotMap;

/// Construction-time settings. Immutable once the table exists.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TableConfig {
    pub mode: Mode,
    /// Cap on bytes held in table-owned buffers (keys, plus values in
    /// `Copy` mode). `None` means only the allocator limits growth.
    pub byte_limit: Option<usize>,
}

impl TableConfig {
    pub fn new(mode: Mode) -> Self {
        Self {
            mode,
            byte_limit: None,
        }
    }

    pub fn with_byte_limit(mut self, limit: usize) -> Self {
        self.byte_limit = Some(limit);
        self
    }
}

/// Bucket heads plus element storage. Every element in `slots` is reachable
/// from exactly one head, and `key_count == slots.len()`.
struct Chains<'v> {
    heads: [Option<ElementKey>; BUCKET_COUNT],
    slots: SlotMap<ElementKey, Element<'v>>,
    key_count: usize,
    owned_bytes: usize,
}

/// Walks one chain from head to tail.
struct ChainWalk<'a, 'v> {
    slots: &'a SlotMap<ElementKey, Element<'v>>,
    cursor: Option<ElementKey>,
}

impl<'a, 'v> Iterator for ChainWalk<'a, 'v> {
    type Item = (ElementKey, &'a Element<'v>);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        let k = self.cursor?;
        let e = self.slots.get(k)?;
        self.cursor = e.next;
        Some((k, e))
    }
}

impl<'v> Chains<'v> {
    fn new() -> Self {
        Self {
            heads: [None; BUCKET_COUNT],
            slots: SlotMap::with_key(),
            key_count: 0,
            owned_bytes: 0,
        }
    }

    #[inline]
    fn walk(&self, bucket: usize) -> ChainWalk<'_, 'v> {
        ChainWalk {
            slots: &self.slots,
            cursor: self.heads[bucket],
        }
    }

    fn find(&self, bucket: usize, key: &[u8]) -> Option<&Element<'v>> {
        self.walk(bucket)
            .map(|(_, e)| e)
            .find(|e| e.matches(key))
    }

    /// Makes room for one more element up front, so a later `link_tail`
    /// never has to grow the arena.
    fn reserve_slot(&mut self) -> Result<(), InsertError> {
        self.slots.try_reserve(1).map_err(|_| {
            warn!("cannot grow element arena past {} slots", self.slots.capacity());
            InsertError::OutOfMemory {
                requested: core::mem::size_of::<Element<'v>>(),
            }
        })
    }

    /// Appends at the tail so chain order is insertion order. Callers
    /// reserve a slot first.
    fn link_tail(&mut self, bucket: usize, element: Element<'v>) {
        let owned = element.owned_bytes();
        let k = self.slots.insert(element);
        match self.heads[bucket] {
            None => {
                trace!("bucket {} empty, element becomes head", bucket);
                self.heads[bucket] = Some(k);
            }
            Some(head) => {
                let mut tail = head;
                let mut depth = 1usize;
                while let Some(next) = self.slots.get(tail).and_then(|e| e.next) {
                    tail = next;
                    depth += 1;
                }
                trace!("bucket {} collision, appending after {} element(s)", bucket, depth);
                if let Some(t) = self.slots.get_mut(tail) {
                    t.next = Some(k);
                }
            }
        }
        self.key_count += 1;
        self.owned_bytes += owned;
    }

    /// Detaches the first element matching `key`; the chain is repaired
    /// before the element is handed back.
    fn unlink(&mut self, bucket: usize, key: &[u8]) -> Option<Element<'v>> {
        let mut prev = None;
        let mut found = None;
        for (k, e) in self.walk(bucket) {
            if e.matches(key) {
                found = Some((k, e.next));
                break;
            }
            prev = Some(k);
        }
        let (k, next) = found?;
        match prev {
            None => self.heads[bucket] = next,
            Some(p) => {
                if let Some(pe) = self.slots.get_mut(p) {
                    pe.next = next;
                }
            }
        }
        self.detach(k)
    }

    fn pop_head(&mut self, bucket: usize) -> Option<Element<'v>> {
        let head = self.heads[bucket]?;
        self.heads[bucket] = self.slots.get(head).and_then(|e| e.next);
        self.detach(head)
    }

    /// Unlinks and destroys every element, head first, bucket by bucket.
    fn destroy_all(&mut self) {
        for bucket in 0..BUCKET_COUNT {
            while let Some(element) = self.pop_head(bucket) {
                element.destroy();
            }
        }
        debug_assert_eq!(self.key_count, 0);
        debug_assert!(self.slots.is_empty());
    }

    fn detach(&mut self, k: ElementKey) -> Option<Element<'v>> {
        let mut e = self.slots.remove(k)?;
        e.next = None;
        self.key_count -= 1;
        self.owned_bytes -= e.owned_bytes();
        Some(e)
    }
}

/// A chained hash table with `BUCKET_COUNT` fixed buckets.
///
/// Keys are always duplicated into the table. Values are duplicated in
/// `Mode::Copy` and borrowed for `'v` in `Mode::ValueRef`. Duplicate keys
/// are allowed: each insert adds an independent element, and lookups and
/// removals reach the earliest one still present.
///
/// `Send` but never `Sync`, in debug and release builds alike. To share a
/// table between threads, wrap it in a lock that serializes every call,
/// reads included.
pub struct ChainTable<'v, H = LeadingWordHasher> {
    hasher: H,
    chains: Chains<'v>,
    config: TableConfig,
    reentrancy: DebugReentrancy,
}

impl<'v> ChainTable<'v> {
    pub fn new(mode: Mode) -> Self {
        Self::with_config(TableConfig::new(mode))
    }

    pub fn with_config(config: TableConfig) -> Self {
        Self::with_hasher(config, LeadingWordHasher)
    }
}

impl<'v> Default for ChainTable<'v> {
    fn default() -> Self {
        Self::with_config(TableConfig::default())
    }
}

/// Iterator over `(key, value)` pairs in bucket order, then chain order.
pub struct Iter<'a, 'v> {
    heads: core::slice::Iter<'a, Option<ElementKey>>,
    walk: ChainWalk<'a, 'v>,
    remaining: usize,
}

impl<'a, 'v> Iterator for Iter<'a, 'v> {
    type Item = (&'a [u8], &'a [u8]);

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((_, e)) = self.walk.next() {
                self.remaining -= 1;
                return Some((e.key(), e.value().as_bytes()));
            }
            self.walk.cursor = *self.heads.next()?;
        }
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl ExactSizeIterator for Iter<'_, '_> {}
impl FusedIterator for Iter<'_, '_> {}

impl<'v, H> ChainTable<'v, H>
where
    H: BucketHasher,
{
    pub fn with_hasher(config: TableConfig, hasher: H) -> Self {
        debug!(
            "creating chain table: mode={:?} byte_limit={:?}",
            config.mode, config.byte_limit
        );
        Self {
            hasher,
            chains: Chains::new(),
            config,
            reentrancy: DebugReentrancy::new(),
        }
    }

    #[inline]
    pub fn mode(&self) -> Mode {
        self.config.mode
    }

    #[inline]
    pub fn config(&self) -> &TableConfig {
        &self.config
    }

    /// Number of live elements across all buckets.
    #[inline]
    pub fn len(&self) -> usize {
        self.chains.key_count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.chains.key_count == 0
    }

    /// Bytes currently held in table-owned buffers.
    #[inline]
    pub fn owned_bytes(&self) -> usize {
        self.chains.owned_bytes
    }

    fn admit(&self, needed: usize) -> Result<(), InsertError> {
        if let Some(limit) = self.config.byte_limit {
            if self.chains.owned_bytes.saturating_add(needed) > limit {
                warn!(
                    "refusing insert: {} bytes needed, {} of {} in use",
                    needed, self.chains.owned_bytes, limit
                );
                return Err(InsertError::OutOfMemory { requested: needed });
            }
        }
        Ok(())
    }

    /// Inserts `key` with `value`, copying or borrowing the value per the
    /// table mode.
    ///
    /// On `OutOfMemory` nothing about the table changes.
    pub fn add(&mut self, key: &[u8], value: &'v [u8]) -> Result<(), InsertError> {
        let _g = self.reentrancy.enter();
        let bucket = self.hasher.bucket(key);
        let needed = match self.config.mode {
            Mode::Copy => key.len().saturating_add(value.len()),
            Mode::ValueRef => key.len(),
        };
        self.admit(needed)?;
        self.chains.reserve_slot()?;
        let element = Element::create(key, value, self.config.mode).map_err(|e| {
            warn!("cannot allocate element for bucket {}: {}", bucket, e);
            e
        })?;
        trace!("adding element at bucket {} in {:?} mode", bucket, self.config.mode);
        self.chains.link_tail(bucket, element);
        Ok(())
    }

    /// Like `add`, but `value` need only live for the call.
    ///
    /// # Panics
    ///
    /// If the table is in `Mode::ValueRef`; such a table must not own values.
    pub fn add_copy(&mut self, key: &[u8], value: &[u8]) -> Result<(), InsertError> {
        assert!(
            self.config.mode == Mode::Copy,
            "add_copy called on a ValueRef table"
        );
        let _g = self.reentrancy.enter();
        let bucket = self.hasher.bucket(key);
        self.admit(key.len().saturating_add(value.len()))?;
        self.chains.reserve_slot()?;
        let element = Element::create_copied(key, value).map_err(|e| {
            warn!("cannot allocate element for bucket {}: {}", bucket, e);
            e
        })?;
        trace!("adding copied element at bucket {}", bucket);
        self.chains.link_tail(bucket, element);
        Ok(())
    }

    /// Unlinks and destroys the first element matching `key`.
    pub fn remove(&mut self, key: &[u8]) -> Result<(), KeyNotFound> {
        let _g = self.reentrancy.enter();
        let bucket = self.hasher.bucket(key);
        match self.chains.unlink(bucket, key) {
            Some(element) => {
                element.destroy();
                trace!("removed element from bucket {}", bucket);
                Ok(())
            }
            None => {
                debug!("remove: key not found in bucket {}", bucket);
                Err(KeyNotFound)
            }
        }
    }

    /// Borrows the value of the first element matching `key`.
    ///
    /// In `ValueRef` mode this is the caller's original slice.
    pub fn lookup(&self, key: &[u8]) -> Option<&[u8]> {
        self.get(key).map(StoredValue::as_bytes)
    }

    /// Like `lookup`, but exposes the ownership tag, which lets a
    /// `ValueRef` caller recover the full `'v` borrow.
    pub fn get(&self, key: &[u8]) -> Option<&StoredValue<'v>> {
        let _g = self.reentrancy.enter();
        let bucket = self.hasher.bucket(key);
        let found = self.chains.find(bucket, key).map(Element::value);
        if found.is_none() {
            debug!("lookup: key not found in bucket {}", bucket);
        }
        found
    }

    pub fn has_key(&self, key: &[u8]) -> bool {
        let _g = self.reentrancy.enter();
        let bucket = self.hasher.bucket(key);
        self.chains.find(bucket, key).is_some()
    }

    /// Every live key, in bucket order and then chain order.
    ///
    /// The returned vector belongs to the caller; the keys stay owned by
    /// the table.
    pub fn keys(&self) -> Vec<&[u8]> {
        let _g = self.reentrancy.enter();
        let mut out = Vec::with_capacity(self.chains.key_count);
        for bucket in 0..BUCKET_COUNT {
            let before = out.len();
            out.extend(self.chains.walk(bucket).map(|(_, e)| e.key()));
            if out.len() > before {
                trace!("found {} key(s) at bucket {}", out.len() - before, bucket);
            }
        }
        debug_assert_eq!(out.len(), self.chains.key_count);
        out
    }

    pub fn iter(&self) -> Iter<'_, 'v> {
        Iter {
            heads: self.chains.heads.iter(),
            walk: ChainWalk {
                slots: &self.chains.slots,
                cursor: None,
            },
            remaining: self.chains.key_count,
        }
    }

    /// Destroys every element; the table stays usable.
    pub fn clear(&mut self) {
        let _g = self.reentrancy.enter();
        self.chains.destroy_all();
    }
}

impl<'a, 'v, H> IntoIterator for &'a ChainTable<'v, H>
where
    H: BucketHasher,
{
    type Item = (&'a [u8], &'a [u8]);
    type IntoIter = Iter<'a, 'v>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'v, H> fmt::Debug for ChainTable<'v, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainTable")
            .field("mode", &self.config.mode)
            .field("len", &self.chains.key_count)
            .field("owned_bytes", &self.chains.owned_bytes)
            .finish_non_exhaustive()
    }
}

impl<'v, H> Drop for ChainTable<'v, H> {
    fn drop(&mut self) {
        debug!(
            "destroying chain table with {} element(s)",
            self.chains.key_count
        );
        self.chains.destroy_all();
    }
}
