//! Element: one stored key/value record and its forward link.
//!
//! Each element carries its own ownership tag in `StoredValue`, so tearing
//! an element down never needs to be told the table mode: an `Owned` value
//! is released with the element, a `Borrowed` one is left to its caller.

use crate::error::InsertError;
use log::trace;

slotmap::new_key_type! {
    /// Generational link to an element slot. Used for bucket heads and
    /// `next` pointers.
    pub(crate) struct ElementKey;
}

/// Value ownership policy, fixed when a table is built.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
pub enum Mode {
    /// Keys and values are duplicated into table-owned buffers.
    #[default]
    Copy,
    /// Keys are duplicated; values are borrowed from the caller.
    ValueRef,
}

/// A stored value, tagged with who owns its bytes.
#[derive(Debug, Clone, Eq, PartialEq)]
pub enum StoredValue<'v> {
    Owned(Box<[u8]>),
    Borrowed(&'v [u8]),
}

impl<'v> StoredValue<'v> {
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            StoredValue::Owned(b) => b,
            StoredValue::Borrowed(b) => b,
        }
    }

    #[inline]
    pub fn is_owned(&self) -> bool {
        matches!(self, StoredValue::Owned(_))
    }

    /// Bytes this value holds on the table's behalf.
    #[inline]
    fn owned_len(&self) -> usize {
        match self {
            StoredValue::Owned(b) => b.len(),
            StoredValue::Borrowed(_) => 0,
        }
    }
}

/// Copies `bytes` into a fresh buffer, reporting allocation failure
/// instead of aborting.
pub(crate) fn duplicate(bytes: &[u8]) -> Result<Box<[u8]>, InsertError> {
    let mut buf = Vec::new();
    buf.try_reserve_exact(bytes.len())
        .map_err(|_| InsertError::OutOfMemory {
            requested: bytes.len(),
        })?;
    buf.extend_from_slice(bytes);
    Ok(buf.into_boxed_slice())
}

#[derive(Debug)]
pub(crate) struct Element<'v> {
    key: Box<[u8]>,
    value: StoredValue<'v>,
    pub(crate) next: Option<ElementKey>,
}

impl<'v> Element<'v> {
    /// Builds a fully populated, unlinked element under `mode`.
    ///
    /// On failure every buffer already allocated for this element is
    /// released before returning.
    pub(crate) fn create(key: &[u8], value: &'v [u8], mode: Mode) -> Result<Self, InsertError> {
        match mode {
            Mode::Copy => Self::create_copied(key, value),
            Mode::ValueRef => {
                let key = duplicate(key)?;
                trace!("created element: key_len={} borrowed value_len={}", key.len(), value.len());
                Ok(Self {
                    key,
                    value: StoredValue::Borrowed(value),
                    next: None,
                })
            }
        }
    }

    /// Builds an element owning duplicates of both `key` and `value`.
    pub(crate) fn create_copied(key: &[u8], value: &[u8]) -> Result<Self, InsertError> {
        let key = duplicate(key)?;
        // `key` drops here if the value buffer cannot be had.
        let value = duplicate(value)?;
        trace!("created element: key_len={} owned value_len={}", key.len(), value.len());
        Ok(Self {
            key,
            value: StoredValue::Owned(value),
            next: None,
        })
    }

    /// Releases the element. Must already be unlinked from its chain.
    pub(crate) fn destroy(self) {
        debug_assert!(self.next.is_none(), "element destroyed while still linked");
        trace!(
            "destroying element: key_len={} value_len={} owned_value={}",
            self.key.len(),
            self.value.as_bytes().len(),
            self.value.is_owned()
        );
        drop(self);
    }

    #[inline]
    pub(crate) fn key(&self) -> &[u8] {
        &self.key
    }

    #[inline]
    pub(crate) fn value(&self) -> &StoredValue<'v> {
        &self.value
    }

    #[inline]
    pub(crate) fn matches(&self, key: &[u8]) -> bool {
        // Length first; only equal-length keys are compared byte-wise.
        self.key.len() == key.len() && *self.key == *key
    }

    /// Bytes held in table-owned buffers.
    #[inline]
    pub(crate) fn owned_bytes(&self) -> usize {
        self.key.len() + self.value.owned_len()
    }
}
