//! Bucket routing: maps raw key bytes to one of `BUCKET_COUNT` chains.

use core::hash::BuildHasher;

/// Number of chain heads in every table. Fixed; the table never grows.
pub const BUCKET_COUNT: usize = 256;

/// Chooses the bucket a key lives in.
///
/// Implementations must be deterministic for the lifetime of a table: the
/// bucket of an element is computed once at insertion and never recomputed,
/// so lookups only find what the hasher routes to the same index again.
pub trait BucketHasher {
    /// Returns an index in `[0, BUCKET_COUNT)`.
    fn bucket(&self, key: &[u8]) -> usize;
}

/// The classic layout: the first four key bytes read as a little-endian
/// `i32`, plus the key length, reduced modulo `BUCKET_COUNT`.
///
/// Bytes past the fourth never participate, so keys sharing a four-byte
/// prefix and a length always collide. Shorter keys are zero-padded.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct LeadingWordHasher;

impl LeadingWordHasher {
    #[inline]
    fn leading_word(key: &[u8]) -> i32 {
        let mut word = [0u8; 4];
        let n = key.len().min(4);
        word[..n].copy_from_slice(&key[..n]);
        i32::from_le_bytes(word)
    }
}

impl BucketHasher for LeadingWordHasher {
    #[inline]
    fn bucket(&self, key: &[u8]) -> usize {
        // Lengths past i32::MAX wrap, matching the signed-int arithmetic.
        let sum = Self::leading_word(key).wrapping_add(key.len() as i32);
        sum.rem_euclid(BUCKET_COUNT as i32) as usize
    }
}

/// Adapts any `BuildHasher` into a bucket router by hashing the whole key
/// and reducing the 64-bit result.
#[derive(Clone, Debug, Default)]
pub struct HashedBuckets<S> {
    build: S,
}

/// `HashedBuckets` over hashbrown's default (ahash) builder.
pub type DefaultBuckets = HashedBuckets<hashbrown::hash_map::DefaultHashBuilder>;

impl<S: BuildHasher> HashedBuckets<S> {
    pub fn new(build: S) -> Self {
        Self { build }
    }
}

impl<S: BuildHasher> BucketHasher for HashedBuckets<S> {
    #[inline]
    fn bucket(&self, key: &[u8]) -> usize {
        (self.build.hash_one(key) % BUCKET_COUNT as u64) as usize
    }
}
