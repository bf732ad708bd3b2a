#![cfg(test)]

// Property tests for ChainTable kept inside the crate so they can walk the
// chains directly.

use crate::bucket_hash::{BucketHasher, LeadingWordHasher};
use crate::chain_table::{ChainTable, TableConfig};
use crate::element::Mode;
use crate::error::{InsertError, KeyNotFound};
use proptest::prelude::*;

// Pool-indexed operations so shrinking moves toward earlier keys.
#[derive(Clone, Debug)]
enum OpI {
    Add(usize, Vec<u8>),
    Remove(usize),
    Lookup(usize),
    HasKey(usize),
    Keys,
}

// Keys share few leading bytes so collisions are frequent.
fn arb_scenario() -> impl Strategy<Value = (Vec<Vec<u8>>, Vec<OpI>)> {
    proptest::collection::vec(proptest::collection::vec(0u8..3, 0..7), 1..=10).prop_flat_map(
        |pool| {
            let idx = 0..pool.len();
            let op = prop_oneof![
                3 => (idx.clone(), proptest::collection::vec(any::<u8>(), 0..5))
                    .prop_map(|(i, v)| OpI::Add(i, v)),
                2 => idx.clone().prop_map(OpI::Remove),
                1 => idx.clone().prop_map(OpI::Lookup),
                1 => idx.clone().prop_map(OpI::HasKey),
                1 => Just(OpI::Keys),
            ];
            proptest::collection::vec(op, 1..80).prop_map(move |ops| (pool.clone(), ops))
        },
    )
}

/// Insertion-ordered multimap: the earliest live pair for a key wins.
#[derive(Default)]
struct Model {
    pairs: Vec<(Vec<u8>, Vec<u8>)>,
}

impl Model {
    fn lookup(&self, k: &[u8]) -> Option<&[u8]> {
        self.pairs
            .iter()
            .find(|(mk, _)| mk == k)
            .map(|(_, v)| v.as_slice())
    }

    fn remove(&mut self, k: &[u8]) -> bool {
        match self.pairs.iter().position(|(mk, _)| mk == k) {
            Some(pos) => {
                self.pairs.remove(pos);
                true
            }
            None => false,
        }
    }
}

fn walked_len(t: &ChainTable<'_>) -> usize {
    t.iter().count()
}

// Property: ChainTable behaves like an insertion-ordered multimap.
// - `len()` == successful adds - successful removes after every op.
// - lookup/has_key parity with the model, including duplicates.
// - Removing an absent key reports KeyNotFound and changes nothing.
// - keys() is a permutation of the model's keys, grouped in bucket order.
proptest! {
    #![proptest_config(ProptestConfig { cases: 128, .. ProptestConfig::default() })]
    #[test]
    fn prop_copy_mode_state_machine((pool, ops) in arb_scenario()) {
        let mut sut = ChainTable::new(Mode::Copy);
        let mut model = Model::default();
        let mut adds = 0usize;
        let mut removes = 0usize;

        for op in ops {
            match op {
                OpI::Add(i, v) => {
                    sut.add_copy(&pool[i], &v).expect("no byte limit configured");
                    model.pairs.push((pool[i].clone(), v));
                    adds += 1;
                }
                OpI::Remove(i) => {
                    let before = sut.keys().len();
                    match sut.remove(&pool[i]) {
                        Ok(()) => {
                            prop_assert!(model.remove(&pool[i]));
                            removes += 1;
                        }
                        Err(KeyNotFound) => {
                            prop_assert!(model.lookup(&pool[i]).is_none());
                            prop_assert_eq!(sut.keys().len(), before);
                        }
                    }
                }
                OpI::Lookup(i) => {
                    prop_assert_eq!(sut.lookup(&pool[i]), model.lookup(&pool[i]));
                }
                OpI::HasKey(i) => {
                    prop_assert_eq!(sut.has_key(&pool[i]), model.lookup(&pool[i]).is_some());
                }
                OpI::Keys => {
                    let keys = sut.keys();
                    let buckets: Vec<usize> =
                        keys.iter().map(|k| LeadingWordHasher.bucket(k)).collect();
                    prop_assert!(buckets.windows(2).all(|w| w[0] <= w[1]));
                    let mut got: Vec<Vec<u8>> = keys.into_iter().map(<[u8]>::to_vec).collect();
                    let mut want: Vec<Vec<u8>> =
                        model.pairs.iter().map(|(k, _)| k.clone()).collect();
                    got.sort();
                    want.sort();
                    prop_assert_eq!(got, want);
                }
            }
            prop_assert_eq!(sut.len(), adds - removes);
            prop_assert_eq!(sut.len(), model.pairs.len());
            prop_assert_eq!(walked_len(&sut), sut.len());
        }
    }
}

// Property: in ValueRef mode every lookup returns the caller's own buffer.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_value_ref_returns_caller_buffers(
        values in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 1..8), 1..40)
    ) {
        let mut sut = ChainTable::new(Mode::ValueRef);
        for (i, v) in values.iter().enumerate() {
            sut.add(&(i as u32).to_le_bytes(), v).expect("no byte limit configured");
        }
        prop_assert_eq!(sut.owned_bytes(), values.len() * 4);
        for (i, v) in values.iter().enumerate() {
            let got = sut.lookup(&(i as u32).to_le_bytes()).expect("present");
            prop_assert_eq!(got.as_ptr(), v.as_ptr());
            prop_assert_eq!(got.len(), v.len());
        }
        for i in (0..values.len()).step_by(2) {
            prop_assert!(sut.remove(&(i as u32).to_le_bytes()).is_ok());
        }
        drop(sut);
        // Caller buffers survive both removal and teardown.
        prop_assert!(values.iter().all(|v| !v.is_empty()));
    }
}

// Property: a byte limit is never exceeded and refusals leave no trace.
proptest! {
    #![proptest_config(ProptestConfig { cases: 64, .. ProptestConfig::default() })]
    #[test]
    fn prop_byte_limit_is_respected(
        limit in 0usize..64,
        inserts in proptest::collection::vec((proptest::collection::vec(any::<u8>(), 0..6), 0usize..6), 1..40)
    ) {
        let mut sut = ChainTable::with_config(TableConfig::new(Mode::Copy).with_byte_limit(limit));
        for (key, vlen) in inserts {
            let value = vec![0xAB; vlen];
            let before_len = sut.len();
            let before_bytes = sut.owned_bytes();
            match sut.add_copy(&key, &value) {
                Ok(()) => {
                    prop_assert_eq!(sut.len(), before_len + 1);
                    prop_assert_eq!(sut.owned_bytes(), before_bytes + key.len() + vlen);
                }
                Err(InsertError::OutOfMemory { requested }) => {
                    prop_assert_eq!(requested, key.len() + vlen);
                    prop_assert!(before_bytes + requested > limit);
                    prop_assert_eq!(sut.len(), before_len);
                    prop_assert_eq!(sut.owned_bytes(), before_bytes);
                }
            }
            prop_assert!(sut.owned_bytes() <= limit);
        }
    }
}
