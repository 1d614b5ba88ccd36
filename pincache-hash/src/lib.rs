//  Copyright 2025 Pincache Authors
//
//  Licensed under the Apache License, Version 2.0 (the "License");
//  you may not use this file except in compliance with the License.
//  You may obtain a copy of the License at
//
//  http://www.apache.org/licenses/LICENSE-2.0
//
//  Unless required by applicable law or agreed to in writing, software
//  distributed under the License is distributed on an "AS IS" BASIS,
//  WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
//  See the License for the specific language governing permissions and
//  limitations under the License.

//! A chained hash index keyed by raw byte slices, using Fibonacci hashing
//! to spread a user-supplied (and possibly poorly distributed)
//! `key_to_integer` projection across a power-of-two bucket array.
//!
//! No rehashing: the bucket array is sized for the expected capacity at
//! construction time and never grows.

use std::cmp::Ordering;

use pincache_list::{List, NodeId, Signal};

/// Projects a key to the `u32` that gets Fibonacci-hashed into a bucket
/// index. Need not be a good hash by itself.
pub type KeyToInteger = dyn Fn(&[u8]) -> u32;

/// Total order on key bytes, used to disambiguate a bucket's chain.
pub type CompareKey = dyn Fn(&[u8], &[u8]) -> Ordering;

const GOLDEN_RATIO_PRIME_32: u32 = 0x9E37_0001;

/// Computes the smallest `b` such that `2^b - 1 >= capacity`, clamped to 32
/// once `capacity` reaches `2^31` (matching invariant I7). This is a clean
/// ceil-log2, unlike the source's `get_bits`, whose `val >>= 1 != 0` loop
/// condition parses (by C operator precedence) as `val >>= (1 != 0)` and so
/// always shifts by exactly one regardless of `val`.
pub fn bits_for_capacity(capacity: usize) -> u32 {
    const CLAMP_AT: u64 = 1 << 31;
    let capacity = capacity as u64;
    if capacity >= CLAMP_AT {
        return 32;
    }
    let mut bits = 1u32;
    while (1u64 << bits) - 1 < capacity {
        bits += 1;
    }
    bits
}

fn bucket_index(bits: u32, projected: u32) -> usize {
    let mixed = projected.wrapping_mul(GOLDEN_RATIO_PRIME_32);
    (mixed >> (32 - bits)) as usize
}

/// A handle to one resident entry, returned by [`HashIndex::add`] and
/// [`HashIndex::find`], and consumed by [`HashIndex::delete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef {
    bucket: u32,
    node: NodeId,
}

/// An open-addressed-by-chaining hash table from key bytes to an opaque
/// value `V`.
pub struct HashIndex<V> {
    buckets: Vec<List<(Box<[u8]>, V)>>,
    bits: u32,
    key_size: usize,
    count: usize,
    compare: Box<CompareKey>,
    to_integer: Box<KeyToInteger>,
}

impl<V> HashIndex<V> {
    /// Builds a table sized for `capacity` resident entries with `key_size`
    /// byte keys, using `compare`/`to_integer` as the embedder-supplied key
    /// operations.
    pub fn new(
        capacity: usize,
        key_size: usize,
        compare: Box<CompareKey>,
        to_integer: Box<KeyToInteger>,
    ) -> Self {
        let bits = bits_for_capacity(capacity);
        let bucket_count = 1usize << bits;
        Self {
            buckets: (0..bucket_count).map(|_| List::new()).collect(),
            bits,
            key_size,
            count: 0,
            compare,
            to_integer,
        }
    }

    /// The number of buckets allocated at construction time.
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// The byte length every key is expected to be.
    pub fn key_size(&self) -> usize {
        self.key_size
    }

    /// The number of entries currently indexed.
    pub fn count(&self) -> usize {
        self.count
    }

    fn bucket_for(&self, key: &[u8]) -> usize {
        bucket_index(self.bits, (self.to_integer)(key))
    }

    /// Finds the entry for `key`, walking its bucket's chain with `compare`.
    /// Does not deduplicate or mutate anything.
    pub fn find(&self, key: &[u8]) -> Option<EntryRef> {
        let bucket = self.bucket_for(key);
        let node = self.buckets[bucket].foreach(|_, (stored_key, _)| {
            if (self.compare)(key, stored_key) == Ordering::Equal {
                Signal::Stop
            } else {
                Signal::Continue
            }
        })?;
        Some(EntryRef {
            bucket: bucket as u32,
            node,
        })
    }

    /// Copies `key` into a fresh internal buffer and appends `(key, value)`
    /// to its bucket. Does not check for an existing entry with the same
    /// key first — callers must `find` before `add` if they want
    /// deduplication.
    pub fn add(&mut self, key: &[u8], value: V) -> EntryRef {
        let bucket = self.bucket_for(key);
        let node = self.buckets[bucket].push_back((Box::from(key), value));
        self.count += 1;
        EntryRef {
            bucket: bucket as u32,
            node,
        }
    }

    /// Removes the entry `entry` refers to, returning its value.
    ///
    /// Panics if `entry` was not produced by this table or has already been
    /// deleted.
    pub fn delete(&mut self, entry: EntryRef) -> V {
        let (_, value) = self.buckets[entry.bucket as usize].remove(entry.node);
        self.count -= 1;
        value
    }

    /// Borrows the value stored for `entry`.
    pub fn value(&self, entry: EntryRef) -> &V {
        &self.buckets[entry.bucket as usize].get(entry.node).1
    }

    /// Mutably borrows the value stored for `entry`, e.g. to repoint it at a
    /// new owning handle without a delete/re-add round trip.
    pub fn value_mut(&mut self, entry: EntryRef) -> &mut V {
        &mut self.buckets[entry.bucket as usize].get_mut(entry.node).1
    }

    /// Empties every bucket, dropping all entries. The bucket array itself
    /// is kept (no rehash/resize ever happens).
    pub fn clear(&mut self) {
        for bucket in &mut self.buckets {
            bucket.clear(|_, _| {});
        }
        self.count = 0;
    }
}
