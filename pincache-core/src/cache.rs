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

use std::cmp::Ordering;

use pincache_common::{Error, Result};
use pincache_hash::HashIndex;
use pincache_list::{List, NodeId, Signal};
use pincache_pool::{EntryRef, Pool};

/// Configuration consumed by [`Cache::new`].
///
/// `compare_key` and `key_to_integer` are the embedder-supplied key
/// operations the hash index needs (the Rust rendition of the source's
/// `cmp_key`/`key_to_number` callback pointers); `free_entry`, if set, is
/// invoked once per resident entry by [`Cache::destroy`].
pub struct CacheConfig {
    pub capacity: usize,
    pub entry_size: usize,
    pub key_size: usize,
    pub compare_key: Box<dyn Fn(&[u8], &[u8]) -> Ordering>,
    pub key_to_integer: Box<dyn Fn(&[u8]) -> u32>,
    pub free_entry: Option<Box<dyn FnMut(&[u8], &[u8])>>,
}

/// A stable handle to a pinned (or freshly inserted, write-through) entry's
/// payload bytes, returned by [`Cache::lookup`] and [`Cache::add`].
///
/// Valid until the entry is unlocked down to zero pins and then evicted or
/// deleted. Holding one past that point and dereferencing it is a logic
/// error, the same contract `pincache_pool::Pool::payload` documents.
#[derive(Debug, Clone, Copy)]
pub struct EntryHandle {
    entry: EntryRef,
    len: usize,
}

impl EntryHandle {
    /// Borrows the entry's payload bytes.
    ///
    /// # Safety
    ///
    /// The owning `Cache` must not have deleted or evicted this entry, and
    /// the caller must not hold a conflicting mutable borrow obtained from
    /// the same handle or the cache.
    pub unsafe fn as_slice(&self) -> &[u8] {
        std::slice::from_raw_parts(self.entry.as_ptr(), self.len)
    }

    /// Mutably borrows the entry's payload bytes.
    ///
    /// # Safety
    ///
    /// Same contract as [`EntryHandle::as_slice`].
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn as_mut_slice(&self) -> &mut [u8] {
        std::slice::from_raw_parts_mut(self.entry.as_ptr(), self.len)
    }
}

/// The outcome of [`Cache::lookup`].
pub enum LookupHit {
    /// No entry was found for the key.
    Miss,
    /// The entry was found and copied into the caller-supplied buffer. Not
    /// pinned.
    Copied,
    /// The entry was found, pinned once, and a handle to it returned.
    Pinned(EntryHandle),
}

/// The outcome of [`Cache::add`].
pub enum AddOutcome {
    /// An entry already exists for this key; nothing was changed.
    Duplicate,
    /// The entry was inserted (and populated from `src`, if given). If `src`
    /// was `None`, the new entry is pinned once.
    Inserted(EntryHandle),
}

struct CacheSlot {
    key: Vec<u8>,
    hash_entry: Option<pincache_hash::EntryRef>,
    payload: EntryRef,
    pins: u32,
}

/// A fixed-capacity, single-threaded, pinning associative cache.
///
/// Composes an LRU-ordered [`List`] of [`CacheSlot`]s, a [`HashIndex`]
/// mapping keys to the owning slot's [`NodeId`], and a [`Pool`] holding each
/// slot's payload bytes. Nothing here takes `&self` on a mutating path and
/// nothing is `Sync`; wrap a `Cache` in an external `Mutex` (or similar) to
/// share it across threads, the way `foyer-memory`'s `GenericCache` wraps
/// each `CacheShard` in a `parking_lot::Mutex`.
pub struct Cache {
    lru: List<CacheSlot>,
    hash: HashIndex<NodeId>,
    pool: Pool,
    capacity: usize,
    entry_size: usize,
    key_size: usize,
    free_entry: Option<Box<dyn FnMut(&[u8], &[u8])>>,
}

impl Cache {
    /// Builds a cache with the given configuration.
    ///
    /// Returns [`Error::InvalidArgument`] if `capacity`, `entry_size` or
    /// `key_size` is zero, and [`Error::OutOfMemory`] if the backing pool
    /// allocation fails.
    pub fn new(config: CacheConfig) -> Result<Self> {
        if config.capacity == 0 {
            return Err(Error::InvalidArgument("capacity must be non-zero"));
        }
        if config.entry_size == 0 {
            return Err(Error::InvalidArgument("entry_size must be non-zero"));
        }
        if config.key_size == 0 {
            return Err(Error::InvalidArgument("key_size must be non-zero"));
        }

        let pool = Pool::new(config.entry_size, config.capacity)?;
        let hash = HashIndex::new(
            config.capacity,
            config.key_size,
            config.compare_key,
            config.key_to_integer,
        );

        tracing::debug!(
            capacity = config.capacity,
            entry_size = config.entry_size,
            key_size = config.key_size,
            "cache created"
        );

        Ok(Self {
            lru: List::new(),
            hash,
            pool,
            capacity: config.capacity,
            entry_size: config.entry_size,
            key_size: config.key_size,
            free_entry: config.free_entry,
        })
    }

    /// The fixed maximum number of entries this cache can hold.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of entries currently resident.
    pub fn size(&self) -> usize {
        self.lru.len()
    }

    fn check_key(&self, key: &[u8]) -> Result<()> {
        if key.len() != self.key_size {
            return Err(Error::InvalidArgument("key length does not match key_size"));
        }
        Ok(())
    }

    fn check_entry(&self, entry: &[u8]) -> Result<()> {
        if entry.len() != self.entry_size {
            return Err(Error::InvalidArgument(
                "entry length does not match entry_size",
            ));
        }
        Ok(())
    }

    fn node_for_entry(&self, entry: &EntryHandle) -> Result<NodeId> {
        self.pool
            .get_owner(entry.entry)
            .map(NodeId::from_index)
            .ok_or(Error::NotFound)
    }

    /// Looks up `key`.
    ///
    /// If `dst` is `Some`, a hit is copied into it and the entry is left
    /// unpinned ([`LookupHit::Copied`]); if `dst` is `None`, a hit is pinned
    /// once and a handle returned ([`LookupHit::Pinned`]). Either way, a hit
    /// is promoted to the front of the LRU order; a miss leaves the cache
    /// unchanged.
    pub fn lookup(&mut self, key: &[u8], dst: Option<&mut [u8]>) -> Result<LookupHit> {
        self.check_key(key)?;
        if let Some(ref buf) = dst {
            self.check_entry(buf)?;
        }

        let Some(hentry) = self.hash.find(key) else {
            tracing::trace!("lookup: miss");
            return Ok(LookupHit::Miss);
        };

        let node = *self.hash.value(hentry);
        let mut slot = self.lru.remove(node);
        let payload = slot.payload;
        let new_node = self.lru.push_front({
            slot.hash_entry = Some(hentry);
            slot
        });
        // the node promoted to the front of the LRU arena may be a fresh
        // NodeId; repoint both back-references at it.
        *self.hash.value_mut(hentry) = new_node;
        self.pool.set_owner(payload, new_node.index());

        if let Some(buf) = dst {
            let bytes = unsafe { self.pool.payload(payload) };
            buf.copy_from_slice(bytes);
            tracing::trace!("lookup: hit, copied");
            return Ok(LookupHit::Copied);
        }

        self.lru.get_mut(new_node).pins += 1;
        tracing::trace!(pins = self.lru.get_mut(new_node).pins, "lookup: hit, pinned");
        Ok(LookupHit::Pinned(EntryHandle {
            entry: payload,
            len: self.entry_size,
        }))
    }

    /// Adds `key`, populating the new entry from `src` if given.
    ///
    /// If an entry for `key` already exists, nothing changes and
    /// [`AddOutcome::Duplicate`] is returned — a duplicate `add` does not
    /// refresh the existing entry's LRU position. If the cache is at
    /// capacity, the least-recently-used unpinned entry is evicted to make
    /// room; if every resident entry is pinned, [`Error::CacheFull`] is
    /// returned. If `src` is `None`, the new entry is left pinned once (the
    /// caller is expected to write into it and `unlock` when done).
    pub fn add(&mut self, key: &[u8], src: Option<&[u8]>) -> Result<AddOutcome> {
        self.check_key(key)?;
        if let Some(buf) = src {
            self.check_entry(buf)?;
        }

        if self.hash.find(key).is_some() {
            tracing::debug!("add: duplicate key, leaving existing entry untouched");
            return Ok(AddOutcome::Duplicate);
        }

        let mut slot = if self.lru.len() >= self.capacity {
            let victim = self
                .lru
                .foreach_reverse(|_, s| if s.pins == 0 { Signal::Stop } else { Signal::Continue })
                .ok_or_else(|| {
                    tracing::warn!("add: cache full and every entry is pinned");
                    Error::CacheFull
                })?;

            let mut slot = self.lru.remove(victim);
            // commit the eviction fully — the hash delete must land before
            // the new key is inserted, so there is never a window where the
            // victim's old key and the new key both resolve to this slot.
            if let Some(hentry) = slot.hash_entry.take() {
                self.hash.delete(hentry);
            }
            slot.key.iter_mut().for_each(|b| *b = 0);
            tracing::debug!("add: evicted an unpinned entry to make room");
            slot
        } else {
            let payload = self.pool.acquire()?;
            CacheSlot {
                key: vec![0u8; self.key_size],
                hash_entry: None,
                payload,
                pins: 0,
            }
        };

        if let Some(buf) = src {
            unsafe { self.pool.payload_mut(slot.payload).copy_from_slice(buf) };
        }
        slot.key.copy_from_slice(key);
        slot.pins = 0;
        let payload = slot.payload;

        let node = self.lru.push_front(slot);
        self.pool.set_owner(payload, node.index());

        let hentry = self.hash.add(key, node);
        self.lru.get_mut(node).hash_entry = Some(hentry);

        if src.is_none() {
            self.lru.get_mut(node).pins += 1;
            tracing::trace!("add: inserted, left pinned");
        } else {
            tracing::trace!("add: inserted");
        }

        Ok(AddOutcome::Inserted(EntryHandle {
            entry: payload,
            len: self.entry_size,
        }))
    }

    /// Deletes the entry for `key`.
    ///
    /// Returns [`Error::NotFound`] if no such entry exists, or
    /// [`Error::Locked`] if it is currently pinned.
    pub fn delete_by_key(&mut self, key: &[u8]) -> Result<()> {
        self.check_key(key)?;

        let hentry = self.hash.find(key).ok_or(Error::NotFound)?;
        let node = *self.hash.value(hentry);
        if self.lru.get(node).pins > 0 {
            tracing::warn!("delete_by_key: entry is locked");
            return Err(Error::Locked);
        }

        self.hash.delete(hentry);
        let slot = self.lru.remove(node);
        self.pool.release(slot.payload)?;
        tracing::debug!("delete_by_key: removed");
        Ok(())
    }

    /// Deletes the entry `entry` refers to.
    ///
    /// Resolves `entry` back to its key and delegates to
    /// [`Cache::delete_by_key`]. Returns [`Error::NotFound`] if `entry` does
    /// not resolve to a currently resident slot.
    pub fn delete_by_entry(&mut self, entry: &EntryHandle) -> Result<()> {
        let node = self.node_for_entry(entry)?;
        let key = self.lru.get(node).key.clone();
        self.delete_by_key(&key)
    }

    /// Releases one pin on the entry `entry` refers to.
    ///
    /// Returns [`Error::AlreadyUnlocked`] if the entry has no outstanding
    /// pins (an unpaired lock/unlock call), or [`Error::NotFound`] if `entry`
    /// does not resolve to a currently resident slot.
    pub fn unlock(&mut self, entry: &EntryHandle) -> Result<()> {
        let node = self.node_for_entry(entry)?;
        let slot = self.lru.get_mut(node);
        if slot.pins == 0 {
            tracing::warn!("unlock: already unlocked");
            return Err(Error::AlreadyUnlocked);
        }
        slot.pins -= 1;
        Ok(())
    }

    fn any_pinned(&self) -> bool {
        self.lru
            .foreach(|_, s| if s.pins > 0 { Signal::Stop } else { Signal::Continue })
            .is_some()
    }

    /// Deletes every entry, leaving the cache empty and as fresh as just
    /// created. Aborts with [`Error::Locked`] (leaving the cache unchanged)
    /// if any entry is currently pinned — unlike the source this is
    /// derived from, which declared this outcome but never implemented the
    /// check.
    pub fn clean(&mut self) -> Result<()> {
        if self.any_pinned() {
            tracing::warn!("clean: aborted, at least one entry is locked");
            return Err(Error::Locked);
        }

        while let Some((_, slot)) = self.lru.pop_front() {
            if let Some(hentry) = slot.hash_entry {
                self.hash.delete(hentry);
            }
            self.pool.release(slot.payload)?;
        }
        tracing::debug!("clean: cache emptied");
        Ok(())
    }

    /// Deletes every entry (invoking the configured `free_entry` finalizer
    /// on each, if any), leaving the cache empty and ready for reuse.
    /// Aborts with [`Error::Locked`] if any entry is currently pinned.
    ///
    /// Unlike the source, this does not consume the cache: a caller that
    /// gets `Locked` back can drop the offending pin and call `destroy`
    /// again. Actual backing-memory reclamation happens when the `Cache`
    /// itself is dropped.
    pub fn destroy(&mut self) -> Result<()> {
        if self.any_pinned() {
            tracing::warn!("destroy: aborted, at least one entry is locked");
            return Err(Error::Locked);
        }

        while let Some((_, slot)) = self.lru.pop_front() {
            if let Some(finalizer) = self.free_entry.as_mut() {
                let bytes = unsafe { self.pool.payload(slot.payload) };
                finalizer(&slot.key, bytes);
            }
        }
        self.hash.clear();
        self.pool.reset();
        tracing::debug!("destroy: cache emptied, finalizers invoked");
        Ok(())
    }
}

impl Drop for Cache {
    fn drop(&mut self) {
        // Unconditional, ignoring outstanding pins — the same way
        // `foyer-memory`'s `CacheShard::drop` unconditionally calls
        // `clear()` regardless of whether callers cleaned up their handles.
        while let Some((_, slot)) = self.lru.pop_front() {
            if let Some(finalizer) = self.free_entry.as_mut() {
                let bytes = unsafe { self.pool.payload(slot.payload) };
                finalizer(&slot.key, bytes);
            }
            if let Some(hentry) = slot.hash_entry {
                self.hash.delete(hentry);
            }
            let _ = self.pool.release(slot.payload);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u32_key_config(capacity: usize) -> CacheConfig {
        CacheConfig {
            capacity,
            entry_size: 8,
            key_size: 4,
            compare_key: Box::new(|a: &[u8], b: &[u8]| a.cmp(b)),
            key_to_integer: Box::new(|k: &[u8]| u32::from_le_bytes(k.try_into().unwrap())),
            free_entry: None,
        }
    }

    fn k(n: u32) -> [u8; 4] {
        n.to_le_bytes()
    }

    fn v(n: u64) -> [u8; 8] {
        n.to_le_bytes()
    }

    #[test]
    fn test_add_then_lookup_copies_value() {
        let mut cache = Cache::new(u32_key_config(4)).unwrap();
        cache.add(&k(1), Some(&v(100))).unwrap();

        let mut buf = [0u8; 8];
        match cache.lookup(&k(1), Some(&mut buf)).unwrap() {
            LookupHit::Copied => assert_eq!(buf, v(100)),
            _ => panic!("expected a copied hit"),
        }
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_lookup_miss() {
        let mut cache = Cache::new(u32_key_config(4)).unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            cache.lookup(&k(1), Some(&mut buf)).unwrap(),
            LookupHit::Miss
        ));
    }

    #[test]
    fn test_add_duplicate_is_noop() {
        let mut cache = Cache::new(u32_key_config(4)).unwrap();
        cache.add(&k(1), Some(&v(1))).unwrap();
        assert!(matches!(
            cache.add(&k(1), Some(&v(2))).unwrap(),
            AddOutcome::Duplicate
        ));
        let mut buf = [0u8; 8];
        cache.lookup(&k(1), Some(&mut buf)).unwrap();
        assert_eq!(buf, v(1));
    }

    #[test_log::test]
    fn test_eviction_at_capacity_picks_lru_victim() {
        let mut cache = Cache::new(u32_key_config(2)).unwrap();
        cache.add(&k(1), Some(&v(1))).unwrap();
        cache.add(&k(2), Some(&v(2))).unwrap();
        // key 1 is now least-recently-used.
        cache.add(&k(3), Some(&v(3))).unwrap();

        let mut buf = [0u8; 8];
        assert!(matches!(
            cache.lookup(&k(1), Some(&mut buf)).unwrap(),
            LookupHit::Miss
        ));
        assert!(matches!(
            cache.lookup(&k(2), Some(&mut buf)).unwrap(),
            LookupHit::Copied
        ));
        assert!(matches!(
            cache.lookup(&k(3), Some(&mut buf)).unwrap(),
            LookupHit::Copied
        ));
    }

    #[test_log::test]
    fn test_pin_prevents_eviction() {
        let mut cache = Cache::new(u32_key_config(2)).unwrap();
        cache.add(&k(1), Some(&v(1))).unwrap();
        // pin key 1 by looking it up with no destination buffer.
        let handle = match cache.lookup(&k(1), None).unwrap() {
            LookupHit::Pinned(h) => h,
            _ => panic!("expected a pinned hit"),
        };
        cache.add(&k(2), Some(&v(2))).unwrap();

        // key 1 is pinned but key 2 is not, so the reverse scan finds key 2
        // as the eviction victim and the insert succeeds.
        cache.add(&k(3), Some(&v(3))).unwrap();
        let mut buf = [0u8; 8];
        assert!(matches!(
            cache.lookup(&k(2), Some(&mut buf)).unwrap(),
            LookupHit::Miss
        ));

        // now only key 1 (pinned) and key 3 (unpinned) are resident; pin key
        // 3 too so every resident entry is pinned and CacheFull is genuine.
        let handle3 = match cache.lookup(&k(3), None).unwrap() {
            LookupHit::Pinned(h) => h,
            _ => panic!("expected a pinned hit"),
        };
        assert_eq!(cache.add(&k(4), Some(&v(4))).err(), Some(Error::CacheFull));

        cache.unlock(&handle).unwrap();
        cache.unlock(&handle3).unwrap();
        cache.add(&k(4), Some(&v(4))).unwrap();
    }

    #[test]
    fn test_lookup_promotes_to_front() {
        let mut cache = Cache::new(u32_key_config(2)).unwrap();
        cache.add(&k(1), Some(&v(1))).unwrap();
        cache.add(&k(2), Some(&v(2))).unwrap();

        let mut buf = [0u8; 8];
        // touch key 1, making key 2 the new LRU victim.
        cache.lookup(&k(1), Some(&mut buf)).unwrap();
        cache.add(&k(3), Some(&v(3))).unwrap();

        assert!(matches!(
            cache.lookup(&k(2), Some(&mut buf)).unwrap(),
            LookupHit::Miss
        ));
        assert!(matches!(
            cache.lookup(&k(1), Some(&mut buf)).unwrap(),
            LookupHit::Copied
        ));
    }

    #[test]
    fn test_delete_locked_then_unlock_then_delete() {
        let mut cache = Cache::new(u32_key_config(2)).unwrap();
        cache.add(&k(1), Some(&v(1))).unwrap();
        let handle = match cache.lookup(&k(1), None).unwrap() {
            LookupHit::Pinned(h) => h,
            _ => unreachable!(),
        };

        assert_eq!(cache.delete_by_key(&k(1)), Err(Error::Locked));
        cache.unlock(&handle).unwrap();
        cache.delete_by_key(&k(1)).unwrap();
        assert_eq!(cache.size(), 0);
    }

    #[test]
    fn test_delete_by_entry_round_trips_through_resolver() {
        let mut cache = Cache::new(u32_key_config(4)).unwrap();
        let handle = match cache.add(&k(7), Some(&v(77))).unwrap() {
            AddOutcome::Inserted(h) => h,
            _ => unreachable!(),
        };
        cache.delete_by_entry(&handle).unwrap();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.delete_by_entry(&handle), Err(Error::NotFound));
    }

    #[test]
    fn test_unlock_unpaired_call_fails() {
        let mut cache = Cache::new(u32_key_config(2)).unwrap();
        let handle = match cache.add(&k(1), Some(&v(1))).unwrap() {
            AddOutcome::Inserted(h) => h,
            _ => unreachable!(),
        };
        assert_eq!(cache.unlock(&handle), Err(Error::AlreadyUnlocked));
    }

    #[test]
    fn test_add_with_no_src_leaves_entry_pinned() {
        let mut cache = Cache::new(u32_key_config(2)).unwrap();
        let handle = match cache.add(&k(1), None).unwrap() {
            AddOutcome::Inserted(h) => h,
            _ => unreachable!(),
        };
        assert_eq!(cache.delete_by_key(&k(1)), Err(Error::Locked));
        cache.unlock(&handle).unwrap();
        cache.delete_by_key(&k(1)).unwrap();
    }

    #[test]
    fn test_clean_aborts_when_locked_then_succeeds_after_unlock() {
        let mut cache = Cache::new(u32_key_config(2)).unwrap();
        cache.add(&k(1), Some(&v(1))).unwrap();
        let handle = match cache.lookup(&k(1), None).unwrap() {
            LookupHit::Pinned(h) => h,
            _ => unreachable!(),
        };
        assert_eq!(cache.clean(), Err(Error::Locked));
        cache.unlock(&handle).unwrap();
        cache.clean().unwrap();
        assert_eq!(cache.size(), 0);
        assert_eq!(cache.capacity(), 2);

        // the cache is immediately reusable.
        cache.add(&k(9), Some(&v(9))).unwrap();
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_destroy_invokes_finalizer_then_resets() {
        let mut config = u32_key_config(2);
        let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        config.free_entry = Some(Box::new(move |key: &[u8], entry: &[u8]| {
            seen_clone.borrow_mut().push((key.to_vec(), entry.to_vec()));
        }));

        let mut cache = Cache::new(config).unwrap();
        cache.add(&k(1), Some(&v(1))).unwrap();
        cache.add(&k(2), Some(&v(2))).unwrap();
        cache.destroy().unwrap();

        assert_eq!(seen.borrow().len(), 2);
        assert_eq!(cache.size(), 0);
        cache.add(&k(3), Some(&v(3))).unwrap();
        assert_eq!(cache.size(), 1);
    }

    #[test]
    fn test_drop_without_destroy_does_not_panic_even_when_pinned() {
        let mut cache = Cache::new(u32_key_config(2)).unwrap();
        cache.add(&k(1), Some(&v(1))).unwrap();
        let _handle = match cache.lookup(&k(1), None).unwrap() {
            LookupHit::Pinned(h) => h,
            _ => unreachable!(),
        };
        drop(cache);
    }
}
