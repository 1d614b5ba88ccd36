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

//! A fixed-count slab allocator carved out of one contiguous allocation.
//!
//! [`Pool`] hands out [`EntryRef`]s — stable pointers into its backing
//! storage — and can resolve one of those pointers back to an "owner" value
//! the caller attached with [`Pool::set_owner`]. This is the mechanism
//! `pincache-core` uses to go from a payload address handed back to an
//! external caller to the cache slot that owns it.

use std::ptr::NonNull;

use pincache_common::{Error, Result};

/// A stable pointer into a [`Pool`]'s backing storage.
///
/// Valid only for the lifetime of the `Pool` that produced it, and only
/// between the matching `acquire` and `release`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryRef(NonNull<u8>);

// `EntryRef` is a plain address; it carries no thread-affinity of its own,
// but the `Pool` it points into is not `Sync`, so sending one across threads
// without external synchronization is still the caller's responsibility.
unsafe impl Send for EntryRef {}

impl EntryRef {
    /// The raw address this handle points to.
    ///
    /// Exposed so a crate built on top of `Pool` (e.g. `pincache-core`'s
    /// `EntryHandle`) can hand callers a self-contained view of the payload
    /// without needing to keep the owning `Pool` borrowed alongside it. The
    /// same validity contract as [`Pool::payload`] applies to whatever the
    /// caller does with the pointer.
    pub fn as_ptr(&self) -> *mut u8 {
        self.0.as_ptr()
    }
}

/// A slab of `slot_count` fixed-size slots, carved out of one contiguous
/// allocation and rounded so each slot starts on a 4-byte boundary.
pub struct Pool {
    storage: Box<[u8]>,
    slot_size: usize,
    slot_count: usize,
    // LIFO stack of free slot indices.
    free: Vec<u32>,
    busy: Vec<bool>,
    owners: Vec<Option<u32>>,
}

fn round_up_to_four(size: usize) -> usize {
    (size + 3) & !3
}

impl Pool {
    /// Allocates a pool of `slot_count` slots, each at least `slot_size`
    /// bytes (rounded up to a multiple of four).
    ///
    /// Returns [`Error::OutOfMemory`] if `slot_count * slot_size` would
    /// overflow or if the backing allocation fails.
    pub fn new(slot_size: usize, slot_count: usize) -> Result<Self> {
        let slot_size = round_up_to_four(slot_size.max(1));
        let total = slot_size
            .checked_mul(slot_count)
            .ok_or(Error::OutOfMemory)?;

        let storage = vec![0u8; total].into_boxed_slice();

        Ok(Self {
            storage,
            slot_size,
            slot_count,
            free: (0..slot_count as u32).rev().collect(),
            busy: vec![false; slot_count],
            owners: vec![None; slot_count],
        })
    }

    /// The size in bytes of each slot (after rounding).
    pub fn slot_size(&self) -> usize {
        self.slot_size
    }

    /// The total number of slots this pool was constructed with.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// The number of slots currently handed out.
    pub fn busy_count(&self) -> usize {
        self.slot_count - self.free.len()
    }

    fn entry_ref_for(&self, index: u32) -> EntryRef {
        let offset = index as usize * self.slot_size;
        // SAFETY: `offset` is within `storage` by construction (index comes
        // from `free`, which only ever holds valid slot indices).
        let ptr = unsafe { self.storage.as_ptr().add(offset) as *mut u8 };
        EntryRef(NonNull::new(ptr).expect("pool storage pointer is never null"))
    }

    /// Resolves an `EntryRef` back to its slot index, or `None` if the
    /// address does not fall within this pool's backing storage or is not
    /// aligned to a slot boundary.
    fn index_of(&self, entry: EntryRef) -> Option<u32> {
        let base = self.storage.as_ptr() as usize;
        let addr = entry.0.as_ptr() as usize;
        let offset = addr.checked_sub(base)?;
        if offset >= self.storage.len() || offset % self.slot_size != 0 {
            return None;
        }
        Some((offset / self.slot_size) as u32)
    }

    /// Hands out a free slot. O(1).
    ///
    /// Returns [`Error::Exhausted`] if every slot is currently busy.
    pub fn acquire(&mut self) -> Result<EntryRef> {
        let index = self.free.pop().ok_or(Error::Exhausted)?;
        self.busy[index as usize] = true;
        Ok(self.entry_ref_for(index))
    }

    /// Returns a previously-acquired slot to the free list. O(1).
    ///
    /// Returns [`Error::NotAllocated`] if `entry` does not resolve to a
    /// currently-busy slot of this pool.
    pub fn release(&mut self, entry: EntryRef) -> Result<()> {
        let index = self.index_of(entry).ok_or(Error::NotAllocated)?;
        if !self.busy[index as usize] {
            return Err(Error::NotAllocated);
        }
        self.busy[index as usize] = false;
        self.free.push(index);
        Ok(())
    }

    /// Attaches an opaque owner value to the slot `entry` resolves to.
    ///
    /// Panics if `entry` does not resolve to a slot of this pool — callers
    /// are expected to only set owners on slots they just `acquire`d.
    pub fn set_owner(&mut self, entry: EntryRef, owner: u32) {
        let index = self
            .index_of(entry)
            .expect("set_owner called with an address foreign to this pool");
        self.owners[index as usize] = Some(owner);
    }

    /// Resolves `entry` back to the owner value set for its slot, if any.
    pub fn get_owner(&self, entry: EntryRef) -> Option<u32> {
        let index = self.index_of(entry)?;
        if !self.busy[index as usize] {
            return None;
        }
        self.owners[index as usize]
    }

    /// Marks every slot free again, regardless of current occupancy, and
    /// forgets every owner. Used to tear a pool down to a fresh state
    /// without reallocating its backing storage.
    pub fn reset(&mut self) {
        self.free = (0..self.slot_count as u32).rev().collect();
        self.busy.iter_mut().for_each(|b| *b = false);
        self.owners.iter_mut().for_each(|o| *o = None);
    }

    /// Borrows the payload bytes for `entry`.
    ///
    /// # Safety
    ///
    /// `entry` must have been returned by `acquire` on this pool and not yet
    /// `release`d. The caller must not hold a conflicting mutable borrow.
    pub unsafe fn payload(&self, entry: EntryRef) -> &[u8] {
        std::slice::from_raw_parts(entry.0.as_ptr(), self.slot_size)
    }

    /// Mutably borrows the payload bytes for `entry`.
    ///
    /// # Safety
    ///
    /// Same contract as [`Pool::payload`].
    #[allow(clippy::mut_from_ref)]
    pub unsafe fn payload_mut(&self, entry: EntryRef) -> &mut [u8] {
        std::slice::from_raw_parts_mut(entry.0.as_ptr(), self.slot_size)
    }
}
