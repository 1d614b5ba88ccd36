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

use thiserror::Error as ThisError;

/// The full error taxonomy shared by the pool and cache core.
///
/// Not every variant is reachable from every crate: `pincache-pool` only ever
/// produces `Exhausted`/`NotAllocated`; `pincache-hash` is infallible and
/// does not depend on this type at all; the rest are surfaced by
/// `pincache-core`. "Duplicate" from the
/// taxonomy this enum realizes is not a variant here: `add` on an existing
/// key is not an erroneous condition, so it is signaled by
/// `AddOutcome::Duplicate` (an `Ok` value), the same way a cache miss is
/// `LookupHit::Miss` rather than an `Err`.
#[derive(ThisError, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// A lookup-shaped operation found no matching entry.
    #[error("entry not found")]
    NotFound,

    /// The operation would have removed or overwritten an entry that is
    /// currently pinned.
    #[error("entry is locked (pin-count > 0)")]
    Locked,

    /// `unlock` was called on an entry whose pin-count is already zero.
    #[error("entry is already unlocked")]
    AlreadyUnlocked,

    /// `add` could not find room: capacity is reached and every resident
    /// entry is pinned.
    #[error("cache is full and every resident entry is pinned")]
    CacheFull,

    /// A caller-supplied argument violates a documented precondition (key or
    /// entry length mismatch, zero capacity, and so on).
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    /// The slab pool has no free slots left to hand out.
    #[error("pool is exhausted")]
    Exhausted,

    /// An address was presented to the pool that does not resolve to a
    /// currently-allocated slot.
    #[error("address does not resolve to an allocated slot")]
    NotAllocated,

    /// The backing allocation for the pool could not be obtained.
    #[error("out of memory")]
    OutOfMemory,
}
