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

//! The cache core: a fixed-capacity, single-threaded, pinning associative
//! cache built from a [`pincache_list::List`] (LRU order), a
//! [`pincache_hash::HashIndex`] (key lookup) and a [`pincache_pool::Pool`]
//! (payload storage).
//!
//! `Cache` is the only type most callers need; [`CacheConfig`] configures it.
//! Nothing in this crate is `Sync` — a single logical owner drives every
//! call, exactly like `pincache_pool::Pool`'s own single-owner contract.
//! Sharing a `Cache` across threads is the embedder's job, the same way
//! `foyer-memory`'s `CacheShard` is only made thread-safe by the
//! `parking_lot::Mutex` its owning `GenericCache` wraps it in.

mod cache;

pub use cache::{AddOutcome, Cache, CacheConfig, EntryHandle, LookupHit};
pub use pincache_common::{Error, Result};
