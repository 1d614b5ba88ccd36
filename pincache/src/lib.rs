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

//! `pincache` is a fixed-capacity, single-threaded, in-process associative
//! cache with explicit entry pinning, built from an LRU-ordered doubly
//! linked list, a chained hash index and a slab pool.
//!
//! ```
//! use pincache::prelude::*;
//!
//! let mut cache = Cache::new(CacheConfig {
//!     capacity: 16,
//!     entry_size: 8,
//!     key_size: 4,
//!     compare_key: Box::new(|a: &[u8], b: &[u8]| a.cmp(b)),
//!     key_to_integer: Box::new(|k: &[u8]| u32::from_le_bytes(k.try_into().unwrap())),
//!     free_entry: None,
//! })
//! .unwrap();
//!
//! cache.add(&1u32.to_le_bytes(), Some(&42u64.to_le_bytes())).unwrap();
//!
//! let mut out = [0u8; 8];
//! if let LookupHit::Copied = cache.lookup(&1u32.to_le_bytes(), Some(&mut out)).unwrap() {
//!     assert_eq!(u64::from_le_bytes(out), 42);
//! }
//! ```
//!
//! Nothing in this crate is `Sync`; see [`Cache`]'s own documentation for
//! the single-owner contract every operation assumes.

pub mod prelude;

pub use pincache_core::{AddOutcome, Cache, CacheConfig, EntryHandle, Error, LookupHit, Result};
