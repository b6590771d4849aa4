// Copyright 2024 The Harvestman Authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The two-tier object store (spec §4.3–§4.5): a bounded in-memory
//! [`Cache`], a durable [`KvStore`], and an [`ObjectManager`] that composes
//! them behind a single-writer-per-key checkout discipline.

pub mod cache;
pub mod fingerprint;
pub mod kv;
pub mod manager;

pub use cache::Cache;
pub use kv::KvStore;
pub use manager::{GetError, Handle, ObjectManager};

use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Capability required of any type held by [`Cache`]/[`KvStore`]/
/// [`ObjectManager`] — collapses the teacher's per-type template
/// instantiations (spec §9: "a single generic over a `Storable` capability
/// suffices") into one trait bound.
pub trait Storable: Serialize + DeserializeOwned + Default + Send + 'static {
    /// Bumped whenever the on-disk schema changes; stored alongside the
    /// value so `KvStore` can recognize and reject a stale encoding rather
    /// than silently misinterpreting its bytes (spec §6.2).
    const VERSION: u32;
}

/// Errors from [`KvStore`] (spec §4.4/§7).
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("key not found")]
    NotFound,
    #[error("stored version {found} does not match expected {expected}")]
    VersionMismatch { expected: u32, found: u32 },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encoding(#[from] bincode::Error),
}

/// Errors from [`Cache`]/[`ObjectManager`] (spec §4.3/§4.5/§7).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The entry is already checked out by another caller; never blocks.
    #[error("entry is locked by another caller")]
    Locked,
}
