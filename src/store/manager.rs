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

//! Composes [`Cache`] and [`KvStore`] behind the checkout/return discipline
//! of spec §4.5.

use std::sync::Mutex;

use log::{debug, warn};

use crate::store::cache::{Cache, Checkout};
use crate::store::{CacheError, KvStore, Storable, StoreError};

/// A checked-out object. `DerefMut` gives exclusive mutation access; the
/// caller must eventually hand it to [`ObjectManager::put_nblk`] or
/// [`ObjectManager::delete_nblk`] to release the lock the key is holding.
pub struct Handle<T> {
    key: String,
    value: T,
}

impl<T> Handle<T> {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl<T> std::ops::Deref for Handle<T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.value
    }
}

impl<T> std::ops::DerefMut for Handle<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.value
    }
}

pub struct ObjectManager<T: Storable> {
    cache: Mutex<Cache<T>>,
    store: KvStore<T>,
}

impl<T: Storable + Clone + PartialEq> ObjectManager<T> {
    pub fn new(cache_capacity: usize, store: KvStore<T>) -> Self {
        Self {
            cache: Mutex::new(Cache::new(cache_capacity)),
            store,
        }
    }

    /// Checks `key` out for exclusive mutation. Never blocks: an
    /// already-checked-out key fails with [`CacheError::Locked`].
    pub fn get_nblk(&self, key: &str) -> Result<Handle<T>, GetError> {
        let mut cache = self.cache.lock().unwrap();
        match cache.checkout(key) {
            Checkout::Hit(mut value) => {
                // Cache says resident; confirm the store hasn't moved on
                // (another process/replica, or a reload after a crash).
                if !self.store.is_fresh(&value, key)? {
                    debug!("store reload for {key}: cache entry stale");
                    self.store.get(&mut value, key)?;
                }
                Ok(Handle {
                    key: key.to_string(),
                    value,
                })
            }
            Checkout::Miss => {
                let mut value = T::default();
                self.store.get(&mut value, key)?;
                // Mark it checked out in the cache immediately so a
                // concurrent get_nblk for the same key sees `Locked`
                // rather than allocating a second fresh default and
                // racing this one to `put_nblk`.
                cache.put(key, T::default());
                let Checkout::Hit(_) = cache.checkout(key) else {
                    unreachable!("just inserted this key")
                };
                Ok(Handle {
                    key: key.to_string(),
                    value,
                })
            }
            Checkout::Locked => Err(GetError::Cache(CacheError::Locked)),
        }
    }

    /// Persists the handle's value and releases the key's lock. The key is
    /// unlocked even if the store write fails (spec §7: "during return
    /// [store errors] are logged and the object is still unlocked") — a
    /// stuck lock would wedge every future checkout of this key.
    pub fn put_nblk(&self, handle: Handle<T>) -> Result<(), StoreError> {
        let store_result = self.store.put(&handle.value, &handle.key);
        if let Err(e) = &store_result {
            warn!("put_nblk: store write failed for {}: {e}", handle.key);
        }
        let mut cache = self.cache.lock().unwrap();
        // `put` both unlocks the key (it was `CheckedOut`) and may evict a
        // different, older entry if the cache is full — spec §4.5 step 3
        // treats that eviction as simply "drop the object", which is
        // exactly what happens here since the evicted value isn't returned.
        cache.put(handle.key, handle.value);
        drop(cache);
        store_result
    }

    /// Deletes `key` from both store and cache, dropping the value. The
    /// cache slot is unlocked even if the store delete fails, mirroring
    /// `put_nblk`'s unlock-regardless-of-result discipline (spec §7) — a
    /// failed delete must not leave the key permanently checked out.
    pub fn delete_nblk(&self, handle: Handle<T>) -> Result<(), StoreError> {
        let store_result = match self.store.delete(&handle.key) {
            Ok(()) | Err(StoreError::NotFound) => Ok(()),
            Err(e) => {
                warn!("delete_nblk: store delete failed for {}: {e}", handle.key);
                Err(e)
            }
        };
        let mut cache = self.cache.lock().unwrap();
        cache.delete(&handle.key);
        drop(cache);
        store_result
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GetError {
    #[error(transparent)]
    Cache(#[from] CacheError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[cfg(test)]
mod test {
    use super::*;
    use camino_tempfile::Utf8TempDir;
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Dummy {
        n: u32,
    }

    impl Storable for Dummy {
        const VERSION: u32 = 1;
    }

    fn manager() -> (ObjectManager<Dummy>, Utf8TempDir) {
        let dir = camino_tempfile::tempdir().unwrap();
        let store = KvStore::open(dir.path().to_path_buf()).unwrap();
        (ObjectManager::new(4, store), dir)
    }

    #[test]
    fn checkout_mutate_put_round_trips_through_the_store() {
        let (mgr, _dir) = manager();
        let mut handle = mgr.get_nblk("a").unwrap();
        handle.n = 9;
        mgr.put_nblk(handle).unwrap();

        let handle2 = mgr.get_nblk("a").unwrap();
        assert_eq!(handle2.n, 9);
        mgr.put_nblk(handle2).unwrap();
    }

    #[test]
    fn second_checkout_while_locked_fails() {
        let (mgr, _dir) = manager();
        let handle = mgr.get_nblk("a").unwrap();
        assert!(matches!(
            mgr.get_nblk("a"),
            Err(GetError::Cache(CacheError::Locked))
        ));
        mgr.put_nblk(handle).unwrap();
        assert!(mgr.get_nblk("a").is_ok());
    }

    #[test]
    fn delete_nblk_removes_from_store() {
        let (mgr, _dir) = manager();
        let mut handle = mgr.get_nblk("a").unwrap();
        handle.n = 3;
        mgr.put_nblk(handle).unwrap();

        let handle = mgr.get_nblk("a").unwrap();
        mgr.delete_nblk(handle).unwrap();

        let handle = mgr.get_nblk("a").unwrap();
        assert_eq!(handle.n, 0);
    }
}
