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

//! Durable single-writer keyed store (spec §4.4, layout §6.2): one file per
//! key under `{root}/{table}/{fingerprint(key)}`.

use std::io::Write as _;
use std::marker::PhantomData;
use std::path::Path;
use std::sync::Mutex;

use camino::Utf8PathBuf;
use camino_tempfile::NamedUtf8TempFile;
use serde::{Deserialize, Serialize};

use crate::store::fingerprint::fingerprint;
use crate::store::{Storable, StoreError};

/// On-disk envelope: the version lets a future schema change detect and
/// reject an entry written by an older binary instead of misparsing it.
#[derive(Serialize, Deserialize)]
struct Envelope<T> {
    version: u32,
    value: T,
}

/// Durable store for one table (one `T`, e.g. `page_table` or
/// `robots_table`). A single IO lock serializes concurrent file operations
/// the way spec §4.4 requires ("a global IO lock serializes concurrent
/// opens to the same path") — scoped crate-wide to this table rather than
/// per-path, which is simpler and the table's throughput is bounded by
/// `ObjectManager`'s own single-writer-per-key discipline anyway.
pub struct KvStore<T> {
    root: Utf8PathBuf,
    io_lock: Mutex<()>,
    _marker: PhantomData<T>,
}

impl<T: Storable> KvStore<T> {
    pub fn open(root: impl Into<Utf8PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            io_lock: Mutex::new(()),
            _marker: PhantomData,
        })
    }

    fn path_for(&self, key: &str) -> Utf8PathBuf {
        self.root.join(fingerprint(key).to_string())
    }

    /// Reads and fills `target` if present. Leaves `target` untouched if
    /// absent — that's not an error (spec §4.4).
    pub fn get(&self, target: &mut T, key: &str) -> Result<bool, StoreError> {
        let _guard = self.io_lock.lock().unwrap();
        let path = self.path_for(key);
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(false),
            Err(e) => return Err(e.into()),
        };
        let envelope: Envelope<T> = bincode::deserialize(&bytes)?;
        if envelope.version != T::VERSION {
            return Err(StoreError::VersionMismatch {
                expected: T::VERSION,
                found: envelope.version,
            });
        }
        *target = envelope.value;
        Ok(true)
    }

    /// Writes `value` for `key`, atomically (write to a temp file in the
    /// same directory, then rename) so a crash never leaves a
    /// readable-but-truncated entry.
    pub fn put(&self, value: &T, key: &str) -> Result<(), StoreError>
    where
        T: Clone,
    {
        let _guard = self.io_lock.lock().unwrap();
        let path = self.path_for(key);
        let envelope = Envelope {
            version: T::VERSION,
            value: value.clone(),
        };
        let bytes = bincode::serialize(&envelope)?;
        let mut tmp = NamedUtf8TempFile::new_in(&self.root)?;
        tmp.write_all(&bytes)?;
        tmp.as_file().sync_all()?;
        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(())
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        let _guard = self.io_lock.lock().unwrap();
        let path = self.path_for(key);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(StoreError::NotFound),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether `current`'s on-disk encoding matches what's already stored
    /// for `key` — used by `ObjectManager` to decide whether a cache hit
    /// needs a reload from the store (spec §4.5 step 1).
    pub fn is_fresh(&self, current: &T, key: &str) -> Result<bool, StoreError>
    where
        T: Clone + PartialEq,
    {
        let mut stored = T::default();
        if !self.get(&mut stored, key)? {
            return Ok(true);
        }
        Ok(&stored == current)
    }

    pub fn root(&self) -> &Path {
        self.root.as_std_path()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    struct Dummy {
        n: u32,
    }

    impl Storable for Dummy {
        const VERSION: u32 = 1;
    }

    #[test]
    fn put_then_get_round_trips() {
        let dir = camino_tempfile::tempdir().unwrap();
        let store: KvStore<Dummy> = KvStore::open(dir.path().to_path_buf()).unwrap();
        store.put(&Dummy { n: 7 }, "key-a").unwrap();
        let mut out = Dummy::default();
        assert!(store.get(&mut out, "key-a").unwrap());
        assert_eq!(out, Dummy { n: 7 });
    }

    #[test]
    fn get_on_missing_key_leaves_target_untouched() {
        let dir = camino_tempfile::tempdir().unwrap();
        let store: KvStore<Dummy> = KvStore::open(dir.path().to_path_buf()).unwrap();
        let mut out = Dummy { n: 42 };
        assert!(!store.get(&mut out, "missing").unwrap());
        assert_eq!(out, Dummy { n: 42 });
    }

    #[test]
    fn delete_missing_key_is_not_found() {
        let dir = camino_tempfile::tempdir().unwrap();
        let store: KvStore<Dummy> = KvStore::open(dir.path().to_path_buf()).unwrap();
        assert!(matches!(store.delete("missing"), Err(StoreError::NotFound)));
    }
}
