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

//! Stable hashing of string keys into storage filenames (spec §3, §6.2).

use std::hash::Hasher;
use twox_hash::XxHash64;

/// A fixed seed keeps the fingerprint stable across process restarts and
/// machines, which matters because it is persisted as a filename.
const SEED: u64 = 0x6861_7276_6573_746d;

/// Hashes `key` to the decimal `u64` used as its filename under `KvStore`.
/// Two distinct keys hashing to the same fingerprint would silently collide
/// on disk: `KvStore` does not persist the original key alongside the
/// value, so it cannot detect or reject this case. 64-bit `XxHash64` makes
/// it unlikely in practice but it is not structurally ruled out.
pub fn fingerprint(key: &str) -> u64 {
    let mut hasher = XxHash64::with_seed(SEED);
    hasher.write(key.as_bytes());
    hasher.finish()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn is_deterministic() {
        assert_eq!(fingerprint("http://example.com"), fingerprint("http://example.com"));
    }

    #[test]
    fn differs_for_different_keys() {
        assert_ne!(fingerprint("http://example.com"), fingerprint("http://example.org"));
    }
}
