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

//! Re-exports the blocking fetch collaborator. `RobotsProfile::fetch` also
//! depends on it, so the trait itself lives in `model::robots`; this module
//! just gives `crawl` callers the name they'd expect (spec §1/§6).

pub use crate::model::robots::{NetIO, NetIoError};
