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

//! The crawled-page record (spec §3).

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::store::Storable;

/// Keyed by URL. `rank` accumulates credit between crawls and is always
/// zero once a crawl completes (spec §3 invariant, enforced in
/// `crawl::thread`, not here).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub rank: u32,
    pub crawl_count: u32,
    #[serde(with = "time::serde::timestamp")]
    pub last_crawl: OffsetDateTime,
    pub title: String,
    pub description: String,
    pub meta: Vec<String>,
    pub out_links: Vec<String>,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            rank: 0,
            crawl_count: 0,
            last_crawl: OffsetDateTime::UNIX_EPOCH,
            title: String::new(),
            description: String::new(),
            meta: Vec::new(),
            out_links: Vec::new(),
        }
    }
}

impl Storable for Page {
    const VERSION: u32 = 1;
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_page_has_zero_rank() {
        let page = Page::default();
        assert_eq!(page.rank, 0);
        assert_eq!(page.crawl_count, 0);
    }
}
