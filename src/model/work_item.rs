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

//! The unit of work transferred over IPC and between crawler queues
//! (spec §3).

use crate::net::messages::QueueNodeWire;

/// An ASCII URL plus the credit it inherited from the referring page.
/// Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkItem {
    url: String,
    credit: u32,
}

impl WorkItem {
    pub fn new(url: impl Into<String>, credit: u32) -> Self {
        Self {
            url: url.into(),
            credit,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn credit(&self) -> u32 {
        self.credit
    }
}

impl From<WorkItem> for QueueNodeWire {
    fn from(value: WorkItem) -> Self {
        QueueNodeWire {
            credit: value.credit,
            url: value.url,
        }
    }
}

impl From<QueueNodeWire> for WorkItem {
    fn from(value: QueueNodeWire) -> Self {
        WorkItem {
            url: value.url,
            credit: value.credit,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn round_trips_through_the_wire_type() {
        let item = WorkItem::new("http://example.com/a", 42);
        let wire: QueueNodeWire = item.clone().into();
        let back: WorkItem = wire.into();
        assert_eq!(item, back);
    }
}
