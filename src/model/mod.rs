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

//! The crate's persistent domain types (spec §3): [`WorkItem`], [`Page`],
//! [`RobotsProfile`].

pub mod page;
pub mod robots;
pub mod work_item;

pub use page::Page;
pub use robots::RobotsProfile;
pub use work_item::WorkItem;
