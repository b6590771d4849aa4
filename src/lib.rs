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

//! A distributed web-crawler worker: IPC to a coordinator, a two-tier
//! object store, robots.txt politeness, and credit-propagation ranking.

pub mod app;
pub mod config;
pub mod crawl;
pub mod model;
pub mod net;
pub mod store;
pub mod util;
