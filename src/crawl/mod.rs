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

//! The crawler work loop and its external collaborator traits (spec §4.7).

pub mod errors;
pub mod netio;
pub mod parser;
pub mod thread;

pub use errors::CrawlError;
pub use netio::NetIO;
pub use parser::{Parser, ParserError, Tag};
pub use thread::CrawlerThread;
