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

//! HTML tag extraction, external to this crate (spec §1): only the trait
//! surface `CrawlerThread` drives is specified here.

use thiserror::Error;

use crate::net::messages::TagType;

/// One extracted tag. `tag_name` is the underlying HTML element name (e.g.
/// `"a"`), independent of `tag_type`, which is how the coordinator's
/// `parse_param` table classified it — `CrawlerThread`'s URL sanitization
/// (spec §4.7) inspects `tag_name` directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tag {
    pub tag_type: TagType,
    pub tag_name: String,
    pub data: String,
}

pub trait Parser: Send + Sync {
    fn parse(&self, body: &[u8]) -> Result<Vec<Tag>, ParserError>;
}

#[derive(Debug, Error)]
pub enum ParserError {
    #[error("malformed tag data: {0}")]
    Malformed(String),
}
