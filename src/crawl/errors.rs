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

use thiserror::Error;

use crate::model::robots::NetIoError;
use crate::net::IpcError;
use crate::store::StoreError;

/// Errors surfaced by a `CrawlerThread`'s loop (spec §7). `Locked` cache
/// conflicts are deliberately absent — they're recoverable in-line (requeue
/// and continue), never propagated as a loop failure.
#[derive(Debug, Error)]
pub enum CrawlError {
    #[error(transparent)]
    Ipc(#[from] IpcError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Parser(#[from] super::parser::ParserError),
    #[error(transparent)]
    NetIo(#[from] NetIoError),
    #[error("too many consecutive empty get_item results")]
    QueueExhausted,
}
