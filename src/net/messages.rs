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

//! Wire payload schemas for the worker<->coordinator protocol (spec §6.1).

use serde::{Deserialize, Serialize};

/// The tag carried in every frame header, identifying how to decode the
/// payload that follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    Instruction,
    WorkerStatus,
    WorkerCapabilities,
    WorkerConfig,
    QueueNode,
}

/// Instructions exchanged between worker and coordinator. `W*` variants are
/// worker-initiated requests, `M*` are coordinator-initiated polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CtrlInstruction {
    /// Coordinator has nothing to say; never sent by a worker.
    NoConfig,
    /// Coordinator asks the worker to report its [`WorkerStatusWire`].
    PollStatus,
    /// Coordinator asks the worker to report its [`WorkerCapabilitiesWire`].
    PollCapabilities,
    /// Worker asks for its [`WorkerConfigWire`].
    RequestConfig,
    /// Worker asks for up to `sc` [`QueueNodeWire`] items.
    RequestNodes,
}

/// Mirrors spec §3/§4.7's crawler thread status state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkerStatusWire {
    Zombie,
    Stop,
    Idle,
    Active,
    Sleep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerCapabilitiesWire {
    pub parsers: u32,
    pub total_threads: u32,
}

/// A single `tagdb_s` entry: which tags the worker should extract and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TagDb {
    pub tag_type: TagType,
    pub xpath: String,
    pub attr: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TagType {
    Invalid,
    Url,
    Title,
    Description,
    Meta,
    Email,
    Image,
}

/// The coordinator-authoritative configuration for this worker (spec §6.1).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkerConfigWire {
    pub user_agent: String,
    pub day_max_crawls: u32,
    pub worker_id: u32,
    pub page_cache_max: u32,
    pub page_cache_res: u32,
    pub robots_cache_max: u32,
    pub robots_cache_res: u32,
    pub db_path: String,
    pub page_table: String,
    pub robots_table: String,
    pub parse_param: Vec<TagDb>,
    /// Batch size per nodes request / drain (`sc` in the spec's glossary).
    pub sc: u32,
}

/// A unit of crawl work as it travels over the wire (`queue_node_s`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueNodeWire {
    pub credit: u32,
    pub url: String,
}

/// The union of payloads a [`crate::net::Connection`] can carry. One
/// variant per [`DataType`]; keeping them in a single enum means the frame
/// header only needs to describe size, not re-derive the schema.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Payload {
    Instruction(CtrlInstruction),
    WorkerStatus(WorkerStatusWire),
    WorkerCapabilities(WorkerCapabilitiesWire),
    WorkerConfig(WorkerConfigWire),
    QueueNode(QueueNodeWire),
}

impl Payload {
    pub fn data_type(&self) -> DataType {
        match self {
            Payload::Instruction(_) => DataType::Instruction,
            Payload::WorkerStatus(_) => DataType::WorkerStatus,
            Payload::WorkerCapabilities(_) => DataType::WorkerCapabilities,
            Payload::WorkerConfig(_) => DataType::WorkerConfig,
            Payload::QueueNode(_) => DataType::QueueNode,
        }
    }
}
