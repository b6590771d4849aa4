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

//! Worker <-> coordinator IPC: framing, wire schemas, and the client state
//! machine (spec §4.1/§4.2/§6.1).

mod connection;
mod errors;
mod ipc_client;
pub mod messages;

pub use connection::Connection;
pub use errors::{IpcError, TransportError};
pub use ipc_client::{GetItemError, IpcClient};

/// Default coordinator TCP port (spec §6.3, `MASTER_SERVICE_PORT`).
pub const MASTER_SERVICE_PORT: u16 = 23331;
