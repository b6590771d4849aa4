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

/// Errors raised by [`crate::net::Connection`] framing (spec §4.1).
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("serialized header length does not match the length established at startup")]
    InvalidArgument,
    #[error("declared payload size was zero")]
    InvalidHeader,
    #[error("short read: expected {expected} bytes, got {got}")]
    ShortRead { expected: usize, got: usize },
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Encoding(#[from] bincode::Error),
}

/// Errors surfaced to an [`crate::net::IpcClient`] caller (spec §4.2/§7).
#[derive(Debug, Error)]
pub enum IpcError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("the driver is disconnected and no longer attempts recovery")]
    Disconnected,
    #[error("the driver thread is gone")]
    DriverGone,
}
