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

//! CLI surface (spec §4.8).

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "harvestman", about = "A distributed web-crawler worker")]
pub struct HarvestmanArgs {
    #[command(subcommand)]
    pub command: RunMode,
}

#[derive(Debug, Subcommand)]
pub enum RunMode {
    /// Connect to the coordinator and start crawling.
    Run {
        #[arg(long)]
        coordinator: Option<String>,
        /// Number of crawler threads. Defaults to the config file's value,
        /// which itself defaults to the host's CPU count.
        #[arg(long)]
        threads: Option<NonZeroUsize>,
        #[arg(long)]
        user_agent: Option<String>,
        #[arg(long)]
        config: Option<PathBuf>,
    },
    /// Write a default local config file to disk.
    InitConfig {
        #[arg(long, default_value = "harvestman.json")]
        path: PathBuf,
    },
}
