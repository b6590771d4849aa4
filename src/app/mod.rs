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

//! Process entry point: CLI parsing, config discovery, logging setup, and
//! the top-level run loop (spec §4.8/§4.9).

pub mod args;
pub mod logging;

use std::process::ExitCode;
use std::sync::Arc;

use log::{error, info};

use crate::app::args::{HarvestmanArgs, RunMode};
use crate::config::WorkerLocalConfig;
use crate::crawl::{CrawlerThread, NetIO, Parser};
use crate::model::robots::NetIoError;
use crate::model::{Page, RobotsProfile};
use crate::net::IpcClient;
use crate::store::{KvStore, ObjectManager};

pub fn exec_args(args: HarvestmanArgs) -> ExitCode {
    match execute(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("harvestman: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn execute(args: HarvestmanArgs) -> Result<(), anyhow::Error> {
    match args.command {
        RunMode::InitConfig { path } => {
            let config = WorkerLocalConfig::default();
            config.write_to_path(&path)?;
            println!("wrote default config to {}", path.display());
            Ok(())
        }
        RunMode::Run {
            coordinator,
            threads,
            user_agent,
            config,
        } => {
            let mut local = match &config {
                Some(path) => WorkerLocalConfig::try_load_from_path(path)?,
                None => WorkerLocalConfig::default(),
            };
            if let Some(coordinator) = coordinator {
                local.coordinator_address = coordinator;
            }
            if let Some(threads) = threads {
                local.threads = threads;
            }
            if let Some(user_agent) = user_agent {
                local.user_agent = user_agent;
            }

            let run_id = uuid::Uuid::new_v4();
            logging::configure_logging(&local, run_id)?;
            info!("starting run {run_id}");
            run(local)
        }
    }
}

/// Seam for the HTTP fetcher this crate deliberately doesn't implement
/// (spec §1 Non-goal). An embedder supplies a real implementation; this one
/// only exists so the binary links and fails loudly if nothing else is
/// wired in.
struct UnimplementedNetIO;

impl NetIO for UnimplementedNetIO {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, NetIoError> {
        Err(NetIoError::Other(format!(
            "no NetIO implementation configured (fetch {url})"
        )))
    }
}

struct UnimplementedParser;

impl Parser for UnimplementedParser {
    fn parse(&self, _body: &[u8]) -> Result<Vec<crate::crawl::Tag>, crate::crawl::ParserError> {
        Err(crate::crawl::ParserError::Malformed(
            "no Parser implementation configured".to_string(),
        ))
    }
}

fn run(local: WorkerLocalConfig) -> Result<(), anyhow::Error> {
    info!("connecting to coordinator at {}", local.coordinator_address);
    let ipc = Arc::new(IpcClient::connect(local.coordinator_address.clone(), 4)?);
    let wire_config = ipc.get_config()?;
    info!("registered as worker {}", wire_config.worker_id);

    let page_store = KvStore::open(local.data_root.join(&wire_config.page_table))?;
    let robots_store = KvStore::open(local.data_root.join(&wire_config.robots_table))?;
    let page_mgr = Arc::new(ObjectManager::<Page>::new(
        wire_config.page_cache_max as usize,
        page_store,
    ));
    let robots_mgr = Arc::new(ObjectManager::<RobotsProfile>::new(
        wire_config.robots_cache_max as usize,
        robots_store,
    ));

    let netio: Arc<dyn NetIO> = Arc::new(UnimplementedNetIO);
    let parser: Arc<dyn Parser> = Arc::new(UnimplementedParser);

    let mut threads = Vec::new();
    let mut handles = Vec::new();
    for id in 0..local.threads.get() as u32 {
        let thread = Arc::new(CrawlerThread::new(
            id,
            ipc.clone(),
            page_mgr.clone(),
            robots_mgr.clone(),
            netio.clone(),
            parser.clone(),
            wire_config.user_agent.clone(),
            wire_config.day_max_crawls,
        ));
        threads.push(thread.clone());
        handles.push(std::thread::spawn(move || {
            if let Err(e) = thread.run() {
                error!("crawler thread {} exited: {e}", thread.id());
            }
        }));
    }

    wait_for_shutdown_signal()?;
    info!("shutdown requested, stopping {} crawler thread(s)", threads.len());
    for thread in &threads {
        thread.stop();
    }
    for handle in handles {
        let _ = handle.join();
    }
    Ok(())
}

fn wait_for_shutdown_signal() -> Result<(), anyhow::Error> {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    rt.block_on(tokio::signal::ctrl_c())?;
    Ok(())
}
