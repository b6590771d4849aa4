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

//! Process-wide logging setup (spec §4.10).

use log4rs::append::console::ConsoleAppender;
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Logger, Root};
use log4rs::encode::pattern::PatternEncoder;

use crate::config::WorkerLocalConfig;

const PATTERN: &str = "{l}@Thread{I} - {d} - {m}{n}";

/// `run_id` disambiguates log files across concurrent worker processes that
/// share the same `data_root` (spec §4.10 is silent on file naming; each
/// process gets its own file rather than interleaving writers).
pub fn configure_logging(
    config: &WorkerLocalConfig,
    run_id: uuid::Uuid,
) -> Result<(), anyhow::Error> {
    let encoder = Box::new(PatternEncoder::new(PATTERN));
    let mut builder = Config::builder();

    if config.log_to_file {
        std::fs::create_dir_all(&config.data_root)?;
        let log_path = config.data_root.join(format!("harvestman-{run_id}.log"));
        let file = FileAppender::builder()
            .encoder(encoder)
            .build(log_path)?;
        builder = builder.appender(Appender::builder().build("file", Box::new(file)));
        builder = builder.logger(Logger::builder().build("harvestman", config.log_level));
        let root = Root::builder().appender("file").build(config.log_level);
        let cfg = builder.build(root)?;
        log4rs::init_config(cfg)?;
    } else {
        let console = ConsoleAppender::builder().encoder(encoder).build();
        builder = builder.appender(Appender::builder().build("console", Box::new(console)));
        let root = Root::builder().appender("console").build(config.log_level);
        let cfg = builder.build(root)?;
        log4rs::init_config(cfg)?;
    }

    Ok(())
}
