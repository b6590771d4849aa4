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

//! Process-local configuration (spec §4.9/§6.4): everything not carried
//! over the wire. The coordinator-authoritative `WorkerConfigWire` (§6.1)
//! supersedes the relevant fields here once received.

use std::num::NonZeroUsize;

use camino::Utf8PathBuf;
use serde::{Deserialize, Serialize};

fn default_coordinator_address() -> String {
    format!("127.0.0.1:{}", crate::net::MASTER_SERVICE_PORT)
}

fn default_user_agent() -> String {
    "harvestman/0.1".to_string()
}

fn default_threads() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::new(1).unwrap())
}

fn default_log_level() -> log::LevelFilter {
    log::LevelFilter::Info
}

fn default_data_root() -> Utf8PathBuf {
    Utf8PathBuf::from("./harvestman-data")
}

/// Mirrors the teacher's `Configs::load_from` / `Config::default()` split:
/// loadable from a file on disk plus environment overrides, falling back
/// field-by-field to these defaults when a field (or the whole file) is
/// absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerLocalConfig {
    #[serde(default = "default_coordinator_address")]
    pub coordinator_address: String,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_threads")]
    pub threads: NonZeroUsize,
    #[serde(default = "default_log_level", with = "level_filter_serde")]
    pub log_level: log::LevelFilter,
    #[serde(default)]
    pub log_to_file: bool,
    #[serde(default = "default_data_root")]
    pub data_root: Utf8PathBuf,
}

impl Default for WorkerLocalConfig {
    fn default() -> Self {
        Self {
            coordinator_address: default_coordinator_address(),
            user_agent: default_user_agent(),
            threads: default_threads(),
            log_level: default_log_level(),
            log_to_file: false,
            data_root: default_data_root(),
        }
    }
}

impl WorkerLocalConfig {
    /// Loads from `path`, layered with `HARVESTMAN_*` environment overrides
    /// (e.g. `HARVESTMAN_THREADS=8`), mirroring the teacher's
    /// `Configs::load_from` hierarchical `config`-crate setup.
    pub fn try_load_from_path(path: &std::path::Path) -> Result<Self, ConfigError> {
        let path_str = path
            .to_str()
            .ok_or_else(|| ConfigError::InvalidPath(path.to_path_buf()))?;
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path_str))
            .add_source(config::Environment::with_prefix("HARVESTMAN"))
            .build()?;
        Ok(settings.try_deserialize()?)
    }

    pub fn write_to_path(&self, path: &std::path::Path) -> Result<(), ConfigError> {
        let text = serde_json::to_string_pretty(self)?;
        std::fs::write(path, text)?;
        Ok(())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Config(#[from] config::ConfigError),
    #[error("config path is not valid UTF-8: {0}")]
    InvalidPath(std::path::PathBuf),
}

mod level_filter_serde {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &log::LevelFilter,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<log::LevelFilter, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_config_round_trips_through_json() {
        let cfg = WorkerLocalConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back: WorkerLocalConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(cfg.coordinator_address, back.coordinator_address);
        assert_eq!(cfg.threads, back.threads);
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let cfg: WorkerLocalConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(cfg.threads, default_threads());
    }

    #[test]
    fn try_load_from_path_reads_json_and_fills_defaults() {
        let dir = camino_tempfile::tempdir().unwrap();
        let path = dir.path().join("harvestman.json");
        std::fs::write(&path, r#"{"user_agent": "custom-agent/1.0"}"#).unwrap();

        let cfg = WorkerLocalConfig::try_load_from_path(path.as_std_path()).unwrap();
        assert_eq!(cfg.user_agent, "custom-agent/1.0");
        assert_eq!(cfg.coordinator_address, default_coordinator_address());
    }
}
