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

//! Per-origin crawl policy parsed from `robots.txt` (spec §4.6).

use log::warn;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

use crate::store::Storable;

/// Robots.txt bodies larger than this are treated as if absent (spec §4.6,
/// §6.3 `MAX_ROBOTS_SIZE`).
pub const MAX_ROBOTS_SIZE: usize = 500 * 1024;

/// Applied when `robots.txt` omits `Crawl-delay` (spec §6.3
/// `DEFAULT_CRAWL_DELAY`).
pub const DEFAULT_CRAWL_DELAY_SECS: u64 = 60;

/// The blocking fetch collaborator, external to this crate (spec §1): real
/// HTTP fetching lives outside; only this trait surface is specified.
pub trait NetIO: Send + Sync {
    fn fetch(&self, url: &str) -> Result<Vec<u8>, NetIoError>;
}

#[derive(Debug, Error)]
pub enum NetIoError {
    #[error("{0}")]
    Other(String),
}

/// Per-origin policy, keyed by origin root URL (spec §3).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotsProfile {
    pub agent_name: String,
    pub domain: String,
    pub can_crawl: bool,
    pub allow_list: Vec<String>,
    pub disallow_list: Vec<String>,
    pub crawl_delay: u64,
    #[serde(with = "time::serde::timestamp")]
    pub last_access: OffsetDateTime,
    pub sitemap_url: Option<String>,
}

impl Default for RobotsProfile {
    fn default() -> Self {
        Self {
            agent_name: String::new(),
            domain: String::new(),
            can_crawl: true,
            allow_list: Vec::new(),
            disallow_list: Vec::new(),
            crawl_delay: DEFAULT_CRAWL_DELAY_SECS,
            last_access: OffsetDateTime::UNIX_EPOCH,
            sitemap_url: None,
        }
    }
}

impl Storable for RobotsProfile {
    const VERSION: u32 = 1;
}

impl RobotsProfile {
    /// Sets the identity fields a freshly checked-out profile needs before
    /// it can be parsed or matched (mirrors `CrawlerThread`'s
    /// `robots.configure(cfg.user_agent, root)` call, spec §4.7).
    pub fn configure(&mut self, agent_name: impl Into<String>, domain: impl Into<String>) {
        self.agent_name = agent_name.into();
        self.domain = domain.into();
    }

    /// Retrieves and parses `{domain}/robots.txt`. Network failure or an
    /// oversize body falls back to permissive defaults rather than erroring
    /// (spec §4.6) — a crawler should not wedge on a broken robots fetch.
    pub fn fetch(&mut self, netio: &dyn NetIO) {
        let url = format!("{}/robots.txt", self.domain.trim_end_matches('/'));
        match netio.fetch(&url) {
            Ok(bytes) if bytes.len() > MAX_ROBOTS_SIZE => {
                warn!("robots.txt for {} is {} bytes, treating as absent", self.domain, bytes.len());
                self.apply_defaults();
            }
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                self.parse(&text);
            }
            Err(e) => {
                warn!("robots.txt fetch failed for {}: {e}", self.domain);
                self.apply_defaults();
            }
        }
        self.last_access = OffsetDateTime::now_utc();
    }

    fn apply_defaults(&mut self) {
        self.can_crawl = true;
        self.allow_list.clear();
        self.disallow_list.clear();
        self.crawl_delay = DEFAULT_CRAWL_DELAY_SECS;
        self.sitemap_url = None;
    }

    /// Parses `text` as a `robots.txt` body, replacing policy fields while
    /// preserving `agent_name`/`domain`/`last_access` (spec §4.6).
    pub fn parse(&mut self, text: &str) {
        self.can_crawl = true;
        self.allow_list.clear();
        self.disallow_list.clear();
        self.crawl_delay = DEFAULT_CRAWL_DELAY_SECS;
        self.sitemap_url = None;

        let mut active = false;

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((field, value)) = line.split_once(':') else {
                continue;
            };
            let field = field.trim();
            let value = value.trim();

            if field.eq_ignore_ascii_case("user-agent") {
                active = value == "*"
                    || self
                        .agent_name
                        .to_ascii_lowercase()
                        .starts_with(&value.to_ascii_lowercase());
                continue;
            }

            if field.eq_ignore_ascii_case("sitemap") {
                self.sitemap_url = Some(value.to_string());
                continue;
            }

            if !active {
                continue;
            }

            if field.eq_ignore_ascii_case("disallow") {
                if value == "/" || value == "*" {
                    self.can_crawl = false;
                } else if !value.is_empty() {
                    self.disallow_list.push(value.replace('*', ""));
                }
            } else if field.eq_ignore_ascii_case("allow") {
                if value == "/" || value == "*" {
                    self.can_crawl = true;
                    if !self.allow_list.iter().any(|p| p == "/") {
                        self.allow_list.push("/".to_string());
                    }
                } else if !value.is_empty() {
                    self.allow_list.push(value.to_string());
                }
            } else if field.eq_ignore_ascii_case("crawl-delay") {
                if let Ok(secs) = value.parse::<u64>() {
                    self.crawl_delay = secs;
                }
            }
        }

        // Allow wins: prune any disallowed path that an allow entry covers.
        let allow_list = self.allow_list.clone();
        self.disallow_list
            .retain(|d| !allow_list.iter().any(|a| d.starts_with(a.as_str())));
    }

    /// True if `path` must not be crawled under this policy (spec §4.6).
    pub fn exclude(&self, path: &str) -> bool {
        if !self.can_crawl {
            return true;
        }
        let remainder = path.strip_prefix(self.domain.as_str()).unwrap_or(path);
        self.disallow_list.iter().any(|d| remainder.starts_with(d.as_str()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn profile(agent: &str, domain: &str) -> RobotsProfile {
        let mut p = RobotsProfile::default();
        p.configure(agent, domain);
        p
    }

    #[test]
    fn disallow_slash_blocks_everything() {
        let mut p = profile("harvestman", "http://example.com");
        p.parse("User-agent: *\nDisallow: /\n");
        assert!(!p.can_crawl);
        assert!(p.exclude("http://example.com/anything"));
    }

    #[test]
    fn allow_prunes_overlapping_disallow() {
        let mut p = profile("harvestman", "http://example.com");
        p.parse("User-agent: *\nDisallow: /private/\nAllow: /private/public/\n");
        assert!(p
            .disallow_list
            .iter()
            .all(|d| !d.starts_with("/private/public/") && d != "/private/public/"));
        assert!(p.exclude("http://example.com/private/secret"));
    }

    #[test]
    fn non_matching_user_agent_block_is_ignored() {
        let mut p = profile("harvestman", "http://example.com");
        p.parse("User-agent: othercrawler\nDisallow: /\n");
        assert!(p.can_crawl);
        assert!(!p.exclude("http://example.com/x"));
    }

    #[test]
    fn crawl_delay_is_parsed() {
        let mut p = profile("harvestman", "http://example.com");
        p.parse("User-agent: *\nCrawl-delay: 5\n");
        assert_eq!(p.crawl_delay, 5);
    }

    #[test]
    fn oversize_body_falls_back_to_defaults() {
        let mut p = profile("harvestman", "http://example.com");
        p.parse("User-agent: *\nDisallow: /\n");
        p.apply_defaults();
        assert!(p.can_crawl);
        assert!(!p.exclude("http://example.com/anything"));
    }

    #[test]
    fn parsing_is_idempotent() {
        let text = "User-agent: *\nDisallow: /a/\nAllow: /a/public/\nCrawl-delay: 3\n";
        let mut p = profile("harvestman", "http://example.com");
        p.parse(text);
        let first = p.clone();
        p.parse(text);
        assert_eq!(first, p);
    }
}
