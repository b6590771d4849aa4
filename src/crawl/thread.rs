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

//! The crawler's main work loop (spec §4.7): pull an item, check
//! politeness, crawl, propagate credit.

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Arc;
use std::time::Duration as StdDuration;

use log::{debug, info, warn};
use rand::Rng;
use time::OffsetDateTime;

use crate::crawl::errors::CrawlError;
use crate::crawl::netio::NetIO;
use crate::crawl::parser::Parser;
use crate::model::{Page, RobotsProfile, WorkItem};
use crate::net::messages::{TagType, WorkerStatusWire};
use crate::net::{GetItemError, IpcClient};
use crate::store::{CacheError, GetError, ObjectManager};

/// Minimum interval between `robots.txt` refetches (spec §6.3).
pub const ROBOTS_REFRESH: StdDuration = StdDuration::from_secs(15 * 60);
/// Fraction of credit retired per crawl (spec §6.3 `CREDIT_TAX_PERCENT`).
pub const CREDIT_TAX_PERCENT: u32 = 10;
/// Starting per-thread backoff (spec §4.7).
pub const BASE_BACKOFF: StdDuration = StdDuration::from_millis(1);
/// Consecutive empty `get_item` results before a thread gives up and
/// transitions to `ZOMBIE` (spec §4.7/§7: "past a threshold" — not otherwise
/// pinned down by the source, chosen generously so a merely quiet
/// coordinator doesn't retire threads).
pub const EMPTY_QUEUE_ZOMBIE_THRESHOLD: u32 = 30;

fn status_to_u8(status: WorkerStatusWire) -> u8 {
    match status {
        WorkerStatusWire::Zombie => 0,
        WorkerStatusWire::Stop => 1,
        WorkerStatusWire::Idle => 2,
        WorkerStatusWire::Active => 3,
        WorkerStatusWire::Sleep => 4,
    }
}

fn status_from_u8(v: u8) -> WorkerStatusWire {
    match v {
        0 => WorkerStatusWire::Zombie,
        1 => WorkerStatusWire::Stop,
        2 => WorkerStatusWire::Idle,
        3 => WorkerStatusWire::Active,
        _ => WorkerStatusWire::Sleep,
    }
}

/// `tax(credit, percent) = credit - credit*(percent/100)`, preserving the
/// source's integer-division truncation (spec §4.7, §9 Open Question 1):
/// for any `percent < 100`, `percent/100` is `0` and no tax is retired.
/// Kept as-is for source-compatible rank math rather than "fixed" to
/// `credit*percent/100`.
pub fn tax(credit: u32, percent: u32) -> u32 {
    credit - credit * (percent / 100)
}

/// The scheme+host prefix of `url`, used to key per-domain robots policy
/// (spec §4.7). Position 8 is the length of the longest known scheme
/// prefix, `"https://"`.
pub fn root_origin(url: &str) -> &str {
    for (i, b) in url.bytes().enumerate().skip(8) {
        if matches!(b, b'/' | b'#' | b'?') {
            return &url[..i];
        }
    }
    url
}

/// Applies the URL-tag sanitization rules of spec §4.7, including the
/// deliberately preserved HTTPS-to-HTTP strip (Open Question 2).
fn sanitize_url(tag_name: &str, attr_data: &str, root_url: &str) -> Option<String> {
    if tag_name != "a" {
        return None;
    }
    if attr_data.is_empty() {
        return None;
    }
    if !attr_data.starts_with("http") {
        return Some(format!("{root_url}{attr_data}"));
    }
    if attr_data.starts_with("https") {
        let mut fixed = attr_data.to_string();
        fixed.remove(4);
        return Some(fixed);
    }
    Some(attr_data.to_string())
}

pub struct CrawlerThread {
    id: u32,
    ipc: Arc<IpcClient>,
    page_mgr: Arc<ObjectManager<Page>>,
    robots_mgr: Arc<ObjectManager<RobotsProfile>>,
    netio: Arc<dyn NetIO>,
    parser: Arc<dyn Parser>,
    user_agent: String,
    day_max_crawls: u32,
    should_stop: AtomicBool,
    status: AtomicU8,
}

impl CrawlerThread {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: u32,
        ipc: Arc<IpcClient>,
        page_mgr: Arc<ObjectManager<Page>>,
        robots_mgr: Arc<ObjectManager<RobotsProfile>>,
        netio: Arc<dyn NetIO>,
        parser: Arc<dyn Parser>,
        user_agent: String,
        day_max_crawls: u32,
    ) -> Self {
        Self {
            id,
            ipc,
            page_mgr,
            robots_mgr,
            netio,
            parser,
            user_agent,
            day_max_crawls,
            should_stop: AtomicBool::new(false),
            status: AtomicU8::new(status_to_u8(WorkerStatusWire::Sleep)),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn status(&self) -> WorkerStatusWire {
        status_from_u8(self.status.load(Ordering::Relaxed))
    }

    fn set_status(&self, status: WorkerStatusWire) {
        self.status.store(status_to_u8(status), Ordering::Relaxed);
        let _ = self.ipc.set_status(status);
    }

    /// Requests a cooperative stop; observed at the top of the next loop
    /// iteration (spec §5 cancellation model).
    pub fn stop(&self) {
        self.should_stop.store(true, Ordering::Relaxed);
    }

    /// Runs the work loop until `stop()` is called or a fatal error occurs.
    /// While status > `STOP` per spec §4.7; on exit the thread's status is
    /// `ZOMBIE`.
    pub fn run(&self) -> Result<(), CrawlError> {
        self.set_status(WorkerStatusWire::Sleep);
        let mut sleep_time = BASE_BACKOFF;
        let mut empty_count: u32 = 0;

        let result = loop {
            if self.should_stop.load(Ordering::Relaxed) {
                self.set_status(WorkerStatusWire::Stop);
                break Ok(());
            }

            self.set_status(WorkerStatusWire::Idle);
            let item = match self.ipc.get_item(Some(StdDuration::from_secs(1))) {
                Ok(item) => {
                    empty_count = 0;
                    item
                }
                Err(GetItemError::Empty) => {
                    empty_count += 1;
                    if empty_count >= EMPTY_QUEUE_ZOMBIE_THRESHOLD {
                        break Err(CrawlError::QueueExhausted);
                    }
                    continue;
                }
                Err(GetItemError::Ipc(e)) => break Err(e.into()),
            };
            self.set_status(WorkerStatusWire::Active);

            if let Err(e) = self.process_item(item, &mut sleep_time) {
                warn!("crawler thread {}: {e}", self.id);
            }

            // Jitter so backoff across threads doesn't stay in lockstep.
            let jitter = StdDuration::from_millis(rand::thread_rng().gen_range(0..50));
            std::thread::sleep(sleep_time + jitter);
        };

        self.set_status(WorkerStatusWire::Zombie);
        result
    }

    fn process_item(&self, item: WorkItem, sleep_time: &mut StdDuration) -> Result<(), CrawlError> {
        let mut page = match self.page_mgr.get_nblk(item.url()) {
            Ok(h) => h,
            Err(GetError::Cache(CacheError::Locked)) => {
                debug!("page {} locked, requeueing", item.url());
                self.ipc.send_item(item)?;
                return Ok(());
            }
            Err(GetError::Store(e)) => {
                warn!("checkout of page {} failed: {e}", item.url());
                self.ipc.send_item(item)?;
                return Err(e.into());
            }
        };

        let root = root_origin(item.url()).to_string();
        let mut robots = match self.robots_mgr.get_nblk(&root) {
            Ok(h) => h,
            Err(GetError::Cache(CacheError::Locked)) => {
                debug!("robots profile {root} locked, requeueing {}", item.url());
                self.ipc.send_item(item)?;
                self.page_mgr.put_nblk(page)?;
                return Ok(());
            }
            Err(GetError::Store(e)) => {
                warn!("checkout of robots profile {root} failed: {e}");
                self.ipc.send_item(item)?;
                self.page_mgr.put_nblk(page)?;
                return Err(e.into());
            }
        };

        robots.configure(self.user_agent.clone(), root.clone());
        let now = OffsetDateTime::now_utc();
        if (now - robots.last_access).unsigned_abs() >= ROBOTS_REFRESH {
            robots.fetch(self.netio.as_ref());
        }

        if robots.exclude(item.url()) {
            info!("excluded by robots.txt: {}", item.url());
            page.rank = tax(item.credit() + page.rank, 100);
            self.page_mgr.delete_nblk(page)?;
            self.robots_mgr.put_nblk(robots)?;
            return Ok(());
        }

        let mut root_handle = if item.url() == root {
            None
        } else {
            match self.page_mgr.get_nblk(&root) {
                Ok(h) => Some(h),
                Err(GetError::Cache(CacheError::Locked)) | Err(GetError::Store(_)) => {
                    self.ipc.send_item(item)?;
                    self.page_mgr.put_nblk(page)?;
                    self.robots_mgr.put_nblk(robots)?;
                    return Ok(());
                }
            }
        };

        let root_last_crawl = root_handle.as_deref().map_or(page.last_crawl, |p| p.last_crawl);
        let delay = StdDuration::from_secs(robots.crawl_delay);
        if (now - root_last_crawl).unsigned_abs() >= delay && page.crawl_count < self.day_max_crawls {
            if (now - page.last_crawl).unsigned_abs() >= StdDuration::from_secs(24 * 3600) {
                page.crawl_count = 0;
            }
            self.crawl(&item, &mut page, &root)?;
            *sleep_time = BASE_BACKOFF;
        } else {
            *sleep_time = (*sleep_time + StdDuration::from_secs(1)).min(ROBOTS_REFRESH);
            self.ipc.send_item(item)?;
        }

        self.page_mgr.put_nblk(page)?;
        if let Some(root_handle) = root_handle.take() {
            self.page_mgr.put_nblk(root_handle)?;
        }
        self.robots_mgr.put_nblk(robots)?;
        Ok(())
    }

    fn crawl(&self, item: &WorkItem, page: &mut Page, root: &str) -> Result<(), CrawlError> {
        let body = self.netio.fetch(item.url())?;
        let tags = self.parser.parse(&body)?;

        page.meta.clear();
        let mut retained_urls = Vec::new();
        for tag in tags {
            match tag.tag_type {
                TagType::Url => {
                    if let Some(url) = sanitize_url(&tag.tag_name, &tag.data, root) {
                        retained_urls.push(url);
                    }
                }
                TagType::Meta => {
                    for token in crate::util::tokenize_whitespace(&tag.data) {
                        page.meta.push(token.to_string());
                    }
                }
                TagType::Title => {
                    if !tag.data.is_empty() {
                        page.title = tag.data;
                    }
                }
                TagType::Description => page.description.push_str(&tag.data),
                TagType::Email | TagType::Image | TagType::Invalid => {}
            }
        }

        page.rank += item.credit();
        page.rank = tax(page.rank, CREDIT_TAX_PERCENT);
        let linked_pages = retained_urls.len() as u32;
        let transfer = if linked_pages == 0 || page.rank == 0 {
            0
        } else {
            page.rank / linked_pages
        };
        page.rank = 0;
        page.crawl_count += 1;
        page.last_crawl = OffsetDateTime::now_utc();
        page.out_links = retained_urls.clone();

        for url in retained_urls {
            self.ipc.send_item(WorkItem::new(url, transfer))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn tax_preserves_integer_division_truncation() {
        assert_eq!(tax(100, 10), 100);
        assert_eq!(tax(100, 100), 0);
    }

    #[test]
    fn root_origin_boundary_cases() {
        assert_eq!(root_origin("http://host"), "http://host");
        assert_eq!(root_origin("https://host/path?q"), "https://host");
    }

    #[test]
    fn sanitize_discards_non_anchor_tags() {
        assert_eq!(sanitize_url("img", "http://x", "http://root"), None);
    }

    #[test]
    fn sanitize_fixes_up_relative_links() {
        assert_eq!(
            sanitize_url("a", "/path", "http://root"),
            Some("http://root/path".to_string())
        );
    }

    #[test]
    fn sanitize_strips_https_to_http() {
        assert_eq!(
            sanitize_url("a", "https://example.com/x", "http://root"),
            Some("http://example.com/x".to_string())
        );
    }
}
