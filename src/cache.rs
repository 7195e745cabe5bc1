// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use bytes::Bytes;

use crate::config::CacheConfig;
use crate::error::FetchError;
use crate::events::{EngineEvent, SharedEventSink};
use crate::fetch::Fetcher;
use crate::http::HttpClient;

/// Bounded, expiring cache of raw feed bytes keyed by feed URL.
///
/// Archival consults the feed once per episode; without this cache that
/// would mean one network fetch of the same document per episode. The
/// cache is owned by the orchestrator and lives for one run.
pub struct FeedCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
    max_entries: usize,
    max_bytes: u64,
    tick: u64,
    sink: SharedEventSink,
}

struct CacheEntry {
    content: Bytes,
    fetched_at: Instant,
    last_access: u64,
}

/// Point-in-time cache occupancy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub expired: usize,
    pub size_bytes: u64,
    pub max_entries: usize,
    pub max_bytes: u64,
    pub ttl: Duration,
}

impl FeedCache {
    pub fn new(config: &CacheConfig, sink: SharedEventSink) -> Self {
        Self {
            entries: HashMap::new(),
            ttl: config.ttl,
            max_entries: config.max_entries.max(1),
            max_bytes: config.max_bytes,
            tick: 0,
            sink,
        }
    }

    /// Return the cached content for `url`, fetching it through `fetcher`
    /// on a miss. An entry older than the TTL counts as a miss even if it
    /// has not been purged yet.
    pub async fn get<C: HttpClient>(
        &mut self,
        url: &str,
        fetcher: &Fetcher<C>,
    ) -> Result<Bytes, FetchError> {
        self.tick += 1;
        let tick = self.tick;

        match self.entries.get_mut(url) {
            Some(entry) if entry.fetched_at.elapsed() <= self.ttl => {
                entry.last_access = tick;
                let content = entry.content.clone();
                self.sink.emit(EngineEvent::CacheHit {
                    url: url.to_string(),
                });
                return Ok(content);
            }
            Some(_) => {
                self.sink.emit(EngineEvent::CacheExpired {
                    url: url.to_string(),
                });
            }
            None => {
                self.sink.emit(EngineEvent::CacheMiss {
                    url: url.to_string(),
                });
            }
        }

        let content = fetcher.fetch_bytes(url).await?;
        self.insert(url, content.clone());
        Ok(content)
    }

    /// Insert content for `url`, evicting least-recently-used entries
    /// until both occupancy limits hold.
    pub fn insert(&mut self, url: &str, content: Bytes) {
        self.purge_expired();

        // An entry that alone exceeds the byte budget is served uncached
        if content.len() as u64 > self.max_bytes {
            return;
        }

        self.tick += 1;
        self.entries.insert(
            url.to_string(),
            CacheEntry {
                content,
                fetched_at: Instant::now(),
                last_access: self.tick,
            },
        );

        while self.entries.len() > self.max_entries || self.size_bytes() > self.max_bytes {
            let Some(victim) = self
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.last_access)
                .map(|(url, _)| url.clone())
            else {
                break;
            };
            if let Some(entry) = self.entries.remove(&victim) {
                self.sink.emit(EngineEvent::CacheEvicted {
                    url: victim,
                    size_bytes: entry.content.len(),
                });
            }
        }
    }

    /// Drop the entry for `url`, if present
    pub fn invalidate(&mut self, url: &str) -> bool {
        self.entries.remove(url).is_some()
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn stats(&self) -> CacheStats {
        let expired = self
            .entries
            .values()
            .filter(|entry| entry.fetched_at.elapsed() > self.ttl)
            .count();

        CacheStats {
            entries: self.entries.len(),
            expired,
            size_bytes: self.size_bytes(),
            max_entries: self.max_entries,
            max_bytes: self.max_bytes,
            ttl: self.ttl,
        }
    }

    fn size_bytes(&self) -> u64 {
        self.entries
            .values()
            .map(|entry| entry.content.len() as u64)
            .sum()
    }

    fn purge_expired(&mut self) {
        let ttl = self.ttl;
        self.entries
            .retain(|_, entry| entry.fetched_at.elapsed() <= ttl);
    }
}
