//! Timed response cache for listing pages.
//!
//! Entries are keyed by request target (path + query), so each page of a
//! listing is cached separately. An entry is served until its timeout
//! passes, even if the rows behind it changed. Writers that must be seen at
//! once call [`PageCache::clear`].
//!
//! The number of entries is capped: when a new key arrives at a full cache,
//! the entry closest to expiry (the oldest one) is evicted.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use crate::response::Response;

pub struct PageCache {
    ttl: Duration,
    max_entries: usize,
    entries: Mutex<HashMap<String, Entry>>,
}

struct Entry {
    expires_at: Instant,
    response: Response,
}

impl PageCache {
    /// A cache holding at most `max_entries` pages, each for `ttl`.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self { ttl, max_entries, entries: Mutex::new(HashMap::new()) }
    }

    // A panic elsewhere cannot leave an entry half-written, so a poisoned
    // map is still usable.
    fn entries(&self) -> MutexGuard<'_, HashMap<String, Entry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The cached response for `key`, if still fresh.
    pub fn get(&self, key: &str) -> Option<Response> {
        let entries = self.entries();
        let entry = entries.get(key)?;
        if Instant::now() >= entry.expires_at {
            return None;
        }
        debug!(%key, "page cache hit");
        Some(entry.response.clone())
    }

    /// Stores `response` under `key` for one timeout. Expired entries are
    /// dropped on the way, then the oldest ones while the cache is full.
    pub fn insert(&self, key: String, response: Response) {
        if self.max_entries == 0 {
            return;
        }
        let now = Instant::now();
        let mut entries = self.entries();
        entries.retain(|_, e| e.expires_at > now);
        while entries.len() >= self.max_entries && !entries.contains_key(&key) {
            let Some(oldest) = entries
                .iter()
                .min_by_key(|(_, e)| e.expires_at)
                .map(|(k, _)| k.clone())
            else {
                break;
            };
            debug!(key = %oldest, "page cache full, evicting");
            entries.remove(&oldest);
        }
        entries.insert(key, Entry { expires_at: now + self.ttl, response });
    }

    pub fn clear(&self) {
        let mut entries = self.entries();
        if !entries.is_empty() {
            debug!(entries = entries.len(), "page cache cleared");
        }
        entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
