use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Key namespace for rendered index pages.
pub const INDEX_PAGE_PREFIX: &str = "index_page";

struct CachedPage {
    body: String,
    expires_at: Instant,
}

/// Time-boxed store of rendered pages.
///
/// Entries are never invalidated by writes: a page rendered inside the TTL
/// window is served as-is until it expires or [`PageCache::clear`] runs.
pub struct PageCache {
    ttl: Duration,
    entries: Mutex<HashMap<String, CachedPage>>,
}

impl PageCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cache key for one page of a view as seen by `viewer` (`None` when anonymous).
    pub fn key(prefix: &str, viewer: Option<i64>, page: usize) -> String {
        match viewer {
            Some(id) => format!("{}:{}:{}", prefix, id, page),
            None => format!("{}:anon:{}", prefix, page),
        }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        self.get_at(key, Instant::now()).await
    }

    pub async fn get_at(&self, key: &str, now: Instant) -> Option<String> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if now < entry.expires_at => Some(entry.body.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Store a rendering. Last writer for a key wins.
    pub async fn insert(&self, key: String, body: String) {
        self.insert_at(key, body, Instant::now()).await
    }

    pub async fn insert_at(&self, key: String, body: String, now: Instant) {
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| now < entry.expires_at);
        entries.insert(
            key,
            CachedPage {
                body,
                expires_at: now + self.ttl,
            },
        );
    }

    /// Drop everything so the next request renders fresh.
    pub async fn clear(&self) {
        self.entries.lock().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }
}
