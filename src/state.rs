use std::sync::Arc;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::cache::PageCache;
use crate::config::Config;
use crate::media::DynMediaStore;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub page_cache: Arc<PageCache>,
    pub media: DynMediaStore,
}

impl AppState {
    pub fn new(db: DbPool, config: Config, media: DynMediaStore) -> Self {
        let ttl = std::time::Duration::from_secs(config.cache.index_ttl_secs);
        Self {
            db,
            config,
            page_cache: Arc::new(PageCache::new(ttl)),
            media,
        }
    }
}
