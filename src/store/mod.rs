use std::sync::Arc;

use log::warn;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::models::block::{ContentBlock, ContentType};

pub mod local;
pub mod remote;

/// Unified content-block access. Every block read and write goes through
/// here so callers never branch on which backend is in use.
/// Implementations: `LocalStore` (SQLite) and `RemoteStore` (HTTP backend).
pub trait ContentStore: Send + Sync {
    /// True iff blocks are persisted to the remote backend.
    fn configured(&self) -> bool;

    /// A missing block is `None`, never an error — the expected path for
    /// first-render defaults.
    fn block_get(&self, block_id: &str) -> Option<ContentBlock>;

    /// Idempotent keyed write, last-write-wins. Sets `updated_at`.
    fn block_upsert(
        &self,
        block_id: &str,
        content: &str,
        content_type: ContentType,
    ) -> Result<(), String>;

    fn block_delete(&self, block_id: &str) -> Result<(), String>;

    /// Store image bytes and return a URL usable as block content. The
    /// caller writes the block record afterwards, as a separate step, so an
    /// upload failure never leaves a dangling reference.
    fn image_upload(&self, block_id: &str, bytes: &[u8], ext: &str) -> Result<String, String>;
}

/// Select the store once at startup. Remote when url+key are configured and
/// the client can be built, local otherwise.
pub fn create_store(cfg: &AppConfig, pool: DbPool) -> Arc<dyn ContentStore> {
    if let (Some(url), Some(key)) = (&cfg.backend_url, &cfg.backend_key) {
        match remote::RemoteStore::new(url, key) {
            Ok(rs) => return Arc::new(rs),
            Err(e) => warn!("Remote content backend unavailable ({}), using local store", e),
        }
    }
    Arc::new(local::LocalStore::new(pool))
}
