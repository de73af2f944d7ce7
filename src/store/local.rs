use chrono::Utc;
use rusqlite::params;

use crate::db::DbPool;
use crate::images;
use crate::models::block::{ContentBlock, ContentType};

use super::ContentStore;

/// SQLite-backed fallback store. Used when no remote backend is configured
/// so the editing feature works in a zero-backend deployment.
pub struct LocalStore {
    pool: DbPool,
}

impl LocalStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ContentStore for LocalStore {
    fn configured(&self) -> bool {
        false
    }

    fn block_get(&self, block_id: &str) -> Option<ContentBlock> {
        let conn = self.pool.get().ok()?;
        conn.query_row(
            "SELECT * FROM content_blocks WHERE block_id = ?1",
            params![block_id],
            ContentBlock::from_row,
        )
        .ok()
    }

    fn block_upsert(
        &self,
        block_id: &str,
        content: &str,
        content_type: ContentType,
    ) -> Result<(), String> {
        let conn = self.pool.get().map_err(|e| e.to_string())?;
        let now = Utc::now().naive_utc();
        conn.execute(
            "INSERT INTO content_blocks (block_id, content, content_type, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(block_id) DO UPDATE SET content = ?2, content_type = ?3, updated_at = ?4",
            params![block_id, content, content_type.as_str(), now],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    fn block_delete(&self, block_id: &str) -> Result<(), String> {
        let conn = self.pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "DELETE FROM content_blocks WHERE block_id = ?1",
            params![block_id],
        )
        .map_err(|e| e.to_string())?;
        Ok(())
    }

    /// Local mode has no object store: inline the file as a data URI so the
    /// resulting block content is self-contained.
    fn image_upload(&self, _block_id: &str, bytes: &[u8], ext: &str) -> Result<String, String> {
        Ok(images::data_uri(bytes, ext))
    }
}
