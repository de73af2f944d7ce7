use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Comment {
    pub id: i64,
    pub video_id: String,
    pub author_name: String,
    pub body: String,
    pub created_at: NaiveDateTime,
}

impl Comment {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Comment {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            author_name: row.get("author_name")?,
            body: row.get("body")?,
            created_at: row.get("created_at")?,
        })
    }

    /// Comments for a video, newest first. Insertion ids break ties between
    /// comments created within the same second.
    pub fn for_video(pool: &DbPool, video_id: &str) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt = match conn.prepare(
            "SELECT * FROM comments WHERE video_id = ?1 ORDER BY created_at DESC, id DESC",
        ) {
            Ok(s) => s,
            Err(_) => return vec![],
        };
        stmt.query_map(params![video_id], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }

    /// Append a comment and return the updated newest-first list.
    /// An absent or empty author name falls back to "Anonymous".
    pub fn create(
        pool: &DbPool,
        video_id: &str,
        author_name: Option<&str>,
        body: &str,
    ) -> Result<Vec<Self>, String> {
        let author = author_name
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .unwrap_or("Anonymous");

        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO comments (video_id, author_name, body) VALUES (?1, ?2, ?3)",
            params![video_id, author, body],
        )
        .map_err(|e| e.to_string())?;

        Ok(Self::for_video(pool, video_id))
    }
}
