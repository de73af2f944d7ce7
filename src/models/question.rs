use chrono::NaiveDateTime;
use rusqlite::{params, Row};
use serde::{Deserialize, Serialize};

use crate::db::DbPool;

/// A patient question submitted from a video page. Status is always
/// "Pending" on creation; the inbox is read-only beyond that.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Question {
    pub id: i64,
    pub video_id: String,
    pub video_title: String,
    pub body: String,
    pub status: String,
    pub created_at: NaiveDateTime,
}

impl Question {
    fn from_row(row: &Row) -> rusqlite::Result<Self> {
        Ok(Question {
            id: row.get("id")?,
            video_id: row.get("video_id")?,
            video_title: row.get("video_title")?,
            body: row.get("body")?,
            status: row.get("status")?,
            created_at: row.get("created_at")?,
        })
    }

    pub fn create(
        pool: &DbPool,
        video_id: &str,
        video_title: &str,
        body: &str,
    ) -> Result<Self, String> {
        let conn = pool.get().map_err(|e| e.to_string())?;
        conn.execute(
            "INSERT INTO questions (video_id, video_title, body) VALUES (?1, ?2, ?3)",
            params![video_id, video_title, body],
        )
        .map_err(|e| e.to_string())?;

        let id = conn.last_insert_rowid();
        conn.query_row(
            "SELECT * FROM questions WHERE id = ?1",
            params![id],
            Self::from_row,
        )
        .map_err(|e| e.to_string())
    }

    /// Global question inbox, newest first.
    pub fn list(pool: &DbPool) -> Vec<Self> {
        let conn = match pool.get() {
            Ok(c) => c,
            Err(_) => return vec![],
        };
        let mut stmt =
            match conn.prepare("SELECT * FROM questions ORDER BY created_at DESC, id DESC") {
                Ok(s) => s,
                Err(_) => return vec![],
            };
        stmt.query_map([], Self::from_row)
            .map(|rows| rows.filter_map(|r| r.ok()).collect())
            .unwrap_or_default()
    }
}
