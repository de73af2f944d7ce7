use chrono::NaiveDateTime;
use rusqlite::Row;
use serde::{Deserialize, Serialize};

/// A named, persisted unit of editable content. `content` holds either the
/// text value or an image URL depending on `content_type`.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ContentBlock {
    pub block_id: String,
    pub content: String,
    pub content_type: ContentType,
    pub updated_at: NaiveDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Text,
    Image,
}

impl ContentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentType::Text => "text",
            ContentType::Image => "image",
        }
    }

    /// Unknown values resolve to text, the dominant block kind.
    pub fn parse(s: &str) -> Self {
        match s {
            "image" => ContentType::Image,
            _ => ContentType::Text,
        }
    }
}

impl ContentBlock {
    pub fn from_row(row: &Row) -> rusqlite::Result<Self> {
        let content_type: String = row.get("content_type")?;
        Ok(ContentBlock {
            block_id: row.get("block_id")?,
            content: row.get("content")?,
            content_type: ContentType::parse(&content_type),
            updated_at: row.get("updated_at")?,
        })
    }
}
