use chrono::Utc;
use log::warn;
use serde_json::{json, Value};

use crate::images;
use crate::models::block::{ContentBlock, ContentType};

use super::ContentStore;

/// HTTP client for the remote content backend: a key-value block table plus
/// a public object store for images. The only contract relied upon is
/// upsert idempotency and read-after-write visibility.
pub struct RemoteStore {
    base: String,
    key: String,
    client: reqwest::blocking::Client,
}

impl RemoteStore {
    pub fn new(url: &str, key: &str) -> Result<Self, String> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| format!("HTTP client error: {}", e))?;

        Ok(Self {
            base: url.trim_end_matches('/').to_string(),
            key: key.to_string(),
            client,
        })
    }

    fn block_url(&self, block_id: &str) -> String {
        format!("{}/api/blocks/{}", self.base, block_id)
    }
}

impl ContentStore for RemoteStore {
    fn configured(&self) -> bool {
        true
    }

    fn block_get(&self, block_id: &str) -> Option<ContentBlock> {
        let resp = match self
            .client
            .get(self.block_url(block_id))
            .bearer_auth(&self.key)
            .send()
        {
            Ok(r) => r,
            Err(e) => {
                warn!("Block fetch failed for {}: {}", block_id, e);
                return None;
            }
        };

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return None;
        }
        if !resp.status().is_success() {
            warn!("Backend returned {} fetching block {}", resp.status(), block_id);
            return None;
        }

        resp.json::<ContentBlock>().ok()
    }

    fn block_upsert(
        &self,
        block_id: &str,
        content: &str,
        content_type: ContentType,
    ) -> Result<(), String> {
        let payload = json!({
            "block_id": block_id,
            "content": content,
            "content_type": content_type,
            "updated_at": Utc::now().naive_utc(),
        });

        let resp = self
            .client
            .put(self.block_url(block_id))
            .bearer_auth(&self.key)
            .json(&payload)
            .send()
            .map_err(|e| format!("Block save failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Backend returned {}", resp.status()));
        }
        Ok(())
    }

    fn block_delete(&self, block_id: &str) -> Result<(), String> {
        let resp = self
            .client
            .delete(self.block_url(block_id))
            .bearer_auth(&self.key)
            .send()
            .map_err(|e| format!("Block delete failed: {}", e))?;

        // Deleting an absent block is already the desired end state
        if !resp.status().is_success() && resp.status() != reqwest::StatusCode::NOT_FOUND {
            return Err(format!("Backend returned {}", resp.status()));
        }
        Ok(())
    }

    fn image_upload(&self, block_id: &str, bytes: &[u8], ext: &str) -> Result<String, String> {
        let object = images::object_name(block_id, ext);
        let url = format!("{}/api/storage/images/{}", self.base, object);

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.key)
            .header("content-type", "application/octet-stream")
            .body(bytes.to_vec())
            .send()
            .map_err(|e| format!("Image upload failed: {}", e))?;

        if !resp.status().is_success() {
            return Err(format!("Backend returned {}", resp.status()));
        }

        let body: Value = resp
            .json()
            .map_err(|e| format!("Malformed upload response: {}", e))?;
        body.get("url")
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
            .ok_or_else(|| "Upload response missing public URL".to_string())
    }
}
