use serde::Serialize;

use crate::models::block::ContentType;
use crate::store::ContentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    Idle,
    Saving,
    Saved,
    Failed,
}

/// Edit session for one text block. Tracks the last persisted value and an
/// in-progress draft; commits only write when the two differ, and a failed
/// write rolls the draft back to the committed value instead of keeping an
/// unpersisted optimistic value.
#[derive(Debug)]
pub struct BlockEditor {
    block_id: String,
    committed: String,
    draft: Option<String>,
    status: SaveStatus,
}

impl BlockEditor {
    /// Resolve the committed value from the store, falling back to the
    /// caller's default when no record exists.
    pub fn load(store: &dyn ContentStore, block_id: &str, default: &str) -> Self {
        let committed = store
            .block_get(block_id)
            .map(|b| b.content)
            .unwrap_or_else(|| default.to_string());

        BlockEditor {
            block_id: block_id.to_string(),
            committed,
            draft: None,
            status: SaveStatus::Idle,
        }
    }

    pub fn begin_edit(&mut self) {
        if self.draft.is_none() {
            self.draft = Some(self.committed.clone());
        }
    }

    pub fn set_draft(&mut self, text: &str) {
        self.draft = Some(text.to_string());
    }

    /// Escape path: drop the draft without writing.
    pub fn cancel(&mut self) {
        self.draft = None;
        self.status = SaveStatus::Idle;
    }

    /// Blur path: persist the draft if it changed. Returns Ok(false) when no
    /// write was needed. On write failure the draft is discarded so the
    /// editor's visible value matches what is actually stored.
    pub fn commit(&mut self, store: &dyn ContentStore) -> Result<bool, String> {
        let draft = match self.draft.take() {
            Some(d) => d,
            None => return Ok(false),
        };

        if draft == self.committed {
            self.status = SaveStatus::Idle;
            return Ok(false);
        }

        self.status = SaveStatus::Saving;
        match store.block_upsert(&self.block_id, &draft, ContentType::Text) {
            Ok(()) => {
                self.committed = draft;
                self.status = SaveStatus::Saved;
                Ok(true)
            }
            Err(e) => {
                self.status = SaveStatus::Failed;
                Err(e)
            }
        }
    }

    /// The value a viewer of this editor sees: the draft while editing,
    /// the committed value otherwise.
    pub fn value(&self) -> &str {
        self.draft.as_deref().unwrap_or(&self.committed)
    }

    pub fn status(&self) -> SaveStatus {
        self.status
    }

    pub fn is_dirty(&self) -> bool {
        self.draft.as_deref().map(|d| d != self.committed).unwrap_or(false)
    }
}
