use std::sync::Arc;

use rocket::form::Form;
use rocket::fs::TempFile;
use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::AdminUser;
use crate::blocks::BlockEditor;
use crate::db::DbPool;
use crate::images;
use crate::models::block::{ContentBlock, ContentType};
use crate::models::settings::Setting;
use crate::store::ContentStore;

// ── Read (public — blocks resolve the same for all viewers) ─────

#[get("/blocks/<block_id>")]
pub fn block_get(
    store: &State<Arc<dyn ContentStore>>,
    block_id: &str,
) -> Result<Json<ContentBlock>, Status> {
    let s: &dyn ContentStore = &**store.inner();
    s.block_get(block_id).map(Json).ok_or(Status::NotFound)
}

// ── Text save ───────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct BlockUpdate {
    pub content: String,
}

#[put("/blocks/<block_id>", format = "json", data = "<form>")]
pub fn block_update(
    _admin: AdminUser,
    store: &State<Arc<dyn ContentStore>>,
    block_id: &str,
    form: Json<BlockUpdate>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let s: &dyn ContentStore = &**store.inner();

    let mut editor = BlockEditor::load(s, block_id, "");
    editor.begin_edit();
    editor.set_draft(&form.content);

    match editor.commit(s) {
        Ok(saved) => Ok(Json(json!({
            "ok": true,
            "saved": saved,
            "status": editor.status(),
            "content": editor.value(),
        }))),
        Err(e) => Err(Custom(
            Status::InternalServerError,
            Json(json!({
                "ok": false,
                "status": editor.status(),
                "content": editor.value(),
                "error": e,
            })),
        )),
    }
}

// ── Remove ──────────────────────────────────────────────────────

/// Deletes the block record only; an uploaded remote object is left behind
/// (accepted leak).
#[delete("/blocks/<block_id>")]
pub fn block_delete(
    _admin: AdminUser,
    store: &State<Arc<dyn ContentStore>>,
    block_id: &str,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let s: &dyn ContentStore = &**store.inner();
    match s.block_delete(block_id) {
        Ok(()) => Ok(Json(json!({ "ok": true }))),
        Err(e) => Err(Custom(
            Status::InternalServerError,
            Json(json!({ "ok": false, "error": e })),
        )),
    }
}

// ── Image upload ────────────────────────────────────────────────

#[derive(FromForm)]
pub struct ImageUpload<'f> {
    pub file: TempFile<'f>,
}

#[post("/blocks/<block_id>/image", data = "<form>")]
pub async fn block_image_upload(
    _admin: AdminUser,
    pool: &State<DbPool>,
    store: &State<Arc<dyn ContentStore>>,
    block_id: &str,
    mut form: Form<ImageUpload<'_>>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let ext = file_extension(&form.file);

    // Spool the upload to disk so it can be read back as a byte buffer
    let tmp_path =
        std::env::temp_dir().join(format!("clinica_upload_{}", uuid::Uuid::new_v4()));
    if let Err(e) = form.file.persist_to(&tmp_path).await {
        return Err(Custom(
            Status::InternalServerError,
            Json(json!({ "ok": false, "error": format!("Failed to read upload: {}", e) })),
        ));
    }
    let bytes = std::fs::read(&tmp_path).map_err(|e| {
        Custom(
            Status::InternalServerError,
            Json(json!({ "ok": false, "error": format!("Failed to read upload: {}", e) })),
        )
    })?;
    let _ = std::fs::remove_file(&tmp_path);

    let max_mb = match Setting::get_i64(pool, "images_max_upload_mb") {
        0 => images::DEFAULT_MAX_UPLOAD_MB,
        n => n,
    };
    let allowed = Setting::get_or(pool, "images_allowed_types", "jpg,jpeg,png,gif,webp");

    // Validation failures never reach the store
    images::validate_upload(&bytes, &ext, &allowed, max_mb as usize * 1_048_576).map_err(|e| {
        Custom(
            Status::UnprocessableEntity,
            Json(json!({ "ok": false, "error": e })),
        )
    })?;

    let s: &dyn ContentStore = &**store.inner();

    // Upload first, record second: a failure here leaves at worst an
    // orphaned object, never a block pointing at a missing image.
    let url = s.image_upload(block_id, &bytes, &ext).map_err(|e| {
        Custom(
            Status::InternalServerError,
            Json(json!({ "ok": false, "error": e })),
        )
    })?;

    s.block_upsert(block_id, &url, ContentType::Image).map_err(|e| {
        Custom(
            Status::InternalServerError,
            Json(json!({ "ok": false, "error": e })),
        )
    })?;

    Ok(Json(json!({ "ok": true, "url": url })))
}

/// Extension from the content type first, then the original filename.
fn file_extension(file: &TempFile<'_>) -> String {
    file.content_type()
        .and_then(|ct| ct.extension())
        .map(|e| e.to_string())
        .or_else(|| {
            file.raw_name().and_then(|rn| {
                let s = rn.dangerous_unsafe_unsanitized_raw().as_str().to_string();
                s.rsplit('.').next().map(|e| e.to_lowercase())
            })
        })
        .unwrap_or_else(|| "jpg".to_string())
}

pub fn routes() -> Vec<rocket::Route> {
    routes![block_get, block_update, block_delete, block_image_upload]
}
