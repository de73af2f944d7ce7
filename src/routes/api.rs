use std::sync::Arc;
use std::time::Duration;

use rocket::http::Status;
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{self, AdminUser, ClientIp};
use crate::db::DbPool;
use crate::models::comment::Comment;
use crate::models::question::Question;
use crate::models::settings::Setting;
use crate::rate_limit::RateLimiter;
use crate::store::ContentStore;

const SUBMIT_WINDOW: Duration = Duration::from_secs(60);

// ── Comments ───────────────────────────────────────────

#[get("/videos/<video_id>/comments")]
pub fn comments_list(pool: &State<DbPool>, video_id: &str) -> Json<Vec<Comment>> {
    Json(Comment::for_video(pool, video_id))
}

#[derive(Debug, Deserialize)]
pub struct CommentSubmit {
    pub author_name: Option<String>,
    pub body: String,
    pub honeypot: Option<String>,
}

#[post("/videos/<video_id>/comments", format = "json", data = "<form>")]
pub fn comment_submit(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    client_ip: ClientIp,
    video_id: &str,
    form: Json<CommentSubmit>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    // Honeypot check — if filled, it's a bot
    if form.honeypot.as_deref().map(|h| !h.is_empty()).unwrap_or(false) {
        return Err(reject(Status::UnprocessableEntity, "Spam detected"));
    }
    if form.body.trim().is_empty() {
        return Err(reject(Status::UnprocessableEntity, "Comment cannot be empty"));
    }

    let rate_key = format!("comment:{}", auth::hash_ip(&client_ip.0));
    let max = Setting::get_i64(pool, "comments_rate_limit").max(1) as u64;
    if !limiter.check_and_record(&rate_key, max, SUBMIT_WINDOW) {
        return Err(reject(
            Status::TooManyRequests,
            "Too many comments, please slow down",
        ));
    }

    let comments = Comment::create(pool, video_id, form.author_name.as_deref(), &form.body)
        .map_err(|e| reject(Status::InternalServerError, &e))?;

    Ok(Json(json!({ "ok": true, "comments": comments })))
}

// ── Questions ──────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct QuestionSubmit {
    pub video_id: String,
    pub video_title: String,
    pub question: String,
    pub honeypot: Option<String>,
}

#[post("/questions", format = "json", data = "<form>")]
pub fn question_submit(
    pool: &State<DbPool>,
    limiter: &State<RateLimiter>,
    client_ip: ClientIp,
    form: Json<QuestionSubmit>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    if form.honeypot.as_deref().map(|h| !h.is_empty()).unwrap_or(false) {
        return Err(reject(Status::UnprocessableEntity, "Spam detected"));
    }
    if form.question.trim().is_empty() {
        return Err(reject(Status::UnprocessableEntity, "Question cannot be empty"));
    }

    let rate_key = format!("question:{}", auth::hash_ip(&client_ip.0));
    let max = Setting::get_i64(pool, "questions_rate_limit").max(1) as u64;
    if !limiter.check_and_record(&rate_key, max, SUBMIT_WINDOW) {
        return Err(reject(
            Status::TooManyRequests,
            "Too many questions, please slow down",
        ));
    }

    let question = Question::create(pool, &form.video_id, &form.video_title, &form.question)
        .map_err(|e| reject(Status::InternalServerError, &e))?;

    Ok(Json(json!({ "ok": true, "question": question })))
}

/// Admin-facing inbox read path.
#[get("/questions")]
pub fn questions_list(_admin: AdminUser, pool: &State<DbPool>) -> Json<Vec<Question>> {
    Json(Question::list(pool))
}

// ── Health ─────────────────────────────────────────────

#[get("/health")]
pub fn health(
    pool: &State<DbPool>,
    store: &State<Arc<dyn ContentStore>>,
) -> Json<Value> {
    let db_ok = pool.get().is_ok();
    Json(json!({
        "status": if db_ok { "ok" } else { "degraded" },
        "backend": if store.configured() { "remote" } else { "local" },
    }))
}

fn reject(status: Status, message: &str) -> Custom<Json<Value>> {
    Custom(status, Json(json!({ "ok": false, "error": message })))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![
        comments_list,
        comment_submit,
        question_submit,
        questions_list,
        health
    ]
}
