use rocket::http::{CookieJar, Status};
use rocket::response::status::Custom;
use rocket::serde::json::Json;
use rocket::State;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{self, AdminUser};
use crate::db::DbPool;
use crate::models::settings::Setting;
use crate::session::AdminState;

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

#[post("/login", format = "json", data = "<form>")]
pub fn login(
    form: Json<LoginRequest>,
    pool: &State<DbPool>,
    cookies: &CookieJar<'_>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let stored_hash = Setting::get(pool, "admin_password_hash").unwrap_or_default();

    let state = AdminState::Anonymous
        .login(&form.password, &stored_hash)
        .map_err(|_| {
            Custom(
                Status::Unauthorized,
                Json(json!({ "ok": false, "error": "Invalid password" })),
            )
        })?;

    let session_id = auth::create_session(pool, state.is_editing()).map_err(|e| {
        Custom(
            Status::InternalServerError,
            Json(json!({ "ok": false, "error": e })),
        )
    })?;
    auth::set_session_cookie(cookies, &session_id);

    Ok(Json(json!({
        "ok": true,
        "state": state,
        "is_admin": state.is_admin(),
        "is_editing": state.is_editing(),
    })))
}

/// Logout always lands in the anonymous state, whether or not the cookie
/// still maps to a live session.
#[post("/logout")]
pub fn logout(pool: &State<DbPool>, cookies: &CookieJar<'_>) -> Json<Value> {
    if let Some(session_id) = auth::take_session_cookie(cookies) {
        let _ = auth::destroy_session(pool, &session_id);
    }

    let state = AdminState::Anonymous;
    Json(json!({
        "ok": true,
        "state": state,
        "is_admin": state.is_admin(),
        "is_editing": state.is_editing(),
    }))
}

#[post("/session/toggle-editing")]
pub fn toggle_editing(
    admin: AdminUser,
    pool: &State<DbPool>,
) -> Result<Json<Value>, Custom<Json<Value>>> {
    let next = AdminState::from_session(admin.editing).toggle_editing();

    auth::set_session_editing(pool, &admin.session_id, next.is_editing()).map_err(|e| {
        Custom(
            Status::InternalServerError,
            Json(json!({ "ok": false, "error": e })),
        )
    })?;

    Ok(Json(json!({
        "ok": true,
        "state": next,
        "is_admin": next.is_admin(),
        "is_editing": next.is_editing(),
    })))
}

/// Session probe for the frontend gate: which mode should the page render
/// in. A fresh page load passes `restore`, and a prior session comes back in
/// preview mode rather than mid-edit.
#[get("/session?<restore>")]
pub fn session_state(
    admin: Option<AdminUser>,
    pool: &State<DbPool>,
    restore: Option<bool>,
) -> Json<Value> {
    let state = match admin {
        Some(a) if restore.unwrap_or(false) => auth::restore_session(pool, &a.session_id),
        Some(a) => AdminState::from_session(a.editing),
        None => AdminState::Anonymous,
    };

    Json(json!({
        "state": state,
        "is_admin": state.is_admin(),
        "is_editing": state.is_editing(),
    }))
}

pub fn routes() -> Vec<rocket::Route> {
    routes![login, logout, toggle_editing, session_state]
}
