use chrono::Utc;
use rocket::http::{Cookie, CookieJar, Status};
use rocket::request::{FromRequest, Outcome, Request};
use rocket::State;
use rusqlite::params;
use sha2::{Digest, Sha256};

use crate::db::DbPool;
use crate::session::AdminState;

const SESSION_COOKIE: &str = "clinica_session";

/// Guard that ensures the request is from an authenticated admin.
/// `editing` mirrors the session's preview/editing flag.
pub struct AdminUser {
    pub session_id: String,
    pub editing: bool,
}

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AdminUser {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let pool = match request.guard::<&State<DbPool>>().await {
            Outcome::Success(p) => p,
            _ => return Outcome::Error((Status::Unauthorized, ())),
        };

        let cookies = request.cookies();
        let session_id = match cookies.get_private(SESSION_COOKIE) {
            Some(c) => c.value().to_string(),
            None => return Outcome::Error((Status::Unauthorized, ())),
        };

        match session_editing(pool, &session_id) {
            Some(editing) => Outcome::Success(AdminUser {
                session_id,
                editing,
            }),
            None => {
                cookies.remove_private(Cookie::from(SESSION_COOKIE));
                Outcome::Error((Status::Unauthorized, ()))
            }
        }
    }
}

/// Client address for rate-limit keying. Falls back to "unknown" behind
/// transports that hide the peer address.
pub struct ClientIp(pub String);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for ClientIp {
    type Error = ();

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        let ip = request
            .client_ip()
            .map(|i| i.to_string())
            .unwrap_or_else(|| "unknown".to_string());
        Outcome::Success(ClientIp(ip))
    }
}

pub fn hash_password(password: &str) -> Result<String, String> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST).map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, hash: &str) -> bool {
    bcrypt::verify(password, hash).unwrap_or(false)
}

/// Sessions have no expiry; they end only on explicit logout.
pub fn create_session(pool: &DbPool, editing: bool) -> Result<String, String> {
    let conn = pool.get().map_err(|e| e.to_string())?;

    let session_id = uuid::Uuid::new_v4().to_string();
    let now = Utc::now().naive_utc();

    conn.execute(
        "INSERT INTO sessions (id, editing, created_at) VALUES (?1, ?2, ?3)",
        params![session_id, editing as i64, now],
    )
    .map_err(|e| e.to_string())?;

    Ok(session_id)
}

/// Editing flag for a valid session, `None` for an unknown session id.
pub fn session_editing(pool: &DbPool, session_id: &str) -> Option<bool> {
    let conn = pool.get().ok()?;
    conn.query_row(
        "SELECT editing FROM sessions WHERE id = ?1",
        params![session_id],
        |row| row.get::<_, i64>(0),
    )
    .ok()
    .map(|v| v != 0)
}

/// Fresh-load path: a valid prior session marker restores to preview mode,
/// never mid-edit. The stored editing flag is cleared so later probes agree.
pub fn restore_session(pool: &DbPool, session_id: &str) -> AdminState {
    let state = AdminState::restore(true);
    let _ = set_session_editing(pool, session_id, state.is_editing());
    state
}

pub fn set_session_editing(pool: &DbPool, session_id: &str, editing: bool) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute(
        "UPDATE sessions SET editing = ?1 WHERE id = ?2",
        params![editing as i64, session_id],
    )
    .map_err(|e| e.to_string())?;
    Ok(())
}

pub fn destroy_session(pool: &DbPool, session_id: &str) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])
        .map_err(|e| e.to_string())?;
    Ok(())
}

pub fn set_session_cookie(cookies: &CookieJar<'_>, session_id: &str) {
    let mut cookie = Cookie::new(SESSION_COOKIE, session_id.to_string());
    cookie.set_http_only(true);
    cookie.set_same_site(rocket::http::SameSite::Strict);
    cookie.set_path("/");
    cookies.add_private(cookie);
}

pub fn take_session_cookie(cookies: &CookieJar<'_>) -> Option<String> {
    let value = cookies.get_private(SESSION_COOKIE).map(|c| c.value().to_string());
    cookies.remove_private(Cookie::from(SESSION_COOKIE));
    value
}

pub fn hash_ip(ip: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(ip.as_bytes());
    hex::encode(hasher.finalize())
}
