#[macro_use]
extern crate rocket;

use std::sync::Arc;

use log::info;
use rocket::serde::json::Json;
use serde_json::{json, Value};

mod auth;
mod blocks;
mod boot;
mod config;
mod db;
mod images;
mod models;
mod rate_limit;
mod routes;
mod session;
mod store;
mod tests;

use store::ContentStore;

#[catch(401)]
fn unauthorized() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Authentication required" }))
}

#[catch(404)]
fn not_found() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Not found" }))
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    Json(json!({ "ok": false, "error": "Malformed request body" }))
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let cfg = config::load();

    // Boot check — verify/create directories, validate config presence
    boot::run();

    let pool = db::init_pool().expect("Failed to initialize database pool");
    db::run_migrations(&pool).expect("Failed to run database migrations");
    db::seed_defaults(&pool, &cfg).expect("Failed to seed default settings");

    let content_store: Arc<dyn ContentStore> = store::create_store(&cfg, pool.clone());
    info!(
        "Content backend: {}",
        if content_store.configured() { "remote" } else { "local" }
    );

    // Raise form/file limits above the 5 MB image cap so oversized uploads
    // reach validation and get a proper error message instead of a 413.
    let figment = rocket::Config::figment()
        .merge(("limits.file", "8 MiB"))
        .merge(("limits.data-form", "10 MiB"));

    rocket::custom(figment)
        .manage(pool)
        .manage(cfg)
        .manage(content_store)
        .manage(rate_limit::RateLimiter::new())
        .mount("/api", routes::auth::routes())
        .mount("/api", routes::blocks::routes())
        .mount("/api", routes::api::routes())
        .register("/", catchers![unauthorized, not_found, unprocessable])
}
