use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

use crate::config::AppConfig;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn init_pool() -> Result<DbPool, String> {
    init_pool_at("site/db/clinica.db")
}

pub fn init_pool_at(path: &str) -> Result<DbPool, String> {
    let manager = SqliteConnectionManager::file(path);
    let pool = Pool::builder()
        .max_size(10)
        .build(manager)
        .map_err(|e| e.to_string())?;

    // Enable WAL mode for better concurrent read performance
    let conn = pool.get().map_err(|e| e.to_string())?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
        .map_err(|e| e.to_string())?;

    Ok(pool)
}

pub fn run_migrations(pool: &DbPool) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;

    conn.execute_batch(
        "
        -- Editable content blocks, one row per block id (upsert semantics)
        CREATE TABLE IF NOT EXISTS content_blocks (
            block_id TEXT PRIMARY KEY,
            content TEXT NOT NULL,
            content_type TEXT NOT NULL DEFAULT 'text',
            updated_at DATETIME NOT NULL
        );

        -- Per-video comment log (append-only)
        CREATE TABLE IF NOT EXISTS comments (
            id INTEGER PRIMARY KEY,
            video_id TEXT NOT NULL,
            author_name TEXT NOT NULL DEFAULT 'Anonymous',
            body TEXT NOT NULL,
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        CREATE INDEX IF NOT EXISTS idx_comments_video ON comments(video_id);

        -- Patient question inbox (append-only, global)
        CREATE TABLE IF NOT EXISTS questions (
            id INTEGER PRIMARY KEY,
            video_id TEXT NOT NULL,
            video_title TEXT NOT NULL,
            body TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'Pending',
            created_at DATETIME DEFAULT CURRENT_TIMESTAMP
        );

        -- Admin sessions. No expiry column: sessions end on explicit logout.
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            editing INTEGER NOT NULL DEFAULT 1,
            created_at DATETIME NOT NULL
        );

        -- Settings (key-value)
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT
        );
        ",
    )
    .map_err(|e| e.to_string())?;

    Ok(())
}

pub fn seed_defaults(pool: &DbPool, cfg: &AppConfig) -> Result<(), String> {
    let conn = pool.get().map_err(|e| e.to_string())?;

    let defaults = vec![
        ("site_name", "Clinica"),
        ("site_url", "http://localhost:8000"),
        // Images
        ("images_max_upload_mb", "5"),
        ("images_allowed_types", "jpg,jpeg,png,gif,webp"),
        // Submission rate limits (per client, per minute)
        ("comments_rate_limit", "5"),
        ("questions_rate_limit", "3"),
    ];

    for (key, value) in defaults {
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES (?1, ?2)",
            params![key, value],
        )
        .map_err(|e| e.to_string())?;
    }

    // Seed the admin password hash, and re-seed it when the configured
    // password no longer matches the stored hash.
    let stored: Option<String> = conn
        .query_row(
            "SELECT value FROM settings WHERE key = 'admin_password_hash'",
            [],
            |row| row.get(0),
        )
        .ok();

    let up_to_date = stored
        .as_deref()
        .map(|h| crate::auth::verify_password(&cfg.admin_password, h))
        .unwrap_or(false);

    if !up_to_date {
        let hash = crate::auth::hash_password(&cfg.admin_password)?;
        conn.execute(
            "INSERT INTO settings (key, value) VALUES ('admin_password_hash', ?1)
             ON CONFLICT(key) DO UPDATE SET value = ?1",
            params![hash],
        )
        .map_err(|e| e.to_string())?;
    }

    Ok(())
}
