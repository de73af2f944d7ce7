#![cfg(test)]

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth;
use crate::blocks::{BlockEditor, SaveStatus};
use crate::config::{self, AppConfig};
use crate::db::{run_migrations, seed_defaults, DbPool};
use crate::images;
use crate::models::block::{ContentBlock, ContentType};
use crate::models::comment::Comment;
use crate::models::question::Question;
use crate::models::settings::Setting;
use crate::rate_limit::RateLimiter;
use crate::session::AdminState;
use crate::store::local::LocalStore;
use crate::store::ContentStore;

/// Atomic counter for unique shared-cache DB names so parallel tests don't collide.
static TEST_DB_COUNTER: AtomicU64 = AtomicU64::new(0);

const TEST_PASSWORD: &str = "admin123";

fn test_config() -> AppConfig {
    AppConfig {
        backend_url: None,
        backend_key: None,
        admin_password: TEST_PASSWORD.to_string(),
    }
}

/// Fast bcrypt hash for tests (cost=4 instead of DEFAULT_COST=12).
fn fast_hash(password: &str) -> String {
    bcrypt::hash(password, 4).unwrap()
}

/// Create a fresh in-memory SQLite pool with migrations + seed defaults.
/// Uses a named shared-cache in-memory DB so multiple connections see the
/// same data. Pre-seeds admin_password_hash with a fast bcrypt hash so
/// seed_defaults skips the expensive DEFAULT_COST hash.
fn test_pool() -> DbPool {
    let id = TEST_DB_COUNTER.fetch_add(1, Ordering::SeqCst);
    let uri = format!("file:testdb_{}?mode=memory&cache=shared", id);
    let manager = SqliteConnectionManager::file(uri);
    let pool = Pool::builder()
        .max_size(2)
        .build(manager)
        .expect("Failed to create test pool");
    run_migrations(&pool).expect("Failed to run migrations");
    {
        let conn = pool.get().unwrap();
        conn.execute(
            "INSERT OR IGNORE INTO settings (key, value) VALUES ('admin_password_hash', ?1)",
            rusqlite::params![fast_hash(TEST_PASSWORD)],
        )
        .unwrap();
    }
    seed_defaults(&pool, &test_config()).expect("Failed to seed defaults");
    pool
}

fn local_store() -> LocalStore {
    LocalStore::new(test_pool())
}

fn png_bytes() -> Vec<u8> {
    let img = image::RgbaImage::new(8, 8);
    let mut cursor = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut cursor, image::ImageFormat::Png)
        .unwrap();
    cursor.into_inner()
}

/// Store wrapper that counts writes, for the zero-writes-on-unchanged-blur
/// property.
struct CountingStore {
    inner: LocalStore,
    writes: AtomicUsize,
}

impl CountingStore {
    fn new() -> Self {
        CountingStore {
            inner: local_store(),
            writes: AtomicUsize::new(0),
        }
    }

    fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl ContentStore for CountingStore {
    fn configured(&self) -> bool {
        false
    }

    fn block_get(&self, block_id: &str) -> Option<ContentBlock> {
        self.inner.block_get(block_id)
    }

    fn block_upsert(
        &self,
        block_id: &str,
        content: &str,
        content_type: ContentType,
    ) -> Result<(), String> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.block_upsert(block_id, content, content_type)
    }

    fn block_delete(&self, block_id: &str) -> Result<(), String> {
        self.inner.block_delete(block_id)
    }

    fn image_upload(&self, block_id: &str, bytes: &[u8], ext: &str) -> Result<String, String> {
        self.inner.image_upload(block_id, bytes, ext)
    }
}

/// Store whose writes always fail, for the rollback-on-failure property.
struct FailingStore;

impl ContentStore for FailingStore {
    fn configured(&self) -> bool {
        false
    }

    fn block_get(&self, _block_id: &str) -> Option<ContentBlock> {
        None
    }

    fn block_upsert(&self, _: &str, _: &str, _: ContentType) -> Result<(), String> {
        Err("backend write failed".to_string())
    }

    fn block_delete(&self, _block_id: &str) -> Result<(), String> {
        Err("backend write failed".to_string())
    }

    fn image_upload(&self, _: &str, _: &[u8], _: &str) -> Result<String, String> {
        Err("backend write failed".to_string())
    }
}

// ═══════════════════════════════════════════════════════════
// Settings
// ═══════════════════════════════════════════════════════════

#[test]
fn settings_set_and_get() {
    let pool = test_pool();
    Setting::set(&pool, "test_key", "hello").unwrap();
    assert_eq!(Setting::get(&pool, "test_key"), Some("hello".to_string()));
}

#[test]
fn settings_get_or_default() {
    let pool = test_pool();
    assert_eq!(Setting::get_or(&pool, "nonexistent", "fallback"), "fallback");
    Setting::set(&pool, "exists", "val").unwrap();
    assert_eq!(Setting::get_or(&pool, "exists", "fallback"), "val");
}

#[test]
fn settings_upsert_overwrites() {
    let pool = test_pool();
    Setting::set(&pool, "key", "first").unwrap();
    Setting::set(&pool, "key", "second").unwrap();
    assert_eq!(Setting::get(&pool, "key"), Some("second".to_string()));
}

#[test]
fn settings_seeded_defaults() {
    let pool = test_pool();
    assert_eq!(Setting::get_i64(&pool, "images_max_upload_mb"), 5);
    assert!(Setting::get(&pool, "admin_password_hash").is_some());
}

// ═══════════════════════════════════════════════════════════
// Content blocks (local store)
// ═══════════════════════════════════════════════════════════

#[test]
fn block_read_after_write() {
    let store = local_store();
    store
        .block_upsert("home-hero-title", "Welcome", ContentType::Text)
        .unwrap();
    let block = store.block_get("home-hero-title").unwrap();
    assert_eq!(block.content, "Welcome");
    assert_eq!(block.content_type, ContentType::Text);
    assert_eq!(block.block_id, "home-hero-title");
}

#[test]
fn block_missing_is_none() {
    let store = local_store();
    assert!(store.block_get("never-written").is_none());
}

#[test]
fn block_upsert_idempotent() {
    let store = local_store();
    store.block_upsert("faq-intro", "Same text", ContentType::Text).unwrap();
    store.block_upsert("faq-intro", "Same text", ContentType::Text).unwrap();
    assert_eq!(store.block_get("faq-intro").unwrap().content, "Same text");
}

#[test]
fn block_last_write_wins() {
    let store = local_store();
    store.block_upsert("bio", "first", ContentType::Text).unwrap();
    let first = store.block_get("bio").unwrap();
    store.block_upsert("bio", "second", ContentType::Text).unwrap();
    let second = store.block_get("bio").unwrap();
    assert_eq!(second.content, "second");
    assert!(second.updated_at >= first.updated_at);
}

#[test]
fn block_delete_removes_record() {
    let store = local_store();
    store.block_upsert("temp", "x", ContentType::Text).unwrap();
    store.block_delete("temp").unwrap();
    assert!(store.block_get("temp").is_none());
}

#[test]
fn block_delete_missing_is_ok() {
    let store = local_store();
    assert!(store.block_delete("never-existed").is_ok());
}

#[test]
fn local_store_reports_unconfigured() {
    assert!(!local_store().configured());
}

#[test]
fn local_image_upload_inlines_data_uri() {
    let store = local_store();
    let url = store.image_upload("hero-img", &png_bytes(), "png").unwrap();
    assert!(url.starts_with("data:image/png;base64,"));
}

#[test]
fn content_type_string_roundtrip() {
    assert_eq!(ContentType::parse("image"), ContentType::Image);
    assert_eq!(ContentType::parse("text"), ContentType::Text);
    assert_eq!(ContentType::parse("garbage"), ContentType::Text);
    assert_eq!(ContentType::Image.as_str(), "image");
}

// ═══════════════════════════════════════════════════════════
// Config
// ═══════════════════════════════════════════════════════════

#[test]
fn config_defaults_to_local_mode() {
    let cfg = config::resolve(Default::default(), None, None, None);
    assert!(!cfg.remote_configured());
    assert_eq!(cfg.admin_password, "admin123");
}

#[test]
fn config_env_enables_remote_mode() {
    let cfg = config::resolve(
        Default::default(),
        Some("https://content.example.com".to_string()),
        Some("secret-key".to_string()),
        Some("hunter2".to_string()),
    );
    assert!(cfg.remote_configured());
    assert_eq!(cfg.admin_password, "hunter2");
}

#[test]
fn config_invalid_url_disables_remote() {
    let cfg = config::resolve(
        Default::default(),
        Some("not a url".to_string()),
        Some("secret-key".to_string()),
        None,
    );
    assert!(!cfg.remote_configured());
}

#[test]
fn config_key_alone_is_not_remote() {
    let cfg = config::resolve(Default::default(), None, Some("key".to_string()), None);
    assert!(!cfg.remote_configured());
}

#[test]
fn config_file_parsing() {
    let file: config::FileConfig = toml::from_str(
        r#"
        [backend]
        url = "https://backend.example.com"
        key = "abc"

        [admin]
        password = "s3cret"
        "#,
    )
    .unwrap();
    let cfg = config::resolve(file, None, None, None);
    assert!(cfg.remote_configured());
    assert_eq!(cfg.admin_password, "s3cret");
}

// ═══════════════════════════════════════════════════════════
// Admin session state machine
// ═══════════════════════════════════════════════════════════

#[test]
fn login_correct_password_enters_editing() {
    let hash = fast_hash("letmein");
    let state = AdminState::Anonymous.login("letmein", &hash).unwrap();
    assert_eq!(state, AdminState::Editing);
    assert!(state.is_admin());
    assert!(state.is_editing());
}

#[test]
fn login_wrong_password_leaves_state_unchanged() {
    let hash = fast_hash("letmein");
    let result = AdminState::Anonymous.login("wrong", &hash);
    assert_eq!(result, Err(AdminState::Anonymous));
}

#[test]
fn logout_from_any_state_is_anonymous() {
    assert_eq!(AdminState::Editing.logout(), AdminState::Anonymous);
    assert_eq!(AdminState::Preview.logout(), AdminState::Anonymous);
    assert_eq!(AdminState::Anonymous.logout(), AdminState::Anonymous);
}

#[test]
fn toggle_editing_flips_between_preview_and_editing() {
    assert_eq!(AdminState::Preview.toggle_editing(), AdminState::Editing);
    assert_eq!(AdminState::Editing.toggle_editing(), AdminState::Preview);
    assert_eq!(AdminState::Anonymous.toggle_editing(), AdminState::Anonymous);
}

#[test]
fn restore_lands_in_preview() {
    assert_eq!(AdminState::restore(true), AdminState::Preview);
    assert_eq!(AdminState::restore(false), AdminState::Anonymous);
}

// ═══════════════════════════════════════════════════════════
// Persisted sessions
// ═══════════════════════════════════════════════════════════

#[test]
fn session_marker_persisted_on_login() {
    let pool = test_pool();
    let hash = Setting::get(&pool, "admin_password_hash").unwrap();
    let state = AdminState::Anonymous.login(TEST_PASSWORD, &hash).unwrap();

    let sid = auth::create_session(&pool, state.is_editing()).unwrap();
    assert_eq!(auth::session_editing(&pool, &sid), Some(true));
}

#[test]
fn session_editing_flag_toggles() {
    let pool = test_pool();
    let sid = auth::create_session(&pool, true).unwrap();

    let next = AdminState::from_session(true).toggle_editing();
    auth::set_session_editing(&pool, &sid, next.is_editing()).unwrap();
    assert_eq!(auth::session_editing(&pool, &sid), Some(false));
}

#[test]
fn logout_clears_session_marker() {
    let pool = test_pool();
    let sid = auth::create_session(&pool, true).unwrap();
    auth::destroy_session(&pool, &sid).unwrap();
    assert_eq!(auth::session_editing(&pool, &sid), None);
}

#[test]
fn fresh_load_restores_session_to_preview() {
    let pool = test_pool();
    // session left mid-edit by a previous visit
    let sid = auth::create_session(&pool, true).unwrap();

    let state = auth::restore_session(&pool, &sid);
    assert_eq!(state, AdminState::Preview);
    // the stored flag agrees with the restored state
    assert_eq!(auth::session_editing(&pool, &sid), Some(false));

    // toggling after restore re-enters editing mode
    let next = AdminState::from_session(false).toggle_editing();
    auth::set_session_editing(&pool, &sid, next.is_editing()).unwrap();
    assert_eq!(auth::session_editing(&pool, &sid), Some(true));
}

#[test]
fn unknown_session_is_invalid() {
    let pool = test_pool();
    assert_eq!(auth::session_editing(&pool, "no-such-session"), None);
}

// ═══════════════════════════════════════════════════════════
// Block editor
// ═══════════════════════════════════════════════════════════

#[test]
fn editor_resolves_default_for_missing_block() {
    let store = local_store();
    let editor = BlockEditor::load(&store, "unwritten", "Default copy");
    assert_eq!(editor.value(), "Default copy");
}

#[test]
fn editor_resolves_stored_value_over_default() {
    let store = local_store();
    store.block_upsert("greeting", "Stored", ContentType::Text).unwrap();
    let editor = BlockEditor::load(&store, "greeting", "Default");
    assert_eq!(editor.value(), "Stored");
}

#[test]
fn editor_commit_persists_changed_draft() {
    let store = local_store();
    let mut editor = BlockEditor::load(&store, "services-intro", "Old");
    editor.begin_edit();
    editor.set_draft("New");
    assert!(editor.is_dirty());

    assert_eq!(editor.commit(&store), Ok(true));
    assert_eq!(editor.status(), SaveStatus::Saved);
    assert_eq!(editor.value(), "New");
    assert_eq!(store.block_get("services-intro").unwrap().content, "New");
}

#[test]
fn editor_unchanged_blur_writes_nothing() {
    let store = CountingStore::new();
    let mut editor = BlockEditor::load(&store, "untouched", "Same");
    editor.begin_edit();
    // blur without any change
    assert_eq!(editor.commit(&store), Ok(false));
    assert_eq!(store.write_count(), 0);

    // typing the identical value back also writes nothing
    editor.begin_edit();
    editor.set_draft("Same");
    assert_eq!(editor.commit(&store), Ok(false));
    assert_eq!(store.write_count(), 0);
}

#[test]
fn editor_cancel_reverts_without_writing() {
    let store = CountingStore::new();
    let mut editor = BlockEditor::load(&store, "bio", "Original");
    editor.begin_edit();
    editor.set_draft("Half-typed edi");
    editor.cancel();

    assert_eq!(editor.value(), "Original");
    assert!(!editor.is_dirty());
    assert_eq!(editor.commit(&store), Ok(false));
    assert_eq!(store.write_count(), 0);
}

#[test]
fn editor_rolls_back_draft_on_write_failure() {
    let store = FailingStore;
    let mut editor = BlockEditor::load(&store, "hero", "Committed");
    editor.begin_edit();
    editor.set_draft("Never persisted");

    let result = editor.commit(&store);
    assert!(result.is_err());
    assert_eq!(editor.status(), SaveStatus::Failed);
    // the visible value matches what is actually stored
    assert_eq!(editor.value(), "Committed");
}

#[test]
fn editor_edit_scenario_end_to_end() {
    let store = local_store();

    // Admin edits the default "Precision." to "Excellence." and blurs
    let mut editor = BlockEditor::load(&store, "home-hero-word1", "Precision.");
    assert_eq!(editor.value(), "Precision.");
    editor.begin_edit();
    editor.set_draft("Excellence.");
    assert_eq!(editor.commit(&store), Ok(true));

    assert_eq!(
        store.block_get("home-hero-word1").unwrap().content,
        "Excellence."
    );

    // A subsequent anonymous visitor resolves the stored value, not the default
    let visitor = BlockEditor::load(&store, "home-hero-word1", "Precision.");
    assert_eq!(visitor.value(), "Excellence.");
}

// ═══════════════════════════════════════════════════════════
// Image validation and upload
// ═══════════════════════════════════════════════════════════

#[test]
fn oversized_image_rejected_before_store() {
    let six_mb = vec![0u8; 6 * 1_048_576];
    let err = images::validate_upload(&six_mb, "png", "jpg,jpeg,png,gif,webp", 5 * 1_048_576)
        .unwrap_err();
    assert!(err.contains("less than 5 MB"));
}

#[test]
fn valid_png_accepted_and_recorded_as_image() {
    let store = local_store();
    let bytes = png_bytes();
    images::validate_upload(&bytes, "png", "jpg,jpeg,png,gif,webp", 5 * 1_048_576).unwrap();

    let url = store.image_upload("doctor-portrait", &bytes, "png").unwrap();
    store.block_upsert("doctor-portrait", &url, ContentType::Image).unwrap();

    let block = store.block_get("doctor-portrait").unwrap();
    assert_eq!(block.content_type, ContentType::Image);
    assert_eq!(block.content, url);
}

#[test]
fn disallowed_extension_rejected() {
    let err = images::validate_upload(&png_bytes(), "pdf", "jpg,jpeg,png,gif,webp", 5 * 1_048_576)
        .unwrap_err();
    assert!(err.contains("Unsupported image type"));
}

#[test]
fn non_image_bytes_rejected() {
    let err = images::validate_upload(b"<html>not an image</html>", "png", "png", 5 * 1_048_576)
        .unwrap_err();
    assert_eq!(err, "File is not a valid image");
}

#[test]
fn object_name_embeds_block_id_and_extension() {
    let name = images::object_name("home-hero", "PNG");
    assert!(name.starts_with("home-hero_"));
    assert!(name.ends_with(".png"));
}

#[test]
fn object_names_do_not_collide() {
    let a = images::object_name("hero", "jpg");
    std::thread::sleep(Duration::from_millis(2));
    let b = images::object_name("hero", "jpg");
    assert_ne!(a, b);
}

#[test]
fn data_uri_carries_mime_type() {
    assert!(images::data_uri(&[1, 2, 3], "jpg").starts_with("data:image/jpeg;base64,"));
    assert!(images::data_uri(&[1, 2, 3], "webp").starts_with("data:image/webp;base64,"));
}

// ═══════════════════════════════════════════════════════════
// Comments and questions
// ═══════════════════════════════════════════════════════════

#[test]
fn comments_list_newest_first_with_distinct_ids() {
    let pool = test_pool();
    Comment::create(&pool, "v1", Some("Alice"), "First!").unwrap();
    let list = Comment::create(&pool, "v1", Some("Bob"), "Second!").unwrap();

    assert_eq!(list.len(), 2);
    assert_eq!(list[0].body, "Second!");
    assert_eq!(list[1].body, "First!");
    assert_ne!(list[0].id, list[1].id);
}

#[test]
fn comments_scoped_per_video() {
    let pool = test_pool();
    Comment::create(&pool, "v1", None, "On v1").unwrap();
    Comment::create(&pool, "v2", None, "On v2").unwrap();

    let v1 = Comment::for_video(&pool, "v1");
    assert_eq!(v1.len(), 1);
    assert_eq!(v1[0].body, "On v1");
}

#[test]
fn comment_author_defaults_to_anonymous() {
    let pool = test_pool();
    let list = Comment::create(&pool, "v1", None, "hello").unwrap();
    assert_eq!(list[0].author_name, "Anonymous");

    let list = Comment::create(&pool, "v1", Some("  "), "again").unwrap();
    assert_eq!(list[0].author_name, "Anonymous");
}

#[test]
fn question_created_pending() {
    let pool = test_pool();
    let q = Question::create(&pool, "v3", "Cataract surgery explained", "Is it painful?").unwrap();
    assert_eq!(q.status, "Pending");
    assert_eq!(q.video_title, "Cataract surgery explained");
}

#[test]
fn questions_list_newest_first() {
    let pool = test_pool();
    Question::create(&pool, "v1", "Video one", "First question").unwrap();
    Question::create(&pool, "v2", "Video two", "Second question").unwrap();

    let list = Question::list(&pool);
    assert_eq!(list.len(), 2);
    assert_eq!(list[0].body, "Second question");
}

// ═══════════════════════════════════════════════════════════
// Rate limiter
// ═══════════════════════════════════════════════════════════

#[test]
fn rate_limiter_allows_then_blocks() {
    let limiter = RateLimiter::new();
    let window = Duration::from_secs(60);
    for _ in 0..3 {
        assert!(limiter.check_and_record("comment:abc", 3, window));
    }
    assert!(!limiter.check_and_record("comment:abc", 3, window));
    // a different client is unaffected
    assert!(limiter.check_and_record("comment:def", 3, window));
}

#[test]
fn rate_limiter_sweeps_stale_clients() {
    let limiter = RateLimiter::new();
    let window = Duration::from_millis(1);

    for i in 0..10 {
        limiter.check_and_record(&format!("comment:client{}", i), 5, window);
    }
    assert!(limiter.tracked_clients() >= 10);

    std::thread::sleep(Duration::from_millis(5));

    // keep one client active until the periodic sweep fires
    for _ in 0..64 {
        limiter.check_and_record("comment:active", 1000, window);
    }
    assert!(limiter.tracked_clients() < 10);
}

// ═══════════════════════════════════════════════════════════
// Auth helpers
// ═══════════════════════════════════════════════════════════

#[test]
fn password_hash_verifies() {
    let hash = fast_hash("correct horse");
    assert!(auth::verify_password("correct horse", &hash));
    assert!(!auth::verify_password("wrong", &hash));
}

#[test]
fn hash_ip_is_stable_and_hex() {
    let a = auth::hash_ip("203.0.113.9");
    let b = auth::hash_ip("203.0.113.9");
    assert_eq!(a, b);
    assert_eq!(a.len(), 64);
}

#[test]
fn seed_rehashes_when_password_changes() {
    let pool = test_pool();
    let before = Setting::get(&pool, "admin_password_hash").unwrap();

    let mut cfg = test_config();
    cfg.admin_password = "new-password".to_string();
    seed_defaults(&pool, &cfg).unwrap();

    let after = Setting::get(&pool, "admin_password_hash").unwrap();
    assert_ne!(before, after);
    assert!(auth::verify_password("new-password", &after));
}
