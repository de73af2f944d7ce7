use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::process;

use crate::config;

/// Required directories that will be created if missing
const REQUIRED_DIRS: &[&str] = &["site", "site/db"];

/// Run all boot checks. Call this before Rocket launches.
/// Creates missing directories and aborts if the database directory is
/// unusable.
pub fn run() {
    info!("Clinica boot check starting...");

    let mut warnings = 0u32;
    let mut errors = 0u32;

    for dir in REQUIRED_DIRS {
        let path = Path::new(dir);
        if !path.exists() {
            match fs::create_dir_all(path) {
                Ok(_) => info!("  Created directory: {}", dir),
                Err(e) => {
                    error!("  FAILED to create directory {}: {}", dir, e);
                    errors += 1;
                }
            }
        }
    }

    // Database directory writable
    let db_dir = Path::new("site/db");
    if db_dir.exists() {
        let test_file = db_dir.join(".write_test");
        match fs::write(&test_file, "test") {
            Ok(_) => {
                let _ = fs::remove_file(&test_file);
            }
            Err(e) => {
                error!("  Database directory not writable: {}", e);
                errors += 1;
            }
        }
    }

    if !Path::new(config::CONFIG_FILE).exists() {
        warn!(
            "  {} not found — using defaults and environment variables",
            config::CONFIG_FILE
        );
        warnings += 1;
    }

    if errors > 0 {
        error!(
            "Boot check FAILED: {} error(s), {} warning(s). Aborting.",
            errors, warnings
        );
        process::exit(1);
    }

    if warnings > 0 {
        warn!("Boot check passed with {} warning(s).", warnings);
    } else {
        info!("Boot check passed.");
    }
}
