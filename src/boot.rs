use log::{error, info, warn};
use std::fs;
use std::path::Path;
use std::process;

use crate::config::{Backend, Config};

/// Run all boot checks. Call this before Rocket launches.
/// Creates the data directory, warns about missing optional files, and
/// aborts if the store location is unusable.
pub fn run(config: &Config) {
    info!("sitekeep boot check starting...");

    let (warnings, errors) = check(config, &Config::path());

    if errors > 0 {
        error!(
            "Boot check failed: {} error(s), {} warning(s). Fix the above and restart.",
            errors, warnings
        );
        process::exit(1);
    }

    if warnings > 0 {
        warn!("Boot check passed with {} warning(s)", warnings);
    } else {
        info!("Boot check passed");
    }
}

/// Returns (warnings, errors).
fn check(config: &Config, config_path: &str) -> (u32, u32) {
    let mut warnings = 0u32;
    let mut errors = 0u32;

    // ── 1. Config file ─────────────────────────────────
    if !Path::new(config_path).exists() {
        warn!("  No {} found, using built-in defaults", config_path);
        warnings += 1;
    }

    // ── 2. Store location ──────────────────────────────
    match config.backend {
        Backend::Memory => {
            warn!("  Memory store selected: data is lost on restart");
            warnings += 1;
        }
        Backend::Sqlite => {
            let db = Path::new(&config.db_path);
            if let Some(dir) = db.parent().filter(|d| !d.as_os_str().is_empty()) {
                if !dir.exists() {
                    match fs::create_dir_all(dir) {
                        Ok(_) => info!("  Created directory: {}", dir.display()),
                        Err(e) => {
                            error!("  FAILED to create directory {}: {}", dir.display(), e);
                            errors += 1;
                        }
                    }
                }
            }
            if db.is_dir() {
                error!("  Store path {} is a directory", db.display());
                errors += 1;
            }
        }
    }

    // ── 3. Summary ─────────────────────────────────────
    info!(
        "  Store: {:?} ({}), sync poll every {}s",
        config.backend, config.db_path, config.poll_interval_secs
    );

    (warnings, errors)
}
