#[macro_use]
extern crate rocket;

use std::sync::Arc;

use rocket::serde::json::Json;
use rocket::{Build, Rocket};
use serde_json::{json, Value};

mod aggregator;
mod boot;
mod config;
mod dashboard;
mod db;
mod ids;
mod models;
mod rate_limit;
mod routes;
mod seed;
mod store;
mod sync;
mod tasks;


use config::Config;
use dashboard::Dashboard;

#[catch(404)]
fn not_found() -> Json<Value> {
    Json(json!({"ok": false, "error": "Not found"}))
}

#[catch(422)]
fn unprocessable() -> Json<Value> {
    Json(json!({"ok": false, "error": "Malformed request body"}))
}

#[catch(500)]
fn server_error() -> Json<Value> {
    Json(json!({"ok": false, "error": "Internal server error"}))
}

/// Assemble the server around an activated dashboard.
pub fn build_rocket(dashboard: Arc<Dashboard>, config: &Config) -> Rocket<Build> {
    rocket::build()
        .manage(dashboard)
        .manage(tasks::SyncSettings {
            poll_interval_secs: config.poll_interval_secs,
        })
        .manage(Arc::new(rate_limit::RateLimiter::new()))
        .manage(config.intake_limits())
        .attach(tasks::BackgroundTasks::default())
        .mount("/api/admin", routes::admin_api::routes())
        .mount("/api", routes::api::routes())
        .register("/", catchers![not_found, unprocessable, server_error])
}

#[launch]
fn rocket() -> _ {
    env_logger::init();

    let config = Config::load();

    // Boot check — create the data directory, validate the store location
    boot::run(&config);

    let store = config.open_store().expect("Failed to open store");
    let dashboard = Arc::new(Dashboard::new(store, config.dashboard_options()));
    dashboard.observe(|event| log::debug!("[dashboard] {:?}", event));
    let stats = dashboard.activate().expect("Failed to load dashboard data");

    log::info!(
        "Loaded {} contact forms, {} subscribers, {} posts",
        stats.total_forms,
        stats.total_subscribers,
        stats.total_posts
    );

    build_rocket(dashboard, &config)
}
