use rocket::fairing::{Fairing, Info, Kind};
use rocket::tokio;
use rocket::{Orbit, Rocket};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use crate::dashboard::Dashboard;
use crate::rate_limit::{IntakeLimits, RateLimiter};
use crate::sync::{SyncHandle, SyncListener};

/// Interval for the change-polling task, managed as Rocket state.
pub struct SyncSettings {
    pub poll_interval_secs: u64,
}

#[derive(Default)]
pub struct BackgroundTasks {
    sync: Mutex<Option<SyncHandle>>,
}

#[rocket::async_trait]
impl Fairing for BackgroundTasks {
    fn info(&self) -> Info {
        Info {
            name: "Background Tasks",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let Some(dashboard) = rocket.state::<Arc<Dashboard>>() else {
            log::error!("[task] Dashboard not found in managed state, sync disabled");
            return;
        };
        let dashboard = Arc::clone(dashboard);
        let interval = rocket
            .state::<SyncSettings>()
            .map(|s| s.poll_interval_secs)
            .unwrap_or(2)
            .max(1);

        // Sync listener: reloads the dashboard on every change notification
        let handle = SyncListener::new(Arc::clone(&dashboard)).spawn();
        if let Ok(mut slot) = self.sync.lock() {
            *slot = Some(handle);
        }

        // External change poll: surfaces writes by other processes as notifications
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_secs(interval)).await;
                match dashboard.store().poll_external() {
                    Ok(0) => {}
                    Ok(count) => log::info!("[task] {} key(s) changed outside this process", count),
                    Err(e) => log::error!("[task] Polling store for external changes failed: {}", e),
                }
            }
        });

        // Rate limiter cleanup: every 10 minutes
        if let Some(limiter) = rocket.state::<Arc<RateLimiter>>() {
            let limiter = Arc::clone(limiter);
            let window = rocket
                .state::<IntakeLimits>()
                .map(|l| l.window)
                .unwrap_or_default();
            tokio::spawn(async move {
                loop {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                    let removed = limiter.cleanup(window);
                    if removed > 0 {
                        log::debug!("[task] Dropped {} idle rate limit entries", removed);
                    }
                }
            });
        }

        log::info!("[task] Background tasks started");
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        let handle = self.sync.lock().ok().and_then(|mut slot| slot.take());
        if let Some(handle) = handle {
            log::info!(
                "[task] Stopping sync listener ({:?}, {} reload(s))",
                handle.state(),
                handle.reloads()
            );
            handle.stop();
        }
    }
}
