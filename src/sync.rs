use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use log::{debug, error, info};

use crate::dashboard::Dashboard;
use crate::store::{ChangeEvent, Subscription, WATCHED_KEYS};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Idle,
    Reloading,
}

const IDLE: u8 = 0;
const RELOADING: u8 = 1;

/// Reloads a dashboard whenever another handle on the same store writes one
/// of the watched keys. Notifications are processed in arrival order; one
/// arriving mid-reload simply causes another reload afterwards.
pub struct SyncListener {
    dashboard: Arc<Dashboard>,
    subscription: Subscription,
    state: Arc<AtomicU8>,
    reloads: Arc<AtomicU64>,
}

impl SyncListener {
    /// Subscribes immediately, so writes made after this call are not missed.
    pub fn new(dashboard: Arc<Dashboard>) -> Self {
        let subscription = dashboard.store().subscribe();
        SyncListener {
            dashboard,
            subscription,
            state: Arc::new(AtomicU8::new(IDLE)),
            reloads: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn is_watched(key: &str) -> bool {
        WATCHED_KEYS.contains(&key)
    }

    fn handle(&self, event: &ChangeEvent) -> Result<bool, String> {
        if !Self::is_watched(&event.key) {
            return Ok(false);
        }
        debug!(
            "[sync] {} changed (revision {}), reloading",
            event.key, event.revision
        );
        self.state.store(RELOADING, Ordering::SeqCst);
        let result = self.dashboard.reload();
        self.state.store(IDLE, Ordering::SeqCst);
        result?;
        self.reloads.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    /// Handle every notification queued so far. Returns how many reloads ran.
    /// Stops at the first failed reload; later notifications stay queued.
    pub fn process_pending(&self) -> Result<usize, String> {
        let mut reloaded = 0;
        while let Some(event) = self.subscription.try_next() {
            if self.handle(&event)? {
                reloaded += 1;
            }
        }
        Ok(reloaded)
    }

    /// Run the listener on its own thread until the handle is stopped or dropped.
    pub fn spawn(self) -> SyncHandle {
        let stop = Arc::new(AtomicBool::new(false));
        let state = Arc::clone(&self.state);
        let reloads = Arc::clone(&self.reloads);
        let thread_stop = Arc::clone(&stop);

        let thread = thread::spawn(move || {
            info!("[sync] listening for changes to {}", WATCHED_KEYS.join(", "));
            while !thread_stop.load(Ordering::SeqCst) {
                let Some(event) = self.subscription.next_timeout(Duration::from_millis(100)) else {
                    continue;
                };
                if let Err(e) = self.handle(&event) {
                    error!("[sync] Reload after change to {} failed: {}", event.key, e);
                    continue;
                }
                // Catch up on anything queued behind it
                if let Err(e) = self.process_pending() {
                    error!("[sync] Reload failed: {}", e);
                }
            }
        });

        SyncHandle {
            stop,
            state,
            reloads,
            thread: Some(thread),
        }
    }
}

fn decode_state(state: &AtomicU8) -> SyncState {
    match state.load(Ordering::SeqCst) {
        RELOADING => SyncState::Reloading,
        _ => SyncState::Idle,
    }
}

pub struct SyncHandle {
    stop: Arc<AtomicBool>,
    state: Arc<AtomicU8>,
    reloads: Arc<AtomicU64>,
    thread: Option<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn state(&self) -> SyncState {
        decode_state(&self.state)
    }

    pub fn reloads(&self) -> u64 {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}
