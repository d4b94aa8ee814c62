use uuid::Uuid;

pub mod memory;
pub mod notify;
pub mod sqlite;

pub use notify::{ChangeEvent, Subscription};

// ── Keys ────────────────────────────────────────────────────────────

pub const CONTACT_FORMS_KEY: &str = "contactForms";
pub const SUBSCRIBERS_KEY: &str = "newsletterSubscribers";
pub const BLOG_POSTS_KEY: &str = "blogPosts";

/// Keys whose changes trigger a dashboard reload in other instances.
pub const WATCHED_KEYS: [&str; 3] = [CONTACT_FORMS_KEY, SUBSCRIBERS_KEY, BLOG_POSTS_KEY];

/// A stored value together with the revision it was written at.
/// Revisions are unique and increasing across the whole store, so a key that
/// is deleted and written again never reuses an old revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    pub value: String,
    pub revision: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written(u64),
    /// The key moved past the expected revision; nothing was written.
    Conflict { current: u64 },
}

/// Synchronous textual key-value store shared by every handle of one origin.
/// Implementations: `MemoryStore` (process-local map) and `SqliteStore`
/// (file-backed, visible to other processes).
pub trait KvStore: Send + Sync {
    // ── Identity ────────────────────────────────────────────────────
    /// Identity of this handle. Change events carry it so that a handle is
    /// never notified about its own writes.
    fn origin(&self) -> Uuid;

    // ── Reads ───────────────────────────────────────────────────────
    fn entry(&self, key: &str) -> Result<Option<Entry>, String>;

    fn get(&self, key: &str) -> Result<Option<String>, String> {
        Ok(self.entry(key)?.map(|e| e.value))
    }

    /// Current revision of `key`, 0 when absent.
    fn revision(&self, key: &str) -> Result<u64, String> {
        Ok(self.entry(key)?.map(|e| e.revision).unwrap_or(0))
    }

    // ── Writes ──────────────────────────────────────────────────────
    /// Replace the value of `key` unconditionally. Returns the new revision.
    fn set(&self, key: &str, value: &str) -> Result<u64, String>;

    /// Replace the value of `key` only if it is still at `expected`
    /// (0 meaning "absent").
    fn compare_and_set(&self, key: &str, value: &str, expected: u64)
        -> Result<WriteOutcome, String>;

    // ── Notifications ───────────────────────────────────────────────
    fn subscribe(&self) -> Subscription;

    /// Look for writes made outside this process and publish them.
    /// Returns how many keys changed.
    fn poll_external(&self) -> Result<usize, String> {
        Ok(0)
    }
}
