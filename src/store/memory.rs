use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use super::notify::{ChangeEvent, ChangeHub, Subscription};
use super::{Entry, KvStore, WriteOutcome};

struct Inner {
    entries: HashMap<String, Entry>,
    last_revision: u64,
}

struct Shared {
    inner: Mutex<Inner>,
    hub: ChangeHub,
}

/// In-process store. Peers share the map and the change hub, the way tabs of
/// one origin share browser storage.
pub struct MemoryStore {
    shared: Arc<Shared>,
    origin: Uuid,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            shared: Arc::new(Shared {
                inner: Mutex::new(Inner {
                    entries: HashMap::new(),
                    last_revision: 0,
                }),
                hub: ChangeHub::new(),
            }),
            origin: Uuid::new_v4(),
        }
    }

    #[cfg(test)]
    pub fn peer(&self) -> MemoryStore {
        MemoryStore {
            shared: Arc::clone(&self.shared),
            origin: Uuid::new_v4(),
        }
    }

    fn write(&self, key: &str, value: &str, expected: Option<u64>) -> Result<WriteOutcome, String> {
        let revision = {
            let mut inner = self.shared.inner.lock().map_err(|e| e.to_string())?;
            let current = inner.entries.get(key).map(|e| e.revision).unwrap_or(0);
            if let Some(expected) = expected {
                if expected != current {
                    return Ok(WriteOutcome::Conflict { current });
                }
            }
            inner.last_revision += 1;
            let revision = inner.last_revision;
            inner.entries.insert(
                key.to_string(),
                Entry {
                    value: value.to_string(),
                    revision,
                },
            );
            revision
        };
        self.shared.hub.publish(&ChangeEvent {
            key: key.to_string(),
            revision,
            origin: self.origin,
        });
        Ok(WriteOutcome::Written(revision))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl KvStore for MemoryStore {
    fn origin(&self) -> Uuid {
        self.origin
    }

    fn entry(&self, key: &str) -> Result<Option<Entry>, String> {
        let inner = self.shared.inner.lock().map_err(|e| e.to_string())?;
        Ok(inner.entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<u64, String> {
        match self.write(key, value, None)? {
            WriteOutcome::Written(rev) => Ok(rev),
            WriteOutcome::Conflict { current } => Err(format!(
                "{}: unconditional write reported conflict at revision {}",
                key, current
            )),
        }
    }

    fn compare_and_set(
        &self,
        key: &str,
        value: &str,
        expected: u64,
    ) -> Result<WriteOutcome, String> {
        self.write(key, value, Some(expected))
    }

    fn subscribe(&self) -> Subscription {
        self.shared.hub.subscribe(self.origin)
    }
}
