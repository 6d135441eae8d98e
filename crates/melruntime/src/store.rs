use crate::StoreError;
use melcore::Value;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Horizon used when a TTL or timeout does not fit in an `Instant`.
pub const FAR_FUTURE: Duration = Duration::from_secs(30 * 365 * 24 * 60 * 60);

/// `from + after`, capped at [`FAR_FUTURE`] when the sum overflows.
pub(crate) fn deadline_after(from: Instant, after: Duration) -> Instant {
    from.checked_add(after).unwrap_or_else(|| from + FAR_FUTURE)
}

#[derive(Debug, Clone)]
pub struct StoreEntry {
    pub data: Value,
    pub expires_at: Instant,
}

/// Keyed scratch space with per-entry TTL.
///
/// Expiry is checked lazily on read; nothing sweeps the table in the
/// background.
#[derive(Debug)]
pub struct DataStore {
    entries: Mutex<HashMap<String, StoreEntry>>,
    default_ttl: Duration,
}

impl DataStore {
    pub fn new(default_ttl: Duration) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            default_ttl: if default_ttl.is_zero() { DEFAULT_TTL } else { default_ttl },
        }
    }

    /// Store `data` under `key`. A zero `ttl` uses the store default.
    pub fn store(&self, key: impl Into<String>, data: Value, ttl: Duration) -> Instant {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        let expires_at = deadline_after(Instant::now(), ttl);
        let key = key.into();
        tracing::debug!(%key, ttl_ms = ttl.as_millis() as u64, "Storing data");
        self.lock().insert(key, StoreEntry { data, expires_at });
        expires_at
    }

    /// Read `key`, evicting it if its TTL has passed.
    pub fn retrieve(&self, key: &str) -> Result<Value, StoreError> {
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            None => return Err(StoreError::NotFound(key.to_string())),
            Some(entry) => Instant::now() >= entry.expires_at,
        };
        if expired {
            entries.remove(key);
            tracing::debug!(%key, "Evicted expired entry");
            return Err(StoreError::Expired(key.to_string()));
        }
        entries
            .get(key)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    /// Remove `key`, reporting whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.lock().remove(key).is_some()
    }

    /// Number of entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, StoreEntry>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}
