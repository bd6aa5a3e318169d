//! A thread-safe in-memory storage for currently active configuration. [`ConfigurationStore`]
//! provides concurrent access for readers (e.g., flag evaluation) and writers (e.g., periodic
//! configuration fetcher), with a short TTL per resource type so stale definitions stop being
//! served when refreshes fall behind.
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::experiments::ExperimentsResponse;
use crate::flags::FlagsResponse;
use crate::remote_config::RemoteConfigResponse;

/// `ConfigurationStore` provides a thread-safe (`Sync`) storage for ToggleBox configuration that
/// allows concurrent access for readers and writers.
///
/// Each resource type (remote config, flags, experiments) occupies its own slot; a slot's value
/// is always immutable and can only be replaced completely. Entries carry a fetch timestamp and
/// are treated as expired (not merely absent) past the TTL; expired entries are evicted lazily
/// on the next read, not proactively.
pub struct ConfigurationStore {
    ttl: Duration,
    remote_config: Slot<RemoteConfigResponse>,
    flags: Slot<FlagsResponse>,
    experiments: Slot<ExperimentsResponse>,
}

impl ConfigurationStore {
    /// Default slot TTL.
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

    /// Create a new empty configuration store with [`ConfigurationStore::DEFAULT_TTL`].
    pub fn new() -> Self {
        ConfigurationStore::with_ttl(ConfigurationStore::DEFAULT_TTL)
    }

    /// Create a new empty configuration store with the given TTL.
    pub fn with_ttl(ttl: Duration) -> Self {
        ConfigurationStore {
            ttl,
            remote_config: Slot::default(),
            flags: Slot::default(),
            experiments: Slot::default(),
        }
    }

    /// Get currently-active remote config entries. Returns `None` if they haven't been fetched
    /// yet or the cached copy expired.
    pub fn get_remote_config(&self) -> Option<Arc<RemoteConfigResponse>> {
        self.remote_config.get(self.ttl)
    }

    /// Set new remote config entries.
    pub fn set_remote_config(&self, response: Arc<RemoteConfigResponse>) {
        self.remote_config.set(response)
    }

    /// Get currently-active flags. Returns `None` if they haven't been fetched yet or the cached
    /// copy expired.
    pub fn get_flags(&self) -> Option<Arc<FlagsResponse>> {
        self.flags.get(self.ttl)
    }

    /// Set new flags.
    pub fn set_flags(&self, response: Arc<FlagsResponse>) {
        self.flags.set(response)
    }

    /// Get currently-active experiments. Returns `None` if they haven't been fetched yet or the
    /// cached copy expired.
    pub fn get_experiments(&self) -> Option<Arc<ExperimentsResponse>> {
        self.experiments.get(self.ttl)
    }

    /// Set new experiments.
    pub fn set_experiments(&self, response: Arc<ExperimentsResponse>) {
        self.experiments.set(response)
    }
}

impl Default for ConfigurationStore {
    fn default() -> Self {
        ConfigurationStore::new()
    }
}

struct Slot<T>(RwLock<Option<Entry<T>>>);

struct Entry<T> {
    fetched_at: Instant,
    value: Arc<T>,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot(RwLock::new(None))
    }
}

impl<T> Slot<T> {
    fn get(&self, ttl: Duration) -> Option<Arc<T>> {
        {
            // self.0.read() should always return Ok(). Err() is possible only if the lock is
            // poisoned (writer panicked while holding the lock), which should never happen.
            let slot = self
                .0
                .read()
                .expect("thread holding configuration lock should not panic");
            match &*slot {
                None => return None,
                Some(entry) if entry.fetched_at.elapsed() < ttl => {
                    return Some(entry.value.clone())
                }
                Some(_expired) => {}
            }
        }

        // Lazy eviction: drop the expired entry so later reads short-circuit on `None`.
        let mut slot = self
            .0
            .write()
            .expect("thread holding configuration lock should not panic");
        if slot.as_ref().is_some_and(|e| e.fetched_at.elapsed() >= ttl) {
            *slot = None;
        }
        None
    }

    fn set(&self, value: Arc<T>) {
        let mut slot = self
            .0
            .write()
            .expect("thread holding configuration lock should not panic");
        *slot = Some(Entry {
            fetched_at: Instant::now(),
            value,
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use super::ConfigurationStore;
    use crate::flags::FlagsResponse;

    #[test]
    fn can_set_configuration_from_another_thread() {
        let store = Arc::new(ConfigurationStore::new());

        assert!(store.get_flags().is_none());

        {
            let store = store.clone();
            let _ = std::thread::spawn(move || {
                store.set_flags(Arc::new(FlagsResponse::default()))
            })
            .join();
        }

        assert!(store.get_flags().is_some());
    }

    #[test]
    fn entries_expire_after_ttl() {
        let store = ConfigurationStore::with_ttl(Duration::from_millis(20));
        store.set_flags(Arc::new(FlagsResponse::default()));

        assert!(store.get_flags().is_some());
        std::thread::sleep(Duration::from_millis(40));
        assert!(store.get_flags().is_none());
    }

    #[test]
    fn resource_types_expire_independently() {
        let store = ConfigurationStore::with_ttl(Duration::from_millis(50));
        store.set_flags(Arc::new(FlagsResponse::default()));
        std::thread::sleep(Duration::from_millis(30));
        store.set_experiments(Arc::new(crate::experiments::ExperimentsResponse::default()));
        std::thread::sleep(Duration::from_millis(30));

        assert!(store.get_flags().is_none());
        assert!(store.get_experiments().is_some());
    }
}
