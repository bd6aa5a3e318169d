//! A background poller thread that periodically requests configuration from the server and stores
//! it in a configuration store.
use std::sync::mpsc::{RecvTimeoutError, SyncSender, TrySendError};
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rand::{thread_rng, Rng};

use crate::configuration_fetcher::ConfigurationFetcher;
use crate::configuration_store::ConfigurationStore;
use crate::{Error, Result};

/// Configuration for [`PollerThread`].
// Not implementing `Copy` as we may add non-copyable fields in the future.
#[derive(Debug, Clone)]
pub struct PollerThreadConfig {
    /// Interval to wait between requests for configuration.
    ///
    /// Defaults to [`PollerThreadConfig::DEFAULT_POLL_INTERVAL`].
    pub interval: Duration,
    /// Jitter applies a randomized duration to wait between requests for configuration. This helps
    /// to avoid multiple server instances synchronizing and producing spiky network load.
    ///
    /// Defaults to [`PollerThreadConfig::DEFAULT_POLL_JITTER`].
    pub jitter: Duration,
}

impl PollerThreadConfig {
    /// Default value for [`PollerThreadConfig::interval`].
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);
    /// Default value for [`PollerThreadConfig::jitter`].
    pub const DEFAULT_POLL_JITTER: Duration = Duration::from_secs(3);

    /// Create a new `PollerThreadConfig` using default configuration.
    pub fn new() -> PollerThreadConfig {
        PollerThreadConfig::default()
    }

    /// Update poll interval with `interval`.
    pub fn with_interval(mut self, interval: Duration) -> PollerThreadConfig {
        self.interval = interval;
        self
    }

    /// Update poll interval jitter with `jitter`.
    pub fn with_jitter(mut self, jitter: Duration) -> PollerThreadConfig {
        self.jitter = jitter;
        self
    }
}

impl Default for PollerThreadConfig {
    fn default() -> PollerThreadConfig {
        PollerThreadConfig {
            interval: PollerThreadConfig::DEFAULT_POLL_INTERVAL,
            jitter: PollerThreadConfig::DEFAULT_POLL_JITTER,
        }
    }
}

/// Notice of one completed refresh, delivered over the channel registered with
/// [`PollerThread::start_with_notices`]. Replaces the listener-set "update" event of emitter
/// designs: receivers poll the channel at their own pace and a full channel drops the notice
/// rather than blocking the poller.
#[derive(Debug, Clone)]
pub struct RefreshNotice {
    /// When the refresh finished.
    pub at: DateTime<Utc>,
    /// `None` on success, the error otherwise.
    pub error: Option<Error>,
}

/// A configuration poller thread.
///
/// The poller thread polls the server periodically to fetch the latest configuration using
/// [`ConfigurationFetcher`] and stores it in [`ConfigurationStore`].
///
/// The fetcher is shared behind a mutex with any on-demand refresh path; the poller only refreshes
/// when it can take the lock without waiting, so a refresh already in progress is never doubled.
pub struct PollerThread {
    join_handle: std::thread::JoinHandle<()>,

    /// Used to send a stop command to the poller thread.
    stop_sender: std::sync::mpsc::SyncSender<()>,

    /// Holds `None` if configuration hasn't been fetched yet. Holds `Some(Ok(()))` if
    /// configuration has been fetched successfully. Holds `Some(Err(...))` if there was an error
    /// fetching the first configuration.
    result: Arc<(Mutex<Option<Result<()>>>, Condvar)>,
}

impl PollerThread {
    /// Starts the configuration poller thread with default configuration.
    ///
    /// # Errors
    ///
    /// This method can return the following errors:
    /// - IO Error if poller thread failed to start.
    pub fn start(
        fetcher: Arc<Mutex<ConfigurationFetcher>>,
        store: Arc<ConfigurationStore>,
    ) -> std::io::Result<PollerThread> {
        PollerThread::start_with_notices(fetcher, store, PollerThreadConfig::default(), None)
    }

    /// Starts the configuration poller thread with the provided configuration and an optional
    /// refresh-notice channel.
    ///
    /// Notices are sent with a non-blocking `try_send`; if the receiver falls behind, notices are
    /// dropped, never queued unboundedly.
    ///
    /// # Errors
    ///
    /// This method can return the following errors:
    /// - IO Error if poller thread failed to start.
    pub fn start_with_notices(
        fetcher: Arc<Mutex<ConfigurationFetcher>>,
        store: Arc<ConfigurationStore>,
        config: PollerThreadConfig,
        notices: Option<SyncSender<RefreshNotice>>,
    ) -> std::io::Result<PollerThread> {
        // Using `sync_channel` here as it makes `stop_sender` `Sync` (shareable between
        // threads). Buffer size of 1 should be enough for our use case as we're sending a stop
        // command, and we can simply `try_send()` and ignore if the buffer is full (another thread
        // has sent a stop command already).
        let (stop_sender, stop_receiver) = std::sync::mpsc::sync_channel::<()>(1);

        let result = Arc::new((Mutex::new(None), Condvar::new()));

        let join_handle = {
            // Cloning Arc for move into thread
            let result = Arc::clone(&result);
            let update_result = move |value| {
                *result.0.lock().unwrap() = Some(value);
                result.1.notify_all();
            };

            std::thread::Builder::new()
                .name("togglebox-poller".to_owned())
                .spawn(move || {
                    let thread_result =
                        std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| loop {
                            let refresh = refresh_once(&fetcher, &store);

                            if let Some(notices) = &notices {
                                let notice = RefreshNotice {
                                    at: Utc::now(),
                                    error: refresh.as_ref().err().cloned(),
                                };
                                match notices.try_send(notice) {
                                    Ok(()) | Err(TrySendError::Full(_)) => {}
                                    Err(TrySendError::Disconnected(_)) => {
                                        // Nobody is listening anymore; not a reason to stop
                                        // refreshing the store.
                                    }
                                }
                            }

                            match refresh {
                                Ok(()) => update_result(Ok(())),
                                Err(err @ (Error::Unauthorized | Error::InvalidBaseUrl(_))) => {
                                    // Unrecoverable errors
                                    update_result(Err(err));
                                    return;
                                }
                                Err(_) => {
                                    // Other errors are retriable.
                                }
                            }

                            let timeout = jitter(config.interval, config.jitter);
                            match stop_receiver.recv_timeout(timeout) {
                                Err(RecvTimeoutError::Timeout) => {
                                    // Timed out. Loop back to fetch a new configuration.
                                }
                                Ok(()) => {
                                    log::debug!(target: "togglebox", "poller thread received stop command");
                                    // Stop command received, break out of the loop to end the thread.
                                    return;
                                }
                                Err(RecvTimeoutError::Disconnected) => {
                                    // When the other end of channel disconnects, calls to
                                    // .recv_timeout() return immediately.
                                    // Stop the thread.
                                    log::debug!(target: "togglebox", "poller thread received disconnected");
                                    return;
                                }
                            }
                        }));

                    // If catch_unwind returns Err, it means a panic occurred.
                    if thread_result.is_err() {
                        // Handle the panic gracefully by updating the result with an error.
                        update_result(Err(Error::PollerThreadPanicked));
                    }
                })?
        };

        Ok(PollerThread {
            join_handle,
            stop_sender,
            result,
        })
    }

    /// Waits for the configuration to be fetched.
    ///
    /// This method blocks until the poller thread has fetched the first configuration.
    ///
    /// # Errors
    ///
    /// This method can fail with the following errors:
    ///
    /// - [`Error::PollerThreadPanicked`]
    /// - [`Error::Unauthorized`]
    /// - [`Error::InvalidBaseUrl`]
    pub fn wait_for_configuration(&self) -> Result<()> {
        let mut lock = self
            .result
            .0
            .lock()
            .map_err(|_| Error::PollerThreadPanicked)?;
        loop {
            match &*lock {
                Some(result) => {
                    // The poller has already fetched the configuration. Return Ok(()) or a
                    // possible error.
                    return result.clone();
                }
                None => {
                    // Block waiting for configuration to get fetched.
                    lock = self
                        .result
                        .1
                        .wait(lock)
                        .map_err(|_| Error::PollerThreadPanicked)?;
                }
            }
        }
    }

    /// Stop the poller thread.
    ///
    /// This function does not wait for the thread to actually stop.
    pub fn stop(&self) {
        // Error means that the receiver was dropped (thread exited) or the channel buffer is
        // full. First case can be ignored as there's nothing useful we can do—thread is already
        // stopped. Second case can be ignored as it indicates that another thread already sent a
        // stop command and the thread will stop anyway.
        let _ = self.stop_sender.try_send(());
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// If you don't need to wait for the thread to exit, use [`PollerThread::stop`] instead.
    ///
    /// # Errors
    ///
    /// - [`Error::PollerThreadPanicked`] if the thread has panicked.
    pub fn shutdown(self) -> Result<()> {
        // Send stop signal in case it wasn't sent before.
        self.stop();

        // Error means that the thread has panicked and there's nothing useful we can do in that
        // case.
        self.join_handle
            .join()
            .map_err(|_| Error::PollerThreadPanicked)?;

        Ok(())
    }
}

/// Refresh all three tiers, taking the fetcher lock without waiting. A refresh already in
/// progress (an on-demand cache-miss fetch holds the same lock) counts as this tick's refresh.
fn refresh_once(
    fetcher: &Mutex<ConfigurationFetcher>,
    store: &ConfigurationStore,
) -> Result<()> {
    let Ok(mut fetcher) = fetcher.try_lock() else {
        log::debug!(target: "togglebox", "refresh already in progress, skipping poll tick");
        return Ok(());
    };

    log::debug!(target: "togglebox", "fetching new configuration");
    let configuration = fetcher.fetch_configuration()?;
    store.set_remote_config(Arc::new(configuration.remote_config));
    store.set_flags(Arc::new(configuration.flags));
    store.set_experiments(Arc::new(configuration.experiments));
    Ok(())
}

/// Apply randomized `jitter` to `interval`.
fn jitter(interval: Duration, jitter: Duration) -> Duration {
    Duration::saturating_sub(interval, thread_rng().gen_range(Duration::ZERO..=jitter))
}

#[cfg(test)]
mod jitter_tests {
    use std::time::Duration;

    #[test]
    fn jitter_is_subtractive() {
        let interval = Duration::from_secs(30);
        let jitter = Duration::from_secs(30);

        let result = super::jitter(interval, jitter);

        assert!(result <= interval, "{result:?} must be <= {interval:?}");
    }

    #[test]
    fn jitter_truncates_to_zero() {
        let interval = Duration::ZERO;
        let jitter = Duration::from_secs(30);

        let result = super::jitter(interval, jitter);

        assert_eq!(result, Duration::ZERO);
    }

    #[test]
    fn jitter_works_with_zero_jitter() {
        let interval = Duration::from_secs(30);
        let jitter = Duration::ZERO;

        let result = super::jitter(interval, jitter);

        assert_eq!(result, Duration::from_secs(30));
    }
}
