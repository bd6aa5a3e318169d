use std::sync::mpsc::SyncSender;
use std::sync::{Arc, Mutex};

use togglebox_core::configuration_fetcher::ConfigurationFetcher;
use togglebox_core::configuration_store::ConfigurationStore;
use togglebox_core::poller_thread::{
    PollerThread as PollerThreadImpl, PollerThreadConfig, RefreshNotice,
};
#[cfg(doc)]
use togglebox_core::Error;

use crate::Result;

/// A configuration poller thread.
///
/// The poller thread polls the server periodically to fetch the latest definitions for all three
/// tiers.
///
/// Use [`Client::start_poller_thread`][crate::Client::start_poller_thread] to get an instance.
///
/// The client serves stale-or-nothing before the first fetch completes, so it is recommended to
/// call [`PollerThread::wait_for_configuration`] before requesting evaluations.
pub struct PollerThread(PollerThreadImpl);

impl PollerThread {
    pub(crate) fn start(
        fetcher: Arc<Mutex<ConfigurationFetcher>>,
        store: Arc<ConfigurationStore>,
    ) -> Result<PollerThread> {
        let inner = PollerThreadImpl::start(fetcher, store)?;
        Ok(PollerThread(inner))
    }

    pub(crate) fn start_with_config(
        fetcher: Arc<Mutex<ConfigurationFetcher>>,
        store: Arc<ConfigurationStore>,
        config: PollerThreadConfig,
        notices: Option<SyncSender<RefreshNotice>>,
    ) -> Result<PollerThread> {
        let inner = PollerThreadImpl::start_with_notices(fetcher, store, config, notices)?;
        Ok(PollerThread(inner))
    }

    /// Waits for the first configuration to be fetched.
    ///
    /// # Errors
    ///
    /// Can return the following errors:
    /// - [`Error::PollerThreadPanicked`]
    /// - [`Error::Unauthorized`]
    /// - [`Error::InvalidBaseUrl`]
    pub fn wait_for_configuration(&self) -> Result<()> {
        self.0.wait_for_configuration()
    }

    /// Stop the poller thread without waiting for it to actually stop.
    pub fn stop(&self) {
        self.0.stop()
    }

    /// Stop the poller thread and block waiting for it to exit.
    ///
    /// # Errors
    ///
    /// - [`Error::PollerThreadPanicked`] if the thread has panicked.
    pub fn shutdown(self) -> Result<()> {
        self.0.shutdown()
    }
}
