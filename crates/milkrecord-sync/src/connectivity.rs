//! # Connectivity Probe
//!
//! Answers one question: is the internet reachable right now?
//!
//! ```text
//!   probe ──GET probe_url (≤3s)──► 2xx          → online
//!                                  non-2xx      → offline
//!                                  error/timeout→ offline
//! ```
//!
//! The probe never errors and never blocks longer than its timeout. Being
//! offline is the normal case for this system, not a failure.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tracing::{debug, trace};

use crate::config::{SyncConfig, MAX_PROBE_TIMEOUT_SECS};
use crate::error::SyncResult;

/// Reachability check used by the write path and the sync loop.
#[async_trait]
pub trait ConnectivityProbe: Send + Sync {
    /// True when the internet is reachable. Never errors.
    async fn internet_available(&self) -> bool;
}

// =============================================================================
// HTTP Probe
// =============================================================================

/// Probes by fetching a lightweight URL.
#[derive(Debug, Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl HttpProbe {
    /// Creates a probe. `timeout` is clamped to 3 seconds.
    pub fn new(url: impl Into<String>, timeout: Duration) -> SyncResult<Self> {
        let timeout = timeout.min(Duration::from_secs(MAX_PROBE_TIMEOUT_SECS));
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .build()?;

        Ok(HttpProbe {
            client,
            url: url.into(),
            timeout,
        })
    }

    pub fn from_config(config: &SyncConfig) -> SyncResult<Self> {
        Self::new(config.connectivity.probe_url.clone(), config.probe_timeout())
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

#[async_trait]
impl ConnectivityProbe for HttpProbe {
    async fn internet_available(&self) -> bool {
        let request = self.client.get(&self.url).send();

        match tokio::time::timeout(self.timeout, request).await {
            Ok(Ok(response)) => {
                let online = response.status().is_success();
                trace!(status = %response.status(), online, "Connectivity probe answered");
                online
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Connectivity probe failed");
                false
            }
            Err(_) => {
                debug!(timeout = ?self.timeout, "Connectivity probe timed out");
                false
            }
        }
    }
}

// =============================================================================
// Static Probe
// =============================================================================

/// Probe with a switchable answer, for tests and `--offline` runs.
#[derive(Debug, Default)]
pub struct StaticProbe {
    online: AtomicBool,
    probes: AtomicUsize,
}

impl StaticProbe {
    pub fn online() -> Self {
        StaticProbe {
            online: AtomicBool::new(true),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn offline() -> Self {
        StaticProbe::default()
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// How many times the probe has been asked.
    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for StaticProbe {
    async fn internet_available(&self) -> bool {
        self.probes.fetch_add(1, Ordering::SeqCst);
        self.online.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_probe_switches() {
        let probe = StaticProbe::offline();
        assert!(!probe.internet_available().await);

        probe.set_online(true);
        assert!(probe.internet_available().await);
        assert_eq!(probe.probe_count(), 2);
    }

    #[test]
    fn test_http_probe_clamps_timeout() {
        let probe = HttpProbe::new("http://127.0.0.1:1/", Duration::from_secs(30)).unwrap();
        assert_eq!(probe.timeout(), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_unreachable_probe_reports_offline() {
        let probe = HttpProbe::new("http://127.0.0.1:1/", Duration::from_secs(1)).unwrap();

        let started = std::time::Instant::now();
        assert!(!probe.internet_available().await);
        assert!(started.elapsed() < Duration::from_secs(3));
    }
}
