//! Engine tuning knobs, loadable from TOML.

use std::time::Duration;

use serde::Deserialize;

/// Dispatcher and lock/lease timing configuration. `Default` carries the
/// protocol-mandated values; deployments override via TOML.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Retry cadence for blocking byte-range locks.
    pub lock_retry_interval_ms: u64,
    /// Overall deadline for a blocking byte-range lock.
    pub lock_wait_timeout_ms: u64,
    /// How long a lease break may stay unacknowledged before the scanner
    /// force-revokes it.
    pub lease_break_timeout_secs: u64,
    /// Period of the lease-break timeout scanner.
    pub lease_scan_period_secs: u64,
    /// Largest READ the engine will serve.
    pub max_read_size: u32,
    /// Largest WRITE the engine will accept.
    pub max_write_size: u32,
    /// Directory entries fetched from the metadata store per page.
    pub directory_page_size: usize,
    /// Label reported by FileFsVolumeInformation.
    pub volume_label: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            lock_retry_interval_ms: 50,
            lock_wait_timeout_ms: 5_000,
            lease_break_timeout_secs: 35,
            lease_scan_period_secs: 10,
            max_read_size: 8 * 1024 * 1024,
            max_write_size: 8 * 1024 * 1024,
            directory_page_size: 4096,
            volume_label: "mamont".to_owned(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml(text: &str) -> Result<EngineConfig, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn lock_retry_interval(&self) -> Duration {
        Duration::from_millis(self.lock_retry_interval_ms)
    }

    pub fn lock_wait_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_wait_timeout_ms)
    }

    pub fn lease_break_timeout(&self) -> Duration {
        Duration::from_secs(self.lease_break_timeout_secs)
    }

    pub fn lease_scan_period(&self) -> Duration {
        Duration::from_secs(self.lease_scan_period_secs)
    }
}
