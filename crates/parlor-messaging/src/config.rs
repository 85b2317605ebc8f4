//! Messaging configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default cap on automatic reconnect attempts.
pub const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default reconnect tick interval in milliseconds.
pub const DEFAULT_RECONNECT_INTERVAL_MS: u64 = 10_000;
/// Default grace period before purging corrupted session files.
pub const DEFAULT_RECOVERY_GRACE_MS: u64 = 2_000;
/// Default grace period before a full session wipe.
pub const DEFAULT_WIPE_GRACE_MS: u64 = 3_000;

/// Configuration for the session supervisor and its collaborators.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagingConfig {
    /// Directory where the driver persists credentials, cookies and caches.
    pub session_dir: PathBuf,
    /// File holding the latest durable pairing artifact.
    pub artifact_path: PathBuf,
    /// Cap on automatic reconnect attempts (default: 3).
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Reconnect tick interval in ms (default: 10000).
    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,
    /// Grace period before purging corrupted session files in ms (default: 2000).
    #[serde(default = "default_recovery_grace_ms")]
    pub recovery_grace_ms: u64,
    /// Grace period before a full session wipe in ms (default: 3000).
    #[serde(default = "default_wipe_grace_ms")]
    pub wipe_grace_ms: u64,
    /// Addressing suffix appended to normalized recipients (default: `@c.us`).
    #[serde(default = "default_address_suffix")]
    pub address_suffix: String,
}

fn default_max_retries() -> u32 {
    DEFAULT_MAX_RETRIES
}
fn default_reconnect_interval_ms() -> u64 {
    DEFAULT_RECONNECT_INTERVAL_MS
}
fn default_recovery_grace_ms() -> u64 {
    DEFAULT_RECOVERY_GRACE_MS
}
fn default_wipe_grace_ms() -> u64 {
    DEFAULT_WIPE_GRACE_MS
}
fn default_address_suffix() -> String {
    "@c.us".to_string()
}

impl MessagingConfig {
    /// Config rooted at `base`, with session storage and artifact file
    /// placed in the conventional locations beneath it.
    #[must_use]
    pub fn rooted_at(base: &std::path::Path) -> Self {
        Self {
            session_dir: base.join("session"),
            artifact_path: base.join("pairing_artifact.json"),
            max_retries: DEFAULT_MAX_RETRIES,
            reconnect_interval_ms: DEFAULT_RECONNECT_INTERVAL_MS,
            recovery_grace_ms: DEFAULT_RECOVERY_GRACE_MS,
            wipe_grace_ms: DEFAULT_WIPE_GRACE_MS,
            address_suffix: default_address_suffix(),
        }
    }

    /// Reconnect tick interval.
    #[must_use]
    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    /// Recovery grace period.
    #[must_use]
    pub fn recovery_grace(&self) -> Duration {
        Duration::from_millis(self.recovery_grace_ms)
    }

    /// Full-wipe grace period.
    #[must_use]
    pub fn wipe_grace(&self) -> Duration {
        Duration::from_millis(self.wipe_grace_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serde_defaults_fill_in() {
        let json = r#"{"sessionDir": "/tmp/s", "artifactPath": "/tmp/a.json"}"#;
        let config: MessagingConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.reconnect_interval_ms, 10_000);
        assert_eq!(config.address_suffix, "@c.us");
    }

    #[test]
    fn rooted_at_places_conventional_paths() {
        let config = MessagingConfig::rooted_at(std::path::Path::new("/data"));
        assert_eq!(config.session_dir, PathBuf::from("/data/session"));
        assert_eq!(config.artifact_path, PathBuf::from("/data/pairing_artifact.json"));
    }
}
