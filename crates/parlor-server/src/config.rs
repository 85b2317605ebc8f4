//! Server configuration.

use serde::{Deserialize, Serialize};

/// Default inter-message pacing for bulk sends, in milliseconds.
pub const DEFAULT_PACING_MS: u64 = 1_000;
/// Default reminder sweep interval, in seconds.
pub const DEFAULT_REMINDER_INTERVAL_SECS: u64 = 900;
/// Default local hour for the daily report.
pub const DEFAULT_REPORT_HOUR: u32 = 18;

/// HTTP server and job configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerConfig {
    /// Bind host (default: `127.0.0.1`).
    #[serde(default = "default_host")]
    pub host: String,
    /// Bind port (default: 3080).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Delay between bulk sends in ms (default: 1000).
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
    /// Reminder sweep interval in seconds (default: 900).
    #[serde(default = "default_reminder_interval_secs")]
    pub reminder_interval_secs: u64,
    /// Local hour (0-23) the daily report fires (default: 18).
    #[serde(default = "default_report_hour")]
    pub report_hour: u32,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    3080
}
fn default_pacing_ms() -> u64 {
    DEFAULT_PACING_MS
}
fn default_reminder_interval_secs() -> u64 {
    DEFAULT_REMINDER_INTERVAL_SECS
}
fn default_report_hour() -> u32 {
    DEFAULT_REPORT_HOUR
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            pacing_ms: DEFAULT_PACING_MS,
            reminder_interval_secs: DEFAULT_REMINDER_INTERVAL_SECS,
            report_hour: DEFAULT_REPORT_HOUR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_fills_defaults() {
        let config: ServerConfig = serde_json::from_str("{}").unwrap();
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 3080);
        assert_eq!(config.pacing_ms, 1_000);
        assert_eq!(config.report_hour, 18);
    }
}
