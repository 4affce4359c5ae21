//! Dashboard configuration types.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level dashboard configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DashboardConfig {
    /// Base URL of the forecasting backend (no trailing slash needed).
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Locations to monitor.
    #[serde(default = "default_locations")]
    pub locations: Vec<LocationConfig>,

    /// Request and display timing.
    #[serde(default)]
    pub timing: TimingConfig,

    /// Query parameters for the forecast and history endpoints.
    #[serde(default)]
    pub query: QueryConfig,
}

/// A location known to the backend.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LocationConfig {
    /// Backend location key, used in request paths and as the cache key.
    pub key: String,
    /// Human-readable name.
    #[serde(default)]
    pub name: String,
}

impl LocationConfig {
    pub fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.key
        } else {
            &self.name
        }
    }
}

/// Timing configuration (all values in seconds).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimingConfig {
    /// Upper bound on a single backend request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Interval between heartbeat log lines.
    #[serde(default = "default_heartbeat")]
    pub heartbeat_secs: u64,
}

impl TimingConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Hours of forecast to request.
    #[serde(default = "default_forecast_hours")]
    pub forecast_hours: u32,

    /// Days of history to request.
    #[serde(default = "default_historical_days")]
    pub historical_days: u32,
}

// ── Defaults ──────────────────────────────────────────────────────────

fn default_api_base_url() -> String {
    "http://localhost:8000".into()
}

fn default_request_timeout() -> u64 {
    10
}
fn default_heartbeat() -> u64 {
    30
}

fn default_forecast_hours() -> u32 {
    24
}
fn default_historical_days() -> u32 {
    30
}

fn default_locations() -> Vec<LocationConfig> {
    vec![
        LocationConfig {
            key: "Washington_DC".into(),
            name: "Washington, DC".into(),
        },
        LocationConfig {
            key: "Los_Angeles".into(),
            name: "Los Angeles, CA".into(),
        },
        LocationConfig {
            key: "New_York".into(),
            name: "New York, NY".into(),
        },
        LocationConfig {
            key: "Chicago".into(),
            name: "Chicago, IL".into(),
        },
        LocationConfig {
            key: "Houston".into(),
            name: "Houston, TX".into(),
        },
    ]
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            request_timeout_secs: default_request_timeout(),
            heartbeat_secs: default_heartbeat(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            forecast_hours: default_forecast_hours(),
            historical_days: default_historical_days(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            api_base_url: default_api_base_url(),
            locations: default_locations(),
            timing: TimingConfig::default(),
            query: QueryConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = DashboardConfig::default();
        assert_eq!(cfg.api_base_url, "http://localhost:8000");
        assert_eq!(cfg.timing.request_timeout(), Duration::from_secs(10));
        assert_eq!(cfg.locations.len(), 5);
        assert_eq!(cfg.locations[0].key, "Washington_DC");
    }

    #[test]
    fn test_partial_document_fills_defaults() {
        let cfg: DashboardConfig = serde_json::from_str(
            r#"{"locations": [{"key": "washington_dc"}], "timing": {"request_timeout_secs": 3}}"#,
        )
        .expect("config should deserialize");

        assert_eq!(cfg.locations.len(), 1);
        assert_eq!(cfg.locations[0].display_name(), "washington_dc");
        assert_eq!(cfg.timing.request_timeout_secs, 3);
        assert_eq!(cfg.timing.heartbeat_secs, 30);
        assert_eq!(cfg.query.forecast_hours, 24);
    }
}
