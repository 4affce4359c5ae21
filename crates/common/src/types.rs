//! Backend resource types shared across the dashboard.
//!
//! The backend emits naive ISO-8601 timestamps (no offset), so every
//! timestamp here is a `NaiveDateTime`.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::aqi::{classify, AqiBand, AqiLevel};

// ── Forecast ──────────────────────────────────────────────────────────

/// Response from `GET /forecast/{location}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub location: String,
    #[serde(default)]
    pub latitude: Option<f64>,
    #[serde(default)]
    pub longitude: Option<f64>,
    #[serde(default)]
    pub forecasts: Vec<ForecastPoint>,
    #[serde(default)]
    pub generated_at: Option<NaiveDateTime>,
}

/// One hourly forecast step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    #[serde(default)]
    pub datetime: Option<NaiveDateTime>,
    #[serde(default)]
    pub no2_predicted: Option<f64>,
    #[serde(default)]
    pub o3_predicted: Option<f64>,
    #[serde(default)]
    pub hcho_predicted: Option<f64>,
    pub aqi_predicted: f64,
    #[serde(default)]
    pub confidence_score: Option<f64>,
    #[serde(default)]
    pub health_recommendation: Option<String>,
}

impl ForecastPoint {
    pub fn band(&self) -> &'static AqiBand {
        classify(self.aqi_predicted)
    }
}

impl ForecastResponse {
    /// The nearest forecast step, if any.
    pub fn current(&self) -> Option<&ForecastPoint> {
        self.forecasts.first()
    }

    pub fn current_aqi(&self) -> Option<f64> {
        self.current().map(|p| p.aqi_predicted)
    }

    /// Highest predicted AQI across the horizon.
    pub fn peak(&self) -> Option<&ForecastPoint> {
        self.forecasts
            .iter()
            .max_by(|a, b| a.aqi_predicted.total_cmp(&b.aqi_predicted))
    }
}

// ── Historical ────────────────────────────────────────────────────────

/// Response from `GET /historical/{location}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalResponse {
    pub location: String,
    #[serde(default)]
    pub days: u32,
    #[serde(default)]
    pub data: Vec<HistoricalPoint>,
}

/// One measured observation. Every measurement may be missing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoricalPoint {
    pub datetime: NaiveDateTime,
    #[serde(default)]
    pub no2_actual: Option<f64>,
    #[serde(default)]
    pub o3_actual: Option<f64>,
    #[serde(default)]
    pub hcho_actual: Option<f64>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub humidity: Option<f64>,
    #[serde(default)]
    pub wind_speed: Option<f64>,
    #[serde(default)]
    pub pressure: Option<f64>,
    #[serde(default)]
    pub source: Option<String>,
}

// ── Alerts ────────────────────────────────────────────────────────────

/// Response from `GET /alerts/{location}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsResponse {
    pub location: String,
    pub aqi: f64,
    #[serde(default)]
    pub alerts: Vec<Alert>,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Alert {
    pub level: AqiLevel,
    pub title: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl AlertsResponse {
    /// The most severe active alert.
    pub fn most_severe(&self) -> Option<&Alert> {
        self.alerts.iter().max_by_key(|a| a.level)
    }
}

// ── Health recommendations ────────────────────────────────────────────

/// Response from `GET /health-recommendations/{location}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthRecommendationsResponse {
    pub location: String,
    pub aqi: f64,
    pub recommendations: String,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

// ── System status ─────────────────────────────────────────────────────

/// Response from `GET /data/status`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemStatus {
    #[serde(default)]
    pub total_locations: u32,
    #[serde(default)]
    pub collected_locations: u32,
    #[serde(default)]
    pub last_updates: BTreeMap<String, LocationUpdate>,
    #[serde(default)]
    pub data_sources: Vec<String>,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationUpdate {
    pub timestamp: NaiveDateTime,
    #[serde(default)]
    pub is_fresh: bool,
}

impl SystemStatus {
    /// Locations whose last collected data is no longer fresh.
    pub fn stale_locations(&self) -> Vec<&str> {
        self.last_updates
            .iter()
            .filter(|(_, u)| !u.is_fresh)
            .map(|(k, _)| k.as_str())
            .collect()
    }

    /// Fraction of known locations with collected data, in [0, 1].
    pub fn coverage(&self) -> f64 {
        if self.total_locations == 0 {
            return 0.0;
        }
        (f64::from(self.collected_locations) / f64::from(self.total_locations)).min(1.0)
    }
}

// ── Validation ────────────────────────────────────────────────────────

/// Response from `GET /validation/{location}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub location: String,
    pub validation: ValidationMetrics,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

/// Ground-truth agreement figures, in percent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationMetrics {
    #[serde(default)]
    pub pandora_accuracy: Option<f64>,
    #[serde(default)]
    pub airnow_accuracy: Option<f64>,
    #[serde(default)]
    pub model_confidence: Option<f64>,
    #[serde(default)]
    pub last_validation: Option<NaiveDateTime>,
    #[serde(default)]
    pub validation_sources: Vec<String>,
}

// ── Misc ──────────────────────────────────────────────────────────────

/// Response from `GET /locations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocationsResponse {
    #[serde(default)]
    pub locations: Vec<String>,
}

/// Response from `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<NaiveDateTime>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_forecast() {
        let raw = r#"{
            "location": "Washington, DC",
            "latitude": 38.9072,
            "longitude": -77.0369,
            "forecasts": [
                {
                    "datetime": "2025-10-05T12:00:00.123456",
                    "no2_predicted": 1.2e15,
                    "o3_predicted": 41.5,
                    "hcho_predicted": 3.0e15,
                    "aqi_predicted": 42,
                    "confidence_score": 0.91,
                    "health_recommendation": "Good - Air quality is satisfactory for most people."
                },
                {"datetime": "2025-10-05T13:00:00", "aqi_predicted": 175}
            ],
            "generated_at": "2025-10-05T12:00:00"
        }"#;

        let parsed: ForecastResponse = serde_json::from_str(raw).expect("forecast should deserialize");
        assert_eq!(parsed.forecasts.len(), 2);
        assert_eq!(parsed.current_aqi(), Some(42.0));
        assert_eq!(parsed.current().map(|p| p.band().label), Some("Good"));
        assert_eq!(parsed.peak().map(|p| p.band().label), Some("Unhealthy"));
        assert!(parsed.forecasts[1].confidence_score.is_none());
    }

    #[test]
    fn test_empty_forecast_has_no_current() {
        let parsed: ForecastResponse =
            serde_json::from_str(r#"{"location": "Houston", "forecasts": []}"#).unwrap();
        assert!(parsed.current().is_none());
        assert!(parsed.peak().is_none());
    }

    #[test]
    fn test_deserialize_alerts() {
        let raw = r#"{
            "location": "Los_Angeles",
            "aqi": 215,
            "alerts": [
                {
                    "level": "very_unhealthy",
                    "title": "Very Unhealthy Air Quality",
                    "message": "Everyone should avoid outdoor activities",
                    "recommendations": ["Stay indoors as much as possible"]
                },
                {"level": "unhealthy_sensitive", "title": "Unhealthy for Sensitive Groups"}
            ],
            "timestamp": "2025-10-05T12:00:00.5"
        }"#;

        let parsed: AlertsResponse = serde_json::from_str(raw).expect("alerts should deserialize");
        assert_eq!(parsed.alerts.len(), 2);
        assert_eq!(
            parsed.most_severe().map(|a| a.level),
            Some(AqiLevel::VeryUnhealthy)
        );
    }

    #[test]
    fn test_system_status_accessors() {
        let raw = r#"{
            "total_locations": 4,
            "collected_locations": 2,
            "last_updates": {
                "Chicago": {"timestamp": "2025-10-05T11:00:00", "is_fresh": true},
                "Houston": {"timestamp": "2025-10-05T02:00:00", "is_fresh": false}
            },
            "data_sources": ["tempo", "airnow"],
            "timestamp": "2025-10-05T12:00:00"
        }"#;

        let status: SystemStatus = serde_json::from_str(raw).expect("status should deserialize");
        assert_eq!(status.stale_locations(), vec!["Houston"]);
        assert!((status.coverage() - 0.5).abs() < 1e-9);

        let empty: SystemStatus = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.coverage(), 0.0);
    }

    #[test]
    fn test_deserialize_validation() {
        let raw = r#"{
            "location": "New_York",
            "validation": {
                "pandora_accuracy": 97.6,
                "airnow_accuracy": 95.2,
                "model_confidence": 94.8,
                "last_validation": "2025-10-05T12:00:00",
                "validation_sources": ["Pandora", "AirNow", "TOLNet"]
            },
            "timestamp": "2025-10-05T12:00:00"
        }"#;

        let parsed: ValidationResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.validation.pandora_accuracy, Some(97.6));
        assert_eq!(parsed.validation.validation_sources.len(), 3);
    }
}
