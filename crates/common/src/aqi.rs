//! AQI banding.
//!
//! Maps a numeric Air Quality Index onto one of the six EPA severity bands.
//! The band is purely cosmetic, so classification never fails: anything
//! outside [0, 500] (including NaN) falls back to the lowest band.

use serde::{Deserialize, Serialize};

/// Upper bound of the AQI scale.
pub const AQI_MAX: u16 = 500;

/// Severity tier of the AQI scale.
///
/// The serde form matches the alert `level` strings used by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AqiLevel {
    Good,
    Moderate,
    UnhealthySensitive,
    Unhealthy,
    VeryUnhealthy,
    Hazardous,
}

impl AqiLevel {
    /// The static band descriptor for this level.
    pub fn band(self) -> &'static AqiBand {
        let idx = match self {
            AqiLevel::Good => 0,
            AqiLevel::Moderate => 1,
            AqiLevel::UnhealthySensitive => 2,
            AqiLevel::Unhealthy => 3,
            AqiLevel::VeryUnhealthy => 4,
            AqiLevel::Hazardous => 5,
        };
        &AQI_BANDS[idx]
    }
}

impl std::fmt::Display for AqiLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.band().label)
    }
}

/// One band of the AQI scale. Bounds are inclusive.
#[derive(Debug, PartialEq, Eq)]
pub struct AqiBand {
    pub min: u16,
    pub max: u16,
    pub level: AqiLevel,
    pub label: &'static str,
    pub description: &'static str,
    /// Display color token (hex).
    pub color: &'static str,
}

impl AqiBand {
    pub fn contains(&self, aqi: u16) -> bool {
        self.min <= aqi && aqi <= self.max
    }
}

/// Ordered band table. Partitions [0, 500] with no gaps or overlaps.
pub static AQI_BANDS: [AqiBand; 6] = [
    AqiBand {
        min: 0,
        max: 50,
        level: AqiLevel::Good,
        label: "Good",
        description: "Air quality is satisfactory",
        color: "#00E400",
    },
    AqiBand {
        min: 51,
        max: 100,
        level: AqiLevel::Moderate,
        label: "Moderate",
        description: "Air quality is acceptable; unusually sensitive people should consider limiting prolonged outdoor exertion",
        color: "#FFFF00",
    },
    AqiBand {
        min: 101,
        max: 150,
        level: AqiLevel::UnhealthySensitive,
        label: "Unhealthy for Sensitive Groups",
        description: "Members of sensitive groups may experience health effects and should limit outdoor activity",
        color: "#FF7E00",
    },
    AqiBand {
        min: 151,
        max: 200,
        level: AqiLevel::Unhealthy,
        label: "Unhealthy",
        description: "Everyone may begin to experience health effects and should limit outdoor exertion",
        color: "#FF0000",
    },
    AqiBand {
        min: 201,
        max: 300,
        level: AqiLevel::VeryUnhealthy,
        label: "Very Unhealthy",
        description: "Health alert: everyone may experience more serious health effects and should avoid outdoor activity",
        color: "#8F3F97",
    },
    AqiBand {
        min: 301,
        max: 500,
        level: AqiLevel::Hazardous,
        label: "Hazardous",
        description: "Health warning of emergency conditions: everyone should avoid outdoor exposure",
        color: "#7E0023",
    },
];

/// Classify an AQI value.
///
/// Out-of-domain input (non-finite, below 0, above 500) returns the "Good"
/// band. In-domain fractional input is rounded to the nearest integer for
/// the band scan, since the index itself is an integer score.
pub fn classify(aqi: f64) -> &'static AqiBand {
    let fallback = &AQI_BANDS[0];

    if !aqi.is_finite() || aqi < 0.0 || aqi > f64::from(AQI_MAX) {
        return fallback;
    }

    let value = aqi.round() as u16;
    AQI_BANDS
        .iter()
        .find(|band| band.contains(value))
        .unwrap_or(fallback)
}

/// Classify a possibly-missing AQI value. `None` stays `None` so callers can
/// render a "no data yet" state instead of a misleading "Good".
pub fn classify_opt(aqi: Option<f64>) -> Option<&'static AqiBand> {
    aqi.map(classify)
}

/// Placeholder rendered wherever a value is not available yet.
pub const NO_DATA: &str = "--";

/// Render a number with a fixed number of decimals, or `"--"` when absent.
pub fn format_number(value: Option<f64>, decimals: usize) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{:.*}", decimals, v),
        _ => NO_DATA.to_string(),
    }
}
