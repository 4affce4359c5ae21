//! Shared types, config, and error definitions for the AQI dashboard.

pub mod aqi;
pub mod config;
pub mod error;
pub mod types;

pub use aqi::{classify, classify_opt, format_number, AqiBand, AqiLevel, AQI_BANDS};
pub use config::DashboardConfig;
pub use error::{Error, ErrorKind};
pub use types::*;

/// Convenience Result alias.
pub type Result<T> = std::result::Result<T, Error>;
