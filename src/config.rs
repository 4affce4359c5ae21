//! Configuration loader: merges `.env`, `config.toml`, and environment.

use std::collections::HashSet;
use std::path::Path;

use common::config::{DashboardConfig, LocationConfig};
use common::Error;

fn parse_positive_u64(raw: &str, env_name: &str) -> Result<u64, Error> {
    match raw.trim().parse::<u64>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::Config(format!("{env_name} must be an integer > 0"))),
    }
}

fn parse_positive_u32(raw: &str, env_name: &str) -> Result<u32, Error> {
    match raw.trim().parse::<u32>() {
        Ok(v) if v > 0 => Ok(v),
        _ => Err(Error::Config(format!("{env_name} must be an integer > 0"))),
    }
}

/// Comma-separated location keys. Keys already configured keep their
/// display name.
fn parse_locations(raw: &str, known: &[LocationConfig]) -> Vec<LocationConfig> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(|key| {
            known
                .iter()
                .find(|l| l.key.eq_ignore_ascii_case(key))
                .cloned()
                .unwrap_or_else(|| LocationConfig {
                    key: key.to_string(),
                    name: String::new(),
                })
        })
        .collect()
}

pub fn validate_config(config: &DashboardConfig) -> Result<(), Error> {
    let mut issues: Vec<String> = Vec::new();

    if let Err(e) = aq_client::parse_base_url(&config.api_base_url) {
        issues.push(format!("api_base_url: {}", e));
    }

    if config.locations.is_empty() {
        issues.push("locations must contain at least one location".into());
    }
    let mut seen = HashSet::new();
    for location in &config.locations {
        if location.key.trim().is_empty() {
            issues.push("locations[].key must not be empty".into());
        } else if !seen.insert(location.key.to_ascii_lowercase()) {
            issues.push(format!("duplicate location key {:?}", location.key));
        }
    }

    if config.timing.request_timeout_secs == 0 {
        issues.push("timing.request_timeout_secs must be > 0".into());
    }
    if config.timing.heartbeat_secs == 0 {
        issues.push("timing.heartbeat_secs must be > 0".into());
    }
    if config.query.forecast_hours == 0 {
        issues.push("query.forecast_hours must be > 0".into());
    }
    if config.query.historical_days == 0 {
        issues.push("query.historical_days must be > 0".into());
    }

    if issues.is_empty() {
        Ok(())
    } else {
        Err(Error::Config(format!(
            "Invalid config:\n - {}",
            issues.join("\n - ")
        )))
    }
}

/// Apply `AQ_*` overrides. `lookup` is `std::env::var` outside of tests.
fn apply_env_overrides<F>(config: &mut DashboardConfig, lookup: F) -> Result<(), Error>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(url) = lookup("AQ_API_BASE_URL") {
        let trimmed = url.trim().trim_end_matches('/');
        if !trimmed.is_empty() {
            config.api_base_url = trimmed.to_string();
        }
    }
    if let Some(raw) = lookup("AQ_REQUEST_TIMEOUT_SECS") {
        config.timing.request_timeout_secs = parse_positive_u64(&raw, "AQ_REQUEST_TIMEOUT_SECS")?;
    }
    if let Some(raw) = lookup("AQ_HEARTBEAT_SECS") {
        config.timing.heartbeat_secs = parse_positive_u64(&raw, "AQ_HEARTBEAT_SECS")?;
    }
    if let Some(raw) = lookup("AQ_FORECAST_HOURS") {
        config.query.forecast_hours = parse_positive_u32(&raw, "AQ_FORECAST_HOURS")?;
    }
    if let Some(raw) = lookup("AQ_HISTORICAL_DAYS") {
        config.query.historical_days = parse_positive_u32(&raw, "AQ_HISTORICAL_DAYS")?;
    }
    if let Some(raw) = lookup("AQ_LOCATIONS") {
        config.locations = parse_locations(&raw, &config.locations);
    }
    Ok(())
}

/// Load dashboard configuration from environment and optional config file.
pub fn load_config() -> Result<DashboardConfig, Error> {
    if let Err(e) = dotenvy::dotenv() {
        tracing::debug!("No .env file loaded: {}", e);
    }

    let mut config = DashboardConfig::default();

    let config_path = Path::new("config.toml");
    if config_path.exists() {
        let contents = std::fs::read_to_string(config_path)
            .map_err(|e| Error::Config(format!("Failed to read config.toml: {}", e)))?;
        config = toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("Failed to parse config.toml: {}", e)))?;
    }

    apply_env_overrides(&mut config, |name| std::env::var(name).ok())?;

    validate_config(&config)?;

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&DashboardConfig::default()).is_ok());
    }

    #[test]
    fn test_validation_collects_every_issue() {
        let mut cfg = DashboardConfig::default();
        cfg.api_base_url = "localhost:8000".into();
        cfg.locations.clear();
        cfg.timing.request_timeout_secs = 0;

        let err = validate_config(&cfg).unwrap_err().to_string();
        assert!(err.contains("api_base_url"), "{}", err);
        assert!(err.contains("at least one location"), "{}", err);
        assert!(err.contains("request_timeout_secs"), "{}", err);
    }

    #[test]
    fn test_base_url_checked_like_the_client() {
        for bad in ["http://exa mple", "http://", "ftp://backend:8000", "backend:8000"] {
            let mut cfg = DashboardConfig::default();
            cfg.api_base_url = bad.into();
            let err = validate_config(&cfg).unwrap_err().to_string();
            assert!(err.contains("api_base_url"), "{}: {}", bad, err);
            assert!(aq_client::parse_base_url(bad).is_err(), "{}", bad);
        }

        let mut cfg = DashboardConfig::default();
        cfg.api_base_url = "https://aq.example.com/api".into();
        assert!(validate_config(&cfg).is_ok());
    }

    #[test]
    fn test_duplicate_keys_rejected() {
        let mut cfg = DashboardConfig::default();
        let first = cfg.locations[0].clone();
        cfg.locations.push(LocationConfig {
            key: first.key.to_uppercase(),
            ..first
        });
        let err = validate_config(&cfg).unwrap_err().to_string();
        assert!(err.contains("duplicate location key"), "{}", err);
    }

    #[test]
    fn test_env_overrides() {
        let mut cfg = DashboardConfig::default();
        let lookup = lookup_from(&[
            ("AQ_API_BASE_URL", "https://aq.example.com/"),
            ("AQ_REQUEST_TIMEOUT_SECS", "4"),
            ("AQ_FORECAST_HOURS", "48"),
            ("AQ_LOCATIONS", "chicago, Springfield ,"),
        ]);
        apply_env_overrides(&mut cfg, lookup).unwrap();

        assert_eq!(cfg.api_base_url, "https://aq.example.com");
        assert_eq!(cfg.timing.request_timeout_secs, 4);
        assert_eq!(cfg.query.forecast_hours, 48);
        assert_eq!(cfg.query.historical_days, 30);

        let keys: Vec<_> = cfg.locations.iter().map(|l| l.key.as_str()).collect();
        assert_eq!(keys, vec!["Chicago", "Springfield"]);
        assert_eq!(cfg.locations[0].display_name(), "Chicago, IL");
        assert_eq!(cfg.locations[1].display_name(), "Springfield");
    }

    #[test]
    fn test_bad_env_value_is_config_error() {
        let mut cfg = DashboardConfig::default();
        let err = apply_env_overrides(&mut cfg, lookup_from(&[("AQ_REQUEST_TIMEOUT_SECS", "0")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("AQ_REQUEST_TIMEOUT_SECS"));
    }

    #[test]
    fn test_toml_document_parses() {
        let cfg: DashboardConfig = toml::from_str(
            r#"
            api_base_url = "http://backend:8000"

            [[locations]]
            key = "Houston"
            name = "Houston, TX"

            [timing]
            request_timeout_secs = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.locations.len(), 1);
        assert_eq!(cfg.timing.request_timeout_secs, 5);
        assert_eq!(cfg.timing.heartbeat_secs, 30);
        assert!(validate_config(&cfg).is_ok());
    }
}
