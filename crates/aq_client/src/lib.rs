//! HTTP client for the air-quality forecasting backend.
//!
//! One method per backend resource. Every method returns `common::Result`
//! so it can back a `poll_cache::Fetcher`; the `*_fetcher` helpers build
//! those directly.

use std::error::Error as StdError;
use std::future::Future;
use std::time::Duration;

use common::config::DashboardConfig;
use common::{
    AlertsResponse, Error, ForecastResponse, HealthCheck, HealthRecommendationsResponse,
    HistoricalResponse, LocationsResponse, Result, SystemStatus, ValidationResponse,
};
use poll_cache::Fetcher;
use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("aqi-dashboard/", env!("CARGO_PKG_VERSION"));
const MAX_BODY_CHARS: usize = 500;

fn format_reqwest_error(err: &reqwest::Error) -> String {
    // reqwest's Display omits the source chain; append each distinct cause.
    let mut message = err.to_string();
    let mut source = err.source();

    while let Some(cause) = source {
        let cause_msg = cause.to_string();
        if !cause_msg.is_empty() && !message.contains(&cause_msg) {
            message.push_str(": ");
            message.push_str(&cause_msg);
        }
        source = cause.source();
    }

    message
}

fn summarize_response_body(raw: &str) -> String {
    let compact = raw.replace(['\n', '\r'], " ");
    if compact.chars().count() > MAX_BODY_CHARS {
        let truncated: String = compact.chars().take(MAX_BODY_CHARS).collect();
        format!("{}…", truncated)
    } else {
        compact
    }
}

/// FastAPI error body: `{"detail": "..."}`, or a list of validation errors.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    detail: serde_json::Value,
}

fn api_error(status: StatusCode, raw: &str) -> Error {
    let message = match serde_json::from_str::<ErrorBody>(raw) {
        Ok(ErrorBody {
            detail: serde_json::Value::String(detail),
        }) => detail,
        Ok(ErrorBody { detail }) => summarize_response_body(&detail.to_string()),
        Err(_) if raw.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("empty response body")
            .to_string(),
        Err(_) => summarize_response_body(raw),
    };

    Error::Api {
        status: status.as_u16(),
        message,
    }
}

/// Parse and check a backend base URL: absolute, http(s), usable as a base.
pub fn parse_base_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| Error::Config(format!("invalid backend URL {:?}: {}", raw, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::Config(format!(
            "backend URL must be http or https, got {:?}",
            url.scheme()
        )));
    }
    if url.cannot_be_a_base() {
        return Err(Error::Config(format!("{} cannot be used as a base URL", url)));
    }
    Ok(url)
}

/// Async client for the forecasting backend.
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct AirQualityClient {
    client: reqwest::Client,
    base_url: Url,
    request_timeout: Duration,
}

impl AirQualityClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Result<Self> {
        let base_url = parse_base_url(base_url)?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(4)
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                Error::Config(format!(
                    "failed to build HTTP client: {}",
                    format_reqwest_error(&e)
                ))
            })?;

        info!(
            "Backend client ready: {} (timeout {:?})",
            base_url, request_timeout
        );

        Ok(Self {
            client,
            base_url,
            request_timeout,
        })
    }

    pub fn from_config(cfg: &DashboardConfig) -> Result<Self> {
        Self::new(&cfg.api_base_url, cfg.timing.request_timeout())
    }

    /// Base URL with `segments` appended, each percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::Config(format!("{} cannot be used as a base URL", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn transport_error(&self, err: reqwest::Error) -> Error {
        if err.is_timeout() {
            Error::Timeout(self.request_timeout)
        } else {
            Error::Http(format_reqwest_error(&err))
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!("GET {}", url);

        let resp = self
            .client
            .get(url.clone())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(api_error(status, &body));
        }

        let body = resp.text().await.map_err(|e| self.transport_error(e))?;
        serde_json::from_str(&body)
            .map_err(|e| Error::Decode(format!("{}: {}", url.path(), e)))
    }

    // ── Location resources ────────────────────────────────────────────

    /// `GET /forecast/{location}?hours=`
    pub async fn get_forecast(&self, location: &str, hours: u32) -> Result<ForecastResponse> {
        let mut url = self.endpoint(&["forecast", location])?;
        url.query_pairs_mut()
            .append_pair("hours", &hours.to_string());

        let data: ForecastResponse = self.get_json(url).await?;
        debug!(
            "Got {} forecast points for {}",
            data.forecasts.len(),
            location
        );
        Ok(data)
    }

    /// `GET /historical/{location}?days=`
    pub async fn get_historical(&self, location: &str, days: u32) -> Result<HistoricalResponse> {
        let mut url = self.endpoint(&["historical", location])?;
        url.query_pairs_mut().append_pair("days", &days.to_string());

        let data: HistoricalResponse = self.get_json(url).await?;
        debug!("Got {} historical points for {}", data.data.len(), location);
        Ok(data)
    }

    /// `GET /alerts/{location}`
    pub async fn get_alerts(&self, location: &str) -> Result<AlertsResponse> {
        let url = self.endpoint(&["alerts", location])?;
        self.get_json(url).await
    }

    /// `GET /health-recommendations/{location}`
    pub async fn get_health_recommendations(
        &self,
        location: &str,
    ) -> Result<HealthRecommendationsResponse> {
        let url = self.endpoint(&["health-recommendations", location])?;
        self.get_json(url).await
    }

    /// `GET /validation/{location}`
    pub async fn get_validation(&self, location: &str) -> Result<ValidationResponse> {
        let url = self.endpoint(&["validation", location])?;
        self.get_json(url).await
    }

    // ── Global resources ──────────────────────────────────────────────

    /// `GET /data/status`
    pub async fn get_system_status(&self) -> Result<SystemStatus> {
        let url = self.endpoint(&["data", "status"])?;
        self.get_json(url).await
    }

    /// `GET /locations`
    pub async fn get_locations(&self) -> Result<LocationsResponse> {
        let url = self.endpoint(&["locations"])?;
        self.get_json(url).await
    }

    /// `GET /health`
    pub async fn health_check(&self) -> Result<HealthCheck> {
        let url = self.endpoint(&["health"])?;
        self.get_json(url).await
    }

    // ── Cache fetchers ────────────────────────────────────────────────

    fn location_fetcher<T, F, Fut>(&self, location: &str, call: F) -> impl Fetcher<T>
    where
        T: Send + 'static,
        F: Fn(AirQualityClient, String) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<T>> + Send + 'static,
    {
        let client = self.clone();
        let location = location.to_string();
        move || call(client.clone(), location.clone())
    }

    pub fn forecast_fetcher(&self, location: &str, hours: u32) -> impl Fetcher<ForecastResponse> {
        self.location_fetcher(location, move |client, location| async move {
            client.get_forecast(&location, hours).await
        })
    }

    pub fn historical_fetcher(&self, location: &str, days: u32) -> impl Fetcher<HistoricalResponse> {
        self.location_fetcher(location, move |client, location| async move {
            client.get_historical(&location, days).await
        })
    }

    pub fn alerts_fetcher(&self, location: &str) -> impl Fetcher<AlertsResponse> {
        self.location_fetcher(location, |client, location| async move {
            client.get_alerts(&location).await
        })
    }

    pub fn health_recommendations_fetcher(
        &self,
        location: &str,
    ) -> impl Fetcher<HealthRecommendationsResponse> {
        self.location_fetcher(location, |client, location| async move {
            client.get_health_recommendations(&location).await
        })
    }

    pub fn validation_fetcher(&self, location: &str) -> impl Fetcher<ValidationResponse> {
        self.location_fetcher(location, |client, location| async move {
            client.get_validation(&location).await
        })
    }

    pub fn system_status_fetcher(&self) -> impl Fetcher<SystemStatus> {
        let client = self.clone();
        move || {
            let client = client.clone();
            async move { client.get_system_status().await }
        }
    }
}
