//! Cache wiring and text rendering for the headless dashboard.

use std::time::Duration;

use aq_client::AirQualityClient;
use common::config::{DashboardConfig, LocationConfig};
use common::{
    classify_opt, format_number, AlertsResponse, ForecastResponse,
    HealthRecommendationsResponse, HistoricalResponse, LocationsResponse, SystemStatus,
    ValidationResponse,
};
use poll_cache::{CacheStats, PollingCache, ResourceKind, Snapshot, Subscription};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Cache key for the single global system-status resource.
pub const STATUS_KEY: &str = "backend";

/// One-line text form of a backend resource.
pub trait Render {
    fn render(&self, name: &str) -> String;
}

fn aqi_with_label(aqi: Option<f64>) -> String {
    let label = classify_opt(aqi).map_or("no data", |band| band.label);
    format!("AQI {} ({})", format_number(aqi, 0), label)
}

fn format_age(age: Duration) -> String {
    let secs = age.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else {
        format!("{}m", secs / 60)
    }
}

impl Render for ForecastResponse {
    fn render(&self, name: &str) -> String {
        let mut line = format!("{}: {}", name, aqi_with_label(self.current_aqi()));
        if let (Some(point), Some(peak)) = (self.current(), self.peak()) {
            if peak.band().level > point.band().level {
                line.push_str(&format!(
                    ", peak {} in the next {}h",
                    aqi_with_label(Some(peak.aqi_predicted)),
                    self.forecasts.len()
                ));
            }
        }
        line
    }
}

impl Render for AlertsResponse {
    fn render(&self, name: &str) -> String {
        let head = format!("{}: {}", name, aqi_with_label(Some(self.aqi)));
        match self.most_severe() {
            Some(alert) => format!(
                "{}; {} alert(s), most severe: {} [{}]",
                head,
                self.alerts.len(),
                alert.title,
                alert.level.band().label
            ),
            None => format!("{}; no active alerts", head),
        }
    }
}

impl Render for HealthRecommendationsResponse {
    fn render(&self, name: &str) -> String {
        format!("{}: {}", name, self.recommendations)
    }
}

impl Render for HistoricalResponse {
    fn render(&self, name: &str) -> String {
        let latest = self.data.iter().max_by_key(|p| p.datetime);
        match latest {
            Some(point) => format!(
                "{}: {} observations over {}d, latest {} (O3 {}, NO2 {})",
                name,
                self.data.len(),
                self.days,
                point.datetime.format("%Y-%m-%d %H:%M"),
                format_number(point.o3_actual, 1),
                format_number(point.no2_actual, 1)
            ),
            None => format!("{}: no observations in the last {}d", name, self.days),
        }
    }
}

impl Render for ValidationResponse {
    fn render(&self, name: &str) -> String {
        let v = &self.validation;
        format!(
            "{}: accuracy pandora={}% airnow={}%, model confidence {}%",
            name,
            format_number(v.pandora_accuracy, 1),
            format_number(v.airnow_accuracy, 1),
            format_number(v.model_confidence, 1)
        )
    }
}

impl Render for SystemStatus {
    fn render(&self, name: &str) -> String {
        let stale = self.stale_locations();
        let mut line = format!(
            "{}: {}/{} locations collected ({}%)",
            name,
            self.collected_locations,
            self.total_locations,
            format_number(Some(self.coverage() * 100.0), 0)
        );
        if !stale.is_empty() {
            line.push_str(&format!(", stale: {}", stale.join(", ")));
        }
        line
    }
}

/// Render a snapshot, marking values kept after a failed refresh.
pub fn describe<T: Render>(name: &str, snapshot: &Snapshot<T>) -> String {
    match (&snapshot.value, &snapshot.error) {
        (Some(value), None) => value.render(name),
        (Some(value), Some(err)) => {
            let age = snapshot
                .age()
                .map(|age| format!(", data {} old", format_age(age)))
                .unwrap_or_default();
            format!(
                "{} [stale: refresh failed ({}){}]",
                value.render(name),
                err.kind(),
                age
            )
        }
        (None, Some(err)) => format!("{}: unavailable ({})", name, err),
        (None, None) if snapshot.is_loading => format!("{}: loading", name),
        (None, None) => format!("{}: no data", name),
    }
}

/// One polling cache per backend resource kind.
#[derive(Clone)]
pub struct DashboardCaches {
    pub forecast: PollingCache<String, ForecastResponse>,
    pub historical: PollingCache<String, HistoricalResponse>,
    pub alerts: PollingCache<String, AlertsResponse>,
    pub health: PollingCache<String, HealthRecommendationsResponse>,
    pub status: PollingCache<String, SystemStatus>,
    pub validation: PollingCache<String, ValidationResponse>,
}

impl DashboardCaches {
    pub fn new(request_timeout: Duration) -> Self {
        Self {
            forecast: PollingCache::for_resource(ResourceKind::Forecast, request_timeout),
            historical: PollingCache::for_resource(ResourceKind::Historical, request_timeout),
            alerts: PollingCache::for_resource(ResourceKind::Alerts, request_timeout),
            health: PollingCache::for_resource(
                ResourceKind::HealthRecommendations,
                request_timeout,
            ),
            status: PollingCache::for_resource(ResourceKind::SystemStatus, request_timeout),
            validation: PollingCache::for_resource(
                ResourceKind::ValidationMetrics,
                request_timeout,
            ),
        }
    }

    /// Revalidate focus-enabled caches. Returns the number of fetches started.
    pub fn notify_focus_regained(&self) -> usize {
        self.forecast.notify_focus_regained()
            + self.historical.notify_focus_regained()
            + self.alerts.notify_focus_regained()
            + self.health.notify_focus_regained()
            + self.status.notify_focus_regained()
            + self.validation.notify_focus_regained()
    }

    pub fn stats(&self) -> Vec<(&str, CacheStats)> {
        vec![
            (self.forecast.name(), self.forecast.stats()),
            (self.historical.name(), self.historical.stats()),
            (self.alerts.name(), self.alerts.stats()),
            (self.health.name(), self.health.stats()),
            (self.status.name(), self.status.stats()),
            (self.validation.name(), self.validation.stats()),
        ]
    }

    /// Heartbeat line: `name=with_data/keys` per cache, totals, and backend
    /// coverage once system status has loaded.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        let in_flight: usize = stats.iter().map(|(_, s)| s.in_flight).sum();
        let errored: usize = stats.iter().map(|(_, s)| s.errored).sum();
        let per_cache: Vec<String> = stats
            .iter()
            .map(|(name, s)| format!("{}={}/{}", name, s.with_data, s.keys))
            .collect();
        let mut line = format!(
            "{} in_flight={} errored={}",
            per_cache.join(" "),
            in_flight,
            errored
        );

        let status = self
            .status
            .peek(&STATUS_KEY.to_string())
            .and_then(|snapshot| snapshot.value);
        if let Some(status) = status {
            line.push_str(&format!(
                " coverage={}%",
                format_number(Some(status.coverage() * 100.0), 0)
            ));
        }
        line
    }
}

/// Configured location keys the backend does not serve.
pub fn unknown_locations<'a>(
    configured: &'a [LocationConfig],
    served: &LocationsResponse,
) -> Vec<&'a str> {
    configured
        .iter()
        .map(|l| l.key.as_str())
        .filter(|key| !served.locations.iter().any(|s| s == key))
        .collect()
}

/// Live subscriptions for one location.
pub struct LocationSubscriptions {
    pub location: LocationConfig,
    pub forecast: Subscription<String, ForecastResponse>,
    pub historical: Subscription<String, HistoricalResponse>,
    pub alerts: Subscription<String, AlertsResponse>,
    pub health: Subscription<String, HealthRecommendationsResponse>,
    pub validation: Subscription<String, ValidationResponse>,
}

pub fn subscribe_location(
    caches: &DashboardCaches,
    client: &AirQualityClient,
    cfg: &DashboardConfig,
    location: &LocationConfig,
) -> LocationSubscriptions {
    let key = location.key.clone();
    debug!("Subscribing {} ({})", location.display_name(), key);

    LocationSubscriptions {
        location: location.clone(),
        forecast: caches.forecast.subscribe(
            key.clone(),
            client.forecast_fetcher(&key, cfg.query.forecast_hours),
        ),
        historical: caches.historical.subscribe(
            key.clone(),
            client.historical_fetcher(&key, cfg.query.historical_days),
        ),
        alerts: caches
            .alerts
            .subscribe(key.clone(), client.alerts_fetcher(&key)),
        health: caches
            .health
            .subscribe(key.clone(), client.health_recommendations_fetcher(&key)),
        validation: caches
            .validation
            .subscribe(key.clone(), client.validation_fetcher(&key)),
    }
}

pub fn subscribe_status(
    caches: &DashboardCaches,
    client: &AirQualityClient,
) -> Subscription<String, SystemStatus> {
    caches
        .status
        .subscribe(STATUS_KEY.to_string(), client.system_status_fetcher())
}

/// Wait until no fetch is outstanding, then render.
async fn settled<T: Render + Send + Sync + 'static>(
    name: &str,
    sub: &mut Subscription<String, T>,
) -> String {
    match sub.wait_for(|s| !s.is_validating).await {
        Some(snapshot) => describe(name, &snapshot),
        None => format!("{}: cache closed", name),
    }
}

impl LocationSubscriptions {
    /// Wait for every resource of this location to settle and render them,
    /// one line per resource.
    pub async fn render_settled(&mut self) -> Vec<String> {
        let name = self.location.display_name().to_string();
        vec![
            settled(&name, &mut self.forecast).await,
            settled(&name, &mut self.alerts).await,
            settled(&name, &mut self.health).await,
            settled(&name, &mut self.historical).await,
            settled(&name, &mut self.validation).await,
        ]
    }

    /// Spawn one render task per resource. Each task owns its
    /// subscription, so aborting it stops that key's polling.
    pub fn spawn_renderers(self) -> Vec<JoinHandle<()>> {
        let name = self.location.display_name().to_string();
        vec![
            spawn_renderer(format!("{} forecast", name), name.clone(), self.forecast),
            spawn_renderer(format!("{} alerts", name), name.clone(), self.alerts),
            spawn_renderer(format!("{} health", name), name.clone(), self.health),
            spawn_renderer(format!("{} historical", name), name.clone(), self.historical),
            spawn_renderer(format!("{} validation", name), name, self.validation),
        ]
    }
}

/// Log every settled state of `sub` until the cache goes away.
pub fn spawn_renderer<T>(
    task: String,
    name: String,
    mut sub: Subscription<String, T>,
) -> JoinHandle<()>
where
    T: Render + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let initial = sub.snapshot();
        if !initial.is_validating {
            info!("{}", describe(&name, &initial));
        }

        while let Some(snapshot) = sub.changed().await {
            if snapshot.is_validating {
                debug!("{}: revalidating", task);
                continue;
            }
            if snapshot.is_error() {
                warn!("{}", describe(&name, &snapshot));
            } else {
                info!("{}", describe(&name, &snapshot));
            }
        }
        debug!("{}: renderer stopped", task);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::Error;
    use std::sync::Arc;

    fn forecast(aqis: &[f64]) -> ForecastResponse {
        let points: Vec<_> = aqis
            .iter()
            .map(|aqi| serde_json::json!({ "aqi_predicted": aqi }))
            .collect();
        serde_json::from_value(serde_json::json!({
            "location": "Washington_DC",
            "forecasts": points,
        }))
        .unwrap()
    }

    fn snapshot<T>(value: Option<T>, error: Option<Error>) -> Snapshot<T> {
        Snapshot {
            value: value.map(Arc::new),
            error: error.map(Arc::new),
            is_loading: false,
            is_validating: false,
            last_fetched_at: None,
        }
    }

    #[test]
    fn test_forecast_line() {
        assert_eq!(
            forecast(&[42.0, 40.0]).render("Washington, DC"),
            "Washington, DC: AQI 42 (Good)"
        );
        assert_eq!(
            forecast(&[42.0, 175.0]).render("Washington, DC"),
            "Washington, DC: AQI 42 (Good), peak AQI 175 (Unhealthy) in the next 2h"
        );
        assert_eq!(
            forecast(&[]).render("Houston"),
            "Houston: AQI -- (no data)"
        );
    }

    #[test]
    fn test_stale_marker_after_failed_refresh() {
        let snap = snapshot(
            Some(forecast(&[120.0])),
            Some(Error::Timeout(Duration::from_secs(10))),
        );
        assert_eq!(
            describe("Chicago", &snap),
            "Chicago: AQI 120 (Unhealthy for Sensitive Groups) [stale: refresh failed (timeout)]"
        );
    }

    #[test]
    fn test_error_without_data() {
        let snap: Snapshot<ForecastResponse> = snapshot(
            None,
            Some(Error::Api {
                status: 404,
                message: "Location not found".into(),
            }),
        );
        assert_eq!(
            describe("Atlantis", &snap),
            "Atlantis: unavailable (Backend API error (status=404): Location not found)"
        );

        let mut loading: Snapshot<ForecastResponse> = snapshot(None, None);
        loading.is_loading = true;
        assert_eq!(describe("Atlantis", &loading), "Atlantis: loading");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stale_marker_reports_data_age() {
        let mut snap = snapshot(
            Some(forecast(&[42.0])),
            Some(Error::Http("connection refused".into())),
        );
        snap.last_fetched_at = Some(tokio::time::Instant::now());
        tokio::time::advance(Duration::from_secs(7 * 60 + 5)).await;

        assert_eq!(
            describe("Chicago", &snap),
            "Chicago: AQI 42 (Good) [stale: refresh failed (network), data 7m old]"
        );
    }

    #[test]
    fn test_unknown_locations() {
        let cfg = DashboardConfig::default();
        let served: LocationsResponse = serde_json::from_str(
            r#"{"locations": ["Washington_DC", "Los_Angeles", "New_York", "Chicago"]}"#,
        )
        .unwrap();
        assert_eq!(unknown_locations(&cfg.locations, &served), vec!["Houston"]);
    }

    #[test]
    fn test_alerts_line() {
        let alerts: AlertsResponse = serde_json::from_str(
            r#"{"location": "Los_Angeles", "aqi": 160, "alerts": [
                {"level": "unhealthy_sensitive", "title": "Sensitive groups advisory"},
                {"level": "unhealthy", "title": "Unhealthy Air Quality"}
            ]}"#,
        )
        .unwrap();
        assert_eq!(
            alerts.render("Los Angeles, CA"),
            "Los Angeles, CA: AQI 160 (Unhealthy); 2 alert(s), most severe: Unhealthy Air Quality [Unhealthy]"
        );
    }

    #[test]
    fn test_status_line() {
        let status: SystemStatus = serde_json::from_str(
            r#"{"total_locations": 5, "collected_locations": 4, "last_updates": {
                "Houston": {"timestamp": "2025-10-05T02:00:00", "is_fresh": false}
            }}"#,
        )
        .unwrap();
        assert_eq!(
            status.render(STATUS_KEY),
            "backend: 4/5 locations collected (80%), stale: Houston"
        );
    }

    #[tokio::test]
    async fn test_caches_use_resource_policies() {
        let caches = DashboardCaches::new(Duration::from_secs(10));
        assert_eq!(caches.alerts.policy(), ResourceKind::Alerts.policy());
        assert_eq!(caches.status.name(), "system_status");
        assert_eq!(caches.notify_focus_regained(), 0);
        assert!(caches.summary().starts_with("forecast=0/0 "));
        assert!(!caches.summary().contains("coverage"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_summary_includes_backend_coverage() {
        let caches = DashboardCaches::new(Duration::from_secs(10));
        let fetcher = || async {
            let status: SystemStatus =
                serde_json::from_str(r#"{"total_locations": 5, "collected_locations": 4}"#)?;
            Ok::<_, common::Error>(status)
        };
        let mut sub = caches.status.subscribe(STATUS_KEY.to_string(), fetcher);
        sub.wait_for(|s| s.value.is_some()).await.unwrap();

        let summary = caches.summary();
        assert!(summary.contains("system_status=1/1"), "{}", summary);
        assert!(summary.ends_with(" coverage=80%"), "{}", summary);
    }
}
