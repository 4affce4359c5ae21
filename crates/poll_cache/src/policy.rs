//! Revalidation policies per resource kind.

use std::time::Duration;

/// Bound applied to every fetch unless the application configures another.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// How often a cache revalidates, and whether focus regain triggers a fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevalidatePolicy {
    pub interval: Duration,
    pub revalidate_on_focus: bool,
}

impl RevalidatePolicy {
    pub const fn new(interval: Duration, revalidate_on_focus: bool) -> Self {
        Self {
            interval,
            revalidate_on_focus,
        }
    }
}

/// The backend resources the dashboard polls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    Forecast,
    Historical,
    Alerts,
    HealthRecommendations,
    SystemStatus,
    ValidationMetrics,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::Forecast,
        ResourceKind::Historical,
        ResourceKind::Alerts,
        ResourceKind::HealthRecommendations,
        ResourceKind::SystemStatus,
        ResourceKind::ValidationMetrics,
    ];

    /// Fixed per-kind policy.
    pub const fn policy(self) -> RevalidatePolicy {
        match self {
            ResourceKind::Forecast => RevalidatePolicy::new(Duration::from_secs(5 * 60), false),
            ResourceKind::Historical => RevalidatePolicy::new(Duration::from_secs(15 * 60), false),
            ResourceKind::Alerts => RevalidatePolicy::new(Duration::from_secs(2 * 60), true),
            ResourceKind::HealthRecommendations => {
                RevalidatePolicy::new(Duration::from_secs(10 * 60), false)
            }
            ResourceKind::SystemStatus => RevalidatePolicy::new(Duration::from_secs(30), true),
            ResourceKind::ValidationMetrics => {
                RevalidatePolicy::new(Duration::from_secs(30 * 60), false)
            }
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ResourceKind::Forecast => "forecast",
            ResourceKind::Historical => "historical",
            ResourceKind::Alerts => "alerts",
            ResourceKind::HealthRecommendations => "health_recommendations",
            ResourceKind::SystemStatus => "system_status",
            ResourceKind::ValidationMetrics => "validation_metrics",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intervals_match_table() {
        let expected = [
            (ResourceKind::Forecast, 300, false),
            (ResourceKind::Historical, 900, false),
            (ResourceKind::Alerts, 120, true),
            (ResourceKind::HealthRecommendations, 600, false),
            (ResourceKind::SystemStatus, 30, true),
            (ResourceKind::ValidationMetrics, 1800, false),
        ];
        for (kind, secs, focus) in expected {
            let policy = kind.policy();
            assert_eq!(policy.interval, Duration::from_secs(secs), "{:?}", kind);
            assert_eq!(policy.revalidate_on_focus, focus, "{:?}", kind);
        }
    }

    #[test]
    fn test_intervals_are_distinct() {
        let mut intervals: Vec<_> = ResourceKind::ALL.iter().map(|k| k.policy().interval).collect();
        intervals.sort();
        intervals.dedup();
        assert_eq!(intervals.len(), ResourceKind::ALL.len());
    }
}
