//! aqi-dashboard: headless air-quality dashboard.
//!
//! Single-binary Tokio application that:
//! 1. Subscribes every configured location to each backend resource
//! 2. Keeps the cached values fresh on per-resource intervals
//! 3. Logs each classified update, keeping stale values when a refresh fails
//! 4. Revalidates focus-enabled resources on `SIGUSR1`

mod config;
mod dashboard;

use std::time::Duration;

use clap::Parser;
use futures::future::select_all;
use tracing::{error, info, warn};

use aq_client::AirQualityClient;
use dashboard::DashboardCaches;

/// Headless air-quality dashboard
#[derive(Parser)]
#[command(name = "aqi-dashboard", about = "Headless air-quality forecast dashboard")]
struct Cli {
    /// Fetch every resource once, print the classified summary, then exit.
    #[arg(long)]
    once: bool,

    /// Only monitor this location key (e.g. Washington_DC).
    #[arg(long)]
    location: Option<String>,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "aqi_dashboard=info,aq_client=info,poll_cache=info".into()
            }),
        )
        .with_target(true)
        .init();

    let cli = Cli::parse();

    info!("AQI dashboard starting up...");

    let mut cfg = match config::load_config() {
        Ok(c) => c,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    if let Some(key) = cli.location.as_deref() {
        cfg.locations.retain(|l| l.key.eq_ignore_ascii_case(key));
        if cfg.locations.is_empty() {
            error!("Unknown location {:?}; check AQ_LOCATIONS or config.toml", key);
            std::process::exit(1);
        }
    }

    info!("Backend: {}", cfg.api_base_url);
    info!(
        "Locations: {:?}",
        cfg.locations
            .iter()
            .map(|l| l.display_name())
            .collect::<Vec<_>>()
    );
    info!(
        "Query: forecast={}h history={}d timeout={}s",
        cfg.query.forecast_hours, cfg.query.historical_days, cfg.timing.request_timeout_secs
    );

    let client = match AirQualityClient::from_config(&cfg) {
        Ok(c) => c,
        Err(e) => {
            error!("Backend client initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    match client.health_check().await {
        Ok(health) => info!("Backend health: {}", health.status),
        Err(e) => warn!("Backend health check failed ({}): {}", e.kind(), e),
    }

    match client.get_locations().await {
        Ok(served) => {
            let unknown = dashboard::unknown_locations(&cfg.locations, &served);
            if !unknown.is_empty() {
                warn!("Backend does not serve {:?}; those rows will show errors", unknown);
            }
        }
        Err(e) => warn!("Could not list backend locations ({}): {}", e.kind(), e),
    }

    let caches = DashboardCaches::new(cfg.timing.request_timeout());

    // ── One-shot mode ────────────────────────────────────────────────
    if cli.once {
        let mut status = dashboard::subscribe_status(&caches, &client);
        let mut locations: Vec<_> = cfg
            .locations
            .iter()
            .map(|l| dashboard::subscribe_location(&caches, &client, &cfg, l))
            .collect();

        for subs in &mut locations {
            for line in subs.render_settled().await {
                println!("{}", line);
            }
        }
        if let Some(snapshot) = status.wait_for(|s| !s.is_validating).await {
            println!("{}", dashboard::describe(dashboard::STATUS_KEY, &snapshot));
        }

        let failed = caches.stats().iter().map(|(_, s)| s.errored).sum::<usize>();
        if failed > 0 {
            warn!("{} resource(s) failed to load", failed);
        }
        return;
    }

    // ── Spawn tasks ──────────────────────────────────────────────────
    info!("Spawning tasks...");

    let mut render_handles = Vec::new();
    for location in &cfg.locations {
        let subs = dashboard::subscribe_location(&caches, &client, &cfg, location);
        render_handles.extend(subs.spawn_renderers());
    }
    render_handles.push(dashboard::spawn_renderer(
        "system status".to_string(),
        dashboard::STATUS_KEY.to_string(),
        dashboard::subscribe_status(&caches, &client),
    ));

    // Focus regain: SIGUSR1 stands in for the dashboard becoming visible.
    let focus_caches = caches.clone();
    let focus_handle = tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut usr1 = match signal(SignalKind::user_defined1()) {
                Ok(s) => s,
                Err(e) => {
                    warn!("SIGUSR1 handler unavailable, focus revalidation disabled: {}", e);
                    return std::future::pending::<()>().await;
                }
            };
            while usr1.recv().await.is_some() {
                let started = focus_caches.notify_focus_regained();
                info!("Focus regained: {} revalidation(s) started", started);
            }
        }
        #[cfg(not(unix))]
        {
            let _ = &focus_caches;
            std::future::pending::<()>().await;
        }
    });

    let heartbeat_interval = Duration::from_secs(cfg.timing.heartbeat_secs);
    let hb_caches = caches.clone();
    let heartbeat_handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(heartbeat_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            info!("HEARTBEAT: {}", hb_caches.summary());
        }
    });

    // ── Wait for shutdown ────────────────────────────────────────────
    info!("AQI dashboard is running. Send SIGUSR1 to revalidate, Ctrl+C to stop.");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Shutdown signal received");
        }
        r = heartbeat_handle => {
            error!("Heartbeat task exited: {:?}", r);
        }
        r = focus_handle => {
            error!("Focus task exited: {:?}", r);
        }
        (r, idx, _) = select_all(render_handles) => {
            error!("Render task {} exited: {:?}", idx, r);
        }
    }

    info!("AQI dashboard shut down.");
}
