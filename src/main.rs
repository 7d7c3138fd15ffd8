//! news-relay — binary entrypoint.
//! Runs every configured source once (or on an interval) and exits.

use std::process::ExitCode;
use std::time::Duration;

use news_relay::metrics::Metrics;
use news_relay::RelayConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const ENV_INTERVAL_SECS: &str = "RELAY_INTERVAL_SECS";

/// `RUST_LOG` filter (default `news_relay=info,warn`); `LOG_FORMAT=json`
/// switches to JSON lines.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("news_relay=info,warn"));
    let json = std::env::var("LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).init();
    } else {
        registry.with(fmt::layer().compact()).init();
    }
}

async fn run(cfg: &RelayConfig, metrics: Option<&Metrics>) -> bool {
    let ok = match news_relay::run_configured(cfg).await {
        Ok(report) => {
            tracing::info!(
                sources = report.sources.len(),
                notified = report.notified(),
                unavailable = report.sources.iter().filter(|s| s.error.is_some()).count(),
                persisted = report.persisted,
                "run finished"
            );
            true
        }
        Err(e) => {
            tracing::error!(error = ?e, "run aborted");
            false
        }
    };
    if let Some(m) = metrics {
        if let Err(e) = m.flush() {
            tracing::warn!(error = ?e, "metrics textfile not written");
        }
    }
    ok
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = match RelayConfig::load_default() {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(error = ?e, "config error");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = cfg.webhook().and_then(|_| cfg.validate()) {
        tracing::error!(error = %e, "config error");
        return ExitCode::FAILURE;
    }

    let metrics = Metrics::from_env();

    let interval = std::env::var(ENV_INTERVAL_SECS)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|s| *s > 0);

    let Some(secs) = interval else {
        return if run(&cfg, metrics.as_ref()).await {
            ExitCode::SUCCESS
        } else {
            ExitCode::FAILURE
        };
    };

    tracing::info!(interval_secs = secs, "running on an interval");
    let mut ticker = tokio::time::interval(Duration::from_secs(secs));
    loop {
        ticker.tick().await;
        run(&cfg, metrics.as_ref()).await;
    }
}
