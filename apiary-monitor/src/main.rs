//! Apiary Monitor - headless console view of live hive telemetry
//!
//! Subscribes to one view and logs every published snapshot:
//! - `apiary-monitor` or `apiary-monitor dashboard`: whole apiary
//! - `apiary-monitor hive <id>`: one colony, its server alerts and daily series
//! - `apiary-monitor reports [<id>]`: apiary summary, optional full history

use anyhow::{bail, Context, Result};
use apiary_sync::alerts::count_by_state;
use apiary_sync::report::monthly_averages;
use apiary_sync::series::today_only;
use apiary_sync::{
    HttpDataSource, MetricKind, Severity, Snapshot, SubscriptionKey, SyncConfig, SyncEngine, ViewKind,
    ViewStatus,
};
use chrono::Local;
use tracing::{info, warn};

const USAGE: &str = "usage: apiary-monitor [dashboard | hive <id> | reports [<id>]]";

fn parse_key(args: &[String]) -> Result<SubscriptionKey> {
    let words: Vec<&str> = args.iter().map(String::as_str).collect();
    match words.as_slice() {
        [] | ["dashboard"] => Ok(SubscriptionKey::dashboard()),
        ["hive", id] => Ok(SubscriptionKey::hive(*id)),
        ["reports"] => Ok(SubscriptionKey::reports(None)),
        ["reports", id] => Ok(SubscriptionKey::reports(Some(id.to_string()))),
        _ => bail!("{USAGE}"),
    }
}

fn log_snapshot(snapshot: &Snapshot) {
    match &snapshot.status {
        ViewStatus::Loading => info!("[{}] loading...", snapshot.key),
        ViewStatus::NotFound { colony_id } => warn!("[{}] colony {} no longer exists", snapshot.key, colony_id),
        ViewStatus::Misconfigured { reason } => warn!("[{}] misconfigured: {}", snapshot.key, reason),
        ViewStatus::Ready => {
            let summary = &snapshot.summary;
            info!(
                "[{}] {} colonies ({} healthy, {} need attention), {} derived alerts, {} server alerts, {} samples",
                snapshot.key,
                summary.total,
                summary.healthy,
                summary.attention(),
                snapshot.active_alert_count,
                snapshot.server_alerts.len(),
                snapshot.series.len(),
            );
            match &snapshot.key.view {
                ViewKind::Hive { .. } => {
                    let (pending, resolved) = count_by_state(&snapshot.server_alerts);
                    let today = today_only(&snapshot.series, &Local::now());
                    info!(
                        "[{}] server alerts: {} pending / {} resolved, {} samples today",
                        snapshot.key,
                        pending,
                        resolved,
                        today.len()
                    );
                }
                ViewKind::Reports { .. } => {
                    for point in monthly_averages(&snapshot.series, MetricKind::Weight, &Local) {
                        info!("[{}] {} average weight {:.1}kg", snapshot.key, point.month, point.value);
                    }
                }
                ViewKind::Dashboard => {}
            }
            for alert in snapshot.derived_alerts.iter().filter(|a| a.severity == Severity::Critical) {
                warn!(
                    "[{}] CRITICAL {} on colony {}: {}{}",
                    snapshot.key,
                    alert.category,
                    alert.colony_id,
                    alert.observed_value,
                    alert.category.unit(),
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt().init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let key = parse_key(&args)?;

    let config = SyncConfig::load().await;
    info!("🐝 Apiary monitor starting on {} ({})", config.api.base_url, key);

    let source = HttpDataSource::new(&config.api, || std::env::var("APIARY_TOKEN").ok())
        .context("Failed to build HTTP data source")?;
    let engine = SyncEngine::new(source, config).context("Invalid sync configuration")?;

    let subscription = engine.subscribe(key, log_snapshot);

    tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
    info!("stopping session {}", subscription.session_id());
    subscription.unsubscribe();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_key() {
        assert_eq!(parse_key(&args(&[])).unwrap(), SubscriptionKey::dashboard());
        assert_eq!(parse_key(&args(&["hive", "42"])).unwrap(), SubscriptionKey::hive("42"));
        assert_eq!(
            parse_key(&args(&["reports", "7"])).unwrap(),
            SubscriptionKey::reports(Some("7".into()))
        );
        assert!(parse_key(&args(&["hive"])).is_err());
        assert!(parse_key(&args(&["colonies", "1", "2"])).is_err());
    }
}
