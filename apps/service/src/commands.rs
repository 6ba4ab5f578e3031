use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use svcwatch::{
    CycleOutcome, CycleReport, Endpoint, EndpointCatalog, EndpointId, EndpointStore, FanoutNotifier, LogNotifier,
    MemoryStore, Millis, NewEndpoint, PollCoordinator, ProbeExecutor, SkipReason, StoreError, TcpConnectivity,
    WebhookNotifier, now_millis,
};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::config::{self, Config};
use crate::database::LibsqlStore;
use crate::trigger::ScanTrigger;

async fn open_store(config: &Config) -> Result<LibsqlStore> {
    LibsqlStore::open(&config.database.path)
        .await
        .with_context(|| format!("Failed to open database {}", config.database.path))
}

/// Log notifier, plus the webhook when one is configured
fn build_notifier(alerts: &config::Alerts) -> Result<FanoutNotifier> {
    let mut notifier = FanoutNotifier::new().with(Arc::new(LogNotifier));

    if !alerts.webhook_url.trim().is_empty() {
        let webhook = WebhookNotifier::new(
            alerts.webhook_url.trim(),
            Duration::from_secs(alerts.webhook_timeout_seconds),
        )
        .context("Failed to build webhook client")?;
        notifier = notifier.with(Arc::new(webhook));
    }

    Ok(notifier)
}

fn build_coordinator(config: &Config, store: Arc<dyn EndpointStore>) -> Result<PollCoordinator> {
    let settings = config.monitor.to_settings();
    settings.validate().context("Invalid [monitor] configuration")?;

    let executor = ProbeExecutor::http(&settings).context("Failed to build HTTP client")?;
    let notifier = build_notifier(&config.alerts)?;
    let mut coordinator = PollCoordinator::new(settings, store, executor, Arc::new(notifier));

    if config.connectivity.enabled {
        let connectivity = TcpConnectivity::new(
            config.connectivity.target.clone(),
            Duration::from_secs(config.connectivity.timeout_seconds),
        );
        debug!("Cycles are gated on connectivity to {}", connectivity.target());
        coordinator = coordinator.with_connectivity(Arc::new(connectivity));
    }

    Ok(coordinator)
}

pub async fn run(config: &Config) -> Result<()> {
    let store = Arc::new(open_store(config).await?);
    let coordinator = Arc::new(build_coordinator(config, store)?);

    let budget = config.monitor.to_settings().probe_budget();
    if budget > config.monitor.trigger_interval() {
        warn!(
            "A single probe may take up to {}s, longer than the {}s trigger interval; slow cycles will skip ticks",
            budget.as_secs(),
            config.monitor.trigger_interval_seconds
        );
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let trigger =
        ScanTrigger::new(coordinator, config.monitor.trigger_interval()).active(config.monitor.active);
    let mut handle = tokio::spawn(trigger.run(shutdown_rx));

    tokio::select! {
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for Ctrl-C")?;
            info!("Shutdown signal received");
            let _ = shutdown_tx.send(true);
            handle.await.context("Scan trigger task failed")?;
        }
        finished = &mut handle => finished.context("Scan trigger task failed")?,
    }

    Ok(())
}

pub async fn scan(config: &Config, urls: Vec<String>, json: bool) -> Result<()> {
    let mut scratch = None;
    let store: Arc<dyn EndpointStore> = if urls.is_empty() {
        Arc::new(open_store(config).await?)
    } else {
        let memory = Arc::new(MemoryStore::new());
        for url in urls {
            let endpoint = NewEndpoint::new(url.clone(), url).context("Invalid --url")?;
            memory.create(endpoint).await?;
        }
        scratch = Some(memory.clone());
        memory
    };

    let coordinator = build_coordinator(config, store)?;
    let report = match coordinator.run_cycle(now_millis()).await? {
        CycleOutcome::Completed(report) => report,
        CycleOutcome::Skipped(SkipReason::Offline) => bail!("Scan skipped: network is not reachable"),
        CycleOutcome::Skipped(SkipReason::Busy) => bail!("Scan skipped: another cycle is running"),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    print_report(&report);
    if let Some(memory) = scratch {
        println!();
        print_endpoints(&memory.list().await?);
    }
    Ok(())
}

pub async fn add(config: &Config, name: String, address: String) -> Result<()> {
    let endpoint = NewEndpoint::new(name, address).context("Invalid endpoint")?;
    let store = open_store(config).await?;

    let created = store.create(endpoint).await?;
    println!("Added {} {} ({})", created.id, created.name, created.address);
    Ok(())
}

pub async fn edit(config: &Config, id: i64, name: Option<String>, address: Option<String>) -> Result<()> {
    if name.is_none() && address.is_none() {
        bail!("Nothing to change: pass --name and/or --address");
    }

    let id = EndpointId(id);
    let store = open_store(config).await?;
    let Some(existing) = store.get(id).await? else {
        bail!("Endpoint {id} not found");
    };

    let endpoint = NewEndpoint::new(name.unwrap_or(existing.name), address.unwrap_or(existing.address))
        .context("Invalid endpoint")?;
    let updated = store.update(id, endpoint).await?;
    println!("Updated {} {} ({}), history reset", updated.id, updated.name, updated.address);
    Ok(())
}

pub async fn remove(config: &Config, id: i64) -> Result<()> {
    let id = EndpointId(id);
    let store = open_store(config).await?;

    match store.delete(id).await {
        Ok(()) => {
            println!("Removed {id}");
            Ok(())
        }
        Err(StoreError::NotFound(_)) => bail!("Endpoint {id} not found"),
        Err(e) => Err(e.into()),
    }
}

pub async fn list(config: &Config, json: bool) -> Result<()> {
    let store = open_store(config).await?;
    let endpoints = store.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&endpoints)?);
        return Ok(());
    }

    print_endpoints(&endpoints);
    if let Some(since) = active_since(&endpoints) {
        println!();
        println!("Active since {}", format_time(since));
    }
    Ok(())
}

/// Oldest last check among probed endpoints
fn active_since(endpoints: &[Endpoint]) -> Option<Millis> {
    endpoints.iter().map(|e| e.last_check).filter(|at| *at > 0).min()
}

fn format_time(millis: Millis) -> String {
    match DateTime::<Utc>::from_timestamp_millis(millis) {
        Some(at) if millis > 0 => at.format("%Y-%m-%d %H:%M:%S").to_string(),
        _ => "never".to_string(),
    }
}

fn print_endpoints(endpoints: &[Endpoint]) {
    if endpoints.is_empty() {
        println!("No endpoints configured");
        return;
    }

    println!("{:<6} {:<20} {:<6} {:<20} {:<20} ADDRESS", "ID", "NAME", "STATUS", "LAST OK", "LAST CHECK");
    for endpoint in endpoints {
        println!(
            "{:<6} {:<20} {:<6} {:<20} {:<20} {}",
            endpoint.id.0,
            endpoint.name,
            endpoint.status,
            format_time(endpoint.last_ok),
            format_time(endpoint.last_check),
            endpoint.address
        );
    }
}

fn print_report(report: &CycleReport) {
    println!(
        "Checked {} endpoint(s) in {:.1}s: {} ok, {} failed",
        report.due,
        report.elapsed.as_secs_f64(),
        report.succeeded,
        report.failed
    );
    if report.discarded > 0 {
        println!("{} failure(s) discarded, network went away", report.discarded);
    }
    for (id, error) in &report.apply_errors {
        println!("Could not store result for {id}: {error}");
    }
    println!("Alarm: {} ({} endpoint(s))", report.decision.tier, report.decision.count);
}

#[cfg(test)]
mod tests {
    use super::*;
    use svcwatch::Status;

    fn endpoint(id: i64, last_check: Millis) -> Endpoint {
        Endpoint {
            id: EndpointId(id),
            name: format!("svc-{id}"),
            address: format!("https://svc-{id}.example.org"),
            status: Status::Ok,
            last_ok: last_check,
            last_check,
            notified: false,
        }
    }

    #[test]
    fn test_active_since_ignores_unprobed() {
        let endpoints = vec![endpoint(1, 0), endpoint(2, 5_000), endpoint(3, 2_000)];
        assert_eq!(active_since(&endpoints), Some(2_000));
        assert_eq!(active_since(&[endpoint(1, 0)]), None);
    }

    #[test]
    fn test_format_time() {
        assert_eq!(format_time(0), "never");
        assert_eq!(format_time(1_700_000_000_000), "2023-11-14 22:13:20");
    }

    #[test]
    fn test_webhook_added_only_when_configured() {
        let mut alerts = config::Alerts::default();
        assert_eq!(build_notifier(&alerts).unwrap().len(), 1);

        alerts.webhook_url = "https://hooks.example.org/svcwatch".into();
        assert_eq!(build_notifier(&alerts).unwrap().len(), 2);
    }

    #[test]
    fn test_invalid_monitor_config_is_rejected() {
        let mut config = Config::default();
        config.monitor.retry_attempts = 0;

        let store: Arc<dyn EndpointStore> = Arc::new(MemoryStore::new());
        assert!(build_coordinator(&config, store).is_err());
    }

    #[tokio::test]
    async fn test_catalog_commands_against_database() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.database.path = dir.path().join("svcwatch.db").to_string_lossy().into_owned();

        add(&config, "api".into(), "https://api.example.org/health".into()).await.unwrap();
        edit(&config, 1, None, Some("https://api.example.org/v2/health".into())).await.unwrap();
        assert!(edit(&config, 1, None, None).await.is_err());
        assert!(add(&config, "bad".into(), "ftp://example.org".into()).await.is_err());

        let store = open_store(&config).await.unwrap();
        let endpoints = store.list().await.unwrap();
        assert_eq!(endpoints.len(), 1);
        assert_eq!(endpoints[0].address, "https://api.example.org/v2/health");

        remove(&config, 1).await.unwrap();
        assert!(remove(&config, 1).await.is_err());
    }
}
