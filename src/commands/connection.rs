use super::{Context, interrupted};

use anyhow::{Context as _, Result, bail};
use std::sync::Arc;
use subbrain_core::api::ProbeResult;
use subbrain_core::{DirectProbe, DiscoveryCoordinator, HealthPoller, HealthStatus, Prober, ServiceProbe};

pub async fn discover(ctx: &Context, direct: bool, select: bool, extra: Vec<String>) -> Result<()> {
    if direct {
        let mut candidates = ctx.config.candidates.clone();
        candidates.extend(extra);
        let mut coordinator = DiscoveryCoordinator::new(Arc::new(DirectProbe::new(&ctx.config)));
        coordinator.scan(&candidates).await;
        report(ctx, &mut coordinator, select)
    } else {
        if !extra.is_empty() {
            log::warn!("--candidate is ignored unless --direct is given");
        }
        let mut coordinator = DiscoveryCoordinator::new(Arc::new(ServiceProbe::new(ctx.client.clone())));
        coordinator
            .discover(&ctx.client)
            .await
            .with_context(|| format!("Auto-detect through {} failed", ctx.client.base_url()))?;
        report(ctx, &mut coordinator, select)
    }
}

fn report<P: Prober>(ctx: &Context, coordinator: &mut DiscoveryCoordinator<P>, select: bool) -> Result<()> {
    if coordinator.results().is_empty() {
        println!("No candidates were tested.");
        return Ok(());
    }
    for result in coordinator.results() {
        println!("{}", format_probe(result));
    }

    let default = coordinator.default_selection().map(str::to_string);
    match default {
        None => println!("\nNo Subgen instance found. Try `subbrain connect <url>`."),
        Some(address) if !select => println!("\nRun `subbrain connect {}` to use it.", address),
        Some(_) => {
            coordinator.auto_select();
            let address = coordinator.commit(&ctx.session)?;
            println!("\nConnected to {}", address);
        }
    }
    Ok(())
}

pub async fn test(ctx: &Context, url: &str) -> Result<()> {
    let coordinator = DiscoveryCoordinator::new(Arc::new(ServiceProbe::new(ctx.client.clone())));
    let result = coordinator.probe(url).await;
    println!("{}", format_probe(&result));
    Ok(())
}

/// Only an address that answered the check can become the active endpoint.
pub async fn connect(ctx: &Context, url: &str) -> Result<()> {
    let mut coordinator = DiscoveryCoordinator::new(Arc::new(ServiceProbe::new(ctx.client.clone())));
    let result = coordinator.test_one(url).await;
    println!("{}", format_probe(&result));

    if !result.success {
        bail!(
            "{} did not answer ({}); the active endpoint is unchanged",
            result.address,
            result.error.as_deref().unwrap_or("unknown error")
        );
    }
    let address = coordinator.commit(&ctx.session)?;
    println!("Connected to {}", address);
    Ok(())
}

pub fn disconnect(ctx: &Context) -> Result<()> {
    let Some(address) = ctx.session.active() else {
        println!("Not connected.");
        return Ok(());
    };
    ctx.session.clear();
    ctx.store
        .forget()
        .with_context(|| format!("Failed to update {}", ctx.store.path().display()))?;
    println!("Disconnected from {}", address);
    Ok(())
}

pub async fn status(ctx: &Context, watch: bool) -> Result<()> {
    let Some(address) = ctx.session.active() else {
        println!("No Subgen instance selected. Run `subbrain discover`.");
        return Ok(());
    };
    println!("Active endpoint: {}", address);
    println!("Control panel:   {}", ctx.client.base_url());

    let prober = Arc::new(ServiceProbe::new(ctx.client.clone()));
    if !watch {
        let result = DiscoveryCoordinator::new(prober).probe(&address).await;
        println!("{}", format_probe(&result));
        return Ok(());
    }

    let poller = HealthPoller::start(
        &ctx.runtime,
        ctx.session.clone(),
        prober,
        ctx.config.health_interval(),
    );
    let mut rx = poller.subscribe();
    loop {
        tokio::select! {
            _ = interrupted() => break,
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                if let Some(status) = rx.borrow_and_update().clone() {
                    println!("{}", format_health(&status));
                }
            }
        }
    }
    Ok(())
}

fn format_probe(result: &ProbeResult) -> String {
    if result.success {
        let outdated = if result.is_outdated { " (update available)" } else { "" };
        format!("  ok    {}  version {}{}", result.address, result.version, outdated)
    } else {
        format!(
            "  fail  {}  {}",
            result.address,
            result.error.as_deref().unwrap_or("unknown error")
        )
    }
}

fn format_health(status: &HealthStatus) -> String {
    if status.reachable {
        let outdated = if status.is_outdated { ", update available" } else { "" };
        format!("[check {}] {} is up, version {}{}", status.checks, status.address, status.version, outdated)
    } else {
        format!(
            "[check {}] {} is down ({} failure(s)): {}",
            status.checks,
            status.address,
            status.consecutive_failures,
            status.last_error.as_deref().unwrap_or("unknown error")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use subbrain_core::{FileSessionStore, PanelConfig, SessionStore};
    use tokio::runtime::Handle;

    fn offline_context(dir: &std::path::Path) -> Context {
        let config = PanelConfig {
            panel_url: "http://127.0.0.1:1".into(),
            ..PanelConfig::default()
        };
        let store = Arc::new(FileSessionStore::new(dir.join("session.json")));
        Context::with_store(config, Handle::current(), store)
    }

    #[tokio::test]
    async fn unreachable_address_is_never_selected() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = offline_context(dir.path());

        assert!(connect(&ctx, "http://127.0.0.1:2").await.is_err());
        assert_eq!(ctx.session.active(), None);
        assert_eq!(ctx.store.load().unwrap(), None);
    }

    #[tokio::test]
    async fn failed_connect_keeps_previous_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = offline_context(dir.path());
        ctx.session.select("http://subgen:9000");

        assert!(connect(&ctx, "http://127.0.0.1:2").await.is_err());
        assert_eq!(ctx.session.active().as_deref(), Some("http://subgen:9000"));
    }

    #[test]
    fn probe_lines() {
        let ok = ProbeResult::reachable("http://subgen:9000", "2025.01.1", true);
        assert_eq!(
            format_probe(&ok),
            "  ok    http://subgen:9000  version 2025.01.1 (update available)"
        );
        let failed = ProbeResult::failed("http://172.17.0.1:9000", "Could not connect. Is Subgen running?");
        assert_eq!(
            format_probe(&failed),
            "  fail  http://172.17.0.1:9000  Could not connect. Is Subgen running?"
        );
    }

    #[test]
    fn health_line_keeps_last_error() {
        let status = HealthStatus {
            address: "http://a".into(),
            reachable: false,
            version: "2026.02.0".into(),
            is_outdated: false,
            last_error: Some("Connection timeout. Check URL and firewall.".into()),
            consecutive_failures: 2,
            checks: 5,
        };
        assert_eq!(
            format_health(&status),
            "[check 5] http://a is down (2 failure(s)): Connection timeout. Check URL and firewall."
        );
    }
}
