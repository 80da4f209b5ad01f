use crate::api::{ProbeResult, TestConnectionRequest};
use crate::config::PanelConfig;
use crate::http::PanelClient;
use crate::version::{self, UNKNOWN_VERSION};

use regex::Regex;
use std::future::Future;
use std::sync::OnceLock;
use std::time::Duration;

/// A single bounded-time reachability + version check.
///
/// Implementations never fail: network trouble is reported through
/// `ProbeResult::failed`.
pub trait Prober: Send + Sync + 'static {
    fn probe(&self, address: &str) -> impl Future<Output = ProbeResult> + Send;
}

/// Strip whitespace and trailing slashes so the same engine is never listed twice.
pub fn normalize_address(address: &str) -> String {
    address.trim().trim_end_matches('/').to_string()
}

/// Translate a transport failure into the message shown next to a candidate.
pub(crate) fn describe_probe_error(err: &reqwest::Error) -> String {
    if err.is_timeout() {
        "Connection timeout. Check URL and firewall.".to_string()
    } else if err.is_connect() {
        "Could not connect. Is Subgen running?".to_string()
    } else {
        format!("Error: {}", err)
    }
}

/// Probes the engine directly from this process.
///
/// 1. GET `<address>` must answer 2xx within the probe timeout
/// 2. GET `<address>/version` is consulted for `{"version": ...}`
/// 3. Otherwise a release tag is scraped from the root page if it mentions Subgen
pub struct DirectProbe {
    http: reqwest::Client,
    probe_timeout: Duration,
    version_timeout: Duration,
    latest_version: String,
}

impl DirectProbe {
    pub fn new(config: &PanelConfig) -> Self {
        Self::with_timeouts(
            config.probe_timeout(),
            config.version_timeout(),
            config.latest_engine_version.clone(),
        )
    }

    pub fn with_timeouts(
        probe_timeout: Duration,
        version_timeout: Duration,
        latest_version: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            probe_timeout,
            version_timeout,
            latest_version: latest_version.into(),
        }
    }

    async fn detect_version(&self, address: &str, root_body: &str) -> String {
        match self
            .http
            .get(format!("{}/version", address))
            .timeout(self.version_timeout)
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(body) = resp.json::<serde_json::Value>().await {
                    if let Some(v) = body.get("version").and_then(|v| v.as_str()) {
                        if !v.trim().is_empty() {
                            return v.trim().to_string();
                        }
                    }
                }
            }
            Ok(resp) => {
                log::debug!("{} has no version endpoint (HTTP {})", address, resp.status());
            }
            Err(e) => {
                log::debug!("Version lookup on {} failed: {}", address, e);
            }
        }

        scrape_version(root_body).unwrap_or_else(|| UNKNOWN_VERSION.to_string())
    }
}

/// Pull a calendar release tag out of a Subgen landing page.
fn scrape_version(body: &str) -> Option<String> {
    static VERSION_REGEX: OnceLock<Regex> = OnceLock::new();
    let lower = body.to_lowercase();
    if !lower.contains("subgen") {
        return None;
    }
    let regex = VERSION_REGEX
        .get_or_init(|| Regex::new(r"v?(\d{4}\.\d{2}\.\d+)").expect("version regex should compile"));
    regex
        .captures(&lower)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
}

impl Prober for DirectProbe {
    async fn probe(&self, address: &str) -> ProbeResult {
        let address = normalize_address(address);

        let resp = match self
            .http
            .get(&address)
            .timeout(self.probe_timeout)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) => {
                log::debug!("Probe of {} failed: {}", address, e);
                return ProbeResult::failed(address, describe_probe_error(&e));
            }
        };

        if !resp.status().is_success() {
            let msg = format!("Error: HTTP {}", resp.status());
            return ProbeResult::failed(address, msg);
        }

        let body = resp.text().await.unwrap_or_default();
        let version = self.detect_version(&address, &body).await;
        let is_outdated = version::is_outdated(&version, &self.latest_version);
        log::info!("Found Subgen at {} (version {})", address, version);
        ProbeResult::reachable(address, version, is_outdated)
    }
}

/// Asks the control-panel service to probe on our behalf, so the check runs
/// from the panel's network (typically inside the docker network).
pub struct ServiceProbe {
    client: PanelClient,
}

impl ServiceProbe {
    pub fn new(client: PanelClient) -> Self {
        Self { client }
    }
}

impl Prober for ServiceProbe {
    async fn probe(&self, address: &str) -> ProbeResult {
        let address = normalize_address(address);
        let body = TestConnectionRequest { url: &address };
        match self
            .client
            .send_json::<_, ProbeResult>(reqwest::Method::POST, "/api/connection/test", &body)
            .await
        {
            Ok(result) => result,
            Err(e) => {
                log::warn!("Panel could not test {}: {}", address, e);
                ProbeResult::failed(address, e.to_string())
            }
        }
    }
}
