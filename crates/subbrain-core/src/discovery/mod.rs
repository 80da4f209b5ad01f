pub mod probe;

pub use probe::{DirectProbe, Prober, ServiceProbe, normalize_address};

use crate::api::{DiscoverResponse, ProbeResult};
use crate::error::{ClientError, Result};
use crate::http::PanelClient;
use crate::session::ConnectionSession;

use std::sync::Arc;
use std::time::Duration;

/// Hard ceiling on a single probe, on top of whatever the prober enforces.
pub const DEFAULT_PROBE_DEADLINE: Duration = Duration::from_secs(15);

/// Finds reachable engines and holds the results until one is committed to
/// the session.
///
/// Result order is candidate order, never completion order: the first
/// successful entry is the default selection.
pub struct DiscoveryCoordinator<P: Prober> {
    prober: Arc<P>,
    probe_deadline: Duration,
    results: Vec<ProbeResult>,
    selected: Option<String>,
}

impl<P: Prober> DiscoveryCoordinator<P> {
    pub fn new(prober: Arc<P>) -> Self {
        Self {
            prober,
            probe_deadline: DEFAULT_PROBE_DEADLINE,
            results: Vec::new(),
            selected: None,
        }
    }

    pub fn with_probe_deadline(mut self, deadline: Duration) -> Self {
        self.probe_deadline = deadline;
        self
    }

    pub fn prober(&self) -> &Arc<P> {
        &self.prober
    }

    pub fn results(&self) -> &[ProbeResult] {
        &self.results
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Probe one address, bounded by the coordinator deadline.
    pub async fn probe(&self, address: &str) -> ProbeResult {
        bounded_probe(&*self.prober, address, self.probe_deadline).await
    }

    /// Probe every candidate concurrently and replace the result set.
    ///
    /// Each call starts from an empty result set and clears any selection.
    pub async fn scan(&mut self, candidates: &[String]) -> &[ProbeResult] {
        self.reset();
        log::info!("Scanning {} candidate address(es)", candidates.len());

        let prober = self.prober.clone();
        let deadline = self.probe_deadline;
        let probes = candidates
            .iter()
            .map(|address| bounded_probe(&*prober, address, deadline));
        self.results = futures::future::join_all(probes).await;

        let reachable = self.results.iter().filter(|r| r.success).count();
        log::info!("Scan finished: {}/{} reachable", reachable, self.results.len());
        &self.results
    }

    /// Let the control panel run the scan from its own network.
    ///
    /// The panel's `tested` list becomes the result set, in the order the
    /// panel returned it. On failure the result set stays empty.
    pub async fn discover(&mut self, client: &PanelClient) -> Result<&[ProbeResult]> {
        self.reset();
        let response: DiscoverResponse = client.get_json("/api/connection/auto-detect", &[]).await?;
        self.results = response.tested;
        log::info!(
            "Panel auto-detect finished: {}/{} reachable",
            response.found.len(),
            self.results.len()
        );
        Ok(&self.results)
    }

    /// Probe a user-supplied address and append it to the current results.
    ///
    /// A reachable address also becomes the selection.
    pub async fn test_one(&mut self, address: &str) -> ProbeResult {
        let result = self.probe(address).await;
        if result.success {
            self.selected = Some(result.address.clone());
        }
        self.results.push(result.clone());
        result
    }

    /// First successful result, if any.
    pub fn default_selection(&self) -> Option<&str> {
        self.results
            .iter()
            .find(|r| r.success)
            .map(|r| r.address.as_str())
    }

    /// Select the default entry. Returns the selected address.
    pub fn auto_select(&mut self) -> Option<&str> {
        self.selected = self.default_selection().map(str::to_string);
        self.selected.as_deref()
    }

    /// Mark `address` as the candidate to connect to.
    ///
    /// Only addresses with a successful result are selectable.
    pub fn select(&mut self, address: &str) -> Result<()> {
        let address = normalize_address(address);
        match self.results.iter().find(|r| r.address == address) {
            Some(result) if result.success => {
                self.selected = Some(address);
                Ok(())
            }
            Some(result) => Err(ClientError::Validation(format!(
                "{} is not reachable: {}",
                address,
                result.error.as_deref().unwrap_or("probe failed")
            ))),
            None => Err(ClientError::Validation(format!(
                "{} has not been probed",
                address
            ))),
        }
    }

    /// Hand the current selection to the session.
    pub fn commit(&self, session: &ConnectionSession) -> Result<String> {
        let address = self.selected.clone().ok_or_else(|| {
            ClientError::Validation("select an instance first".to_string())
        })?;
        session.select(&address);
        Ok(address)
    }

    fn reset(&mut self) {
        self.results.clear();
        self.selected = None;
    }
}

async fn bounded_probe<P: Prober>(prober: &P, address: &str, deadline: Duration) -> ProbeResult {
    match tokio::time::timeout(deadline, prober.probe(address)).await {
        Ok(result) => result,
        Err(_) => {
            log::warn!("Probe of {} exceeded {:?}", address, deadline);
            ProbeResult::failed(
                normalize_address(address),
                "Connection timeout. Check URL and firewall.",
            )
        }
    }
}
