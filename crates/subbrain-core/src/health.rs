use crate::api::ProbeResult;
use crate::discovery::Prober;
use crate::poll::PollSlot;
use crate::session::ConnectionSession;
use crate::version::UNKNOWN_VERSION;

use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Latest liveness snapshot for the active endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HealthStatus {
    pub address: String,
    pub reachable: bool,
    /// Last version reported while reachable
    pub version: String,
    pub is_outdated: bool,
    pub last_error: Option<String>,
    pub consecutive_failures: u32,
    pub checks: u64,
}

impl HealthStatus {
    fn next(previous: Option<&HealthStatus>, address: &str, result: &ProbeResult) -> Self {
        let previous = previous.filter(|p| p.address == address);
        let checks = previous.map_or(0, |p| p.checks) + 1;
        if result.success {
            Self {
                address: address.to_string(),
                reachable: true,
                version: result.version.clone(),
                is_outdated: result.is_outdated,
                last_error: None,
                consecutive_failures: 0,
                checks,
            }
        } else {
            Self {
                address: address.to_string(),
                reachable: false,
                version: previous.map_or_else(|| UNKNOWN_VERSION.to_string(), |p| p.version.clone()),
                is_outdated: previous.is_some_and(|p| p.is_outdated),
                last_error: result.error.clone(),
                consecutive_failures: previous.map_or(0, |p| p.consecutive_failures) + 1,
                checks,
            }
        }
    }
}

/// Re-probes the active endpoint on a fixed interval.
///
/// Failures only update the status; the session is never cleared from here.
/// A network blip must not throw the user back into discovery.
pub struct HealthPoller {
    status: Arc<watch::Sender<Option<HealthStatus>>>,
    supervisor: JoinHandle<()>,
}

impl HealthPoller {
    pub fn start<P: Prober>(
        runtime: &Handle,
        session: ConnectionSession,
        prober: Arc<P>,
        interval: Duration,
    ) -> Self {
        let (status_tx, _) = watch::channel(None);
        let status = Arc::new(status_tx);

        let supervisor = runtime.spawn({
            let status = status.clone();
            let runtime = runtime.clone();
            async move {
                let mut active_rx = session.subscribe();
                let mut slot: PollSlot<String> = PollSlot::new();
                loop {
                    let active = active_rx.borrow_and_update().clone();
                    status.send_replace(None);
                    match active {
                        Some(address) => {
                            log::debug!("Health polling {} every {:?}", address, interval);
                            Self::start_probe_loop(
                                &mut slot,
                                &runtime,
                                address,
                                interval,
                                session.clone(),
                                prober.clone(),
                                status.clone(),
                            );
                        }
                        None => slot.stop(),
                    }
                    if active_rx.changed().await.is_err() {
                        break;
                    }
                }
            }
        });

        Self { status, supervisor }
    }

    fn start_probe_loop<P: Prober>(
        slot: &mut PollSlot<String>,
        runtime: &Handle,
        address: String,
        interval: Duration,
        session: ConnectionSession,
        prober: Arc<P>,
        status: Arc<watch::Sender<Option<HealthStatus>>>,
    ) {
        slot.start(runtime, address.clone(), interval, move |guard| {
            let prober = prober.clone();
            let status = status.clone();
            let session = session.clone();
            let address = address.clone();
            async move {
                let result = prober.probe(&address).await;
                let published = Self::publish(&status, &address, &result, || {
                    guard.is_current() && session.is_active(&address)
                });
                if !published {
                    log::debug!("Discarding health result for superseded endpoint {}", address);
                } else if !result.success {
                    log::warn!(
                        "Health check of {} failed: {}",
                        address,
                        result.error.as_deref().unwrap_or("unknown error")
                    );
                }
            }
        });
    }

    /// Fold `result` into the status unless `still_current` says the address
    /// was superseded. The check runs while the channel is locked, so the
    /// supervisor's reset on an endpoint change cannot slip in between.
    fn publish(
        status: &watch::Sender<Option<HealthStatus>>,
        address: &str,
        result: &ProbeResult,
        still_current: impl Fn() -> bool,
    ) -> bool {
        status.send_if_modified(|current| {
            if !still_current() {
                return false;
            }
            *current = Some(HealthStatus::next(current.as_ref(), address, result));
            true
        })
    }

    /// Most recent status; `None` before the first check or without an endpoint.
    pub fn status(&self) -> Option<HealthStatus> {
        self.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<HealthStatus>> {
        self.status.subscribe()
    }
}

impl Drop for HealthPoller {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}
