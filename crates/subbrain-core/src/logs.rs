//! Fixed-interval log retrieval from the engine or the panel itself.
//!
//! Each poll replaces the buffer wholesale. Filtering is a projection over the
//! raw text and never changes what is fetched or stored.

use crate::api::LogsResponse;
use crate::error::{ClientError, Result};
use crate::http::PanelClient;
use crate::poll::PollSlot;
use crate::session::ConnectionSession;

use parking_lot::Mutex;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use time::OffsetDateTime;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Which log stream is tailed.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LogSource {
    /// The engine's logs, relayed by the panel for the active endpoint
    Engine,
    /// The panel service's own logs
    Local,
}

impl LogSource {
    /// Name used in endpoint paths and export file names.
    pub fn as_str(self) -> &'static str {
        match self {
            LogSource::Engine => "subgen",
            LogSource::Local => "local",
        }
    }

    fn path(self) -> &'static str {
        match self {
            LogSource::Engine => "/api/logs/subgen",
            LogSource::Local => "/api/logs/local",
        }
    }
}

impl FromStr for LogSource {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "engine" | "subgen" => Ok(LogSource::Engine),
            "local" | "panel" => Ok(LogSource::Local),
            other => Err(ClientError::Validation(format!("unknown log source {:?}", other))),
        }
    }
}

/// Most recent window of lines from one source.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogBuffer {
    pub source: LogSource,
    pub raw_text: String,
}

impl LogBuffer {
    pub fn line_count(&self) -> usize {
        self.raw_text.lines().count()
    }

    pub fn filtered(&self, term: &str) -> Vec<&str> {
        filter_lines(&self.raw_text, term)
    }
}

/// Point-in-time snapshot of the filtered view, ready to be written out.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogExport {
    pub file_name: String,
    pub contents: String,
}

/// Case-insensitive substring match per line. An empty term keeps everything.
pub fn filter_lines<'a>(raw: &'a str, term: &str) -> Vec<&'a str> {
    let term = term.to_lowercase();
    raw.lines()
        .filter(|line| term.is_empty() || line.to_lowercase().contains(&term))
        .collect()
}

/// Buffer text for a successful fetch that carried no lines.
pub const NO_LOGS: &str = "No logs available";

/// Fetch the latest `lines` lines and turn the outcome into buffer text.
///
/// Failures are rendered into the text rather than returned, so the viewer
/// always shows why it has nothing to show.
pub async fn fetch_logs(client: &PanelClient, source: LogSource, address: &str, lines: u32) -> String {
    let mut query = Vec::with_capacity(2);
    if source == LogSource::Engine {
        query.push(("subgen_url", address.to_string()));
    }
    query.push(("lines", lines.to_string()));

    match client.get_json::<LogsResponse>(source.path(), &query).await {
        Ok(resp) if resp.success => match resp.logs {
            Some(logs) if !logs.trim().is_empty() => logs,
            _ => NO_LOGS.to_string(),
        },
        Ok(resp) => {
            let error = resp.error.unwrap_or_else(|| "unknown error".to_string());
            log::warn!("{} logs unavailable: {}", source.as_str(), error);
            format!("Error: {}", error)
        }
        Err(e) => {
            log::warn!("Failed to fetch {} logs: {}", source.as_str(), e);
            format!("Failed to fetch logs: {}", e)
        }
    }
}

struct TailState {
    source: LogSource,
    filter: String,
    auto_scroll: bool,
    buffer: Option<LogBuffer>,
}

struct TailShared {
    state: Mutex<TailState>,
    /// Bumped under the state lock whenever the buffer is invalidated
    generation: Arc<AtomicU64>,
    source: watch::Sender<LogSource>,
    revision: watch::Sender<u64>,
}

impl TailShared {
    /// Store `text` unless the target moved on since `token` was taken.
    fn apply(&self, token: u64, source: LogSource, address: &str, session: &ConnectionSession, text: String) -> bool {
        {
            let mut state = self.state.lock();
            if self.generation.load(Ordering::SeqCst) != token
                || state.source != source
                || !session.is_active(address)
            {
                return false;
            }
            state.buffer = Some(LogBuffer {
                source,
                raw_text: text,
            });
        }
        self.bump_revision();
        true
    }

    fn invalidate(&self) {
        {
            let mut state = self.state.lock();
            state.buffer = None;
            self.generation.fetch_add(1, Ordering::SeqCst);
        }
        self.bump_revision();
    }

    fn bump_revision(&self) {
        self.revision.send_modify(|rev| *rev = rev.wrapping_add(1));
    }
}

/// Tails one log source for the active endpoint on a fixed interval.
///
/// The timer is restarted whenever the source or the active endpoint
/// changes; a response for a superseded target is dropped.
pub struct LogTailer {
    shared: Arc<TailShared>,
    session: ConnectionSession,
    client: PanelClient,
    lines: u32,
    supervisor: JoinHandle<()>,
}

impl LogTailer {
    pub fn start(
        runtime: &Handle,
        session: ConnectionSession,
        client: PanelClient,
        interval: Duration,
        lines: u32,
    ) -> Self {
        let (source_tx, _) = watch::channel(LogSource::Engine);
        let (revision_tx, _) = watch::channel(0);
        let shared = Arc::new(TailShared {
            state: Mutex::new(TailState {
                source: LogSource::Engine,
                filter: String::new(),
                auto_scroll: true,
                buffer: None,
            }),
            generation: Arc::new(AtomicU64::new(0)),
            source: source_tx,
            revision: revision_tx,
        });

        let supervisor = runtime.spawn({
            let shared = shared.clone();
            let session = session.clone();
            let client = client.clone();
            let runtime = runtime.clone();
            async move {
                let mut active_rx = session.subscribe();
                let mut source_rx = shared.source.subscribe();
                let mut slot: PollSlot<(LogSource, String)> =
                    PollSlot::with_generation(shared.generation.clone());
                loop {
                    let active = active_rx.borrow_and_update().clone();
                    let source = *source_rx.borrow_and_update();
                    match active {
                        Some(address) => {
                            let key = (source, address.clone());
                            if !slot.is_running_for(&key) {
                                if slot.is_running() {
                                    shared.invalidate();
                                }
                                log::debug!(
                                    "Tailing {} logs for {} every {:?}",
                                    source.as_str(),
                                    address,
                                    interval
                                );
                                Self::start_fetch_loop(
                                    &mut slot,
                                    &runtime,
                                    key,
                                    interval,
                                    lines,
                                    session.clone(),
                                    client.clone(),
                                    shared.clone(),
                                );
                            }
                        }
                        None => {
                            if slot.is_running() {
                                slot.stop();
                                shared.invalidate();
                            }
                        }
                    }
                    tokio::select! {
                        changed = active_rx.changed() => if changed.is_err() { break },
                        changed = source_rx.changed() => if changed.is_err() { break },
                    }
                }
            }
        });

        Self {
            shared,
            session,
            client,
            lines,
            supervisor,
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn start_fetch_loop(
        slot: &mut PollSlot<(LogSource, String)>,
        runtime: &Handle,
        key: (LogSource, String),
        interval: Duration,
        lines: u32,
        session: ConnectionSession,
        client: PanelClient,
        shared: Arc<TailShared>,
    ) {
        let (source, address) = key.clone();
        slot.start(runtime, key, interval, move |guard| {
            let session = session.clone();
            let client = client.clone();
            let shared = shared.clone();
            let address = address.clone();
            async move {
                let token = shared.generation.load(Ordering::SeqCst);
                if !guard.is_current() {
                    return;
                }
                let text = fetch_logs(&client, source, &address, lines).await;
                if !guard.is_current() || !shared.apply(token, source, &address, &session, text) {
                    log::debug!("Discarding {} logs for superseded target", source.as_str());
                }
            }
        });
    }

    pub fn source(&self) -> LogSource {
        self.shared.state.lock().source
    }

    /// Switch streams. The old buffer is dropped immediately; the filter is kept.
    pub fn set_source(&self, source: LogSource) {
        {
            let mut state = self.shared.state.lock();
            if state.source == source {
                return;
            }
            state.source = source;
            state.buffer = None;
            self.shared.generation.fetch_add(1, Ordering::SeqCst);
        }
        log::debug!("Log source switched to {}", source.as_str());
        self.shared.source.send_replace(source);
        self.shared.bump_revision();
    }

    pub fn filter(&self) -> String {
        self.shared.state.lock().filter.clone()
    }

    pub fn set_filter(&self, term: &str) {
        self.shared.state.lock().filter = term.to_string();
        self.shared.bump_revision();
    }

    pub fn auto_scroll(&self) -> bool {
        self.shared.state.lock().auto_scroll
    }

    pub fn set_auto_scroll(&self, enabled: bool) {
        self.shared.state.lock().auto_scroll = enabled;
    }

    pub fn buffer(&self) -> Option<LogBuffer> {
        self.shared.state.lock().buffer.clone()
    }

    /// Lines of the current buffer that match the filter.
    pub fn filtered_view(&self) -> Vec<String> {
        let state = self.shared.state.lock();
        match &state.buffer {
            Some(buffer) => buffer
                .filtered(&state.filter)
                .into_iter()
                .map(str::to_string)
                .collect(),
            None => Vec::new(),
        }
    }

    pub fn line_count(&self) -> usize {
        self.shared
            .state
            .lock()
            .buffer
            .as_ref()
            .map_or(0, LogBuffer::line_count)
    }

    pub fn filtered_line_count(&self) -> usize {
        let state = self.shared.state.lock();
        state
            .buffer
            .as_ref()
            .map_or(0, |buffer| buffer.filtered(&state.filter).len())
    }

    /// Empty the display. The next poll fills it again.
    pub fn clear(&self) {
        {
            let mut state = self.shared.state.lock();
            if let Some(buffer) = state.buffer.as_mut() {
                buffer.raw_text.clear();
            }
        }
        self.shared.bump_revision();
    }

    /// Snapshot the filtered view. No network effect.
    pub fn export(&self) -> LogExport {
        self.export_at(OffsetDateTime::now_utc())
    }

    fn export_at(&self, now: OffsetDateTime) -> LogExport {
        let source = self.source();
        let mut contents = self.filtered_view().join("\n");
        if !contents.is_empty() {
            contents.push('\n');
        }
        // Colons are not allowed in file names everywhere.
        let stamp = format!(
            "{:04}-{:02}-{:02}T{:02}-{:02}-{:02}Z",
            now.year(),
            u8::from(now.month()),
            now.day(),
            now.hour(),
            now.minute(),
            now.second()
        );
        LogExport {
            file_name: format!("{}-logs-{}.txt", source.as_str(), stamp),
            contents,
        }
    }

    /// Fetch right away instead of waiting for the next tick.
    pub async fn refresh_now(&self) -> Result<()> {
        let address = self.session.require_active()?;
        let (source, token) = {
            let state = self.shared.state.lock();
            (state.source, self.shared.generation.load(Ordering::SeqCst))
        };
        let text = fetch_logs(&self.client, source, &address, self.lines).await;
        self.shared.apply(token, source, &address, &self.session, text);
        Ok(())
    }

    /// Receive a tick every time the buffer, filter or source changes.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }
}

impl Drop for LogTailer {
    fn drop(&mut self) {
        self.supervisor.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use crate::testing::{serve, wait_until};
    use axum::Router;
    use axum::extract::{Json, Query};
    use axum::routing::get;
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;

    const TICK: Duration = Duration::from_millis(30);
    const WAIT: Duration = Duration::from_secs(3);

    #[test]
    fn filter_is_case_insensitive_and_pure() {
        let raw = "INFO start\nWARN disk slow\ninfo done\n";
        assert_eq!(filter_lines(raw, "info"), vec!["INFO start", "info done"]);
        assert_eq!(filter_lines(raw, "").len(), 3);
        assert!(filter_lines(raw, "error").is_empty());
        assert_eq!(raw, "INFO start\nWARN disk slow\ninfo done\n");
    }

    #[test]
    fn source_names() {
        assert_eq!("engine".parse::<LogSource>().unwrap(), LogSource::Engine);
        assert_eq!("subgen".parse::<LogSource>().unwrap(), LogSource::Engine);
        assert_eq!("Local".parse::<LogSource>().unwrap(), LogSource::Local);
        assert!("syslog".parse::<LogSource>().is_err());
        assert_eq!(LogSource::Engine.as_str(), "subgen");
    }

    /// Fake panel log endpoints. Engine lines carry the queried address.
    fn log_router(hits: Arc<AtomicUsize>) -> Router {
        let engine_hits = hits.clone();
        Router::new()
            .route(
                "/api/logs/subgen",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    engine_hits.fetch_add(1, Ordering::SeqCst);
                    async move {
                        let url = q.get("subgen_url").cloned().unwrap_or_default();
                        if url.contains("broken") {
                            return Json(json!({ "success": false, "error": "Subgen returned status 502", "logs": "" }));
                        }
                        Json(json!({
                            "success": true,
                            "logs": format!("engine {} line 1\nengine {} ERROR line 2", url, url),
                        }))
                    }
                }),
            )
            .route(
                "/api/logs/local",
                get(move |Query(q): Query<HashMap<String, String>>| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    async move {
                        let lines = q.get("lines").cloned().unwrap_or_default();
                        Json::<Value>(json!({ "success": true, "logs": format!("local lines={}\nlocal ok", lines) }))
                    }
                }),
            )
    }

    async fn setup() -> (ConnectionSession, LogTailer, Arc<AtomicUsize>) {
        let hits = Arc::new(AtomicUsize::new(0));
        let base = serve(log_router(hits.clone())).await;
        let session = ConnectionSession::new(MemorySessionStore::default());
        let client = PanelClient::new(&base, Duration::from_secs(2));
        let tailer = LogTailer::start(&Handle::current(), session.clone(), client, TICK, 200);
        (session, tailer, hits)
    }

    fn text(tailer: &LogTailer) -> String {
        tailer.buffer().map(|b| b.raw_text).unwrap_or_default()
    }

    #[tokio::test]
    async fn idle_without_endpoint() {
        let (_session, tailer, hits) = setup().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert!(tailer.buffer().is_none());
        assert_eq!(tailer.refresh_now().await, Err(ClientError::NoActiveEndpoint));
    }

    #[tokio::test]
    async fn polls_engine_logs_for_active_endpoint() {
        let (session, tailer, _hits) = setup().await;
        session.select("http://subgen:9000");
        wait_until(WAIT, || text(&tailer).contains("engine http://subgen:9000")).await;
        assert_eq!(tailer.line_count(), 2);

        tailer.set_filter("error");
        assert_eq!(tailer.filtered_line_count(), 1);
        assert_eq!(tailer.filtered_view(), vec!["engine http://subgen:9000 ERROR line 2"]);
        assert_eq!(tailer.line_count(), 2);
    }

    #[tokio::test]
    async fn switching_source_never_mixes_buffers() {
        let (session, tailer, _hits) = setup().await;
        session.select("http://subgen:9000");
        tailer.set_filter("line");
        wait_until(WAIT, || tailer.buffer().is_some()).await;

        tailer.set_source(LogSource::Local);
        assert!(tailer.buffer().is_none());
        assert_eq!(tailer.filter(), "line");

        wait_until(WAIT, || tailer.buffer().is_some()).await;
        let buffer = tailer.buffer().unwrap();
        assert_eq!(buffer.source, LogSource::Local);
        assert!(!buffer.raw_text.contains("engine"));
        assert!(buffer.raw_text.contains("lines=200"));

        tokio::time::sleep(TICK * 3).await;
        assert!(!text(&tailer).contains("engine"));
    }

    #[tokio::test]
    async fn endpoint_change_restarts_tail() {
        let (session, tailer, _hits) = setup().await;
        session.select("http://a:9000");
        wait_until(WAIT, || text(&tailer).contains("http://a:9000")).await;

        session.select("http://b:9000");
        wait_until(WAIT, || text(&tailer).contains("http://b:9000")).await;
        tokio::time::sleep(TICK * 3).await;
        assert!(!text(&tailer).contains("http://a:9000"));
    }

    #[tokio::test]
    async fn clear_session_stops_polling() {
        let (session, tailer, hits) = setup().await;
        session.select("http://a:9000");
        wait_until(WAIT, || tailer.buffer().is_some()).await;

        session.clear();
        wait_until(WAIT, || tailer.buffer().is_none()).await;
        tokio::time::sleep(TICK).await;
        let frozen = hits.load(Ordering::SeqCst);
        tokio::time::sleep(TICK * 4).await;
        assert_eq!(hits.load(Ordering::SeqCst), frozen);
    }

    #[tokio::test]
    async fn remote_failure_replaces_buffer_with_error() {
        let (session, tailer, _hits) = setup().await;
        session.select("http://broken:9000");
        wait_until(WAIT, || tailer.buffer().is_some()).await;
        assert_eq!(text(&tailer), "Error: Subgen returned status 502");
    }

    #[tokio::test]
    async fn transport_failure_is_reported_in_buffer() {
        let client = PanelClient::new("http://127.0.0.1:1", Duration::from_secs(1));
        let text = fetch_logs(&client, LogSource::Local, "http://a", 10).await;
        assert!(text.starts_with("Failed to fetch logs: "));
    }

    #[tokio::test]
    async fn empty_success_reads_as_no_logs() {
        let base = serve(
            Router::new()
                .route("/api/logs/local", get(|| async { Json(json!({ "success": true, "logs": "" })) }))
                .route("/api/logs/subgen", get(|| async { Json(json!({ "success": true })) })),
        )
        .await;
        let client = PanelClient::new(&base, Duration::from_secs(2));

        assert_eq!(fetch_logs(&client, LogSource::Local, "http://a", 10).await, NO_LOGS);
        assert_eq!(fetch_logs(&client, LogSource::Engine, "http://a", 10).await, NO_LOGS);
    }

    #[tokio::test]
    async fn clear_and_export() {
        let (session, tailer, _hits) = setup().await;
        tailer.set_auto_scroll(false);
        assert!(!tailer.auto_scroll());
        tailer.set_source(LogSource::Local);
        session.select("http://a:9000");
        tailer.refresh_now().await.unwrap();
        wait_until(WAIT, || tailer.buffer().is_some()).await;
        tailer.set_filter("OK");

        let now = OffsetDateTime::from_unix_timestamp(1_700_000_000).unwrap();
        let export = tailer.export_at(now);
        assert_eq!(export.file_name, "local-logs-2023-11-14T22-13-20Z.txt");
        assert_eq!(export.contents, "local ok\n");

        tailer.clear();
        assert_eq!(tailer.line_count(), 0);
        assert!(tailer.export_at(now).contents.is_empty());
    }
}
