//! Library scans run by the panel against the active engine.

use crate::api::{ScanRequest, ScanResponse};
use crate::error::{ClientError, Result};
use crate::http::PanelClient;
use crate::session::ConnectionSession;

use reqwest::Method;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScanKind {
    /// Panel decides the scan order
    #[default]
    Smart,
    /// Newest content first
    Forward,
    /// Oldest content first, fills gaps
    Reverse,
}

impl ScanKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ScanKind::Smart => "smart",
            ScanKind::Forward => "forward",
            ScanKind::Reverse => "reverse",
        }
    }

    fn path(self) -> &'static str {
        match self {
            ScanKind::Smart => "/api/scanning/smart-scan",
            ScanKind::Forward => "/api/scanning/forward-scan",
            ScanKind::Reverse => "/api/scanning/reverse-scan",
        }
    }
}

impl FromStr for ScanKind {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smart" => Ok(ScanKind::Smart),
            "forward" => Ok(ScanKind::Forward),
            "reverse" => Ok(ScanKind::Reverse),
            other => Err(ClientError::Validation(format!("unknown scan kind {:?}", other))),
        }
    }
}

/// Ask the panel to start a scan on the active engine.
pub async fn trigger_scan(client: &PanelClient, session: &ConnectionSession, kind: ScanKind) -> Result<ScanResponse> {
    let address = session.require_active()?;
    let body = ScanRequest {
        subgen_url: &address,
        scan_type: kind.as_str(),
    };
    let resp: ScanResponse = client.send_json(Method::POST, kind.path(), &body).await?;
    if resp.status != "success" {
        log::warn!("{} scan on {} refused: {}", kind.as_str(), address, resp.message);
        let message = if resp.message.is_empty() {
            format!("Scan {}", resp.status)
        } else {
            resp.message
        };
        return Err(ClientError::Rejected(message));
    }
    log::info!("{} scan started on {}", kind.as_str(), address);
    Ok(resp)
}

/// Engine scan progress, passed through as the panel reports it.
pub async fn scan_status(client: &PanelClient, session: &ConnectionSession) -> Result<serde_json::Value> {
    let address = session.require_active()?;
    client
        .get_json("/api/scanning/scan-status", &[("subgen_url", address)])
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::MemorySessionStore;
    use crate::testing::serve;
    use axum::Json;
    use axum::Router;
    use axum::routing::{get, post};
    use serde_json::{Value, json};
    use std::time::Duration;

    async fn panel() -> PanelClient {
        let router = Router::new()
            .route(
                "/api/scanning/forward-scan",
                post(|Json(body): Json<Value>| async move {
                    Json(json!({
                        "status": "success",
                        "scan_type": body["scan_type"],
                        "reason": "User requested",
                        "message": format!("Scan triggered on {}", body["subgen_url"].as_str().unwrap_or("")),
                    }))
                }),
            )
            .route(
                "/api/scanning/reverse-scan",
                post(|| async {
                    Json(json!({
                        "status": "error",
                        "scan_type": "reverse",
                        "reason": "User requested",
                        "message": "Subgen returned error: 404",
                    }))
                }),
            )
            .route(
                "/api/scanning/scan-status",
                get(|| async { Json(json!({ "status": "idle" })) }),
            );
        PanelClient::new(&serve(router).await, Duration::from_secs(2))
    }

    #[test]
    fn kinds_parse() {
        assert_eq!("Forward".parse::<ScanKind>().unwrap(), ScanKind::Forward);
        assert_eq!(ScanKind::default(), ScanKind::Smart);
        assert!("sideways".parse::<ScanKind>().is_err());
    }

    #[tokio::test]
    async fn scan_targets_active_endpoint() {
        let client = panel().await;
        let session = ConnectionSession::new(MemorySessionStore::default());
        session.select("http://subgen:9000");

        let resp = trigger_scan(&client, &session, ScanKind::Forward).await.unwrap();
        assert_eq!(resp.scan_type.as_deref(), Some("forward"));
        assert_eq!(resp.message, "Scan triggered on http://subgen:9000");

        let status = scan_status(&client, &session).await.unwrap();
        assert_eq!(status["status"], "idle");
    }

    #[tokio::test]
    async fn refused_scan_is_rejected() {
        let client = panel().await;
        let session = ConnectionSession::new(MemorySessionStore::default());
        session.select("http://subgen:9000");

        let err = trigger_scan(&client, &session, ScanKind::Reverse).await.unwrap_err();
        assert_eq!(err, ClientError::Rejected("Subgen returned error: 404".into()));
    }

    #[tokio::test]
    async fn scan_needs_endpoint() {
        let client = panel().await;
        let session = ConnectionSession::new(MemorySessionStore::default());
        let err = trigger_scan(&client, &session, ScanKind::Smart).await.unwrap_err();
        assert_eq!(err, ClientError::NoActiveEndpoint);
    }
}
