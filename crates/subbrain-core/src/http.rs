use crate::error::{ClientError, Result};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;

/// JSON-over-HTTP access to the control-panel service.
///
/// Cheap to clone; every component that talks to the panel holds its own copy.
#[derive(Clone, Debug)]
pub struct PanelClient {
    base_url: String,
    http: reqwest::Client,
    request_timeout: Duration,
}

impl PanelClient {
    pub fn new(base_url: &str, request_timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim().trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            request_timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// GET `path` and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
        let url = self.url(path);
        log::debug!("GET {}", url);
        let resp = self
            .http
            .get(&url)
            .query(query)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))?;
        Self::decode(&url, resp).await
    }

    /// GET `path`, treating 404 as "this endpoint does not exist here".
    pub async fn get_optional_json<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let url = self.url(path);
        log::debug!("GET {}", url);
        let resp = self
            .http
            .get(&url)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Self::decode(&url, resp).await.map(Some)
    }

    /// Send `body` as JSON with `method` and decode the JSON reply.
    pub async fn send_json<B, T>(&self, method: reqwest::Method, path: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        log::debug!("{} {}", method, url);
        let resp = self
            .http
            .request(method, &url)
            .json(body)
            .timeout(self.request_timeout)
            .send()
            .await
            .map_err(|e| ClientError::from_reqwest(&url, e))?;
        Self::decode(&url, resp).await
    }

    async fn decode<T: DeserializeOwned>(url: &str, resp: reqwest::Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            let msg = if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {} - {}", status, body.trim())
            };
            log::warn!("{} rejected request: {}", url, msg);
            return Err(ClientError::Rejected(msg));
        }
        resp.json::<T>().await.map_err(|e| ClientError::Decode {
            target: url.to_string(),
            message: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::Router;
    use axum::http::StatusCode;
    use axum::routing::get;

    #[test]
    fn base_url_is_normalized() {
        let client = PanelClient::new(" http://panel:9001/ ", Duration::from_secs(1));
        assert_eq!(client.base_url(), "http://panel:9001");
    }

    #[tokio::test]
    async fn non_success_status_is_rejected() {
        let base = serve(Router::new().route(
            "/boom",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "exploded") }),
        ))
        .await;
        let client = PanelClient::new(&base, Duration::from_secs(2));
        let err = client.get_json::<serde_json::Value>("/boom", &[]).await.unwrap_err();
        assert_eq!(err, ClientError::Rejected("HTTP 500 Internal Server Error - exploded".into()));
    }

    #[tokio::test]
    async fn malformed_body_is_decode_error() {
        let base = serve(Router::new().route("/bad", get(|| async { "not json" }))).await;
        let client = PanelClient::new(&base, Duration::from_secs(2));
        let err = client.get_json::<serde_json::Value>("/bad", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Decode { .. }));
        assert!(err.is_transient());
    }

    #[tokio::test]
    async fn missing_optional_endpoint_is_none() {
        let base = serve(Router::new()).await;
        let client = PanelClient::new(&base, Duration::from_secs(2));
        let value = client
            .get_optional_json::<serde_json::Value>("/api/settings/compose-snippet")
            .await
            .unwrap();
        assert!(value.is_none());
    }

    #[tokio::test]
    async fn unreachable_panel_is_transient() {
        let client = PanelClient::new("http://127.0.0.1:1", Duration::from_secs(2));
        let err = client.get_json::<serde_json::Value>("/", &[]).await.unwrap_err();
        assert!(matches!(err, ClientError::Unreachable { .. }));
    }
}
