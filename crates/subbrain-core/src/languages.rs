//! Per-language decoding profiles kept by the panel.
//!
//! Like the hardware endpoints these are served by the panel itself, so no
//! active engine endpoint is required.

use crate::api::LanguageProfile;
use crate::error::{ClientError, Result};
use crate::http::PanelClient;

/// Every known profile, sorted by display name.
pub async fn fetch_languages(client: &PanelClient) -> Result<Vec<LanguageProfile>> {
    client.get_json("/api/languages/list", &[]).await
}

/// One profile by language code. Unknown codes come back as a generic
/// profile with `is_optimized == false`, never as an error.
pub async fn fetch_language(client: &PanelClient, code: &str) -> Result<LanguageProfile> {
    let code = normalize_code(code)?;
    client.get_json(&format!("/api/languages/{}", code), &[]).await
}

fn normalize_code(code: &str) -> Result<String> {
    let code = code.trim().to_ascii_lowercase();
    if code.is_empty() {
        return Err(ClientError::Validation("language code must not be empty".to_string()));
    }
    if !code.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(ClientError::Validation(format!("invalid language code {:?}", code)));
    }
    Ok(code)
}

impl LanguageProfile {
    /// Flag followed by name, as shown in listings.
    pub fn display_name(&self) -> String {
        if self.flag.is_empty() {
            self.name.clone()
        } else {
            format!("{} {}", self.flag, self.name)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::serve;
    use axum::Json;
    use axum::Router;
    use axum::extract::Path;
    use axum::routing::get;
    use serde_json::json;
    use std::time::Duration;

    fn language_router() -> Router {
        Router::new()
            .route(
                "/api/languages/list",
                get(|| async {
                    Json(json!([
                        { "code": "en", "name": "English", "flag": "🇬🇧", "patience": 1.0,
                          "length_penalty": 1.0, "beam_size": 5, "files_processed": 42,
                          "last_used": "2026-10-17T21:04:00", "recommendation": null, "is_optimized": true },
                        { "code": "ja", "name": "Japanese", "flag": "🇯🇵", "patience": 2.0,
                          "length_penalty": 0.8 }
                    ]))
                }),
            )
            .route(
                "/api/languages/{code}",
                get(|Path(code): Path<String>| async move {
                    if code == "en" {
                        return Json(json!({ "code": "en", "name": "English", "flag": "🇬🇧",
                            "patience": 1.0, "length_penalty": 1.0, "files_processed": 42 }));
                    }
                    Json(json!({
                        "code": code, "name": code.to_uppercase(), "flag": "🌐",
                        "patience": 1.5, "length_penalty": 0.9, "beam_size": 5,
                        "files_processed": 0, "last_used": null,
                        "recommendation": "Using default settings", "is_optimized": false
                    }))
                }),
            )
    }

    #[tokio::test]
    async fn lists_profiles() {
        let base = serve(language_router()).await;
        let client = PanelClient::new(&base, Duration::from_secs(2));

        let langs = fetch_languages(&client).await.unwrap();
        assert_eq!(langs.len(), 2);
        assert_eq!(langs[0].files_processed, 42);
        assert_eq!(langs[0].last_used.as_deref(), Some("2026-10-17T21:04:00"));
        assert_eq!(langs[1].beam_size, 5);
        assert!(langs[1].is_optimized);
    }

    #[tokio::test]
    async fn known_code_is_optimized() {
        let base = serve(language_router()).await;
        let client = PanelClient::new(&base, Duration::from_secs(2));

        let en = fetch_language(&client, " EN ").await.unwrap();
        assert_eq!(en.code, "en");
        assert!(en.is_optimized);
        assert_eq!(en.display_name(), "🇬🇧 English");
    }

    #[tokio::test]
    async fn unknown_code_gets_generic_profile() {
        let base = serve(language_router()).await;
        let client = PanelClient::new(&base, Duration::from_secs(2));

        let xx = fetch_language(&client, "xx").await.unwrap();
        assert_eq!(xx.name, "XX");
        assert!(!xx.is_optimized);
        assert_eq!(xx.patience, 1.5);
        assert_eq!(xx.length_penalty, 0.9);
        assert_eq!(xx.recommendation.as_deref(), Some("Using default settings"));
    }

    #[tokio::test]
    async fn malformed_code_never_hits_the_wire() {
        let client = PanelClient::new("http://127.0.0.1:1", Duration::from_millis(200));
        assert!(matches!(fetch_language(&client, "  ").await, Err(ClientError::Validation(_))));
        assert!(matches!(fetch_language(&client, "en/../x").await, Err(ClientError::Validation(_))));
    }
}
