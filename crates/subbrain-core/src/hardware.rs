//! Host hardware profile and tuning recommendations, as reported by the panel.
//!
//! The panel inspects its own host, so these calls do not need an active
//! engine endpoint.

use crate::api::{HardwareProfile, PlatformInfo, Recommendation, RecommendationsResponse};
use crate::error::Result;
use crate::http::PanelClient;

pub async fn fetch_hardware(client: &PanelClient) -> Result<HardwareProfile> {
    client.get_json("/api/hardware/detect", &[]).await
}

pub async fn fetch_recommendations(client: &PanelClient) -> Result<Vec<Recommendation>> {
    let resp: RecommendationsResponse = client
        .get_json("/api/hardware/smart-recommendations", &[])
        .await?;
    Ok(resp.recommendations)
}

/// Host flavour the panel detected (unraid, synology, windows, linux).
pub async fn fetch_platform(client: &PanelClient) -> Result<PlatformInfo> {
    client.get_json("/api/docker/platform", &[]).await
}

impl HardwareProfile {
    pub fn has_gpu(&self) -> bool {
        matches!(self.device_type.as_str(), "cuda" | "mps")
    }
}
