use crate::settings::Settings;
use crate::version::UNKNOWN_VERSION;
use serde::{Deserialize, Deserializer, Serialize};

// ── Connection ──────────────────────────────────────────────────────────────

/// Outcome of a single reachability + version check.
///
/// Failures are data, not errors: an unreachable candidate is a result with
/// `success == false` and the cause in `error`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProbeResult {
    #[serde(rename = "url")]
    pub address: String,
    pub success: bool,
    #[serde(default = "unknown_version", deserialize_with = "version_or_unknown")]
    pub version: String,
    #[serde(default)]
    pub is_outdated: bool,
    #[serde(default)]
    pub error: Option<String>,
}

impl ProbeResult {
    pub fn reachable(address: impl Into<String>, version: impl Into<String>, is_outdated: bool) -> Self {
        Self {
            address: address.into(),
            success: true,
            version: version.into(),
            is_outdated,
            error: None,
        }
    }

    pub fn failed(address: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            success: false,
            version: UNKNOWN_VERSION.to_string(),
            is_outdated: false,
            error: Some(error.into()),
        }
    }

    /// Whether the version could be determined at all.
    pub fn has_known_version(&self) -> bool {
        self.version != UNKNOWN_VERSION
    }
}

fn unknown_version() -> String {
    UNKNOWN_VERSION.to_string()
}

/// The panel reports an undetectable version as `"Connected"` and failed
/// probes as `null`; both mean "Unknown" here.
fn version_or_unknown<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(match raw {
        Some(v) if !v.trim().is_empty() && v != "Connected" => v,
        _ => unknown_version(),
    })
}

/// POST /api/connection/test request body
#[derive(Serialize)]
pub struct TestConnectionRequest<'a> {
    pub url: &'a str,
}

/// GET /api/connection/auto-detect response
#[derive(Clone, Debug, Deserialize)]
pub struct DiscoverResponse {
    #[serde(default)]
    pub found: Vec<ProbeResult>,
    #[serde(default)]
    pub tested: Vec<ProbeResult>,
}

// ── Settings side-channels ──────────────────────────────────────────────────

/// POST /api/settings/test-path-mapping response
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PathTestResult {
    pub valid: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl PathTestResult {
    /// Server explanation, whichever field it chose to put it in.
    pub fn reason(&self) -> Option<&str> {
        self.message.as_deref().or(self.error.as_deref())
    }
}

/// One bind mount on the engine's container.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeMapping {
    pub host_path: String,
    pub container_path: String,
    #[serde(default)]
    pub suggested: bool,
}

/// GET /api/docker/volumes response
#[derive(Clone, Debug, Default, Deserialize)]
pub struct VolumesResponse {
    #[serde(default)]
    pub subgen_volumes: Vec<VolumeMapping>,
    #[serde(default)]
    pub suggested_mapping: Option<VolumeMapping>,
}

/// GET /api/settings/compose-snippet response
#[derive(Clone, Debug, Deserialize)]
pub struct ComposeSnippet {
    pub snippet: String,
}

/// GET /api/settings/defaults response
#[derive(Clone, Debug, Deserialize)]
pub struct SettingsDefaults {
    #[serde(default)]
    pub message: String,
    pub settings: Settings,
}

/// GET /api/docker/platform response
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct PlatformInfo {
    /// Python `os.name` of the panel host: "posix" or "nt"
    pub os: String,
    /// unraid, synology, windows, linux or unknown
    pub platform: String,
}

// ── Languages ───────────────────────────────────────────────────────────────

/// Per-language decoding profile.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LanguageProfile {
    pub code: String,
    pub name: String,
    pub flag: String,
    pub patience: f64,
    pub length_penalty: f64,
    #[serde(default = "default_language_beam_size")]
    pub beam_size: u32,
    #[serde(default)]
    pub files_processed: u64,
    #[serde(default)]
    pub last_used: Option<String>,
    #[serde(default)]
    pub recommendation: Option<String>,
    /// False when the panel fell back to generic defaults for this code
    #[serde(default = "default_true")]
    pub is_optimized: bool,
}

fn default_language_beam_size() -> u32 {
    5
}

fn default_true() -> bool {
    true
}

// ── Hardware ────────────────────────────────────────────────────────────────

/// GET /api/hardware/detect response
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HardwareProfile {
    /// "cuda", "cpu" or "mps"
    pub device_type: String,
    #[serde(default)]
    pub device_name: Option<String>,
    /// GPU VRAM in GB
    #[serde(default)]
    pub total_memory: Option<f64>,
    #[serde(default)]
    pub available_memory: Option<f64>,
    #[serde(default)]
    pub cpu_cores: Option<u32>,
    #[serde(default)]
    pub cpu_threads: Option<u32>,
    /// System RAM in GB
    #[serde(default)]
    pub ram_total: Option<f64>,
    #[serde(default)]
    pub ram_available: Option<f64>,
    #[serde(default)]
    pub platform: String,
    #[serde(default)]
    pub platform_version: Option<String>,
    #[serde(default)]
    pub storage: Option<StorageInfo>,
    #[serde(default)]
    pub recommendation: Option<String>,
}

/// Disk figures in GB.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StorageInfo {
    pub total: f64,
    pub used: f64,
    pub free: f64,
    /// "SSD" or "HDD"
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub icon: Option<String>,
}

/// GET /api/hardware/smart-recommendations response
#[derive(Clone, Debug, Deserialize)]
pub struct RecommendationsResponse {
    #[serde(default)]
    pub recommendations: Vec<Recommendation>,
}

// ── Logs ────────────────────────────────────────────────────────────────────

/// GET /api/logs/{subgen,local} response
#[derive(Clone, Debug, Deserialize)]
pub struct LogsResponse {
    pub success: bool,
    #[serde(default)]
    pub logs: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

// ── Scanning ────────────────────────────────────────────────────────────────

/// POST /api/scanning/* request body
#[derive(Serialize)]
pub struct ScanRequest<'a> {
    pub subgen_url: &'a str,
    pub scan_type: &'a str,
}

/// POST /api/scanning/* response
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct ScanResponse {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub reason: Option<String>,
    #[serde(default)]
    pub scan_type: Option<String>,
}
