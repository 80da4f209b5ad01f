//! Engine configuration as edited by the user.
//!
//! Every field has an explicit update policy (see [`SettingsField::policy`]):
//! scalars and the path mapping are replaced wholesale, custom environment
//! entries merge by key. Edits are expressed as [`SettingsEdit`] values so the
//! same edit can be replayed over a server echo after a save.

pub mod path;
pub mod sync;

pub use path::{PathMapping, PathStatus, validate_container_path, validate_host_path};
pub use sync::{SettingsSynchronizer, SyncState, fetch_defaults};

use crate::error::{ClientError, Result};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// How an edit combines with the current value of a field.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdatePolicy {
    /// The new value replaces the old one entirely
    Replace,
    /// Entries merge by key: existing keys are overwritten, others untouched
    MergeByKey,
}

/// Full engine configuration snapshot as served by the panel.
///
/// No `Default`: before the first successful fetch no settings exist on the
/// client.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // Connection
    pub subgen_url: String,

    // Model & compute
    /// tiny, small, medium, large-v3
    pub whisper_model: String,
    /// float32, float16, int8_float16, int8
    pub compute_type: String,
    /// cuda, cpu
    pub transcribe_device: String,
    pub beam_size: u32,

    // Performance
    pub whisper_threads: u32,
    pub concurrent_transcriptions: u32,
    pub clear_vram_on_complete: bool,

    // Task
    /// translate or transcribe
    pub whisper_task: String,
    pub subtitle_language: String,

    // Path mapping
    pub use_path_mapping: bool,
    #[serde(default)]
    pub path_mapping: Option<PathMapping>,

    // Skip conditions
    pub skip_if_english_audio: bool,
    pub skip_if_english_subs_exist: bool,
    #[serde(default)]
    pub skip_files_patterns: Vec<String>,

    // Advanced
    pub auto_skip_threshold: f64,
    pub ssa_fix_encoding: bool,
    pub ssa_fix_newlines: bool,
    #[serde(default)]
    pub custom_regroup: Option<String>,

    /// User-defined environment entries, no schema
    #[serde(default)]
    pub custom_env: BTreeMap<String, String>,

    /// Fields this client does not know about, sent back untouched on save
    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

/// Clamp ranges mirrored from the engine's accepted values.
const BEAM_SIZE_RANGE: (u32, u32) = (1, 10);
const WHISPER_THREADS_RANGE: (u32, u32) = (1, 32);
const CONCURRENT_RANGE: (u32, u32) = (1, 5);

/// Macro to apply every `Some` field of a patch with replace semantics
macro_rules! replace_fields {
    ($settings:expr, $patch:expr, $($field:ident),+ $(,)?) => {
        $(
            if let Some(value) = &$patch.$field {
                $settings.$field = value.clone();
            }
        )+
    };
}

impl Settings {
    /// Apply one edit in place. Never fails.
    pub fn apply(&mut self, edit: &SettingsEdit) {
        match edit {
            SettingsEdit::Patch(patch) => {
                replace_fields!(
                    self,
                    patch,
                    subgen_url,
                    whisper_model,
                    compute_type,
                    transcribe_device,
                    beam_size,
                    whisper_threads,
                    concurrent_transcriptions,
                    clear_vram_on_complete,
                    whisper_task,
                    subtitle_language,
                    use_path_mapping,
                    skip_if_english_audio,
                    skip_if_english_subs_exist,
                    skip_files_patterns,
                    auto_skip_threshold,
                    ssa_fix_encoding,
                    ssa_fix_newlines,
                    custom_regroup,
                );
                self.beam_size = self.beam_size.clamp(BEAM_SIZE_RANGE.0, BEAM_SIZE_RANGE.1);
                self.whisper_threads = self
                    .whisper_threads
                    .clamp(WHISPER_THREADS_RANGE.0, WHISPER_THREADS_RANGE.1);
                self.concurrent_transcriptions = self
                    .concurrent_transcriptions
                    .clamp(CONCURRENT_RANGE.0, CONCURRENT_RANGE.1);
                if patch.auto_skip_threshold.is_some() {
                    self.auto_skip_threshold = self.auto_skip_threshold.clamp(0.0, 1.0);
                }
            }
            SettingsEdit::SetPathMapping(mapping) => {
                self.path_mapping = mapping.clone();
            }
            SettingsEdit::SetCustom { key, value } => {
                self.custom_env.insert(key.clone(), value.clone());
            }
            SettingsEdit::RemoveCustom(key) => {
                self.custom_env.remove(key);
            }
        }
    }
}

/// A local change to the in-memory settings.
#[derive(Clone, Debug, PartialEq)]
pub enum SettingsEdit {
    /// Replace every field set in the patch
    Patch(SettingsPatch),
    /// Replace the whole path mapping (both sides at once)
    SetPathMapping(Option<PathMapping>),
    /// Insert or overwrite one custom entry
    SetCustom { key: String, value: String },
    /// Delete one custom entry entirely
    RemoveCustom(String),
}

/// Scalar fields to replace; `None` leaves a field alone.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SettingsPatch {
    pub subgen_url: Option<String>,
    pub whisper_model: Option<String>,
    pub compute_type: Option<String>,
    pub transcribe_device: Option<String>,
    pub beam_size: Option<u32>,
    pub whisper_threads: Option<u32>,
    pub concurrent_transcriptions: Option<u32>,
    pub clear_vram_on_complete: Option<bool>,
    pub whisper_task: Option<String>,
    pub subtitle_language: Option<String>,
    pub use_path_mapping: Option<bool>,
    pub skip_if_english_audio: Option<bool>,
    pub skip_if_english_subs_exist: Option<bool>,
    pub skip_files_patterns: Option<Vec<String>>,
    pub auto_skip_threshold: Option<f64>,
    pub ssa_fix_encoding: Option<bool>,
    pub ssa_fix_newlines: Option<bool>,
    pub custom_regroup: Option<Option<String>>,
}

/// Every user-editable settings field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SettingsField {
    SubgenUrl,
    WhisperModel,
    ComputeType,
    TranscribeDevice,
    BeamSize,
    WhisperThreads,
    ConcurrentTranscriptions,
    ClearVramOnComplete,
    WhisperTask,
    SubtitleLanguage,
    UsePathMapping,
    PathMapping,
    SkipIfEnglishAudio,
    SkipIfEnglishSubsExist,
    SkipFilesPatterns,
    AutoSkipThreshold,
    SsaFixEncoding,
    SsaFixNewlines,
    CustomRegroup,
    CustomEnv,
}

impl SettingsField {
    pub fn all_variants() -> &'static [SettingsField] {
        use SettingsField::*;
        &[
            SubgenUrl,
            WhisperModel,
            ComputeType,
            TranscribeDevice,
            BeamSize,
            WhisperThreads,
            ConcurrentTranscriptions,
            ClearVramOnComplete,
            WhisperTask,
            SubtitleLanguage,
            UsePathMapping,
            PathMapping,
            SkipIfEnglishAudio,
            SkipIfEnglishSubsExist,
            SkipFilesPatterns,
            AutoSkipThreshold,
            SsaFixEncoding,
            SsaFixNewlines,
            CustomRegroup,
            CustomEnv,
        ]
    }

    /// Wire name of the field.
    pub fn name(self) -> &'static str {
        match self {
            SettingsField::SubgenUrl => "subgen_url",
            SettingsField::WhisperModel => "whisper_model",
            SettingsField::ComputeType => "compute_type",
            SettingsField::TranscribeDevice => "transcribe_device",
            SettingsField::BeamSize => "beam_size",
            SettingsField::WhisperThreads => "whisper_threads",
            SettingsField::ConcurrentTranscriptions => "concurrent_transcriptions",
            SettingsField::ClearVramOnComplete => "clear_vram_on_complete",
            SettingsField::WhisperTask => "whisper_task",
            SettingsField::SubtitleLanguage => "subtitle_language",
            SettingsField::UsePathMapping => "use_path_mapping",
            SettingsField::PathMapping => "path_mapping",
            SettingsField::SkipIfEnglishAudio => "skip_if_english_audio",
            SettingsField::SkipIfEnglishSubsExist => "skip_if_english_subs_exist",
            SettingsField::SkipFilesPatterns => "skip_files_patterns",
            SettingsField::AutoSkipThreshold => "auto_skip_threshold",
            SettingsField::SsaFixEncoding => "ssa_fix_encoding",
            SettingsField::SsaFixNewlines => "ssa_fix_newlines",
            SettingsField::CustomRegroup => "custom_regroup",
            SettingsField::CustomEnv => "custom_env",
        }
    }

    pub fn policy(self) -> UpdatePolicy {
        match self {
            SettingsField::CustomEnv => UpdatePolicy::MergeByKey,
            _ => UpdatePolicy::Replace,
        }
    }

    /// Build a single-field patch from user text.
    ///
    /// Path mapping and custom entries have their own edits and are refused here.
    pub fn parse_patch(self, raw: &str) -> Result<SettingsPatch> {
        let mut patch = SettingsPatch::default();
        let text = raw.trim().to_string();
        match self {
            SettingsField::SubgenUrl => patch.subgen_url = Some(text),
            SettingsField::WhisperModel => patch.whisper_model = Some(text),
            SettingsField::ComputeType => patch.compute_type = Some(text),
            SettingsField::TranscribeDevice => patch.transcribe_device = Some(text),
            SettingsField::WhisperTask => patch.whisper_task = Some(text),
            SettingsField::SubtitleLanguage => patch.subtitle_language = Some(text),
            SettingsField::BeamSize => patch.beam_size = Some(self.parse_value(&text)?),
            SettingsField::WhisperThreads => patch.whisper_threads = Some(self.parse_value(&text)?),
            SettingsField::ConcurrentTranscriptions => {
                patch.concurrent_transcriptions = Some(self.parse_value(&text)?)
            }
            SettingsField::AutoSkipThreshold => {
                patch.auto_skip_threshold = Some(self.parse_value(&text)?)
            }
            SettingsField::ClearVramOnComplete => {
                patch.clear_vram_on_complete = Some(self.parse_bool(&text)?)
            }
            SettingsField::UsePathMapping => patch.use_path_mapping = Some(self.parse_bool(&text)?),
            SettingsField::SkipIfEnglishAudio => {
                patch.skip_if_english_audio = Some(self.parse_bool(&text)?)
            }
            SettingsField::SkipIfEnglishSubsExist => {
                patch.skip_if_english_subs_exist = Some(self.parse_bool(&text)?)
            }
            SettingsField::SsaFixEncoding => patch.ssa_fix_encoding = Some(self.parse_bool(&text)?),
            SettingsField::SsaFixNewlines => patch.ssa_fix_newlines = Some(self.parse_bool(&text)?),
            SettingsField::SkipFilesPatterns => {
                patch.skip_files_patterns = Some(
                    text.split(',')
                        .map(str::trim)
                        .filter(|p| !p.is_empty())
                        .map(str::to_string)
                        .collect(),
                )
            }
            SettingsField::CustomRegroup => {
                patch.custom_regroup = Some(if text.is_empty() { None } else { Some(text) })
            }
            SettingsField::PathMapping | SettingsField::CustomEnv => {
                return Err(ClientError::Validation(format!(
                    "{} cannot be set as a single value",
                    self.name()
                )));
            }
        }
        Ok(patch)
    }

    fn parse_value<T: FromStr>(self, text: &str) -> Result<T> {
        text.parse::<T>().map_err(|_| {
            ClientError::Validation(format!("{} expects a number, got {:?}", self.name(), text))
        })
    }

    fn parse_bool(self, text: &str) -> Result<bool> {
        match text.to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            _ => Err(ClientError::Validation(format!(
                "{} expects true or false, got {:?}",
                self.name(),
                text
            ))),
        }
    }
}

impl FromStr for SettingsField {
    type Err = ClientError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim().replace('-', "_");
        SettingsField::all_variants()
            .iter()
            .copied()
            .find(|f| f.name() == wanted)
            .ok_or_else(|| ClientError::Validation(format!("unknown settings field {:?}", s)))
    }
}
