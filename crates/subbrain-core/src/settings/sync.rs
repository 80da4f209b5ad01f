use super::{PathMapping, Settings, SettingsEdit, SettingsPatch};
use crate::api::{ComposeSnippet, PathTestResult, SettingsDefaults, VolumeMapping, VolumesResponse};
use crate::error::{ClientError, Result};
use crate::http::PanelClient;
use crate::session::ConnectionSession;

use parking_lot::Mutex;
use reqwest::Method;

const CURRENT_PATH: &str = "/api/settings/current";
const UPDATE_PATH: &str = "/api/settings/update";
const TEST_PATH_MAPPING_PATH: &str = "/api/settings/test-path-mapping";
const COMPOSE_SNIPPET_PATH: &str = "/api/settings/compose-snippet";
const VOLUMES_PATH: &str = "/api/docker/volumes";
const DEFAULTS_PATH: &str = "/api/settings/defaults";

/// Settings the panel would pick for its host hardware. Read-only: nothing
/// here touches a synchronizer or needs an active endpoint.
pub async fn fetch_defaults(client: &PanelClient) -> Result<SettingsDefaults> {
    client.get_json(DEFAULTS_PATH, &[]).await
}

/// Lifecycle of the locally held settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SyncState {
    /// Nothing fetched yet; no settings object exists
    Unloaded,
    Loading,
    /// In sync with the last server snapshot (or a failed save kept edits)
    Loaded,
    /// Local edits not yet sent
    Editing,
    /// A save is waiting for the server
    Saving,
}

impl SyncState {
    pub fn display_name(self) -> &'static str {
        match self {
            SyncState::Unloaded => "unloaded",
            SyncState::Loading => "loading",
            SyncState::Loaded => "loaded",
            SyncState::Editing => "editing",
            SyncState::Saving => "saving",
        }
    }
}

struct SyncInner {
    state: SyncState,
    settings: Option<Settings>,
    /// Local edits the server has not acknowledged
    dirty: bool,
    /// Edits made while a save is in flight, replayed over the echo
    journal: Option<Vec<SettingsEdit>>,
    last_error: Option<String>,
    compose_snippet: Option<String>,
    volumes: Vec<VolumeMapping>,
}

/// Fetches, edits and commits the engine configuration.
///
/// Only one save may be in flight. Edits made while it is pending are kept
/// and re-applied on top of whatever the server answers.
pub struct SettingsSynchronizer {
    session: ConnectionSession,
    client: PanelClient,
    inner: Mutex<SyncInner>,
}

impl SettingsSynchronizer {
    pub fn new(session: ConnectionSession, client: PanelClient) -> Self {
        Self {
            session,
            client,
            inner: Mutex::new(SyncInner {
                state: SyncState::Unloaded,
                settings: None,
                dirty: false,
                journal: None,
                last_error: None,
                compose_snippet: None,
                volumes: Vec::new(),
            }),
        }
    }

    pub fn state(&self) -> SyncState {
        self.inner.lock().state
    }

    /// Current in-memory settings, including unsaved edits.
    pub fn settings(&self) -> Option<Settings> {
        self.inner.lock().settings.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.lock().dirty
    }

    pub fn last_error(&self) -> Option<String> {
        self.inner.lock().last_error.clone()
    }

    /// Deployment snippet fetched after the last successful save.
    pub fn compose_snippet(&self) -> Option<String> {
        self.inner.lock().compose_snippet.clone()
    }

    /// Engine volumes seen by the last detection.
    pub fn volumes(&self) -> Vec<VolumeMapping> {
        self.inner.lock().volumes.clone()
    }

    /// Fetch the full snapshot from the server, replacing local state.
    ///
    /// On failure nothing is synthesized: a first load stays `Unloaded`, a
    /// reload keeps the settings that were already there.
    pub async fn load(&self) -> Result<Settings> {
        let address = self.session.require_active()?;
        let previous = {
            let mut inner = self.inner.lock();
            if inner.state == SyncState::Saving {
                return Err(ClientError::SaveInProgress);
            }
            std::mem::replace(&mut inner.state, SyncState::Loading)
        };

        log::debug!("Loading settings for {}", address);
        let result = self.client.get_json::<Settings>(CURRENT_PATH, &[]).await;

        let mut inner = self.inner.lock();
        match result {
            Ok(settings) => {
                inner.settings = Some(settings.clone());
                inner.state = SyncState::Loaded;
                inner.dirty = false;
                inner.last_error = None;
                log::info!("Loaded settings for {}", address);
                Ok(settings)
            }
            Err(e) => {
                log::warn!("Failed to load settings: {}", e);
                inner.state = if inner.settings.is_some() {
                    previous
                } else {
                    SyncState::Unloaded
                };
                inner.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    /// Throw away local edits and fetch the server snapshot again.
    pub async fn reset(&self) -> Result<Settings> {
        self.load().await
    }

    /// Merge one edit into the in-memory settings. No network effect.
    pub fn edit(&self, edit: SettingsEdit) -> Result<()> {
        let mut inner = self.inner.lock();
        let inner = &mut *inner;
        let settings = inner.settings.as_mut().ok_or(ClientError::NotLoaded)?;
        settings.apply(&edit);
        inner.dirty = true;
        match inner.journal.as_mut() {
            Some(journal) => journal.push(edit),
            None => inner.state = SyncState::Editing,
        }
        Ok(())
    }

    pub fn patch(&self, patch: SettingsPatch) -> Result<()> {
        self.edit(SettingsEdit::Patch(patch))
    }

    pub fn set_path_mapping(&self, mapping: Option<PathMapping>) -> Result<()> {
        self.edit(SettingsEdit::SetPathMapping(mapping))
    }

    pub fn set_custom(&self, key: &str, value: &str) -> Result<()> {
        let key = key.trim();
        if key.is_empty() {
            return Err(ClientError::Validation("custom key must not be empty".to_string()));
        }
        self.edit(SettingsEdit::SetCustom {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    pub fn remove_custom(&self, key: &str) -> Result<()> {
        self.edit(SettingsEdit::RemoveCustom(key.trim().to_string()))
    }

    /// Send the full in-memory settings and adopt the server's echo.
    ///
    /// On failure every local edit is kept and the error is returned; nothing
    /// is retried. After a success the compose snippet is fetched if the
    /// panel offers one.
    pub async fn save(&self) -> Result<Settings> {
        let address = self.session.require_active()?;
        let snapshot = {
            let mut inner = self.inner.lock();
            if inner.state == SyncState::Saving {
                return Err(ClientError::SaveInProgress);
            }
            let snapshot = inner.settings.clone().ok_or(ClientError::NotLoaded)?;
            inner.state = SyncState::Saving;
            inner.journal = Some(Vec::new());
            snapshot
        };
        let mut pending = PendingSave {
            inner: &self.inner,
            armed: true,
        };

        log::debug!("Saving settings for {}", address);
        let result = self
            .client
            .send_json::<_, Settings>(Method::PUT, UPDATE_PATH, &snapshot)
            .await;

        let saved = {
            let mut inner = self.inner.lock();
            pending.armed = false;
            let journal = inner.journal.take().unwrap_or_default();
            match result {
                Ok(echo) => {
                    let mut settings = echo;
                    for edit in &journal {
                        settings.apply(edit);
                    }
                    inner.dirty = !journal.is_empty();
                    inner.state = if inner.dirty {
                        SyncState::Editing
                    } else {
                        SyncState::Loaded
                    };
                    inner.settings = Some(settings.clone());
                    inner.last_error = None;
                    if !journal.is_empty() {
                        log::debug!("Replayed {} edit(s) made during save", journal.len());
                    }
                    settings
                }
                Err(e) => {
                    log::warn!("Failed to save settings: {}", e);
                    inner.state = SyncState::Loaded;
                    inner.dirty = true;
                    inner.last_error = Some(e.to_string());
                    return Err(e);
                }
            }
        };
        log::info!("Saved settings for {}", address);

        match self
            .client
            .get_optional_json::<ComposeSnippet>(COMPOSE_SNIPPET_PATH)
            .await
        {
            Ok(snippet) => self.inner.lock().compose_snippet = snippet.map(|s| s.snippet),
            Err(e) => log::warn!("Failed to fetch compose snippet: {}", e),
        }

        Ok(saved)
    }

    /// Ask the panel which volumes the engine container has mounted.
    pub async fn detect_volumes(&self) -> Result<VolumesResponse> {
        self.session.require_active()?;
        let volumes: VolumesResponse = self.client.get_json(VOLUMES_PATH, &[]).await?;
        self.inner.lock().volumes = volumes.subgen_volumes.clone();
        Ok(volumes)
    }

    /// Replace the path mapping with the panel's suggestion, if it has one.
    ///
    /// `Ok(None)` means nothing was suggested; the settings are left alone.
    pub async fn auto_detect_paths(&self) -> Result<Option<PathMapping>> {
        if self.inner.lock().settings.is_none() {
            return Err(ClientError::NotLoaded);
        }
        let volumes = self.detect_volumes().await?;
        self.adopt_suggestion(&volumes)
    }

    /// Apply the suggestion from an earlier [`detect_volumes`] answer without
    /// asking the panel again.
    ///
    /// [`detect_volumes`]: Self::detect_volumes
    pub fn adopt_suggestion(&self, volumes: &VolumesResponse) -> Result<Option<PathMapping>> {
        if self.inner.lock().settings.is_none() {
            return Err(ClientError::NotLoaded);
        }
        let Some(suggested) = &volumes.suggested_mapping else {
            log::info!("No path mapping suggestion available");
            return Ok(None);
        };
        let mapping = PathMapping::new(suggested.host_path.clone(), suggested.container_path.clone());
        self.set_path_mapping(Some(mapping.clone()))?;
        log::info!(
            "Detected path mapping {} -> {}",
            mapping.host_path,
            mapping.container_path
        );
        Ok(Some(mapping))
    }

    /// Server-side check of `mapping`. Only runs once both sides pass the
    /// local syntactic check. Returns the server's message on success.
    pub async fn test_path_mapping(&self, mapping: &PathMapping) -> Result<String> {
        if let Some(problem) = mapping.problem() {
            return Err(ClientError::Validation(problem));
        }
        self.session.require_active()?;
        let result: PathTestResult = self
            .client
            .send_json(Method::POST, TEST_PATH_MAPPING_PATH, mapping)
            .await?;
        if result.valid {
            Ok(result.reason().unwrap_or("Path mapping is valid").to_string())
        } else {
            Err(ClientError::Rejected(
                result.reason().unwrap_or("Path mapping is invalid").to_string(),
            ))
        }
    }

    /// Test the mapping currently held in the settings.
    pub async fn test_current_path_mapping(&self) -> Result<String> {
        let mapping = {
            let inner = self.inner.lock();
            let settings = inner.settings.as_ref().ok_or(ClientError::NotLoaded)?;
            settings.path_mapping.clone().unwrap_or_default()
        };
        self.test_path_mapping(&mapping).await
    }
}

/// Puts the synchronizer back into a usable state if a save future is
/// dropped before the server answers.
struct PendingSave<'a> {
    inner: &'a Mutex<SyncInner>,
    armed: bool,
}

impl Drop for PendingSave<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let mut inner = self.inner.lock();
        if inner.state == SyncState::Saving {
            inner.journal = None;
            inner.state = SyncState::Loaded;
            inner.dirty = true;
        }
    }
}
