//! Client-side orchestration for a remote Subgen instance.
//!
//! Discovery and probing, the persisted connection session, the settings
//! synchronizer and the fixed-interval health and log pollers. Everything here
//! talks JSON over HTTP to the control-panel service, which in turn fronts the
//! engine at the session's active address.

pub mod api;
pub mod config;
pub mod discovery;
pub mod error;
pub mod hardware;
pub mod health;
pub mod http;
pub mod languages;
pub mod logs;
pub mod poll;
pub mod scan;
pub mod session;
pub mod settings;
pub mod version;

#[cfg(test)]
pub(crate) mod testing;

pub use config::PanelConfig;
pub use discovery::{DirectProbe, DiscoveryCoordinator, Prober, ServiceProbe};
pub use error::{ClientError, Result};
pub use health::{HealthPoller, HealthStatus};
pub use http::PanelClient;
pub use logs::{LogBuffer, LogExport, LogSource, LogTailer};
pub use session::{ConnectionSession, FileSessionStore, MemorySessionStore, SessionStore};
pub use settings::{PathMapping, PathStatus, Settings, SettingsEdit, SettingsSynchronizer, SyncState};
