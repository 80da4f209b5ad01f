//! Syntactic path-mapping checks.
//!
//! These never touch a filesystem. `Valid` means "shaped like an absolute
//! path", not "exists"; the panel's path test is the authoritative check.

use serde::{Deserialize, Serialize};

/// Result of a client-side path check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PathStatus {
    Empty,
    Valid,
    Invalid,
}

impl PathStatus {
    pub fn display_name(self) -> &'static str {
        match self {
            PathStatus::Empty => "empty",
            PathStatus::Valid => "valid",
            PathStatus::Invalid => "invalid",
        }
    }
}

/// Host side of the mapping: Windows drive (`X:\...`), UNC share (`\\...`)
/// or absolute POSIX path.
pub fn validate_host_path(path: &str) -> PathStatus {
    if path.is_empty() {
        PathStatus::Empty
    } else if is_drive_path(path) || path.starts_with("\\\\") || path.starts_with('/') {
        PathStatus::Valid
    } else {
        PathStatus::Invalid
    }
}

/// Container side: always a Linux path inside the engine container.
pub fn validate_container_path(path: &str) -> PathStatus {
    if path.is_empty() {
        PathStatus::Empty
    } else if path.starts_with('/') {
        PathStatus::Valid
    } else {
        PathStatus::Invalid
    }
}

fn is_drive_path(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.len() >= 3 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' && bytes[2] == b'\\'
}

/// How host paths translate to paths inside the engine container.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathMapping {
    pub host_path: String,
    pub container_path: String,
}

impl PathMapping {
    pub fn new(host_path: impl Into<String>, container_path: impl Into<String>) -> Self {
        Self {
            host_path: host_path.into(),
            container_path: container_path.into(),
        }
    }

    pub fn host_status(&self) -> PathStatus {
        validate_host_path(&self.host_path)
    }

    pub fn container_status(&self) -> PathStatus {
        validate_container_path(&self.container_path)
    }

    /// Both sides pass the syntactic check, so the server test may run.
    pub fn is_testable(&self) -> bool {
        self.host_status() == PathStatus::Valid && self.container_status() == PathStatus::Valid
    }

    /// Explain why the mapping cannot be tested yet, if it cannot.
    pub fn problem(&self) -> Option<String> {
        let describe = |side: &str, status: PathStatus| match status {
            PathStatus::Valid => None,
            PathStatus::Empty => Some(format!("{} path is required", side)),
            PathStatus::Invalid => Some(format!("{} path must be absolute", side)),
        };
        match (
            describe("Host", self.host_status()),
            describe("Container", self.container_status()),
        ) {
            (None, None) => None,
            (Some(host), None) => Some(host),
            (None, Some(container)) => Some(container),
            (Some(host), Some(container)) => Some(format!("{}; {}", host, container)),
        }
    }
}
