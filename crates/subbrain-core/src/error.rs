//! Client error types.
//!
//! Every failure is scoped to the operation that produced it. Nothing here is
//! fatal to the process and no variant implies that prior state was discarded.

use thiserror::Error;

/// Result type alias using ClientError.
pub type Result<T> = std::result::Result<T, ClientError>;

/// Errors surfaced by the orchestration layer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Network failure or timeout talking to `target`.
    #[error("{target} is unreachable: {message}")]
    Unreachable { target: String, message: String },

    /// `target` answered, but with a body we could not decode.
    #[error("malformed response from {target}: {message}")]
    Decode { target: String, message: String },

    /// Client-side syntactic rejection. User input is kept as-is.
    #[error("{0}")]
    Validation(String),

    /// The server explicitly refused the request; message is shown verbatim.
    #[error("{0}")]
    Rejected(String),

    /// No engine endpoint has been selected yet.
    #[error("no Subgen instance selected")]
    NoActiveEndpoint,

    /// Another save is already waiting for the server.
    #[error("a save is already in progress")]
    SaveInProgress,

    /// Settings have not been fetched from the server yet.
    #[error("settings have not been loaded")]
    NotLoaded,

    /// Reading or writing client-side state failed.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Build an error from a reqwest failure against `target`.
    pub(crate) fn from_reqwest(target: &str, err: reqwest::Error) -> Self {
        if err.is_decode() {
            ClientError::Decode {
                target: target.to_string(),
                message: err.to_string(),
            }
        } else {
            ClientError::Unreachable {
                target: target.to_string(),
                message: err.to_string(),
            }
        }
    }

    /// Unreachable and Decode look the same to callers: worth retrying on the
    /// next poll, never worth aborting a workflow for.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ClientError::Unreachable { .. } | ClientError::Decode { .. }
        )
    }
}

impl From<std::io::Error> for ClientError {
    fn from(err: std::io::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for ClientError {
    fn from(err: serde_json::Error) -> Self {
        ClientError::Storage(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_covers_network_and_decode_only() {
        let unreachable = ClientError::Unreachable {
            target: "http://a".into(),
            message: "refused".into(),
        };
        let decode = ClientError::Decode {
            target: "http://a".into(),
            message: "eof".into(),
        };
        assert!(unreachable.is_transient());
        assert!(decode.is_transient());
        assert!(!ClientError::Rejected("no".into()).is_transient());
        assert!(!ClientError::Validation("bad".into()).is_transient());
        assert!(!ClientError::NoActiveEndpoint.is_transient());
    }

    #[test]
    fn rejected_message_is_verbatim() {
        let err = ClientError::Rejected("Path not found in container".into());
        assert_eq!(err.to_string(), "Path not found in container");
    }
}
