//! Error taxonomy shared by the webhook service and the setup tool.
//!
//! Lookup misses are not errors: they surface as `AlertOutcome` variants.

use std::{io, path::PathBuf};
use thiserror::Error;

/// Missing or invalid settings, fatal at startup.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("the following environment variables are not set: {}", .0.join(", "))]
    MissingVariables(Vec<String>),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Failures of the flat-file stores.
///
/// `Missing` is kept apart from `Read`/`Malformed` so "no data" is never
/// confused with a broken medium.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to find {path:?}")]
    Missing { path: PathBuf },

    #[error("failed to read {path:?}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed data in {path:?}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    #[error("failed to write {path:?}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failures talking to the dashboard API. Never retried.
#[derive(Debug, Error)]
pub enum RemoteCallError {
    #[error("{operation} timed out")]
    Timeout { operation: String },

    #[error("{operation} failed")]
    Transport {
        operation: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation} failed with status {status} and body: {body}")]
    Status {
        operation: String,
        status: u16,
        body: String,
    },

    #[error("failed to parse response of {operation}")]
    Decode {
        operation: String,
        #[source]
        source: serde_json::Error,
    },
}

impl RemoteCallError {
    pub(crate) fn from_reqwest(operation: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            RemoteCallError::Timeout {
                operation: operation.to_string(),
            }
        } else {
            RemoteCallError::Transport {
                operation: operation.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_variables_are_listed_in_order() {
        let err = ConfigError::MissingVariables(vec![
            "MERAKI_API_KEY".to_string(),
            "MY_PSK".to_string(),
        ]);

        assert_eq!(
            err.to_string(),
            "the following environment variables are not set: MERAKI_API_KEY, MY_PSK"
        );
    }

    #[test]
    fn status_error_carries_body() {
        let err = RemoteCallError::Status {
            operation: "PUT /networks/N_1/wireless/ssids/2".to_string(),
            status: 400,
            body: r#"{"errors":["bad vlan"]}"#.to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("status 400"));
        assert!(msg.contains("bad vlan"));
    }
}
