use std::time::Duration;

use jailsync_common::JailsyncError;

#[derive(thiserror::Error, Debug)]
pub enum AdapterError {
    #[error("failed to start {0}: {1}")]
    Spawn(String, #[source] std::io::Error),
    #[error("timed out after {0:?}")]
    Timeout(Duration),
    #[error("exited with code {code:?}: {output}")]
    Failed { code: Option<i32>, output: String },
    #[error("unexpected output: {0}")]
    UnexpectedOutput(String),
    #[error("fail2ban is not responding")]
    Unreachable,
    #[error("invalid jail name: {0:?}")]
    InvalidJail(String),
}

impl From<AdapterError> for JailsyncError {
    fn from(e: AdapterError) -> Self {
        match e {
            AdapterError::Spawn(..) | AdapterError::Unreachable | AdapterError::Timeout(_) => {
                JailsyncError::Connectivity("fail2ban", e.to_string())
            }
            AdapterError::InvalidJail(jail) => JailsyncError::Validation("jail name", jail),
            e => JailsyncError::Adapter(e.to_string()),
        }
    }
}
