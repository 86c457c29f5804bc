use std::fmt::Debug;
use std::str::FromStr;

use crate::{JailsyncError, Secret};

pub const API_KEY_LENGTH: usize = 64;

/// A per-server sync credential: exactly 64 hex characters, stored lowercase.
#[derive(Clone, PartialEq, Eq)]
pub struct ApiKey(Secret<String>);

impl ApiKey {
    pub fn generate() -> Self {
        Self(Secret::random())
    }

    pub fn expose_secret(&self) -> &str {
        self.0.expose_secret()
    }
}

impl FromStr for ApiKey {
    type Err = JailsyncError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != API_KEY_LENGTH || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(JailsyncError::Unauthorized("Invalid API key format"));
        }
        Ok(Self(Secret::new(s.to_ascii_lowercase())))
    }
}

impl Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "ApiKey(<secret>)")
    }
}
