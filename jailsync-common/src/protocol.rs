//! Wire types for the `POST /sync` endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

pub const API_KEY_HEADER: &str = "X-API-Key";

pub const DEFAULT_FINDTIME: i64 = 600;
pub const DEFAULT_BANTIME: i64 = 3600;
pub const DEFAULT_MAXRETRY: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncAction {
    Ping,
    Sync,
}

impl SyncAction {
    pub fn parse(action: &str) -> Option<Self> {
        match action {
            "ping" => Some(Self::Ping),
            "sync" => Some(Self::Sync),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::Sync => "sync",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncRequest {
    #[serde(default)]
    pub action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_ip: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub jails: Vec<JailDescriptor>,
}

impl SyncRequest {
    pub fn ping() -> Self {
        Self {
            action: SyncAction::Ping.as_str().to_owned(),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JailDescriptor {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub info: Option<JailPolicy>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub banned_ips: Vec<String>,
}

/// Policy parameters reported by the local tool. Values the tool did not
/// report (or reported as non-numeric) are `None`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct JailPolicy {
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub findtime: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub bantime: Option<i64>,
    #[serde(
        default,
        deserialize_with = "lenient_i64",
        skip_serializing_if = "Option::is_none"
    )]
    pub maxretry: Option<i64>,
}

impl JailPolicy {
    pub fn is_empty(&self) -> bool {
        self.findtime.is_none() && self.bantime.is_none() && self.maxretry.is_none()
    }

    pub fn findtime_or_default(&self) -> i64 {
        self.findtime.unwrap_or(DEFAULT_FINDTIME)
    }

    pub fn bantime_or_default(&self) -> i64 {
        self.bantime.unwrap_or(DEFAULT_BANTIME)
    }

    pub fn maxretry_or_default(&self) -> i64 {
        self.maxretry.unwrap_or(DEFAULT_MAXRETRY)
    }
}

fn lenient_i64<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_i64(),
        serde_json::Value::String(s) => s.trim().parse().ok(),
        _ => None,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PingResponse {
    pub status: String,
    pub message: String,
    pub server_id: Uuid,
    pub server_name: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncResponse {
    pub status: String,
    pub message: String,
    pub server_id: Uuid,
    pub server_name: String,
    pub jails_processed: usize,
    pub ips_synced: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}
