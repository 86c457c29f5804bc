mod client;
mod error;
mod parse;

use std::net::IpAddr;

pub use client::Fail2banClient;
pub use error::AdapterError;
use jailsync_common::protocol::JailPolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BanOutcome {
    Changed,
    /// Already banned (or, for unban, not banned)
    Unchanged,
}

/// Access to the local ban engine.
#[async_trait::async_trait]
pub trait EnforcementAdapter: Send + Sync {
    async fn ping(&self) -> Result<(), AdapterError>;

    async fn list_jails(&self) -> Result<Vec<String>, AdapterError>;

    /// Policy values the engine did not report are left as `None`
    async fn jail_info(&self, jail: &str) -> Result<JailPolicy, AdapterError>;

    async fn list_banned(&self, jail: &str) -> Result<Vec<IpAddr>, AdapterError>;

    async fn ban(&self, jail: &str, ip: IpAddr) -> Result<BanOutcome, AdapterError>;

    async fn unban(&self, jail: &str, ip: IpAddr) -> Result<BanOutcome, AdapterError>;
}
