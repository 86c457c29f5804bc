use std::net::IpAddr;
use std::process::Stdio;
use std::time::Duration;

use jailsync_common::protocol::JailPolicy;
use jailsync_common::Fail2banConfig;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::parse::*;
use crate::{AdapterError, BanOutcome, EnforcementAdapter};

/// Drives the local `fail2ban-client` binary. Arguments are passed as argv,
/// never through a shell.
#[derive(Debug, Clone)]
pub struct Fail2banClient {
    client_path: String,
    timeout: Duration,
}

impl Fail2banClient {
    pub fn new(client_path: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client_path: client_path.into(),
            timeout,
        }
    }

    pub fn from_config(config: &Fail2banConfig) -> Self {
        Self::new(config.client_path.clone(), config.timeout)
    }

    async fn run(&self, args: &[&str]) -> Result<String, AdapterError> {
        debug!(client = %self.client_path, ?args, "Running fail2ban client");

        let mut cmd = Command::new(&self.client_path);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| AdapterError::Timeout(self.timeout))?
            .map_err(|e| AdapterError::Spawn(self.client_path.clone(), e))?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            return Err(AdapterError::Failed {
                code: output.status.code(),
                output: text.trim().to_owned(),
            });
        }
        Ok(text)
    }

    async fn get_number(&self, jail: &str, param: &str) -> Option<i64> {
        match self.run(&["get", jail, param]).await {
            Ok(output) => parse_number(&output),
            Err(error) => {
                warn!(%jail, %param, %error, "Could not read jail parameter");
                None
            }
        }
    }

    async fn set_ip(&self, jail: &str, verb: &str, ip: IpAddr) -> Result<BanOutcome, AdapterError> {
        let jail = valid_jail(jail)?;
        let output = self.run(&["set", jail, verb, &ip.to_string()]).await?;
        Ok(parse_ban_outcome(&output))
    }
}

fn valid_jail(jail: &str) -> Result<&str, AdapterError> {
    let trimmed = jail.trim();
    if trimmed.is_empty() || trimmed.starts_with('-') {
        return Err(AdapterError::InvalidJail(jail.to_owned()));
    }
    Ok(trimmed)
}

#[async_trait::async_trait]
impl EnforcementAdapter for Fail2banClient {
    async fn ping(&self) -> Result<(), AdapterError> {
        match self.run(&["ping"]).await {
            Ok(output) if is_pong(&output) => Ok(()),
            Ok(_) | Err(AdapterError::Failed { .. }) => Err(AdapterError::Unreachable),
            Err(e) => Err(e),
        }
    }

    async fn list_jails(&self) -> Result<Vec<String>, AdapterError> {
        parse_jail_list(&self.run(&["status"]).await?)
    }

    async fn jail_info(&self, jail: &str) -> Result<JailPolicy, AdapterError> {
        let jail = valid_jail(jail)?;
        Ok(JailPolicy {
            findtime: self.get_number(jail, "findtime").await,
            bantime: self.get_number(jail, "bantime").await,
            maxretry: self.get_number(jail, "maxretry").await,
        })
    }

    async fn list_banned(&self, jail: &str) -> Result<Vec<IpAddr>, AdapterError> {
        let jail = valid_jail(jail)?;
        parse_banned_list(&self.run(&["status", jail]).await?)
    }

    async fn ban(&self, jail: &str, ip: IpAddr) -> Result<BanOutcome, AdapterError> {
        self.set_ip(jail, "banip", ip).await
    }

    async fn unban(&self, jail: &str, ip: IpAddr) -> Result<BanOutcome, AdapterError> {
        self.set_ip(jail, "unbanip", ip).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary() {
        let client = Fail2banClient::new("/nonexistent/fail2ban-client", Duration::from_secs(1));
        assert!(matches!(client.ping().await, Err(AdapterError::Spawn(..))));
    }

    #[tokio::test]
    async fn test_timeout() {
        let client = Fail2banClient::new("sleep", Duration::from_millis(100));
        assert!(matches!(
            client.run(&["5"]).await,
            Err(AdapterError::Timeout(_))
        ));
    }

    #[tokio::test]
    async fn test_ping_requires_pong() {
        // `echo ping` exits 0 but never says pong
        let client = Fail2banClient::new("echo", Duration::from_secs(1));
        assert!(matches!(client.ping().await, Err(AdapterError::Unreachable)));
    }

    #[tokio::test]
    async fn test_rejects_bad_jail_names() {
        let client = Fail2banClient::new("echo", Duration::from_secs(1));
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        assert!(matches!(
            client.ban("", ip).await,
            Err(AdapterError::InvalidJail(_))
        ));
        assert!(matches!(
            client.unban("--help", ip).await,
            Err(AdapterError::InvalidJail(_))
        ));
    }

    #[tokio::test]
    async fn test_ban_accepts_any_success_output() {
        // echo exits 0 and prints the argv back, ending with the IP
        let client = Fail2banClient::new("echo", Duration::from_secs(1));
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        assert_eq!(client.ban("sshd", ip).await.unwrap(), BanOutcome::Changed);
    }

    #[tokio::test]
    async fn test_ban_failure_exit_status() {
        let client = Fail2banClient::new("false", Duration::from_secs(1));
        let ip: IpAddr = "203.0.113.5".parse().unwrap();
        assert!(matches!(
            client.ban("sshd", ip).await,
            Err(AdapterError::Failed { .. })
        ));
    }
}
