use std::net::IpAddr;

use anyhow::{Context, Result};
use jailsync_common::JailsyncConfig;
use jailsync_core::{AuditRecord, BanAnnotations, CentralStore};
use jailsync_db_entities::AuditLogEntry::AuditAction;
use jailsync_fail2ban::{BanOutcome, EnforcementAdapter};
use tracing::*;

use super::common::{local_adapter, open_store};
use crate::config::load_config;

pub(crate) async fn ban(cli: &crate::Cli, jail: &str, ip: IpAddr, author: &str) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    let adapter = local_adapter(&config);
    let store = open_store(&config).await?;
    ban_and_record(&config, &store, adapter.as_ref(), jail, ip, author).await
}

pub(crate) async fn unban(cli: &crate::Cli, jail: &str, ip: IpAddr, author: &str) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    let adapter = local_adapter(&config);
    let store = open_store(&config).await?;
    unban_and_record(&config, &store, adapter.as_ref(), jail, ip, author).await
}

async fn ban_and_record(
    config: &JailsyncConfig,
    store: &CentralStore,
    adapter: &dyn EnforcementAdapter,
    jail: &str,
    ip: IpAddr,
    author: &str,
) -> Result<()> {
    let name = config.server_name()?;

    match adapter.ban(jail, ip).await.context("Local ban failed")? {
        BanOutcome::Changed => info!(%ip, %jail, "Banned locally"),
        BanOutcome::Unchanged => info!(%ip, %jail, "Already banned locally"),
    }

    let server_id = store
        .upsert_server(name, &config.store.server_ip)
        .await
        .context("Could not register this server")?;
    let policy = adapter.jail_info(jail).await.ok();
    let jail_id = store
        .upsert_jail(server_id, jail, policy.as_ref())
        .await
        .context("Could not register the jail")?;
    if !store
        .record_ban(server_id, jail_id, ip, BanAnnotations::default())
        .await
    {
        anyhow::bail!("Banned locally, but the central store was not updated");
    }

    store
        .append_audit(
            AuditRecord::new(AuditAction::Ban, author)
                .server(server_id)
                .ip(ip)
                .jail(jail),
        )
        .await;
    Ok(())
}

/// The central record is cleared even when the engine reports the IP was not banned.
async fn unban_and_record(
    config: &JailsyncConfig,
    store: &CentralStore,
    adapter: &dyn EnforcementAdapter,
    jail: &str,
    ip: IpAddr,
    author: &str,
) -> Result<()> {
    let name = config.server_name()?;

    match adapter.unban(jail, ip).await.context("Local unban failed")? {
        BanOutcome::Changed => info!(%ip, %jail, "Unbanned locally"),
        BanOutcome::Unchanged => info!(%ip, %jail, "Was not banned locally"),
    }

    let Some(server) = store.find_server_by_name(name).await? else {
        warn!(server = %name, "Server is not registered centrally");
        return Ok(());
    };
    let Some(jail_record) = store.find_jail(server.id, jail).await? else {
        warn!(server = %name, %jail, "Jail is not registered centrally");
        return Ok(());
    };
    if !store.deactivate_ban(server.id, jail_record.id, ip).await {
        anyhow::bail!("Unbanned locally, but the central store was not updated");
    }

    store
        .append_audit(
            AuditRecord::new(AuditAction::Unban, author)
                .server(server.id)
                .ip(ip)
                .jail(jail),
        )
        .await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use jailsync_common::protocol::JailPolicy;
    use jailsync_core::BanFilter;
    use jailsync_fail2ban::AdapterError;

    use super::*;
    use crate::commands::common::test_support::cli_with_database;

    #[derive(Default)]
    struct RecordingAdapter {
        fail: bool,
        calls: Mutex<Vec<String>>,
    }

    #[async_trait::async_trait]
    impl EnforcementAdapter for RecordingAdapter {
        async fn ping(&self) -> Result<(), AdapterError> {
            Ok(())
        }

        async fn list_jails(&self) -> Result<Vec<String>, AdapterError> {
            Ok(vec!["sshd".into()])
        }

        async fn jail_info(&self, _jail: &str) -> Result<JailPolicy, AdapterError> {
            Ok(JailPolicy {
                findtime: Some(300),
                bantime: None,
                maxretry: Some(3),
            })
        }

        async fn list_banned(&self, _jail: &str) -> Result<Vec<IpAddr>, AdapterError> {
            Ok(vec![])
        }

        async fn ban(&self, jail: &str, ip: IpAddr) -> Result<BanOutcome, AdapterError> {
            if self.fail {
                return Err(AdapterError::Unreachable);
            }
            self.calls.lock().unwrap().push(format!("ban {jail} {ip}"));
            Ok(BanOutcome::Changed)
        }

        async fn unban(&self, jail: &str, ip: IpAddr) -> Result<BanOutcome, AdapterError> {
            self.calls.lock().unwrap().push(format!("unban {jail} {ip}"));
            Ok(BanOutcome::Unchanged)
        }
    }

    async fn setup(name: &str) -> (JailsyncConfig, CentralStore) {
        let cli = cli_with_database(name);
        let config = load_config(&cli.config, false).unwrap();
        let store = open_store(&config).await.unwrap();
        (config, store)
    }

    #[tokio::test]
    async fn test_ban_then_unban() {
        let (config, store) = setup("ban").await;
        let adapter = RecordingAdapter::default();
        let ip: IpAddr = "203.0.113.5".parse().unwrap();

        ban_and_record(&config, &store, &adapter, "sshd", ip, "ops")
            .await
            .unwrap();
        let bans = store.list_active_bans(&BanFilter::default()).await;
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].server_name, "web-1");
        assert_eq!(bans[0].jail_name, "sshd");
        assert_eq!(bans[0].ban.ban_count, 1);

        let server = store.find_server_by_name("web-1").await.unwrap().unwrap();
        let jail = store.find_jail(server.id, "sshd").await.unwrap().unwrap();
        assert_eq!((jail.findtime, jail.maxretry), (300, 3));

        // engine says "not banned", the central row is still closed
        unban_and_record(&config, &store, &adapter, "sshd", ip, "ops")
            .await
            .unwrap();
        assert!(store.list_active_bans(&BanFilter::default()).await.is_empty());
        assert_eq!(
            *adapter.calls.lock().unwrap(),
            vec!["ban sshd 203.0.113.5", "unban sshd 203.0.113.5"]
        );
    }

    #[tokio::test]
    async fn test_local_failure_leaves_store_untouched() {
        let (config, store) = setup("ban-fail").await;
        let adapter = RecordingAdapter {
            fail: true,
            ..Default::default()
        };
        let ip: IpAddr = "203.0.113.5".parse().unwrap();

        assert!(ban_and_record(&config, &store, &adapter, "sshd", ip, "ops")
            .await
            .is_err());
        assert!(store.find_server_by_name("web-1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unban_unknown_server() {
        let (config, store) = setup("unban-unknown").await;
        let adapter = RecordingAdapter::default();
        let ip: IpAddr = "198.51.100.7".parse().unwrap();

        unban_and_record(&config, &store, &adapter, "sshd", ip, "cli")
            .await
            .unwrap();
    }
}
