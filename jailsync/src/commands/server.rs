use anyhow::{Context, Result};
use jailsync_common::ApiKey;
use jailsync_core::{AuditRecord, CentralStore};
use jailsync_db_entities::AuditLogEntry::AuditAction;
use tracing::*;
use uuid::Uuid;

use super::common::{find_server, open_store};
use crate::config::load_config;
use crate::ServerCommand;

pub(crate) async fn command(cli: &crate::Cli, command: &ServerCommand) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    let store = open_store(&config).await?;

    match command {
        ServerCommand::Add { name, ip } => {
            let id = store
                .upsert_server(name, ip)
                .await
                .context("Could not register the server")?;
            let key = issue_key(&store, id).await?;
            info!(server = %name, server_id = %id, "Server registered");
            println!("{}", key.expose_secret());
        }
        ServerCommand::RotateKey { name } => {
            let server = find_server(&store, name).await?;
            let key = issue_key(&store, server.id).await?;
            info!(server = %name, "API key rotated");
            println!("{}", key.expose_secret());
        }
        ServerCommand::List => {
            println!(
                "{:<24} {:<16} {:<8} {:>6} {:>6}  LAST SYNC",
                "NAME", "IP", "ACTIVE", "JAILS", "BANS"
            );
            for summary in store.list_servers().await {
                let server = summary.server;
                println!(
                    "{:<24} {:<16} {:<8} {:>6} {:>6}  {}",
                    server.server_name,
                    server.server_ip,
                    if server.is_active { "yes" } else { "no" },
                    summary.jail_count,
                    summary.active_bans,
                    server
                        .last_sync
                        .map(|t| t.to_rfc3339())
                        .unwrap_or_else(|| "never".into()),
                );
            }
        }
        ServerCommand::Deactivate { name } => set_active(&store, name, false).await?,
        ServerCommand::Activate { name } => set_active(&store, name, true).await?,
    }
    Ok(())
}

async fn issue_key(store: &CentralStore, server_id: Uuid) -> Result<ApiKey> {
    let key = ApiKey::generate();
    if !store.set_server_api_key(server_id, &key).await {
        anyhow::bail!("Could not store the API key");
    }
    store
        .append_audit(
            AuditRecord::new(AuditAction::ServerKey, "cli")
                .server(server_id)
                .details("API key issued"),
        )
        .await;
    Ok(key)
}

async fn set_active(store: &CentralStore, name: &str, active: bool) -> Result<()> {
    let server = find_server(store, name).await?;
    if !store.set_server_active(server.id, active).await {
        anyhow::bail!("Could not update server {name}");
    }
    let status = if active { "activated" } else { "deactivated" };
    store
        .append_audit(
            AuditRecord::new(AuditAction::ServerStatus, "cli")
                .server(server.id)
                .details(status),
        )
        .await;
    info!(server = %name, "Server {status}");
    Ok(())
}
