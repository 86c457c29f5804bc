use anyhow::{Context, Result};
use chrono::Utc;
use jailsync_core::{AuditRecord, NewGlobalBan};
use jailsync_db_entities::AuditLogEntry::AuditAction;
use jailsync_db_entities::GlobalBan;
use tracing::*;

use super::common::open_store;
use crate::config::load_config;
use crate::GlobalBanCommand;

pub(crate) async fn command(cli: &crate::Cli, command: &GlobalBanCommand) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    let store = open_store(&config).await?;

    match command {
        GlobalBanCommand::Add {
            ip,
            reason,
            author,
            permanent,
            expires_in,
        } => {
            let expires_at = match expires_in {
                Some(duration) => Some(
                    Utc::now()
                        + chrono::Duration::from_std(*duration)
                            .context("Expiry is out of range")?,
                ),
                None => None,
            };
            let stored = store
                .upsert_global_ban(NewGlobalBan {
                    ip: *ip,
                    reason: reason.clone(),
                    banned_by: author.clone(),
                    permanent: *permanent,
                    expires_at,
                })
                .await;
            if !stored {
                anyhow::bail!("Could not store the global ban for {ip}");
            }
            store
                .append_audit(
                    AuditRecord::new(AuditAction::GlobalBan, author.as_str())
                        .ip(ip)
                        .details(reason.as_str()),
                )
                .await;
        }
        GlobalBanCommand::Remove { ip, author } => {
            if !store.deactivate_global_ban(*ip).await {
                warn!(%ip, "No active global ban");
                return Ok(());
            }
            store
                .append_audit(AuditRecord::new(AuditAction::GlobalUnban, author.as_str()).ip(ip))
                .await;
            info!(%ip, "Global ban removed");
        }
        GlobalBanCommand::List => {
            println!("{:<40} {:<26} {:<12} REASON", "IP", "EXPIRES", "BY");
            for ban in store.list_global_bans().await {
                println!(
                    "{:<40} {:<26} {:<12} {}",
                    ban.ip_address,
                    expiry_label(&ban),
                    ban.banned_by,
                    ban.reason
                );
            }
        }
    }
    Ok(())
}

/// A recorded expiry always wins over the permanent flag.
fn expiry_label(ban: &GlobalBan::Model) -> String {
    match (ban.expires_at, ban.permanent) {
        (Some(expires_at), _) => expires_at.to_rfc3339(),
        (None, true) => "permanent".to_owned(),
        (None, false) => "-".to_owned(),
    }
}
