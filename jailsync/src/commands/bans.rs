use anyhow::Result;
use jailsync_core::BanFilter;

use super::common::open_store;
use crate::config::load_config;

pub(crate) async fn command(
    cli: &crate::Cli,
    server_name: Option<String>,
    jail_name: Option<String>,
) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    let store = open_store(&config).await?;

    let bans = store
        .list_active_bans(&BanFilter {
            server_name,
            jail_name,
        })
        .await;

    println!(
        "{:<40} {:<24} {:<16} {:>5}  BANNED AT",
        "IP", "SERVER", "JAIL", "COUNT"
    );
    for listing in bans {
        println!(
            "{:<40} {:<24} {:<16} {:>5}  {}",
            listing.ban.ip_address,
            listing.server_name,
            listing.jail_name,
            listing.ban.ban_count,
            listing.ban.ban_time.to_rfc3339(),
        );
    }
    Ok(())
}
