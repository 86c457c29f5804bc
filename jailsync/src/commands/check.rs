use anyhow::Result;
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    if let Err(error) = config.server_name() {
        warn!(%error, "Agent commands will need --server");
    }
    if let Err(error) = config.sync_transport() {
        warn!(%error, "No central store configured");
    }
    info!("No problems found");
    Ok(())
}
