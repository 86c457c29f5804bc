use anyhow::Result;
use jailsync_core::agent::{run_agent, AgentMode, AgentReport};
use tracing::*;

use super::common::local_adapter;
use crate::config::load_config;

pub(crate) async fn command(
    cli: &crate::Cli,
    apply_global: bool,
    server: Option<&str>,
) -> Result<()> {
    let config = load_config(&cli.config, true)?;
    let adapter = local_adapter(&config);
    let mode = if apply_global {
        AgentMode::ApplyGlobal
    } else {
        AgentMode::SyncLocal
    };

    let report = match run_agent(config, adapter, server, mode).await {
        Ok(report) => report,
        Err(error) => {
            error!(kind = error.kind(), %error, "Agent run aborted");
            anyhow::bail!("Sync failed");
        }
    };

    let warnings = match &report {
        AgentReport::Synced(report) => report.warnings.len(),
        AgentReport::Applied(summary) => summary.warnings.len() + summary.failed(),
    };
    if warnings > 0 {
        warn!(warnings, "Finished with warnings");
    } else {
        info!("Done");
    }
    Ok(())
}
