use anyhow::Result;
use jailsync_core::Services;
use jailsync_protocol_http::SyncHttpServer;
use tracing::*;

use crate::config::load_config;

pub(crate) async fn command(cli: &crate::Cli) -> Result<()> {
    let version = env!("CARGO_PKG_VERSION");
    info!(%version, "jailsync");

    let config = load_config(&cli.config, true)?;
    let listen = config.store.http.listen.clone();
    let services = Services::new(config).await?;

    if console::user_attended() {
        info!("--------------------------------------------");
        info!("jailsync is now running.");
        info!("Accepting sync requests on http://{}/sync", listen);
        info!("--------------------------------------------");
    }

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Exiting");
        }
        result = SyncHttpServer::new(&services).run(listen) => {
            if let Err(error) = result {
                error!(?error, "HTTP server error");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
