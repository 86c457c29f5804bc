use std::sync::Arc;

use anyhow::{Context, Result};
use jailsync_common::JailsyncConfig;
use jailsync_core::db::connect_to_db;
use jailsync_core::CentralStore;
use jailsync_db_entities::Server;
use jailsync_fail2ban::{EnforcementAdapter, Fail2banClient};

pub(crate) async fn open_store(config: &JailsyncConfig) -> Result<CentralStore> {
    let db = connect_to_db(config)
        .await
        .context("Could not open the central database")?;
    Ok(CentralStore::new(db))
}

pub(crate) fn local_adapter(config: &JailsyncConfig) -> Arc<dyn EnforcementAdapter> {
    Arc::new(Fail2banClient::from_config(&config.store.fail2ban))
}

pub(crate) async fn find_server(store: &CentralStore, name: &str) -> Result<Server::Model> {
    store
        .find_server_by_name(name)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Server not found: {name}"))
}
