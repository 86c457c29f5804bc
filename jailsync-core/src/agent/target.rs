use jailsync_common::protocol::JailDescriptor;
use jailsync_common::{JailsyncConfig, JailsyncError, SyncTransport};
use jailsync_db_entities::GlobalBan;
use sea_orm::ConnectionTrait;
use tracing::warn;
use uuid::Uuid;

use super::http::HttpTarget;
use crate::db::connect_to_db;
use crate::{CentralStore, SyncReport};

/// Who this agent is, as configured locally
#[derive(Debug, Clone)]
pub struct ServerIdentity {
    pub name: String,
    pub ip: String,
}

/// The central record for this agent's server
#[derive(Debug, Clone)]
pub struct ResolvedServer {
    pub id: Uuid,
    pub name: String,
}

/// Where an agent pushes to and pulls global bans from
#[async_trait::async_trait]
pub trait SyncTarget: Send + Sync {
    fn describe(&self) -> String;

    async fn check(&self) -> Result<(), JailsyncError>;

    async fn resolve_server(
        &self,
        identity: &ServerIdentity,
    ) -> Result<ResolvedServer, JailsyncError>;

    async fn push(
        &self,
        server: &ResolvedServer,
        identity: &ServerIdentity,
        jails: Vec<JailDescriptor>,
    ) -> Result<SyncReport, JailsyncError>;

    async fn global_bans(&self) -> Result<Vec<GlobalBan::Model>, JailsyncError>;
}

pub async fn connect_target(
    config: &JailsyncConfig,
) -> Result<Box<dyn SyncTarget>, JailsyncError> {
    Ok(match config.sync_transport()? {
        SyncTransport::Database(_) => {
            let db = connect_to_db(config).await?;
            Box::new(StoreTarget::new(CentralStore::new(db)))
        }
        SyncTransport::Http(central) => Box::new(HttpTarget::new(central)?),
    })
}

/// Direct database access
pub struct StoreTarget {
    store: CentralStore,
}

impl StoreTarget {
    pub fn new(store: CentralStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl SyncTarget for StoreTarget {
    fn describe(&self) -> String {
        format!("database ({:?})", self.store.connection().get_database_backend())
    }

    async fn check(&self) -> Result<(), JailsyncError> {
        self.store
            .connection()
            .ping()
            .await
            .map_err(|e| JailsyncError::Connectivity("database", e.to_string()))
    }

    async fn resolve_server(
        &self,
        identity: &ServerIdentity,
    ) -> Result<ResolvedServer, JailsyncError> {
        let id = self
            .store
            .upsert_server(&identity.name, &identity.ip)
            .await
            .ok_or_else(|| {
                JailsyncError::Connectivity(
                    "database",
                    format!("could not register server {}", identity.name),
                )
            })?;

        if let Ok(Some(server)) = self.store.find_server_by_name(&identity.name).await {
            if !server.is_active {
                warn!(
                    server = %identity.name,
                    "This server is marked inactive in the central store"
                );
            }
        }

        Ok(ResolvedServer {
            id,
            name: identity.name.clone(),
        })
    }

    async fn push(
        &self,
        server: &ResolvedServer,
        _identity: &ServerIdentity,
        jails: Vec<JailDescriptor>,
    ) -> Result<SyncReport, JailsyncError> {
        Ok(self.store.apply_snapshot(server.id, &jails).await)
    }

    async fn global_bans(&self) -> Result<Vec<GlobalBan::Model>, JailsyncError> {
        Ok(self.store.list_global_bans().await)
    }
}
