use std::sync::Arc;

use jailsync_common::{JailsyncConfig, JailsyncError};
use sea_orm::DatabaseConnection;

use crate::db::connect_to_db;
use crate::CentralStore;

/// Shared handles for processes that talk to the central database
#[derive(Clone)]
pub struct Services {
    pub db: DatabaseConnection,
    pub store: CentralStore,
    pub config: Arc<JailsyncConfig>,
}

impl Services {
    pub async fn new(config: JailsyncConfig) -> Result<Self, JailsyncError> {
        let db = connect_to_db(&config).await?;
        Ok(Self::from_connection(db, config))
    }

    pub fn from_connection(db: DatabaseConnection, config: JailsyncConfig) -> Self {
        Self {
            store: CentralStore::new(db.clone()),
            db,
            config: Arc::new(config),
        }
    }
}
