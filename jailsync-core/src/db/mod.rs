use sea_orm::{ConnectOptions, ConnectionTrait, Database, DatabaseConnection, TransactionTrait};
use tracing::*;

use jailsync_common::helpers::fs::secure_file;
use jailsync_common::{JailsyncConfig, JailsyncError};
use jailsync_db_migrations::migrate_database;

fn unreachable(e: impl std::fmt::Display) -> JailsyncError {
    JailsyncError::Connectivity("database", e.to_string())
}

/// Opens the pool, creating the SQLite file if needed, and applies pending migrations.
pub async fn connect_to_db(config: &JailsyncConfig) -> Result<DatabaseConnection, JailsyncError> {
    let mut url = url::Url::parse(&config.database_url()?.expose_secret()[..])
        .map_err(|e| JailsyncError::Configuration(format!("database_url is invalid: {e}")))?;

    if url.scheme() == "sqlite" && !url.path().contains(":memory:") {
        let mut abs_path = config.paths_relative_to.clone();
        abs_path.push(url.path());

        if let Some(parent) = abs_path.parent() {
            std::fs::create_dir_all(parent).map_err(unreachable)?
        }

        url.set_path(abs_path.to_str().ok_or_else(|| {
            JailsyncError::Configuration("database path is not valid UTF-8".to_owned())
        })?);
        url.set_query(Some("mode=rwc"));

        let db = Database::connect(ConnectOptions::new(url.to_string()))
            .await
            .map_err(unreachable)?;
        db.begin().await?.commit().await?;
        drop(db);

        secure_file(&abs_path).map_err(unreachable)?;
    }

    let db_config = &config.store.database;
    let mut opt = ConnectOptions::new(url.to_string());
    opt.max_connections(db_config.max_connections)
        .min_connections(1)
        .connect_timeout(db_config.connect_timeout)
        .acquire_timeout(db_config.acquire_timeout)
        .sqlx_logging(false);

    let connection = Database::connect(opt).await.map_err(unreachable)?;
    debug!(backend = ?connection.get_database_backend(), "Connected to the database");

    migrate_database(&connection).await?;
    Ok(connection)
}

#[cfg(test)]
pub(crate) async fn test_db() -> DatabaseConnection {
    let mut opt = ConnectOptions::new("sqlite::memory:");
    opt.max_connections(1).sqlx_logging(false);
    #[allow(clippy::unwrap_used)]
    let db = Database::connect(opt).await.unwrap();
    #[allow(clippy::unwrap_used)]
    migrate_database(&db).await.unwrap();
    db
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use jailsync_common::{JailsyncConfigStore, Secret};

    use super::*;

    #[tokio::test]
    async fn test_memory_database() {
        let config = JailsyncConfig {
            store: JailsyncConfigStore {
                database_url: Some(Secret::new("sqlite::memory:".to_owned())),
                ..Default::default()
            },
            paths_relative_to: PathBuf::from("/tmp"),
        };
        assert!(connect_to_db(&config).await.is_ok());
    }

    #[tokio::test]
    async fn test_missing_database_url() {
        let config = JailsyncConfig {
            store: JailsyncConfigStore::default(),
            paths_relative_to: PathBuf::from("/tmp"),
        };
        assert!(matches!(
            connect_to_db(&config).await,
            Err(JailsyncError::Configuration(_))
        ));
    }
}
