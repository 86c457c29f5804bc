use std::path::Path;

use anyhow::{Context, Result};
use config::{Config, Environment, File};
use jailsync_common::helpers::fs::secure_file;
use jailsync_common::{JailsyncConfig, JailsyncConfigStore, SyncTransport};
use tracing::*;

pub fn load_config(path: &Path, secure: bool) -> Result<JailsyncConfig> {
    if secure {
        secure_file(path).context("Could not secure config")?;
    }

    let store: JailsyncConfigStore = Config::builder()
        .add_source(File::from(path))
        .add_source(
            Environment::with_prefix("JAILSYNC")
                .prefix_separator("_")
                .separator("__"),
        )
        .build()
        .context("Could not load config")?
        .try_deserialize()
        .context("Could not parse config")?;

    let config = JailsyncConfig {
        store,
        paths_relative_to: path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default(),
    };

    let transport = match config.sync_transport() {
        Ok(SyncTransport::Database(_)) => "database",
        Ok(SyncTransport::Http(_)) => "http",
        Err(_) => "none",
    };
    info!(
        "Using config: {path:?} (server: {}, transport: {transport})",
        config.store.server_name.as_deref().unwrap_or("-"),
    );
    Ok(config)
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;
    use std::path::PathBuf;

    use super::*;

    fn write_config(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("jailsync-{}-{name}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("jailsync.yaml");
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_config() {
        let path = write_config(
            "load",
            "server_name: web-1\nserver_ip: 10.0.0.7\ndatabase_url: sqlite:data/db.sqlite3\nfail2ban:\n  timeout: 5s\n",
        );
        let config = load_config(&path, true).unwrap();

        assert_eq!(config.server_name().unwrap(), "web-1");
        assert_eq!(config.store.server_ip, "10.0.0.7");
        assert_eq!(config.store.fail2ban.timeout.as_secs(), 5);
        assert_eq!(config.paths_relative_to, path.parent().unwrap());
        assert!(matches!(
            config.sync_transport().unwrap(),
            SyncTransport::Database(_)
        ));

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }

    #[test]
    fn test_missing_file() {
        let path = std::env::temp_dir().join("jailsync-does-not-exist.yaml");
        assert!(load_config(&path, false).is_err());
    }

    #[test]
    fn test_rejects_bad_values() {
        let path = write_config("bad", "http:\n  listen: not-an-address\n");
        assert!(load_config(&path, false).is_err());
    }
}
