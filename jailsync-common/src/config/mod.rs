mod defaults;

use std::path::PathBuf;
use std::time::Duration;

use defaults::*;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::{JailsyncError, ListenEndpoint, Secret};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct DatabaseConfig {
    #[serde(default = "_default_db_connect_timeout", with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(default = "_default_db_acquire_timeout", with = "humantime_serde")]
    pub acquire_timeout: Duration,

    #[serde(default = "_default_db_max_connections")]
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            connect_timeout: _default_db_connect_timeout(),
            acquire_timeout: _default_db_acquire_timeout(),
            max_connections: _default_db_max_connections(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "_default_http_listen")]
    pub listen: ListenEndpoint,

    #[serde(default = "_default_false")]
    pub trust_x_forwarded_headers: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            listen: _default_http_listen(),
            trust_x_forwarded_headers: false,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Fail2banConfig {
    #[serde(default = "_default_fail2ban_client")]
    pub client_path: String,

    #[serde(default = "_default_fail2ban_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl Default for Fail2banConfig {
    fn default() -> Self {
        Self {
            client_path: _default_fail2ban_client(),
            timeout: _default_fail2ban_timeout(),
        }
    }
}

/// Remote sync endpoint used by agents that have no direct database access
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CentralConfig {
    pub url: String,
    pub api_key: Secret<String>,

    #[serde(default = "_default_central_timeout", with = "humantime_serde")]
    pub timeout: Duration,
}

impl CentralConfig {
    pub fn sync_url(&self) -> Result<Url, JailsyncError> {
        Ok(Url::parse(&self.url)?)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct JailsyncConfigStore {
    #[serde(default)]
    pub server_name: Option<String>,

    #[serde(default = "_default_server_ip")]
    pub server_ip: String,

    #[serde(default)]
    pub database_url: Option<Secret<String>>,

    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub http: HttpConfig,

    #[serde(default)]
    pub fail2ban: Fail2banConfig,

    #[serde(default)]
    pub central: Option<CentralConfig>,
}

impl Default for JailsyncConfigStore {
    fn default() -> Self {
        Self {
            server_name: None,
            server_ip: _default_server_ip(),
            database_url: None,
            database: <_>::default(),
            http: <_>::default(),
            fail2ban: <_>::default(),
            central: None,
        }
    }
}

/// Where an agent pushes its local state
#[derive(Debug, Clone, Copy)]
pub enum SyncTransport<'a> {
    Database(&'a Secret<String>),
    Http(&'a CentralConfig),
}

#[derive(Debug, Clone)]
pub struct JailsyncConfig {
    pub store: JailsyncConfigStore,
    pub paths_relative_to: PathBuf,
}

impl JailsyncConfig {
    pub fn server_name(&self) -> Result<&str, JailsyncError> {
        match self.store.server_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => Ok(name),
            _ => Err(JailsyncError::Configuration(
                "server_name is not set".to_owned(),
            )),
        }
    }

    pub fn database_url(&self) -> Result<&Secret<String>, JailsyncError> {
        match &self.store.database_url {
            Some(url) if !url.expose_secret().trim().is_empty() => Ok(url),
            _ => Err(JailsyncError::Configuration(
                "database_url is not set".to_owned(),
            )),
        }
    }

    /// A configured database always wins over the HTTP endpoint.
    pub fn sync_transport(&self) -> Result<SyncTransport<'_>, JailsyncError> {
        if let Ok(url) = self.database_url() {
            return Ok(SyncTransport::Database(url));
        }
        match &self.store.central {
            Some(central) => {
                central.sync_url().map_err(|e| {
                    JailsyncError::Configuration(format!("central.url is invalid: {e}"))
                })?;
                if central.api_key.expose_secret().trim().is_empty() {
                    return Err(JailsyncError::Configuration(
                        "central.api_key is not set".to_owned(),
                    ));
                }
                Ok(SyncTransport::Http(central))
            }
            None => Err(JailsyncError::Configuration(
                "neither database_url nor central endpoint is configured".to_owned(),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(yaml: &str) -> JailsyncConfig {
        JailsyncConfig {
            store: serde_yaml::from_str(yaml).unwrap(),
            paths_relative_to: PathBuf::from("/etc"),
        }
    }

    #[test]
    fn test_defaults() {
        let config = load("server_name: web-1\n");
        assert_eq!(config.store.server_ip, "127.0.0.1");
        assert_eq!(config.store.fail2ban.client_path, "fail2ban-client");
        assert_eq!(config.store.fail2ban.timeout, Duration::from_secs(10));
        assert_eq!(config.store.http.listen.port(), 8888);
        assert_eq!(config.server_name().unwrap(), "web-1");
        assert!(config.database_url().is_err());
    }

    #[test]
    fn test_missing_server_name() {
        let config = load("server_name: '  '\n");
        assert!(matches!(
            config.server_name(),
            Err(JailsyncError::Configuration(_))
        ));
    }

    #[test]
    fn test_transport_selection() {
        let config = load(
            "database_url: sqlite:data/db\ncentral:\n  url: https://central/sync\n  api_key: abc\n",
        );
        assert!(matches!(
            config.sync_transport(),
            Ok(SyncTransport::Database(_))
        ));

        let config = load("central:\n  url: https://central/sync\n  api_key: abc\n  timeout: 5s\n");
        match config.sync_transport() {
            Ok(SyncTransport::Http(central)) => {
                assert_eq!(central.timeout, Duration::from_secs(5))
            }
            other => panic!("unexpected transport: {other:?}"),
        }

        let config = load("central:\n  url: not a url\n  api_key: abc\n");
        assert!(config.sync_transport().is_err());

        assert!(load("{}").sync_transport().is_err());
    }
}
