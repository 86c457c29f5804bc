//! Single-pass agent run.
//!
//! The run is a typestate chain:
//! `Init -> ConfigValidated -> Connected -> ServerResolved -> finish()`.
//! Errors before `ServerResolved` are fatal and returned to the caller;
//! everything after that is per-item and ends up in the report.

mod http;
mod target;

use std::net::IpAddr;
use std::sync::Arc;

use jailsync_common::helpers::net::parse_ip;
use jailsync_common::protocol::JailDescriptor;
use jailsync_common::{JailsyncConfig, JailsyncError, SyncTransport};
use jailsync_fail2ban::{BanOutcome, EnforcementAdapter};
use tracing::{error, info, warn};

pub use self::http::HttpTarget;
pub use self::target::{connect_target, ResolvedServer, ServerIdentity, StoreTarget, SyncTarget};
use crate::SyncReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Push local jails and bans to the central store
    SyncLocal,
    /// Pull global bans and apply them to every local jail
    ApplyGlobal,
}

/// One global ban applied to one local jail
#[derive(Debug, Clone)]
pub struct GlobalBanApplication {
    pub ip: String,
    pub jail: String,
    pub outcome: Result<BanOutcome, String>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplySummary {
    pub global_bans: usize,
    pub applications: Vec<GlobalBanApplication>,
    pub warnings: Vec<String>,
}

impl ApplySummary {
    pub fn applied(&self) -> usize {
        self.count(|o| matches!(o, Ok(BanOutcome::Changed)))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, Ok(BanOutcome::Unchanged)))
    }

    pub fn failed(&self) -> usize {
        self.count(Result::is_err)
    }

    fn count(&self, f: impl Fn(&Result<BanOutcome, String>) -> bool) -> usize {
        self.applications.iter().filter(|a| f(&a.outcome)).count()
    }
}

#[derive(Debug, Clone)]
pub enum AgentReport {
    Synced(SyncReport),
    Applied(ApplySummary),
}

pub struct Init {
    config: JailsyncConfig,
}

pub struct ConfigValidated {
    config: JailsyncConfig,
    identity: ServerIdentity,
    mode: AgentMode,
}

pub struct Connected {
    identity: ServerIdentity,
    mode: AgentMode,
    target: Box<dyn SyncTarget>,
}

pub struct ServerResolved {
    identity: ServerIdentity,
    mode: AgentMode,
    target: Box<dyn SyncTarget>,
    server: ResolvedServer,
}

pub struct Agent<S> {
    adapter: Arc<dyn EnforcementAdapter>,
    state: S,
}

impl Agent<Init> {
    pub fn new(config: JailsyncConfig, adapter: Arc<dyn EnforcementAdapter>) -> Self {
        Self {
            adapter,
            state: Init { config },
        }
    }

    pub fn validate(
        self,
        server_override: Option<&str>,
        mode: AgentMode,
    ) -> Result<Agent<ConfigValidated>, JailsyncError> {
        let config = self.state.config;
        let name = match server_override.map(str::trim) {
            Some(name) if !name.is_empty() => name.to_owned(),
            _ => config.server_name()?.to_owned(),
        };

        let transport = config.sync_transport()?;
        if mode == AgentMode::ApplyGlobal && matches!(transport, SyncTransport::Http(_)) {
            return Err(JailsyncError::Configuration(
                "--apply-global requires database_url".to_owned(),
            ));
        }

        let identity = ServerIdentity {
            name,
            ip: config.store.server_ip.clone(),
        };
        Ok(Agent {
            adapter: self.adapter,
            state: ConfigValidated {
                config,
                identity,
                mode,
            },
        })
    }
}

impl Agent<ConfigValidated> {
    pub fn identity(&self) -> &ServerIdentity {
        &self.state.identity
    }

    pub async fn connect(self) -> Result<Agent<Connected>, JailsyncError> {
        let target = connect_target(&self.state.config).await?;
        self.connect_with(target).await
    }

    /// Uses an already established target, then checks the local ban engine.
    pub async fn connect_with(
        self,
        target: Box<dyn SyncTarget>,
    ) -> Result<Agent<Connected>, JailsyncError> {
        info!(target = %target.describe(), "Connected");
        self.adapter.ping().await?;

        Ok(Agent {
            adapter: self.adapter,
            state: Connected {
                identity: self.state.identity,
                mode: self.state.mode,
                target,
            },
        })
    }
}

impl Agent<Connected> {
    pub async fn resolve_server(self) -> Result<Agent<ServerResolved>, JailsyncError> {
        let Connected {
            identity,
            mode,
            target,
        } = self.state;
        let server = target.resolve_server(&identity).await?;
        info!(server = %server.name, server_id = %server.id, "Server resolved");

        Ok(Agent {
            adapter: self.adapter,
            state: ServerResolved {
                identity,
                mode,
                target,
                server,
            },
        })
    }
}

impl Agent<ServerResolved> {
    pub fn server(&self) -> &ResolvedServer {
        &self.state.server
    }

    pub async fn finish(self) -> AgentReport {
        match self.state.mode {
            AgentMode::SyncLocal => AgentReport::Synced(self.sync_local().await),
            AgentMode::ApplyGlobal => AgentReport::Applied(self.apply_global().await),
        }
    }

    async fn sync_local(&self) -> SyncReport {
        let mut warnings = vec![];

        let jails = match self.adapter.list_jails().await {
            Ok(jails) => jails,
            Err(error) => {
                error!(%error, "Could not enumerate local jails");
                return SyncReport {
                    warnings: vec![format!("Could not enumerate jails: {error}")],
                    ..Default::default()
                };
            }
        };
        if jails.is_empty() {
            info!("No jails found");
            return SyncReport::default();
        }
        info!(count = jails.len(), "Found jails");

        let mut descriptors = Vec::with_capacity(jails.len());
        for jail in jails {
            let info = match self.adapter.jail_info(&jail).await {
                Ok(policy) => Some(policy),
                Err(error) => {
                    warn!(%jail, %error, "Could not read jail policy");
                    None
                }
            };
            let banned = match self.adapter.list_banned(&jail).await {
                Ok(banned) => banned,
                Err(error) => {
                    warn!(%jail, %error, "Could not read banned IPs");
                    warnings.push(format!("Could not read banned IPs of {jail}: {error}"));
                    vec![]
                }
            };
            info!(%jail, banned = banned.len(), "Processing jail");
            descriptors.push(JailDescriptor {
                name: jail,
                info,
                banned_ips: banned.iter().map(IpAddr::to_string).collect(),
            });
        }

        let mut report = match self
            .state
            .target
            .push(&self.state.server, &self.state.identity, descriptors)
            .await
        {
            Ok(report) => report,
            Err(error) => {
                error!(%error, "Sync failed");
                SyncReport {
                    warnings: vec![format!("Sync failed: {error}")],
                    ..Default::default()
                }
            }
        };

        for warning in &report.warnings {
            warn!("{warning}");
        }
        warnings.append(&mut report.warnings);
        report.warnings = warnings;
        info!(
            jails = report.jails_processed,
            ips_synced = report.ips_synced,
            "Sync completed"
        );
        report
    }

    async fn apply_global(&self) -> ApplySummary {
        let mut summary = ApplySummary::default();

        let bans = match self.state.target.global_bans().await {
            Ok(bans) => bans,
            Err(error) => {
                error!(%error, "Could not load global bans");
                summary.warnings.push(format!("Could not load global bans: {error}"));
                return summary;
            }
        };
        summary.global_bans = bans.len();
        if bans.is_empty() {
            info!("No global bans found");
            return summary;
        }

        let jails = match self.adapter.list_jails().await {
            Ok(jails) => jails,
            Err(error) => {
                error!(%error, "Could not enumerate local jails");
                summary
                    .warnings
                    .push(format!("Could not enumerate jails: {error}"));
                return summary;
            }
        };
        info!(bans = bans.len(), jails = jails.len(), "Applying global bans");

        for ban in bans {
            let ip = match parse_ip(&ban.ip_address) {
                Ok(ip) => ip,
                Err(error) => {
                    warn!(ip = %ban.ip_address, %error, "Skipping global ban");
                    summary
                        .warnings
                        .push(format!("Skipped global ban {}: {error}", ban.ip_address));
                    continue;
                }
            };

            for jail in &jails {
                let outcome = self.adapter.ban(jail, ip).await.map_err(|e| e.to_string());
                match &outcome {
                    Ok(BanOutcome::Changed) => info!(%ip, %jail, "Applied global ban"),
                    Ok(BanOutcome::Unchanged) => info!(%ip, %jail, "Already banned"),
                    Err(error) => warn!(%ip, %jail, %error, "Failed to apply global ban"),
                }
                summary.applications.push(GlobalBanApplication {
                    ip: ban.ip_address.clone(),
                    jail: jail.clone(),
                    outcome,
                });
            }
        }

        info!(
            applied = summary.applied(),
            unchanged = summary.unchanged(),
            failed = summary.failed(),
            "Global bans applied"
        );
        summary
    }
}

/// Runs the whole chain. Only precondition failures are returned as errors.
pub async fn run_agent(
    config: JailsyncConfig,
    adapter: Arc<dyn EnforcementAdapter>,
    server_override: Option<&str>,
    mode: AgentMode,
) -> Result<AgentReport, JailsyncError> {
    let agent = Agent::new(config, adapter).validate(server_override, mode)?;
    info!(server = %agent.identity().name, "Starting agent");
    let agent = agent.connect().await?.resolve_server().await?;
    Ok(agent.finish().await)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use jailsync_common::protocol::JailPolicy;
    use jailsync_common::{CentralConfig, JailsyncConfigStore, Secret};
    use jailsync_db_entities::{BannedIp, Jail, Server};
    use jailsync_fail2ban::AdapterError;
    use sea_orm::{ColumnTrait, EntityTrait, QueryFilter};

    use super::*;
    use crate::db::test_db;
    use crate::{CentralStore, NewGlobalBan};

    #[derive(Default)]
    struct FakeAdapter {
        unreachable: bool,
        jails: BTreeMap<String, Vec<IpAddr>>,
        policies: BTreeMap<String, JailPolicy>,
        failing_jail: Option<String>,
        bans: Mutex<Vec<(String, IpAddr)>>,
    }

    impl FakeAdapter {
        fn with_jail(mut self, jail: &str, ips: &[&str]) -> Self {
            self.jails.insert(
                jail.to_owned(),
                ips.iter().map(|ip| ip.parse().unwrap()).collect(),
            );
            self
        }
    }

    #[async_trait::async_trait]
    impl EnforcementAdapter for FakeAdapter {
        async fn ping(&self) -> Result<(), AdapterError> {
            if self.unreachable {
                return Err(AdapterError::Unreachable);
            }
            Ok(())
        }

        async fn list_jails(&self) -> Result<Vec<String>, AdapterError> {
            Ok(self.jails.keys().cloned().collect())
        }

        async fn jail_info(&self, jail: &str) -> Result<JailPolicy, AdapterError> {
            Ok(self.policies.get(jail).copied().unwrap_or_default())
        }

        async fn list_banned(&self, jail: &str) -> Result<Vec<IpAddr>, AdapterError> {
            Ok(self.jails.get(jail).cloned().unwrap_or_default())
        }

        async fn ban(&self, jail: &str, ip: IpAddr) -> Result<BanOutcome, AdapterError> {
            if self.failing_jail.as_deref() == Some(jail) {
                return Err(AdapterError::UnexpectedOutput("jail does not exist".into()));
            }
            self.bans.lock().unwrap().push((jail.to_owned(), ip));
            Ok(BanOutcome::Changed)
        }

        async fn unban(&self, _jail: &str, _ip: IpAddr) -> Result<BanOutcome, AdapterError> {
            Ok(BanOutcome::Unchanged)
        }
    }

    fn config(store: JailsyncConfigStore) -> JailsyncConfig {
        JailsyncConfig {
            store,
            paths_relative_to: PathBuf::from("/tmp"),
        }
    }

    fn db_config() -> JailsyncConfig {
        config(JailsyncConfigStore {
            server_name: Some("web-1".into()),
            database_url: Some(Secret::new("sqlite::memory:".into())),
            ..Default::default()
        })
    }

    async fn run(
        store: &CentralStore,
        adapter: Arc<dyn EnforcementAdapter>,
        mode: AgentMode,
    ) -> AgentReport {
        Agent::new(db_config(), adapter)
            .validate(None, mode)
            .unwrap()
            .connect_with(Box::new(StoreTarget::new(store.clone())))
            .await
            .unwrap()
            .resolve_server()
            .await
            .unwrap()
            .finish()
            .await
    }

    #[test]
    fn test_missing_server_name_is_fatal() {
        let config = config(JailsyncConfigStore {
            database_url: Some(Secret::new("sqlite::memory:".into())),
            ..Default::default()
        });
        let result = Agent::new(config.clone(), Arc::new(FakeAdapter::default()))
            .validate(None, AgentMode::SyncLocal);
        assert!(matches!(result, Err(JailsyncError::Configuration(_))));

        // --server fills in the name
        assert!(Agent::new(config, Arc::new(FakeAdapter::default()))
            .validate(Some("web-9"), AgentMode::SyncLocal)
            .is_ok());
    }

    #[test]
    fn test_apply_global_needs_database() {
        let config = config(JailsyncConfigStore {
            server_name: Some("web-1".into()),
            central: Some(CentralConfig {
                url: "https://central.example/sync".into(),
                api_key: Secret::new("a".repeat(64)),
                timeout: std::time::Duration::from_secs(1),
            }),
            ..Default::default()
        });
        let result = Agent::new(config.clone(), Arc::new(FakeAdapter::default()))
            .validate(None, AgentMode::ApplyGlobal);
        assert!(matches!(result, Err(JailsyncError::Configuration(_))));

        assert!(Agent::new(config, Arc::new(FakeAdapter::default()))
            .validate(None, AgentMode::SyncLocal)
            .is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_engine_is_fatal() {
        let store = CentralStore::new(test_db().await);
        let adapter = FakeAdapter {
            unreachable: true,
            ..Default::default()
        };
        let result = Agent::new(db_config(), Arc::new(adapter))
            .validate(None, AgentMode::SyncLocal)
            .unwrap()
            .connect_with(Box::new(StoreTarget::new(store)))
            .await;
        assert!(matches!(result, Err(JailsyncError::Connectivity(..))));
    }

    #[tokio::test]
    async fn test_sync_scenario() {
        let store = CentralStore::new(test_db().await);
        let adapter: Arc<dyn EnforcementAdapter> =
            Arc::new(FakeAdapter::default().with_jail("sshd", &["203.0.113.5"]));

        let AgentReport::Synced(report) = run(&store, adapter.clone(), AgentMode::SyncLocal).await
        else {
            panic!("expected a sync report");
        };
        assert_eq!(report.jails_processed, 1);
        assert_eq!(report.ips_synced, 1);
        assert!(report.warnings.is_empty());

        let server = store.find_server_by_name("web-1").await.unwrap().unwrap();
        let jail = Jail::Entity::find()
            .filter(Jail::Column::ServerId.eq(server.id))
            .one(store.connection())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(jail.jail_name, "sshd");
        assert_eq!((jail.findtime, jail.bantime, jail.maxretry), (600, 3600, 5));

        let first = BannedIp::Entity::find()
            .one(store.connection())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(first.ip_address, "203.0.113.5");
        assert_eq!(first.ban_count, 1);
        assert!(first.is_active);

        run(&store, adapter, AgentMode::SyncLocal).await;
        let second = BannedIp::Entity::find().all(store.connection()).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].ban_count, 2);
        assert_eq!(second[0].ban_time, first.ban_time);
        assert!(second[0].last_attempt >= first.last_attempt);
        assert_eq!(Server::Entity::find().all(store.connection()).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_apply_global_tolerates_failures() {
        let store = CentralStore::new(test_db().await);
        store
            .upsert_global_ban(NewGlobalBan {
                ip: "198.51.100.9".parse().unwrap(),
                reason: "abuse".into(),
                banned_by: "admin".into(),
                permanent: true,
                expires_at: None,
            })
            .await;

        let adapter = Arc::new(FakeAdapter {
            failing_jail: Some("nginx".into()),
            ..FakeAdapter::default()
                .with_jail("nginx", &[])
                .with_jail("sshd", &[])
        });

        let AgentReport::Applied(summary) =
            run(&store, adapter.clone(), AgentMode::ApplyGlobal).await
        else {
            panic!("expected an apply summary");
        };
        assert_eq!(summary.global_bans, 1);
        assert_eq!(summary.applications.len(), 2);
        assert_eq!(summary.applied(), 1);
        assert_eq!(summary.failed(), 1);

        let bans = adapter.bans.lock().unwrap();
        assert_eq!(bans.len(), 1);
        assert_eq!(bans[0].0, "sshd");
    }

    #[tokio::test]
    async fn test_apply_global_without_bans() {
        let store = CentralStore::new(test_db().await);
        let adapter = Arc::new(FakeAdapter::default().with_jail("sshd", &[]));
        let AgentReport::Applied(summary) =
            run(&store, adapter.clone(), AgentMode::ApplyGlobal).await
        else {
            panic!("expected an apply summary");
        };
        assert_eq!(summary.global_bans, 0);
        assert!(adapter.bans.lock().unwrap().is_empty());
    }
}
