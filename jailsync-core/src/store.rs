use std::collections::HashMap;
use std::net::IpAddr;

use chrono::{DateTime, Utc};
use jailsync_common::helpers::net::parse_ip;
use jailsync_common::protocol::{JailDescriptor, JailPolicy};
use jailsync_common::{ApiKey, JailsyncError};
use jailsync_db_entities::AuditLogEntry::AuditAction;
use jailsync_db_entities::{AuditLogEntry, BannedIp, GlobalBan, Jail, Server};
use sea_orm::sea_query::{Expr, OnConflict};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, JoinType,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, RelationTrait, Set, TransactionTrait,
};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Optional annotations stored alongside a ban
#[derive(Debug, Clone, Default)]
pub struct BanAnnotations {
    pub hostname: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewGlobalBan {
    pub ip: IpAddr,
    pub reason: String,
    pub banned_by: String,
    pub permanent: bool,
    pub expires_at: Option<DateTime<Utc>>,
}

/// A single audit ledger entry, built up with the setter methods.
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub action: AuditAction,
    pub performed_by: String,
    pub server_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub jail_name: Option<String>,
    pub details: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, performed_by: impl Into<String>) -> Self {
        Self {
            action,
            performed_by: performed_by.into(),
            server_id: None,
            ip_address: None,
            jail_name: None,
            details: None,
        }
    }

    pub fn server(mut self, server_id: Uuid) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub fn ip(mut self, ip: impl ToString) -> Self {
        self.ip_address = Some(ip.to_string());
        self
    }

    pub fn jail(mut self, jail_name: impl Into<String>) -> Self {
        self.jail_name = Some(jail_name.into());
        self
    }

    pub fn details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}

/// Outcome of reconciling one batch of jail descriptors
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub jails_processed: usize,
    pub ips_synced: usize,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct ServerSummary {
    pub server: Server::Model,
    pub jail_count: u64,
    pub active_bans: u64,
}

#[derive(Debug, Clone, Default)]
pub struct BanFilter {
    pub server_name: Option<String>,
    pub jail_name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct BanListing {
    pub ban: BannedIp::Model,
    pub server_name: String,
    pub jail_name: String,
}

fn sentinel<T>(operation: &'static str, result: Result<T, JailsyncError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(error) => {
            error!(%operation, %error, "Store operation failed");
            None
        }
    }
}

/// Reconciliation rules for the central database.
///
/// Every public operation that writes or reads rows catches datastore
/// errors, logs them and returns a sentinel (`None`, `false` or an empty
/// list) so that callers can skip the item and carry on.
#[derive(Clone)]
pub struct CentralStore {
    db: DatabaseConnection,
}

impl CentralStore {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.db
    }

    // Servers

    pub async fn upsert_server(&self, name: &str, ip: &str) -> Option<Uuid> {
        sentinel("upsert_server", self.try_upsert_server(name, ip).await)
    }

    async fn try_upsert_server(&self, name: &str, ip: &str) -> Result<Uuid, JailsyncError> {
        let now = Utc::now();
        let existing = Server::Entity::find()
            .filter(Server::Column::ServerName.eq(name))
            .one(&self.db)
            .await?;

        if let Some(server) = existing {
            let id = server.id;
            let mut model: Server::ActiveModel = server.into();
            model.server_ip = Set(ip.to_owned());
            model.last_sync = Set(Some(now));
            model.update(&self.db).await?;
            return Ok(id);
        }

        let values = Server::ActiveModel {
            id: Set(Uuid::new_v4()),
            server_name: Set(name.to_owned()),
            server_ip: Set(ip.to_owned()),
            api_key: Set(None),
            is_active: Set(true),
            last_sync: Set(Some(now)),
            created: Set(now),
        };
        let server = values.insert(&self.db).await?;
        info!(server = %name, %ip, "Registered new server");
        Ok(server.id)
    }

    /// Refreshes IP and last-sync of a server already identified by id.
    pub async fn touch_server(&self, server_id: Uuid, ip: &str) -> bool {
        sentinel("touch_server", self.try_touch_server(server_id, ip).await).is_some()
    }

    async fn try_touch_server(&self, server_id: Uuid, ip: &str) -> Result<(), JailsyncError> {
        Server::Entity::update_many()
            .col_expr(Server::Column::ServerIp, Expr::value(ip.to_owned()))
            .col_expr(Server::Column::LastSync, Expr::value(Some(Utc::now())))
            .filter(Server::Column::Id.eq(server_id))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    pub async fn find_server_by_api_key(
        &self,
        key: &ApiKey,
    ) -> Result<Option<Server::Model>, JailsyncError> {
        Ok(Server::Entity::find()
            .filter(Server::Column::ApiKey.eq(key.expose_secret()))
            .one(&self.db)
            .await?)
    }

    pub async fn find_server_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Server::Model>, JailsyncError> {
        Ok(Server::Entity::find()
            .filter(Server::Column::ServerName.eq(name))
            .one(&self.db)
            .await?)
    }

    pub async fn set_server_api_key(&self, server_id: Uuid, key: &ApiKey) -> bool {
        let update = Server::Entity::update_many()
            .col_expr(
                Server::Column::ApiKey,
                Expr::value(Some(key.expose_secret().to_owned())),
            )
            .filter(Server::Column::Id.eq(server_id))
            .exec(&self.db)
            .await
            .map_err(JailsyncError::from);
        sentinel("set_server_api_key", update).is_some_and(|r| r.rows_affected > 0)
    }

    /// Returns false if the server does not exist.
    pub async fn set_server_active(&self, server_id: Uuid, active: bool) -> bool {
        let update = Server::Entity::update_many()
            .col_expr(Server::Column::IsActive, Expr::value(active))
            .filter(Server::Column::Id.eq(server_id))
            .exec(&self.db)
            .await
            .map_err(JailsyncError::from);
        sentinel("set_server_active", update).is_some_and(|r| r.rows_affected > 0)
    }

    pub async fn list_servers(&self) -> Vec<ServerSummary> {
        sentinel("list_servers", self.try_list_servers().await).unwrap_or_default()
    }

    async fn try_list_servers(&self) -> Result<Vec<ServerSummary>, JailsyncError> {
        let servers = Server::Entity::find()
            .order_by_asc(Server::Column::ServerName)
            .all(&self.db)
            .await?;

        let mut result = Vec::with_capacity(servers.len());
        for server in servers {
            let jail_count = Jail::Entity::find()
                .filter(Jail::Column::ServerId.eq(server.id))
                .count(&self.db)
                .await?;
            let active_bans = BannedIp::Entity::find()
                .filter(BannedIp::Column::ServerId.eq(server.id))
                .filter(BannedIp::Column::IsActive.eq(true))
                .count(&self.db)
                .await?;
            result.push(ServerSummary {
                server,
                jail_count,
                active_bans,
            });
        }
        Ok(result)
    }

    // Jails

    /// A policy with no values is treated as absent. Values missing from a
    /// supplied policy fall back to the engine defaults.
    pub async fn upsert_jail(
        &self,
        server_id: Uuid,
        jail_name: &str,
        policy: Option<&JailPolicy>,
    ) -> Option<Uuid> {
        sentinel(
            "upsert_jail",
            self.try_upsert_jail(server_id, jail_name, policy.filter(|p| !p.is_empty()))
                .await,
        )
    }

    async fn try_upsert_jail(
        &self,
        server_id: Uuid,
        jail_name: &str,
        policy: Option<&JailPolicy>,
    ) -> Result<Uuid, JailsyncError> {
        let now = Utc::now();
        let existing = Jail::Entity::find()
            .filter(Jail::Column::ServerId.eq(server_id))
            .filter(Jail::Column::JailName.eq(jail_name))
            .one(&self.db)
            .await?;

        if let Some(jail) = existing {
            let id = jail.id;
            if let Some(policy) = policy {
                let mut model: Jail::ActiveModel = jail.into();
                model.findtime = Set(policy.findtime_or_default());
                model.bantime = Set(policy.bantime_or_default());
                model.maxretry = Set(policy.maxretry_or_default());
                model.last_sync = Set(Some(now));
                model.update(&self.db).await?;
            }
            return Ok(id);
        }

        let policy = policy.copied().unwrap_or_default();
        let values = Jail::ActiveModel {
            id: Set(Uuid::new_v4()),
            server_id: Set(server_id),
            jail_name: Set(jail_name.to_owned()),
            findtime: Set(policy.findtime_or_default()),
            bantime: Set(policy.bantime_or_default()),
            maxretry: Set(policy.maxretry_or_default()),
            last_sync: Set(Some(now)),
        };
        let jail = values.insert(&self.db).await?;
        debug!(%server_id, jail = %jail_name, "Created jail");
        Ok(jail.id)
    }

    pub async fn find_jail(
        &self,
        server_id: Uuid,
        jail_name: &str,
    ) -> Result<Option<Jail::Model>, JailsyncError> {
        Ok(Jail::Entity::find()
            .filter(Jail::Column::ServerId.eq(server_id))
            .filter(Jail::Column::JailName.eq(jail_name))
            .one(&self.db)
            .await?)
    }

    // Bans

    /// Increments the active ban for the triple, or opens a new ban cycle.
    /// Two concurrent first observations may both insert; the counter is
    /// informational so this is tolerated.
    pub async fn record_ban(
        &self,
        server_id: Uuid,
        jail_id: Uuid,
        ip: IpAddr,
        annotations: BanAnnotations,
    ) -> bool {
        sentinel(
            "record_ban",
            self.try_record_ban(server_id, jail_id, ip, annotations).await,
        )
        .is_some()
    }

    async fn try_record_ban(
        &self,
        server_id: Uuid,
        jail_id: Uuid,
        ip: IpAddr,
        annotations: BanAnnotations,
    ) -> Result<(), JailsyncError> {
        let ip = ip.to_string();
        let now = Utc::now();
        let txn = self.db.begin().await?;

        let active = BannedIp::Entity::find()
            .filter(BannedIp::Column::ServerId.eq(server_id))
            .filter(BannedIp::Column::JailId.eq(jail_id))
            .filter(BannedIp::Column::IpAddress.eq(&ip))
            .filter(BannedIp::Column::IsActive.eq(true))
            .one(&txn)
            .await?;

        match active {
            Some(row) => {
                let mut update = BannedIp::Entity::update_many()
                    .col_expr(
                        BannedIp::Column::BanCount,
                        Expr::col(BannedIp::Column::BanCount).add(1),
                    )
                    .col_expr(BannedIp::Column::LastAttempt, Expr::value(Some(now)));
                if let Some(hostname) = annotations.hostname {
                    update =
                        update.col_expr(BannedIp::Column::Hostname, Expr::value(Some(hostname)));
                }
                if let Some(country) = annotations.country {
                    update =
                        update.col_expr(BannedIp::Column::Country, Expr::value(Some(country)));
                }
                update
                    .filter(BannedIp::Column::Id.eq(row.id))
                    .exec(&txn)
                    .await?;
            }
            None => {
                let values = BannedIp::ActiveModel {
                    id: Set(Uuid::new_v4()),
                    server_id: Set(server_id),
                    jail_id: Set(jail_id),
                    ip_address: Set(ip.clone()),
                    hostname: Set(annotations.hostname),
                    country: Set(annotations.country),
                    ban_time: Set(now),
                    last_attempt: Set(Some(now)),
                    ban_count: Set(1),
                    is_active: Set(true),
                    unban_time: Set(None),
                };
                values.insert(&txn).await?;
                info!(%ip, %server_id, %jail_id, "New ban recorded");
            }
        }

        txn.commit().await?;
        Ok(())
    }

    /// No-op when there is no active ban for the triple.
    pub async fn deactivate_ban(&self, server_id: Uuid, jail_id: Uuid, ip: IpAddr) -> bool {
        let update = BannedIp::Entity::update_many()
            .col_expr(BannedIp::Column::IsActive, Expr::value(false))
            .col_expr(BannedIp::Column::UnbanTime, Expr::value(Some(Utc::now())))
            .filter(BannedIp::Column::ServerId.eq(server_id))
            .filter(BannedIp::Column::JailId.eq(jail_id))
            .filter(BannedIp::Column::IpAddress.eq(ip.to_string()))
            .filter(BannedIp::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .map_err(JailsyncError::from);
        match sentinel("deactivate_ban", update) {
            Some(result) => {
                debug!(%ip, %server_id, %jail_id, rows = result.rows_affected, "Deactivated ban");
                true
            }
            None => false,
        }
    }

    pub async fn list_active_bans(&self, filter: &BanFilter) -> Vec<BanListing> {
        sentinel("list_active_bans", self.try_list_active_bans(filter).await).unwrap_or_default()
    }

    async fn try_list_active_bans(
        &self,
        filter: &BanFilter,
    ) -> Result<Vec<BanListing>, JailsyncError> {
        let mut query = BannedIp::Entity::find()
            .join(JoinType::InnerJoin, BannedIp::Relation::Server.def())
            .join(JoinType::InnerJoin, BannedIp::Relation::Jail.def())
            .filter(BannedIp::Column::IsActive.eq(true));
        if let Some(server_name) = &filter.server_name {
            query = query.filter(Server::Column::ServerName.eq(server_name.as_str()));
        }
        if let Some(jail_name) = &filter.jail_name {
            query = query.filter(Jail::Column::JailName.eq(jail_name.as_str()));
        }
        let bans = query
            .order_by_desc(BannedIp::Column::BanTime)
            .all(&self.db)
            .await?;

        let servers: HashMap<Uuid, String> = Server::Entity::find()
            .filter(Server::Column::Id.is_in(bans.iter().map(|b| b.server_id)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|s| (s.id, s.server_name))
            .collect();
        let jails: HashMap<Uuid, String> = Jail::Entity::find()
            .filter(Jail::Column::Id.is_in(bans.iter().map(|b| b.jail_id)))
            .all(&self.db)
            .await?
            .into_iter()
            .map(|j| (j.id, j.jail_name))
            .collect();

        Ok(bans
            .into_iter()
            .map(|ban| BanListing {
                server_name: servers.get(&ban.server_id).cloned().unwrap_or_default(),
                jail_name: jails.get(&ban.jail_id).cloned().unwrap_or_default(),
                ban,
            })
            .collect())
    }

    // Global bans

    /// Active global bans without an expiry or expiring in the future, newest first.
    pub async fn list_global_bans(&self) -> Vec<GlobalBan::Model> {
        let query = GlobalBan::Entity::find()
            .filter(GlobalBan::Column::IsActive.eq(true))
            .filter(
                Condition::any()
                    .add(GlobalBan::Column::ExpiresAt.is_null())
                    .add(GlobalBan::Column::ExpiresAt.gt(Utc::now())),
            )
            .order_by_desc(GlobalBan::Column::BanTime)
            .all(&self.db)
            .await
            .map_err(JailsyncError::from);
        sentinel("list_global_bans", query).unwrap_or_default()
    }

    /// Single-statement insert-or-update keyed by IP.
    pub async fn upsert_global_ban(&self, ban: NewGlobalBan) -> bool {
        sentinel("upsert_global_ban", self.try_upsert_global_ban(ban).await).is_some()
    }

    async fn try_upsert_global_ban(&self, ban: NewGlobalBan) -> Result<(), JailsyncError> {
        let values = GlobalBan::ActiveModel {
            id: Set(Uuid::new_v4()),
            ip_address: Set(ban.ip.to_string()),
            reason: Set(ban.reason),
            banned_by: Set(ban.banned_by),
            permanent: Set(ban.permanent),
            expires_at: Set(ban.expires_at),
            is_active: Set(true),
            ban_time: Set(Utc::now()),
        };
        GlobalBan::Entity::insert(values)
            .on_conflict(
                OnConflict::column(GlobalBan::Column::IpAddress)
                    .update_columns([
                        GlobalBan::Column::Reason,
                        GlobalBan::Column::BannedBy,
                        GlobalBan::Column::Permanent,
                        GlobalBan::Column::ExpiresAt,
                        GlobalBan::Column::IsActive,
                        GlobalBan::Column::BanTime,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(&self.db)
            .await?;
        info!(ip = %ban.ip, "Global ban stored");
        Ok(())
    }

    /// Returns false if there was no active global ban for the IP.
    pub async fn deactivate_global_ban(&self, ip: IpAddr) -> bool {
        let update = GlobalBan::Entity::update_many()
            .col_expr(GlobalBan::Column::IsActive, Expr::value(false))
            .filter(GlobalBan::Column::IpAddress.eq(ip.to_string()))
            .filter(GlobalBan::Column::IsActive.eq(true))
            .exec(&self.db)
            .await
            .map_err(JailsyncError::from);
        sentinel("deactivate_global_ban", update).is_some_and(|r| r.rows_affected > 0)
    }

    // Audit

    /// Best effort: failures are logged and never reach the caller.
    pub async fn append_audit(&self, record: AuditRecord) {
        let values = AuditLogEntry::ActiveModel {
            id: Set(Uuid::new_v4()),
            server_id: Set(record.server_id),
            action_type: Set(record.action),
            ip_address: Set(record.ip_address),
            jail_name: Set(record.jail_name),
            performed_by: Set(record.performed_by),
            details: Set(record.details),
            timestamp: Set(Utc::now()),
        };
        if let Err(error) = values.insert(&self.db).await {
            warn!(%error, "Failed to write audit log entry");
        }
    }

    // Snapshots

    /// Reconciles one agent's view of its jails. Per-jail and per-IP
    /// failures become warnings; the rest of the batch still goes through.
    pub async fn apply_snapshot(&self, server_id: Uuid, jails: &[JailDescriptor]) -> SyncReport {
        let mut report = SyncReport {
            jails_processed: jails.len(),
            ..Default::default()
        };

        for (index, descriptor) in jails.iter().enumerate() {
            let jail_name = descriptor.name.trim();
            if jail_name.is_empty() {
                report
                    .warnings
                    .push(format!("Skipped jail #{index}: missing name"));
                continue;
            }

            let Some(jail_id) = self
                .upsert_jail(server_id, jail_name, descriptor.info.as_ref())
                .await
            else {
                report
                    .warnings
                    .push(format!("Failed to sync jail {jail_name}"));
                continue;
            };

            for raw_ip in &descriptor.banned_ips {
                let ip = match parse_ip(raw_ip) {
                    Ok(ip) => ip,
                    Err(_) => {
                        report
                            .warnings
                            .push(format!("Skipped invalid IP {raw_ip:?} in jail {jail_name}"));
                        continue;
                    }
                };
                if self
                    .record_ban(server_id, jail_id, ip, BanAnnotations::default())
                    .await
                {
                    report.ips_synced += 1;
                } else {
                    report
                        .warnings
                        .push(format!("Failed to record {ip} in jail {jail_name}"));
                }
            }
        }

        report
    }
}
