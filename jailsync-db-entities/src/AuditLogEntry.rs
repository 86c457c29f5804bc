use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, PartialEq, Eq, Serialize, Clone, Copy, EnumIter, DeriveActiveEnum)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(32))")]
pub enum AuditAction {
    #[sea_orm(string_value = "ban")]
    Ban,
    #[sea_orm(string_value = "unban")]
    Unban,
    #[sea_orm(string_value = "global_ban")]
    GlobalBan,
    #[sea_orm(string_value = "global_unban")]
    GlobalUnban,
    #[sea_orm(string_value = "server_key")]
    ServerKey,
    #[sea_orm(string_value = "server_status")]
    ServerStatus,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "audit_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub server_id: Option<Uuid>,
    pub action_type: AuditAction,
    pub ip_address: Option<String>,
    pub jail_name: Option<String>,
    pub performed_by: String,
    #[sea_orm(column_type = "Text", nullable)]
    pub details: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
