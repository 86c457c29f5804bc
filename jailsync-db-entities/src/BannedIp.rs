use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

/// One ban cycle of an IP in a jail. At most one row per
/// (server, jail, ip) has `is_active` set.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "banned_ips")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub server_id: Uuid,
    pub jail_id: Uuid,
    pub ip_address: String,
    pub hostname: Option<String>,
    pub country: Option<String>,
    /// First seen
    pub ban_time: DateTime<Utc>,
    pub last_attempt: Option<DateTime<Utc>>,
    pub ban_count: i32,
    pub is_active: bool,
    pub unban_time: Option<DateTime<Utc>>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::Server::Entity",
        from = "Column::ServerId",
        to = "super::Server::Column::Id",
        on_delete = "Cascade"
    )]
    Server,
    #[sea_orm(
        belongs_to = "super::Jail::Entity",
        from = "Column::JailId",
        to = "super::Jail::Column::Id",
        on_delete = "Cascade"
    )]
    Jail,
}

impl Related<super::Server::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl Related<super::Jail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Jail.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
