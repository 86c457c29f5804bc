use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "jails")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub server_id: Uuid,
    pub jail_name: String,
    pub findtime: i64,
    pub bantime: i64,
    pub maxretry: i64,
    pub last_sync: Option<DateTime<Utc>>,
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
    #[sea_orm(has_many = "super::BannedIp::Entity")]
    BannedIps,
}

impl Related<super::Server::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Server.def()
    }
}

impl Related<super::BannedIp::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BannedIps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
