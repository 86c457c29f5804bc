use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize)]
#[sea_orm(table_name = "servers")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub server_name: String,
    pub server_ip: String,
    /// Lowercase hex sync credential, unset until issued by an operator
    #[sea_orm(unique)]
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub is_active: bool,
    pub last_sync: Option<DateTime<Utc>>,
    pub created: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::Jail::Entity")]
    Jails,
    #[sea_orm(has_many = "super::BannedIp::Entity")]
    BannedIps,
}

impl Related<super::Jail::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Jails.def()
    }
}

impl Related<super::BannedIp::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::BannedIps.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
