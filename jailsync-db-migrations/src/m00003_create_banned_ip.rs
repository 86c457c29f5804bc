use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub mod banned_ip {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "banned_ips")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub server_id: Uuid,
        pub jail_id: Uuid,
        pub ip_address: String,
        pub hostname: Option<String>,
        pub country: Option<String>,
        pub ban_time: DateTime<Utc>,
        pub last_attempt: Option<DateTime<Utc>>,
        pub ban_count: i32,
        pub is_active: bool,
        pub unban_time: Option<DateTime<Utc>>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {
        #[sea_orm(
            belongs_to = "crate::m00001_create_server::server::Entity",
            from = "Column::ServerId",
            to = "crate::m00001_create_server::server::Column::Id",
            on_delete = "Cascade"
        )]
        Server,
        #[sea_orm(
            belongs_to = "crate::m00002_create_jail::jail::Entity",
            from = "Column::JailId",
            to = "crate::m00002_create_jail::jail::Column::Id",
            on_delete = "Cascade"
        )]
        Jail,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00003_create_banned_ip"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(banned_ip::Entity))
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(banned_ip::Entity)
                    .name("banned_ips__server_id_jail_id_ip_address")
                    .col(banned_ip::Column::ServerId)
                    .col(banned_ip::Column::JailId)
                    .col(banned_ip::Column::IpAddress)
                    .col(banned_ip::Column::IsActive)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(banned_ip::Entity)
                    .name("banned_ips__ban_time")
                    .col(banned_ip::Column::BanTime)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(banned_ip::Entity).to_owned())
            .await
    }
}
