use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub mod global_ban {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "global_bans")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        #[sea_orm(unique)]
        pub ip_address: String,
        #[sea_orm(column_type = "Text")]
        pub reason: String,
        pub banned_by: String,
        pub permanent: bool,
        pub expires_at: Option<DateTime<Utc>>,
        pub is_active: bool,
        pub ban_time: DateTime<Utc>,
    }

    #[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
    pub enum Relation {}

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00004_create_global_ban"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(global_ban::Entity))
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(global_ban::Entity)
                    .name("global_bans__is_active_expires_at")
                    .col(global_ban::Column::IsActive)
                    .col(global_ban::Column::ExpiresAt)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(global_ban::Entity).to_owned())
            .await
    }
}
