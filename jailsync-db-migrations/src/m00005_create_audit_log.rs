use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub mod audit_log {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
    #[sea_orm(table_name = "audit_log")]
    pub struct Model {
        #[sea_orm(primary_key, auto_increment = false)]
        pub id: Uuid,
        pub server_id: Option<Uuid>,
        pub action_type: String,
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
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00005_create_audit_log"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(audit_log::Entity))
            .await?;
        manager
            .create_index(
                Index::create()
                    .table(audit_log::Entity)
                    .name("audit_log__timestamp")
                    .col(audit_log::Column::Timestamp)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(audit_log::Entity).to_owned())
            .await
    }
}
