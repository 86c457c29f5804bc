use sea_orm::Schema;
use sea_orm_migration::prelude::*;

pub mod jail {
    use chrono::{DateTime, Utc};
    use sea_orm::entity::prelude::*;
    use uuid::Uuid;

    #[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel)]
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
            belongs_to = "crate::m00001_create_server::server::Entity",
            from = "Column::ServerId",
            to = "crate::m00001_create_server::server::Column::Id",
            on_delete = "Cascade"
        )]
        Server,
    }

    impl ActiveModelBehavior for ActiveModel {}
}

pub struct Migration;

impl MigrationName for Migration {
    fn name(&self) -> &str {
        "m00002_create_jail"
    }
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let builder = manager.get_database_backend();
        let schema = Schema::new(builder);
        manager
            .create_table(schema.create_table_from_entity(jail::Entity))
            .await?;

        // one row per jail name and server
        manager
            .create_index(
                Index::create()
                    .table(jail::Entity)
                    .name("jails__server_id_jail_name")
                    .col(jail::Column::ServerId)
                    .col(jail::Column::JailName)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(jail::Entity).to_owned())
            .await
    }
}
