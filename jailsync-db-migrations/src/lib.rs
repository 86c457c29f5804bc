use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;
use sea_orm_migration::MigrationTrait;

mod m00001_create_server;
mod m00002_create_jail;
mod m00003_create_banned_ip;
mod m00004_create_global_ban;
mod m00005_create_audit_log;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m00001_create_server::Migration),
            Box::new(m00002_create_jail::Migration),
            Box::new(m00003_create_banned_ip::Migration),
            Box::new(m00004_create_global_ban::Migration),
            Box::new(m00005_create_audit_log::Migration),
        ]
    }
}

pub async fn migrate_database(connection: &DatabaseConnection) -> Result<(), DbErr> {
    Migrator::up(connection, None).await
}
