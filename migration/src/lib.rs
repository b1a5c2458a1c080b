pub use sea_orm_migration::prelude::*;

pub mod entities;
mod m20261019_000001_pixel_tables;
mod m20261019_000002_event_tables;
mod m20261019_000003_daily_visitors;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20261019_000001_pixel_tables::Migration),
            Box::new(m20261019_000002_event_tables::Migration),
            Box::new(m20261019_000003_daily_visitors::Migration),
        ]
    }
}
