//! Schema migrations for the blog database.

pub use sea_orm_migration::prelude::*;

mod m20240101_000001_create_user_profiles;
mod m20240101_000002_create_posts;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_user_profiles::Migration),
            Box::new(m20240101_000002_create_posts::Migration),
        ]
    }
}
