pub use sea_orm_migration::prelude::*;

mod m20260301_000001_create_tenants;
mod m20260301_000002_create_accounts;
mod m20260301_000003_create_applications;
mod m20260301_000004_create_signing_keys;
mod m20260301_000005_create_authorization_codes;
mod m20260301_000006_create_access_tokens;
mod m20260301_000007_create_refresh_tokens;
mod m20260301_000008_create_sessions;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20260301_000001_create_tenants::Migration),
            Box::new(m20260301_000002_create_accounts::Migration),
            Box::new(m20260301_000003_create_applications::Migration),
            Box::new(m20260301_000004_create_signing_keys::Migration),
            Box::new(m20260301_000005_create_authorization_codes::Migration),
            Box::new(m20260301_000006_create_access_tokens::Migration),
            Box::new(m20260301_000007_create_refresh_tokens::Migration),
            Box::new(m20260301_000008_create_sessions::Migration),
        ]
    }
}
