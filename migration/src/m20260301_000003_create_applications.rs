use sea_orm_migration::prelude::*;

use crate::m20260301_000001_create_tenants::Tenants;
use crate::m20260301_000002_create_accounts::Accounts;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Applications::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Applications::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(Applications::TenantId)
                            .string_len(63)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Applications::Name).string_len(255).not_null())
                    .col(
                        ColumnDef::new(Applications::ClientId)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Applications::ClientSecretHash)
                            .string_len(255)
                            .not_null(),
                    )
                    .col(ColumnDef::new(Applications::RedirectUris).text().not_null())
                    .col(ColumnDef::new(Applications::GrantTypes).text().not_null())
                    .col(ColumnDef::new(Applications::AllowedScopes).text().not_null())
                    .col(
                        ColumnDef::new(Applications::AccessTokenExpiresIn)
                            .big_integer()
                            .not_null()
                            .default(3600),
                    )
                    .col(
                        ColumnDef::new(Applications::ServiceAccountId)
                            .string_len(36)
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Applications::RotateRefreshTokens)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Applications::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Applications::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Applications::UpdatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-applications-tenant_id")
                            .from(Applications::Table, Applications::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-applications-service_account_id")
                            .from(Applications::Table, Applications::ServiceAccountId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        // client_id is only unique within a tenant
        manager
            .create_index(
                Index::create()
                    .name("idx-applications-tenant_id-client_id")
                    .table(Applications::Table)
                    .col(Applications::TenantId)
                    .col(Applications::ClientId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Applications::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
pub enum Applications {
    Table,
    Id,
    TenantId,
    Name,
    ClientId,
    ClientSecretHash,
    RedirectUris,
    GrantTypes,
    AllowedScopes,
    AccessTokenExpiresIn,
    ServiceAccountId,
    RotateRefreshTokens,
    IsActive,
    CreatedAt,
    UpdatedAt,
}
