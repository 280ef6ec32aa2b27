use sea_orm_migration::prelude::*;

use crate::m20260301_000001_create_tenants::Tenants;
use crate::m20260301_000002_create_accounts::Accounts;
use crate::m20260301_000003_create_applications::Applications;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(AccessTokens::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(AccessTokens::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(AccessTokens::TenantId).string_len(63).not_null())
                    .col(ColumnDef::new(AccessTokens::AppId).string_len(36).not_null())
                    .col(ColumnDef::new(AccessTokens::UserId).string_len(36).not_null())
                    .col(ColumnDef::new(AccessTokens::Scopes).text().not_null())
                    .col(ColumnDef::new(AccessTokens::Token).text().not_null())
                    .col(ColumnDef::new(AccessTokens::ExpiresAt).date_time().not_null())
                    .col(
                        ColumnDef::new(AccessTokens::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-access_tokens-tenant_id")
                            .from(AccessTokens::Table, AccessTokens::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-access_tokens-app_id")
                            .from(AccessTokens::Table, AccessTokens::AppId)
                            .to(Applications::Table, Applications::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-access_tokens-user_id")
                            .from(AccessTokens::Table, AccessTokens::UserId)
                            .to(Accounts::Table, Accounts::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(AccessTokens::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum AccessTokens {
    Table,
    Id,
    TenantId,
    AppId,
    UserId,
    Scopes,
    Token,
    ExpiresAt,
    CreatedAt,
}
