use sea_orm_migration::prelude::*;

use crate::m20260301_000001_create_tenants::Tenants;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(SigningKeys::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(SigningKeys::Id)
                            .string_len(36)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(SigningKeys::TenantId).string_len(63).not_null())
                    .col(
                        ColumnDef::new(SigningKeys::Kid)
                            .string_len(64)
                            .not_null()
                            .unique_key(),
                    )
                    .col(ColumnDef::new(SigningKeys::Algorithm).string_len(10).not_null())
                    .col(ColumnDef::new(SigningKeys::KeyUse).string_len(3).not_null())
                    .col(
                        ColumnDef::new(SigningKeys::PrivateKeyEncrypted)
                            .text()
                            .not_null(),
                    )
                    .col(ColumnDef::new(SigningKeys::PublicKeyPem).text().not_null())
                    .col(
                        ColumnDef::new(SigningKeys::IsActive)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(SigningKeys::ExpiresAt).date_time().null())
                    .col(
                        ColumnDef::new(SigningKeys::CreatedAt)
                            .date_time()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk-signing_keys-tenant_id")
                            .from(SigningKeys::Table, SigningKeys::TenantId)
                            .to(Tenants::Table, Tenants::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx-signing_keys-tenant_id")
                    .table(SigningKeys::Table)
                    .col(SigningKeys::TenantId)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(SigningKeys::Table).to_owned())
            .await
    }
}

#[derive(DeriveIden)]
enum SigningKeys {
    Table,
    Id,
    TenantId,
    Kid,
    Algorithm,
    KeyUse,
    PrivateKeyEncrypted,
    PublicKeyPem,
    IsActive,
    ExpiresAt,
    CreatedAt,
}
