use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};

use super::SqlStore;
use crate::db::models::{KeyUse, SigningKey};
use crate::db::store::SigningKeyStore;
use crate::error::AppError;

use entity::signing_key::{ActiveModel, Column, Entity, Model};

impl From<Model> for SigningKey {
    fn from(m: Model) -> Self {
        SigningKey {
            key_use: KeyUse::parse(&m.key_use),
            id: m.id,
            tenant_id: m.tenant_id,
            kid: m.kid,
            algorithm: m.algorithm,
            private_key_encrypted: m.private_key_encrypted,
            public_key_pem: m.public_key_pem,
            is_active: m.is_active,
            expires_at: m.expires_at,
            created_at: m.created_at,
        }
    }
}

fn to_active(key: &SigningKey) -> ActiveModel {
    ActiveModel {
        id: Set(key.id.clone()),
        tenant_id: Set(key.tenant_id.clone()),
        kid: Set(key.kid.clone()),
        algorithm: Set(key.algorithm.clone()),
        key_use: Set(key.key_use.as_str().to_string()),
        private_key_encrypted: Set(key.private_key_encrypted.clone()),
        public_key_pem: Set(key.public_key_pem.clone()),
        is_active: Set(key.is_active),
        expires_at: Set(key.expires_at),
        created_at: Set(key.created_at),
    }
}

#[async_trait]
impl SigningKeyStore for SqlStore {
    async fn list(&self, tenant_id: &str) -> Result<Vec<SigningKey>, AppError> {
        let keys = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .order_by_desc(Column::CreatedAt)
            .all(&self.db)
            .await?;
        Ok(keys.into_iter().map(SigningKey::from).collect())
    }

    async fn find_active(&self, tenant_id: &str) -> Result<Option<SigningKey>, AppError> {
        let key = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::IsActive.eq(true))
            .filter(Column::KeyUse.eq(KeyUse::Sign.as_str()))
            .order_by_desc(Column::CreatedAt)
            .one(&self.db)
            .await?;
        Ok(key.map(SigningKey::from))
    }

    async fn create(&self, key: &SigningKey) -> Result<(), AppError> {
        to_active(key).insert(&self.db).await?;
        Ok(())
    }

    async fn rotate(&self, key: &SigningKey, retire_at: NaiveDateTime) -> Result<(), AppError> {
        let txn = self.db.begin().await?;

        Entity::update_many()
            .col_expr(Column::IsActive, Expr::value(false))
            .col_expr(Column::ExpiresAt, Expr::value(retire_at))
            .filter(Column::TenantId.eq(key.tenant_id.as_str()))
            .filter(Column::IsActive.eq(true))
            .filter(Column::KeyUse.eq(KeyUse::Sign.as_str()))
            .exec(&txn)
            .await?;

        to_active(key).insert(&txn).await?;
        txn.commit().await?;
        Ok(())
    }
}
