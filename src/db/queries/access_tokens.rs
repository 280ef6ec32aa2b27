use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

use super::{decode_list, encode_list, SqlStore};
use crate::db::models::AccessTokenRecord;
use crate::db::store::AccessTokenStore;
use crate::error::AppError;

use entity::access_token::{ActiveModel, Entity, Model};

impl TryFrom<Model> for AccessTokenRecord {
    type Error = AppError;

    fn try_from(m: Model) -> Result<Self, AppError> {
        Ok(AccessTokenRecord {
            scopes: decode_list(&m.scopes)?,
            id: m.id,
            tenant_id: m.tenant_id,
            app_id: m.app_id,
            user_id: m.user_id,
            token: m.token,
            expires_at: m.expires_at,
            created_at: m.created_at,
        })
    }
}

#[async_trait]
impl AccessTokenStore for SqlStore {
    async fn find(&self, jti: &str) -> Result<Option<AccessTokenRecord>, AppError> {
        let record = Entity::find_by_id(jti).one(&self.db).await?;
        record.map(AccessTokenRecord::try_from).transpose()
    }

    async fn create(&self, record: &AccessTokenRecord) -> Result<(), AppError> {
        ActiveModel {
            id: Set(record.id.clone()),
            tenant_id: Set(record.tenant_id.clone()),
            app_id: Set(record.app_id.clone()),
            user_id: Set(record.user_id.clone()),
            scopes: Set(encode_list(&record.scopes)),
            token: Set(record.token.clone()),
            expires_at: Set(record.expires_at),
            created_at: Set(record.created_at),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}
