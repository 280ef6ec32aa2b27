use async_trait::async_trait;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, EntityTrait, QueryFilter, Set};

use super::{decode_list, encode_list, SqlStore};
use crate::db::models::RefreshToken;
use crate::db::store::RefreshTokenStore;
use crate::error::AppError;

use entity::refresh_token::{ActiveModel, Column, Entity, Model};

impl TryFrom<Model> for RefreshToken {
    type Error = AppError;

    fn try_from(m: Model) -> Result<Self, AppError> {
        Ok(RefreshToken {
            scopes: decode_list(&m.scopes)?,
            id: m.id,
            tenant_id: m.tenant_id,
            app_id: m.app_id,
            user_id: m.user_id,
            token_hash: m.token_hash,
            expires_at: m.expires_at,
            revoked: m.revoked,
            superseded: m.superseded,
            created_at: m.created_at,
        })
    }
}

#[async_trait]
impl RefreshTokenStore for SqlStore {
    async fn find_by_hash(&self, token_hash: &str) -> Result<Option<RefreshToken>, AppError> {
        let token = Entity::find()
            .filter(Column::TokenHash.eq(token_hash))
            .one(&self.db)
            .await?;
        token.map(RefreshToken::try_from).transpose()
    }

    async fn create(&self, token: &RefreshToken) -> Result<(), AppError> {
        ActiveModel {
            id: Set(token.id.clone()),
            tenant_id: Set(token.tenant_id.clone()),
            app_id: Set(token.app_id.clone()),
            user_id: Set(token.user_id.clone()),
            token_hash: Set(token.token_hash.clone()),
            scopes: Set(encode_list(&token.scopes)),
            expires_at: Set(token.expires_at),
            revoked: Set(token.revoked),
            superseded: Set(token.superseded),
            created_at: Set(token.created_at),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn supersede(&self, id: &str) -> Result<bool, AppError> {
        let result = Entity::update_many()
            .col_expr(Column::Revoked, Expr::value(true))
            .col_expr(Column::Superseded, Expr::value(true))
            .filter(Column::Id.eq(id))
            .filter(Column::Revoked.eq(false))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn revoke(&self, id: &str) -> Result<bool, AppError> {
        let result = Entity::update_many()
            .col_expr(Column::Revoked, Expr::value(true))
            .col_expr(Column::Superseded, Expr::value(false))
            .filter(Column::Id.eq(id))
            .filter(
                Condition::any()
                    .add(Column::Revoked.eq(false))
                    .add(Column::Superseded.eq(true)),
            )
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn restore(&self, id: &str) -> Result<bool, AppError> {
        let result = Entity::update_many()
            .col_expr(Column::Revoked, Expr::value(false))
            .col_expr(Column::Superseded, Expr::value(false))
            .filter(Column::Id.eq(id))
            .filter(Column::Revoked.eq(true))
            .filter(Column::Superseded.eq(true))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
