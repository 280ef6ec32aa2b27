use async_trait::async_trait;
use chrono::NaiveDateTime;
use sea_orm::sea_query::Expr;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use super::{decode_list, encode_list, SqlStore};
use crate::db::models::AuthorizationCode;
use crate::db::store::AuthorizationCodeStore;
use crate::error::AppError;

use entity::authorization_code::{ActiveModel, Column, Entity, Model};

impl TryFrom<Model> for AuthorizationCode {
    type Error = AppError;

    fn try_from(m: Model) -> Result<Self, AppError> {
        Ok(AuthorizationCode {
            scopes: decode_list(&m.scopes)?,
            code_hash: m.code_hash,
            tenant_id: m.tenant_id,
            app_id: m.app_id,
            user_id: m.user_id,
            redirect_uri: m.redirect_uri,
            nonce: m.nonce,
            code_challenge: m.code_challenge,
            code_challenge_method: m.code_challenge_method,
            expires_at: m.expires_at,
            consumed: m.consumed,
            created_at: m.created_at,
        })
    }
}

#[async_trait]
impl AuthorizationCodeStore for SqlStore {
    async fn find(&self, code_hash: &str) -> Result<Option<AuthorizationCode>, AppError> {
        let code = Entity::find_by_id(code_hash).one(&self.db).await?;
        code.map(AuthorizationCode::try_from).transpose()
    }

    async fn create(&self, code: &AuthorizationCode) -> Result<(), AppError> {
        ActiveModel {
            code_hash: Set(code.code_hash.clone()),
            tenant_id: Set(code.tenant_id.clone()),
            app_id: Set(code.app_id.clone()),
            user_id: Set(code.user_id.clone()),
            redirect_uri: Set(code.redirect_uri.clone()),
            scopes: Set(encode_list(&code.scopes)),
            nonce: Set(code.nonce.clone()),
            code_challenge: Set(code.code_challenge.clone()),
            code_challenge_method: Set(code.code_challenge_method.clone()),
            expires_at: Set(code.expires_at),
            consumed: Set(code.consumed),
            created_at: Set(code.created_at),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }

    async fn mark_consumed(&self, code_hash: &str, now: NaiveDateTime) -> Result<bool, AppError> {
        // UPDATE ... WHERE consumed = false: only one caller can see rows_affected == 1
        let result = Entity::update_many()
            .col_expr(Column::Consumed, Expr::value(true))
            .filter(Column::CodeHash.eq(code_hash))
            .filter(Column::Consumed.eq(false))
            .filter(Column::ExpiresAt.gt(now))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }

    async fn restore(&self, code_hash: &str) -> Result<bool, AppError> {
        let result = Entity::update_many()
            .col_expr(Column::Consumed, Expr::value(false))
            .filter(Column::CodeHash.eq(code_hash))
            .filter(Column::Consumed.eq(true))
            .exec(&self.db)
            .await?;
        Ok(result.rows_affected == 1)
    }
}
