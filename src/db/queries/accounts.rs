use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use super::{decode_list, encode_list, SqlStore};
use crate::db::models::{Account, AccountType};
use crate::db::store::AccountStore;
use crate::error::AppError;

use entity::account::{ActiveModel, Column, Entity, Model};

impl TryFrom<Model> for Account {
    type Error = AppError;

    fn try_from(m: Model) -> Result<Self, AppError> {
        Ok(Account {
            account_type: AccountType::parse(&m.account_type),
            roles: decode_list(&m.roles)?,
            id: m.id,
            tenant_id: m.tenant_id,
            username: m.username,
            email: m.email,
            password_hash: m.password_hash,
            given_name: m.given_name,
            family_name: m.family_name,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

#[async_trait]
impl AccountStore for SqlStore {
    async fn find(&self, tenant_id: &str, id: &str) -> Result<Option<Account>, AppError> {
        let account = Entity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?;
        account.map(Account::try_from).transpose()
    }

    async fn find_by_username(
        &self,
        tenant_id: &str,
        username: &str,
    ) -> Result<Option<Account>, AppError> {
        let account = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::Username.eq(username))
            .one(&self.db)
            .await?;
        account.map(Account::try_from).transpose()
    }

    async fn create(&self, account: &Account) -> Result<(), AppError> {
        ActiveModel {
            id: Set(account.id.clone()),
            tenant_id: Set(account.tenant_id.clone()),
            account_type: Set(account.account_type.as_str().to_string()),
            username: Set(account.username.clone()),
            email: Set(account.email.clone()),
            password_hash: Set(account.password_hash.clone()),
            given_name: Set(account.given_name.clone()),
            family_name: Set(account.family_name.clone()),
            roles: Set(encode_list(&account.roles)),
            created_at: Set(account.created_at),
            updated_at: Set(account.updated_at),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}
