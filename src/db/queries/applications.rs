use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use super::{decode_list, encode_list, SqlStore};
use crate::db::models::Client;
use crate::db::store::ClientStore;
use crate::error::AppError;

use entity::application::{ActiveModel, Column, Entity, Model};

impl TryFrom<Model> for Client {
    type Error = AppError;

    fn try_from(m: Model) -> Result<Self, AppError> {
        Ok(Client {
            redirect_uris: decode_list(&m.redirect_uris)?,
            grant_types: decode_list(&m.grant_types)?,
            allowed_scopes: decode_list(&m.allowed_scopes)?,
            id: m.id,
            tenant_id: m.tenant_id,
            name: m.name,
            client_id: m.client_id,
            client_secret_hash: m.client_secret_hash,
            access_token_expires_in: m.access_token_expires_in,
            service_account_id: m.service_account_id,
            rotate_refresh_tokens: m.rotate_refresh_tokens,
            is_active: m.is_active,
            created_at: m.created_at,
            updated_at: m.updated_at,
        })
    }
}

#[async_trait]
impl ClientStore for SqlStore {
    async fn find_by_client_id(
        &self,
        tenant_id: &str,
        client_id: &str,
    ) -> Result<Option<Client>, AppError> {
        let app = Entity::find()
            .filter(Column::TenantId.eq(tenant_id))
            .filter(Column::ClientId.eq(client_id))
            .one(&self.db)
            .await?;
        app.map(Client::try_from).transpose()
    }

    async fn create(&self, client: &Client) -> Result<(), AppError> {
        ActiveModel {
            id: Set(client.id.clone()),
            tenant_id: Set(client.tenant_id.clone()),
            name: Set(client.name.clone()),
            client_id: Set(client.client_id.clone()),
            client_secret_hash: Set(client.client_secret_hash.clone()),
            redirect_uris: Set(encode_list(&client.redirect_uris)),
            grant_types: Set(encode_list(&client.grant_types)),
            allowed_scopes: Set(encode_list(&client.allowed_scopes)),
            access_token_expires_in: Set(client.access_token_expires_in),
            service_account_id: Set(client.service_account_id.clone()),
            rotate_refresh_tokens: Set(client.rotate_refresh_tokens),
            is_active: Set(client.is_active),
            created_at: Set(client.created_at),
            updated_at: Set(client.updated_at),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}
