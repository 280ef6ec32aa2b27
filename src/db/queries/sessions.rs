use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set};

use super::SqlStore;
use crate::db::models::Session;
use crate::db::store::SessionStore;
use crate::error::AppError;

use entity::session::{ActiveModel, Column, Entity, Model};

impl From<Model> for Session {
    fn from(m: Model) -> Self {
        Session {
            id: m.id,
            tenant_id: m.tenant_id,
            user_id: m.user_id,
            ip_address: m.ip_address,
            user_agent: m.user_agent,
            expires_at: m.expires_at,
            created_at: m.created_at,
        }
    }
}

#[async_trait]
impl SessionStore for SqlStore {
    async fn find(&self, tenant_id: &str, id: &str) -> Result<Option<Session>, AppError> {
        let session = Entity::find_by_id(id)
            .filter(Column::TenantId.eq(tenant_id))
            .one(&self.db)
            .await?;
        Ok(session.map(Session::from))
    }

    async fn create(&self, session: &Session) -> Result<(), AppError> {
        ActiveModel {
            id: Set(session.id.clone()),
            tenant_id: Set(session.tenant_id.clone()),
            user_id: Set(session.user_id.clone()),
            ip_address: Set(session.ip_address.clone()),
            user_agent: Set(session.user_agent.clone()),
            expires_at: Set(session.expires_at),
            created_at: Set(session.created_at),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}
