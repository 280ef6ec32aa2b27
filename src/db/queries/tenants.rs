use async_trait::async_trait;
use sea_orm::{ActiveModelTrait, EntityTrait, Set};

use super::SqlStore;
use crate::db::models::Tenant;
use crate::db::store::TenantStore;
use crate::error::AppError;

impl From<entity::tenant::Model> for Tenant {
    fn from(m: entity::tenant::Model) -> Self {
        Tenant {
            id: m.id,
            title: m.title,
            created_at: m.created_at,
        }
    }
}

#[async_trait]
impl TenantStore for SqlStore {
    async fn find(&self, id: &str) -> Result<Option<Tenant>, AppError> {
        let tenant = entity::tenant::Entity::find_by_id(id).one(&self.db).await?;
        Ok(tenant.map(Tenant::from))
    }

    async fn create(&self, tenant: &Tenant) -> Result<(), AppError> {
        entity::tenant::ActiveModel {
            id: Set(tenant.id.clone()),
            title: Set(tenant.title.clone()),
            created_at: Set(tenant.created_at),
        }
        .insert(&self.db)
        .await?;
        Ok(())
    }
}
