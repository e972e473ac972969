use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::properties::PropertyEntity;

#[automock]
#[async_trait]
pub trait PropertyRepository {
    async fn find_by_id(&self, property_id: Uuid) -> Result<Option<PropertyEntity>>;
}
