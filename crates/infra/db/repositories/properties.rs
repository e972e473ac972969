use anyhow::Result;
use async_trait::async_trait;
use diesel::prelude::*;
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::properties},
};
use domain::{
    entities::properties::{PropertyEntity, PropertyRow},
    repositories::properties::PropertyRepository,
};

pub struct PropertyPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PropertyPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PropertyRepository for PropertyPostgres {
    async fn find_by_id(&self, property_id: Uuid) -> Result<Option<PropertyEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = properties::table
            .find(property_id)
            .select(PropertyRow::as_select())
            .first::<PropertyRow>(&mut conn)
            .optional()?;

        Ok(row.map(PropertyEntity::from))
    }
}
