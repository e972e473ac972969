use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, insert_into};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::booking_events},
};
use domain::{
    entities::booking_events::InsertBookingEventEntity,
    repositories::booking_events::BookingEventRepository,
};

pub struct BookingEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BookingEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BookingEventRepository for BookingEventPostgres {
    async fn record_event(&self, event: InsertBookingEventEntity) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_into(booking_events::table)
            .values(&event)
            .execute(&mut conn)?;

        Ok(())
    }
}
