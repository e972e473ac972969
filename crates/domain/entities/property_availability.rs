use chrono::{DateTime, NaiveDate, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::property_availability;

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = property_availability)]
pub struct PropertyAvailabilityEntity {
    pub property_id: Uuid,
    pub date: NaiveDate,
    pub available: bool,
    pub updated_at: DateTime<Utc>,
}
