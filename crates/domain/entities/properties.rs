use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::enums::cancellation_policies::CancellationPolicy,
    infra::db::postgres::schema::properties,
};

/// Read-only view of a listing, as far as booking needs it.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyEntity {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub nightly_rate_minor: i64,
    pub cleaning_fee_minor: i64,
    pub currency: String,
    pub cancellation_policy: CancellationPolicy,
    pub capacity: i32,
    pub instant_book: bool,
}

#[derive(Debug, Clone, Identifiable, Selectable, Queryable)]
#[diesel(table_name = properties)]
pub struct PropertyRow {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub nightly_rate_minor: i64,
    pub cleaning_fee_minor: i64,
    pub currency: String,
    pub cancellation_policy: String,
    pub capacity: i32,
    pub instant_book: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<PropertyRow> for PropertyEntity {
    fn from(value: PropertyRow) -> Self {
        Self {
            id: value.id,
            owner_id: value.owner_id,
            title: value.title,
            nightly_rate_minor: value.nightly_rate_minor,
            cleaning_fee_minor: value.cleaning_fee_minor,
            currency: value.currency,
            cancellation_policy: CancellationPolicy::from_str(&value.cancellation_policy),
            capacity: value.capacity,
            instant_book: value.instant_book,
        }
    }
}
