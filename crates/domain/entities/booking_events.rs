use diesel::prelude::*;
use uuid::Uuid;

use crate::infra::db::postgres::schema::booking_events;

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = booking_events)]
pub struct InsertBookingEventEntity {
    pub booking_id: Uuid,
    pub from_status: Option<String>,
    pub to_status: String,
    pub actor_id: Option<Uuid>,
    pub actor_role: String,
    pub note: Option<String>,
}
