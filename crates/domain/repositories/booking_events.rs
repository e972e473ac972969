use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::booking_events::InsertBookingEventEntity;

/// Best-effort audit trail of status changes.
#[automock]
#[async_trait]
pub trait BookingEventRepository {
    async fn record_event(&self, event: InsertBookingEventEntity) -> Result<()>;
}
