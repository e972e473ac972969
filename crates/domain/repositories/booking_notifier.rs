use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::enums::booking_statuses::BookingStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingNotification {
    pub booking_id: Uuid,
    pub guest_id: Uuid,
    pub host_id: Uuid,
    pub status: BookingStatus,
    pub message: String,
}

/// Email/SMS side channel for CONFIRMED, EXPIRED, CANCELLED and REJECTED bookings. Callers
/// log failures and carry on.
#[automock]
#[async_trait]
pub trait BookingNotifier {
    async fn notify(&self, notification: BookingNotification) -> Result<()>;
}
