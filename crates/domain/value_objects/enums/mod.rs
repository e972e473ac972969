pub mod booking_actions;
pub mod booking_statuses;
pub mod cancellation_policies;
pub mod cancelled_by;
pub mod payment_gateways;
pub mod payment_statuses;
