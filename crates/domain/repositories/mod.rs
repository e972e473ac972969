pub mod booking_events;
pub mod booking_notifier;
pub mod bookings;
pub mod payment_gateways;
pub mod payments;
pub mod properties;
