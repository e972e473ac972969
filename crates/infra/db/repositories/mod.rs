pub mod booking_events;
pub mod bookings;
pub mod payments;
pub mod properties;
