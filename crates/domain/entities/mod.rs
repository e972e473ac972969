pub mod booking_events;
pub mod bookings;
pub mod payments;
pub mod properties;
pub mod property_availability;
pub mod transactions;
