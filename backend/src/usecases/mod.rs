pub mod booking_effects;
pub mod booking_errors;
pub mod bookings;
pub mod payments;
