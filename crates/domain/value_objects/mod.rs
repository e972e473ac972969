pub mod booking_lifecycle;
pub mod bookings;
pub mod cancellation;
pub mod enums;
pub mod holds;
pub mod payments;
pub mod pricing;
pub mod stay_ranges;
