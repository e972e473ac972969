pub mod bookings_maintenance;

use crates::infra::{
    db::repositories::{booking_events::BookingEventPostgres, bookings::BookingPostgres},
    notifications::webhook_notifier::WebhookBookingNotifier,
};

use crate::usecases::{
    advance_stays::AdvanceStaysUseCase, sweep_expired_holds::SweepExpiredHoldsUseCase,
};

pub type SweepService =
    SweepExpiredHoldsUseCase<BookingPostgres, BookingEventPostgres, WebhookBookingNotifier>;
pub type AdvanceStaysService =
    AdvanceStaysUseCase<BookingPostgres, BookingEventPostgres, WebhookBookingNotifier>;
