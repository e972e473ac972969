use crates::infra::{
    db::repositories::{
        booking_events::BookingEventPostgres, bookings::BookingPostgres, payments::PaymentPostgres,
        properties::PropertyPostgres,
    },
    notifications::webhook_notifier::WebhookBookingNotifier,
};

use crate::usecases::{bookings::BookingUseCase, payments::PaymentUseCase};

pub mod bookings;
pub mod payment_webhooks;
pub mod payments;
pub mod properties;

pub type BookingService = BookingUseCase<
    BookingPostgres,
    PropertyPostgres,
    PaymentPostgres,
    BookingEventPostgres,
    WebhookBookingNotifier,
>;

pub type PaymentService =
    PaymentUseCase<BookingPostgres, PaymentPostgres, BookingEventPostgres, WebhookBookingNotifier>;
