use crate::{
    axum_http::{
        default_routers,
        routers::{self, BookingService, PaymentService},
    },
    config::config_model::{DotEnvyConfig, GatewaySettings},
    usecases::{bookings::BookingUseCase, payments::PaymentUseCase},
};
use anyhow::{Context, Result};
use axum::{
    Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::value_objects::holds::HoldPolicy,
    infra::{
        db::{
            postgres::postgres_connection::PgPoolSquad,
            repositories::{
                booking_events::BookingEventPostgres, bookings::BookingPostgres,
                payments::PaymentPostgres, properties::PropertyPostgres,
            },
        },
        notifications::webhook_notifier::WebhookBookingNotifier,
    },
    payments::{
        gateways::PaymentGateways,
        paypal_client::{PaypalClient, PaypalSettings},
        sadad_client::{SadadClient, SadadSettings},
        stripe_client::StripeClient,
    },
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{info, warn};
use url::Url;

pub fn build_payment_gateways(settings: &GatewaySettings) -> Result<PaymentGateways> {
    let timeout = Duration::from_secs(settings.timeout_seconds);
    let mut gateways = PaymentGateways::new();

    if let Some(stripe) = &settings.stripe {
        gateways = gateways.with(Arc::new(StripeClient::new(
            stripe.secret_key.clone(),
            stripe.webhook_secret.clone(),
            timeout,
        )?));
    }
    if let Some(paypal) = &settings.paypal {
        gateways = gateways.with(Arc::new(PaypalClient::new(
            PaypalSettings {
                client_id: paypal.client_id.clone(),
                client_secret: paypal.client_secret.clone(),
                webhook_id: paypal.webhook_id.clone(),
                api_base: paypal.api_base.clone(),
                return_url: settings.return_url.clone(),
                cancel_url: settings.cancel_url.clone(),
            },
            timeout,
        )?));
    }
    if let Some(sadad) = &settings.sadad {
        gateways = gateways.with(Arc::new(SadadClient::new(
            SadadSettings {
                merchant_id: sadad.merchant_id.clone(),
                secret_key: sadad.secret_key.clone(),
                api_base: sadad.api_base.clone(),
                callback_url: sadad.callback_url.clone(),
            },
            timeout,
        )?));
    }

    Ok(gateways)
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let gateways = build_payment_gateways(&config.gateways)?;
    if gateways.configured().is_empty() {
        warn!("http_serve: no payment gateway is configured, payments will be refused");
    } else {
        info!(gateways = ?gateways.configured(), "http_serve: payment gateways configured");
    }

    let notify_url = config
        .notifications
        .booking_webhook_url
        .as_deref()
        .map(Url::parse)
        .transpose()
        .context("BOOKING_NOTIFY_WEBHOOK_URL is invalid")?;
    let notifier = Arc::new(WebhookBookingNotifier::new(notify_url)?);

    let booking_repo = Arc::new(BookingPostgres::new(Arc::clone(&db_pool)));
    let payment_repo = Arc::new(PaymentPostgres::new(Arc::clone(&db_pool)));
    let event_repo = Arc::new(BookingEventPostgres::new(Arc::clone(&db_pool)));
    let property_repo = Arc::new(PropertyPostgres::new(Arc::clone(&db_pool)));

    let hold_policy = HoldPolicy {
        payment_hold: chrono::Duration::minutes(config.booking.hold_minutes),
        request_hold: chrono::Duration::hours(config.booking.request_hold_hours),
    };

    let booking_usecase: Arc<BookingService> = Arc::new(BookingUseCase::new(
        Arc::clone(&booking_repo),
        property_repo,
        Arc::clone(&payment_repo),
        Arc::clone(&event_repo),
        Arc::clone(&notifier),
        gateways.clone(),
        hold_policy,
    ));
    let payment_usecase: Arc<PaymentService> = Arc::new(PaymentUseCase::new(
        booking_repo,
        payment_repo,
        event_repo,
        notifier,
        gateways,
    ));

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/api/v1/bookings",
            routers::bookings::routes(Arc::clone(&booking_usecase)),
        )
        .nest(
            "/api/v1/properties",
            routers::properties::routes(booking_usecase),
        )
        .nest(
            "/api/v1/payments/webhooks",
            routers::payment_webhooks::routes(Arc::clone(&payment_usecase)),
        )
        .nest("/api/v1/payments", routers::payments::routes(payment_usecase))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST, Method::PATCH])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(
        stage = %config.stage,
        "Server is running on port {}", config.backend_server.port
    );
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = ?err, "Failed to install CTRL+C signal handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!(error = ?err, "Failed to install SIGTERM signal handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl+C signal"),
        _ = terminate => info!("Received terminate signal"),
    }
}
