use crate::{
    axum_http::{
        default_routers,
        routers::{self, AdvanceStaysService, SweepService},
    },
    config::config_model::DotEnvyConfig,
    usecases::{
        advance_stays::AdvanceStaysUseCase, sweep_expired_holds::SweepExpiredHoldsUseCase,
    },
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
use crates::infra::{
    db::{
        postgres::postgres_connection::PgPoolSquad,
        repositories::{booking_events::BookingEventPostgres, bookings::BookingPostgres},
    },
    notifications::webhook_notifier::WebhookBookingNotifier,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, timeout::TimeoutLayer, trace::TraceLayer,
};
use tracing::{info, warn};
use url::Url;

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    if config.maintenance.internal_token.is_none() {
        warn!("http_serve: INTERNAL_SWEEP_TOKEN is not set, internal endpoints will answer 503");
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
    let event_repo = Arc::new(BookingEventPostgres::new(Arc::clone(&db_pool)));

    let sweep: Arc<SweepService> = Arc::new(SweepExpiredHoldsUseCase::new(
        Arc::clone(&booking_repo),
        Arc::clone(&event_repo),
        Arc::clone(&notifier),
    ));
    let advance_stays: Arc<AdvanceStaysService> = Arc::new(AdvanceStaysUseCase::new(
        booking_repo,
        event_repo,
        notifier,
    ));

    let allowed_origins = vec![
        "http://localhost".parse()?,
        "http://127.0.0.1".parse()?,
        "http://localhost:3000".parse()?,
        "http://127.0.0.1:3000".parse()?,
    ];

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest(
            "/internal/v1/bookings",
            routers::bookings_maintenance::routes(Arc::clone(&config), sweep, advance_stays),
        )
        .route("/health-check", get(default_routers::health_check))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.worker_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.worker_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(allowed_origins),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.worker_server.port));
    let listener = TcpListener::bind(addr).await?;
    info!(stage = %config.stage, "Worker HTTP server running on {}", addr);

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

    // SIGTERM is what Docker and Fly send on deploys (Unix only).
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
