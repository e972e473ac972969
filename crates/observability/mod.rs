mod alerts;
mod config;
mod layer;

use alerts::{AlertDispatcher, AlertSink, WebhookAlertSink};
use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertLayer;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Installs the global subscriber: RFC 3339 local-time fmt output filtered by `RUST_LOG`
/// (default `info`), plus an optional ops alert webhook for severe events.
pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let mut warnings = config.warnings.clone();
    let alert_layer = match config.ops_alert.as_ref() {
        Some(ops_alert) => match WebhookAlertSink::new(ops_alert.webhook_url.clone()) {
            Ok(sink) => {
                let sinks: Vec<Arc<dyn AlertSink>> = vec![Arc::new(sink)];
                let dispatcher = AlertDispatcher::spawn(sinks);
                Some(
                    AlertLayer::new(dispatcher, config.service_context.clone())
                        .with_filter(LevelFilter::from_level(ops_alert.min_level)),
                )
            }
            Err(err) => {
                warnings.push(format!("ops alert client could not be built: {err}"));
                None
            }
        },
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    let context = &config.service_context;
    for warning in &warnings {
        warn!(
            service = %context.service_name,
            environment = %context.environment,
            component = %context.component,
            warning = %warning,
            "observability config warning"
        );
    }

    info!(
        service = %context.service_name,
        environment = %context.environment,
        component = %context.component,
        ops_alerts = config.ops_alert.is_some(),
        "observability initialised"
    );

    Ok(())
}
