use std::str::FromStr;

use anyhow::{Context, Result};

use super::{
    config_model::{
        BackendServer, BookingSettings, Database, DotEnvyConfig, GatewaySettings, Notifications,
        PaypalSecrets, SadadSecrets, StripeSecrets, Supabase,
    },
    stage::Stage,
};

const PAYPAL_LIVE_API_BASE: &str = "https://api-m.paypal.com";

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup so tests do not have to touch the process env.
pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let stage = Stage::try_from(lookup("STAGE").unwrap_or_default().as_str()).unwrap_or_default();

    let backend_server = BackendServer {
        port: parse_required(&lookup, "SERVER_PORT_BACKEND")?,
        body_limit: parse_required(&lookup, "SERVER_BODY_LIMIT")?,
        timeout: parse_required(&lookup, "SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: required(&lookup, "DATABASE_URL")?,
        pool_max_size: parse_or(&lookup, "DATABASE_POOL_MAX_SIZE", 10)?,
    };

    let supabase = Supabase {
        jwt_secret: required(&lookup, "SUPABASE_JWT_SECRET")?,
    };

    let booking = BookingSettings {
        hold_minutes: parse_or(&lookup, "BOOKING_HOLD_MINUTES", 15)?,
        request_hold_hours: parse_or(&lookup, "BOOKING_REQUEST_HOLD_HOURS", 24)?,
    };
    if booking.hold_minutes <= 0 || booking.request_hold_hours <= 0 {
        anyhow::bail!("booking hold durations must be positive");
    }

    let stripe = match (
        optional(&lookup, "STRIPE_SECRET_KEY"),
        optional(&lookup, "STRIPE_WEBHOOK_SECRET"),
    ) {
        (Some(secret_key), Some(webhook_secret)) => Some(StripeSecrets {
            secret_key,
            webhook_secret,
        }),
        (None, None) => None,
        _ => anyhow::bail!("STRIPE_SECRET_KEY and STRIPE_WEBHOOK_SECRET must be set together"),
    };

    let paypal = match (
        optional(&lookup, "PAYPAL_CLIENT_ID"),
        optional(&lookup, "PAYPAL_CLIENT_SECRET"),
        optional(&lookup, "PAYPAL_WEBHOOK_ID"),
    ) {
        (Some(client_id), Some(client_secret), Some(webhook_id)) => Some(PaypalSecrets {
            client_id,
            client_secret,
            webhook_id,
            api_base: optional(&lookup, "PAYPAL_API_BASE")
                .unwrap_or_else(|| PAYPAL_LIVE_API_BASE.to_string()),
        }),
        (None, None, None) => None,
        _ => anyhow::bail!(
            "PAYPAL_CLIENT_ID, PAYPAL_CLIENT_SECRET and PAYPAL_WEBHOOK_ID must be set together"
        ),
    };

    let sadad = match optional(&lookup, "SADAD_MERCHANT_ID") {
        Some(merchant_id) => Some(SadadSecrets {
            merchant_id,
            secret_key: required(&lookup, "SADAD_SECRET_KEY")?,
            api_base: required(&lookup, "SADAD_API_BASE")?,
            callback_url: required(&lookup, "SADAD_CALLBACK_URL")?,
        }),
        None => None,
    };

    let gateways = GatewaySettings {
        timeout_seconds: parse_or(&lookup, "GATEWAY_TIMEOUT_SECONDS", 15)?,
        return_url: optional(&lookup, "PAYMENT_RETURN_URL").unwrap_or_default(),
        cancel_url: optional(&lookup, "PAYMENT_CANCEL_URL").unwrap_or_default(),
        stripe,
        paypal,
        sadad,
    };
    if gateways.paypal.is_some() && (gateways.return_url.is_empty() || gateways.cancel_url.is_empty()) {
        anyhow::bail!("PayPal needs PAYMENT_RETURN_URL and PAYMENT_CANCEL_URL");
    }

    let notifications = Notifications {
        booking_webhook_url: optional(&lookup, "BOOKING_NOTIFY_WEBHOOK_URL"),
    };

    Ok(DotEnvyConfig {
        stage,
        backend_server,
        database,
        supabase,
        booking,
        gateways,
        notifications,
    })
}

pub fn get_supabase_jwt_secret() -> Result<String> {
    dotenvy::dotenv().ok();
    required(&|key: &str| std::env::var(key).ok(), "SUPABASE_JWT_SECRET")
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn required(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    optional(lookup, key).with_context(|| format!("{key} is not set"))
}

fn parse_required<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    required(lookup, key)?
        .parse()
        .with_context(|| format!("{key} is invalid"))
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match optional(lookup, key) {
        Some(raw) => raw.parse().with_context(|| format!("{key} is invalid")),
        None => Ok(default),
    }
}
