use std::str::FromStr;

use anyhow::{Context, Result};
use backend::config::stage::Stage;

use super::config_model::{Database, DotEnvyConfig, Maintenance, Notifications, WorkerServer};

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub fn load_from(lookup: impl Fn(&str) -> Option<String>) -> Result<DotEnvyConfig> {
    let stage = Stage::try_from(lookup("STAGE").unwrap_or_default().as_str()).unwrap_or_default();

    let worker_server = WorkerServer {
        port: parse_required(&lookup, "SERVER_PORT_WORKER")?,
        body_limit: parse_required(&lookup, "SERVER_BODY_LIMIT")?,
        timeout: parse_required(&lookup, "SERVER_TIMEOUT")?,
    };

    let database = Database {
        url: optional(&lookup, "DATABASE_URL").context("DATABASE_URL is not set")?,
        pool_max_size: parse_or(&lookup, "DATABASE_POOL_MAX_SIZE", 4)?,
    };

    let maintenance = Maintenance {
        internal_token: optional(&lookup, "INTERNAL_SWEEP_TOKEN"),
        default_limit: parse_or(&lookup, "SWEEP_DEFAULT_LIMIT", 500)?,
    };
    if maintenance.default_limit <= 0 {
        anyhow::bail!("SWEEP_DEFAULT_LIMIT must be positive");
    }

    let notifications = Notifications {
        booking_webhook_url: optional(&lookup, "BOOKING_NOTIFY_WEBHOOK_URL"),
    };

    Ok(DotEnvyConfig {
        stage,
        worker_server,
        database,
        maintenance,
        notifications,
    })
}

fn optional(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<String> {
    lookup(key)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_required<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    optional(lookup, key)
        .with_context(|| format!("{key} is not set"))?
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
