use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use chrono::Utc;
use serde::Deserialize;
use tracing::error;

use super::{AdvanceStaysService, SweepService};
use crate::config::config_model::DotEnvyConfig;

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/bookings/sweep-expired-holds" \
//     -H "Authorization: Bearer $INTERNAL_SWEEP_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"limit":500}'

#[derive(Clone)]
pub struct MaintenanceRouteState {
    config: Arc<DotEnvyConfig>,
    sweep: Arc<SweepService>,
    advance_stays: Arc<AdvanceStaysService>,
}

pub fn routes(
    config: Arc<DotEnvyConfig>,
    sweep: Arc<SweepService>,
    advance_stays: Arc<AdvanceStaysService>,
) -> Router {
    Router::new()
        .route("/sweep-expired-holds", post(sweep_expired_holds))
        .route("/advance-stays", post(self::advance_stays))
        .with_state(MaintenanceRouteState {
            config,
            sweep,
            advance_stays,
        })
}

#[derive(Debug, Default, Deserialize)]
pub struct BatchRequest {
    pub limit: Option<i64>,
}

pub async fn sweep_expired_holds(
    State(state): State<MaintenanceRouteState>,
    headers: HeaderMap,
    payload: Option<Json<BatchRequest>>,
) -> Response {
    if let Err(rejection) = check_token(&state.config, &headers) {
        return rejection;
    }

    let limit = batch_limit(&state.config, payload);
    match state.sweep.run(Utc::now(), limit).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => {
            error!(error = ?err, "sweep_expired_holds: usecase failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "sweep failed").into_response()
        }
    }
}

pub async fn advance_stays(
    State(state): State<MaintenanceRouteState>,
    headers: HeaderMap,
    payload: Option<Json<BatchRequest>>,
) -> Response {
    if let Err(rejection) = check_token(&state.config, &headers) {
        return rejection;
    }

    let limit = batch_limit(&state.config, payload);
    match state.advance_stays.run(Utc::now().date_naive(), limit).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => {
            error!(error = ?err, "advance_stays: usecase failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "advance stays failed").into_response()
        }
    }
}

fn batch_limit(config: &DotEnvyConfig, payload: Option<Json<BatchRequest>>) -> i64 {
    let requested = payload.and_then(|Json(body)| body.limit);
    requested
        .filter(|limit| *limit > 0)
        .map(|limit| limit.min(config.maintenance.default_limit))
        .unwrap_or(config.maintenance.default_limit)
}

fn check_token(config: &DotEnvyConfig, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected_token) = config.maintenance.internal_token.as_deref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "sweep token is not configured",
        )
            .into_response());
    };

    authorize_bearer(headers, expected_token)
        .map_err(|status| (status, "unauthorized").into_response())
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let auth = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let token = auth
        .strip_prefix("Bearer ")
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_model::{Database, Maintenance, Notifications, WorkerServer};
    use axum::http::HeaderValue;
    use backend::config::stage::Stage;

    fn config(token: Option<&str>) -> DotEnvyConfig {
        DotEnvyConfig {
            stage: Stage::Local,
            worker_server: WorkerServer {
                port: 8090,
                timeout: 60,
                body_limit: 1,
            },
            database: Database {
                url: "postgres://localhost/stays".to_string(),
                pool_max_size: 4,
            },
            maintenance: Maintenance {
                internal_token: token.map(str::to_string),
                default_limit: 500,
            },
            notifications: Notifications {
                booking_webhook_url: None,
            },
        }
    }

    fn bearer(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn accepts_only_the_configured_bearer_token() {
        assert!(authorize_bearer(&bearer("Bearer s3cret"), "s3cret").is_ok());
        assert_eq!(
            authorize_bearer(&bearer("Bearer wrong"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&bearer("s3cret"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&HeaderMap::new(), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn unconfigured_token_answers_service_unavailable() {
        let rejection = check_token(&config(None), &bearer("Bearer anything")).unwrap_err();
        assert_eq!(rejection.status(), StatusCode::SERVICE_UNAVAILABLE);

        assert!(check_token(&config(Some("s3cret")), &bearer("Bearer s3cret")).is_ok());
    }

    #[test]
    fn batch_limit_is_capped_by_the_configured_default() {
        let config = config(Some("s3cret"));

        assert_eq!(batch_limit(&config, None), 500);
        assert_eq!(batch_limit(&config, Some(Json(BatchRequest { limit: Some(50) }))), 50);
        assert_eq!(batch_limit(&config, Some(Json(BatchRequest { limit: Some(0) }))), 500);
        assert_eq!(
            batch_limit(&config, Some(Json(BatchRequest { limit: Some(10_000) }))),
            500
        );
    }
}
