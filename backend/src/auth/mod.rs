use axum::{async_trait, extract::FromRequestParts, http::request::Parts};
use crates::domain::value_objects::booking_lifecycle::Actor;
use jsonwebtoken::{DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};
use tracing::{error, warn};
use uuid::Uuid;

use crate::{axum_http::error_responses::AppError, config::config_loader};

const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppMetadata {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub is_host: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SupabaseClaims {
    pub sub: String,
    pub aud: String,
    pub role: String,
    pub email: Option<String>,
    pub exp: usize,
    /// Only writable server-side, so roles are read from here and never from user metadata.
    #[serde(default)]
    pub app_metadata: AppMetadata,
}

#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user_id: Uuid,
    pub email: Option<String>,
    pub role: String,
    pub is_host: bool,
    pub is_admin: bool,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor {
            user_id: self.user_id,
            is_host: self.is_host,
            is_admin: self.is_admin,
        }
    }
}

#[derive(Debug)]
pub struct AuthError(anyhow::Error);

impl From<anyhow::Error> for AuthError {
    fn from(err: anyhow::Error) -> Self {
        AuthError(err)
    }
}

pub fn validate_supabase_jwt(token: &str, secret: &str) -> Result<SupabaseClaims, AuthError> {
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    let mut validation = Validation::new(jsonwebtoken::Algorithm::HS256);
    validation.set_audience(&["authenticated"]);

    let token_data = decode::<SupabaseClaims>(token, &decoding_key, &validation)
        .map_err(|e| anyhow::anyhow!("JWT validation failed: {}", e))?;

    Ok(token_data.claims)
}

pub fn auth_user_from_claims(claims: SupabaseClaims) -> Result<AuthUser, AuthError> {
    let user_id = Uuid::parse_str(&claims.sub)
        .map_err(|_| anyhow::anyhow!("Invalid user ID in token"))?;
    let is_admin = claims.app_metadata.role.as_deref() == Some(ADMIN_ROLE);

    Ok(AuthUser {
        user_id,
        email: claims.email,
        role: claims.role,
        is_host: claims.app_metadata.is_host || is_admin,
        is_admin,
    })
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let auth_str = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .ok_or_else(|| AppError::Unauthorized("Missing Authorization header".to_string()))?
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid Authorization header".to_string()))?;

        let token = auth_str.strip_prefix("Bearer ").ok_or_else(|| {
            AppError::Unauthorized("Invalid Authorization header format".to_string())
        })?;

        let secret = config_loader::get_supabase_jwt_secret().map_err(|err| {
            error!(error = ?err, "auth: jwt secret unavailable");
            AppError::Internal(err)
        })?;

        let claims = validate_supabase_jwt(token, &secret).map_err(|e| {
            warn!(error = %e.0, "auth: rejected bearer token");
            AppError::Unauthorized("Invalid or expired token".to_string())
        })?;

        auth_user_from_claims(claims).map_err(|e| AppError::Unauthorized(e.0.to_string()))
    }
}
