// src/auth.rs
//! Bearer-token authentication.
//!
//! Tokens are HS256 JWTs whose subject is the username. Handlers receive the
//! resolved [`User`] through the [`CurrentUser`] and [`MaybeUser`] extractors.

use axum::extract::FromRequestParts;
use chrono::Utc;
use http::header::AUTHORIZATION;
use http::request::Parts;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::config::AuthConfig;
use crate::error::AppError;
use crate::models::{Role, User};
use crate::state::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Username.
    pub sub: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

pub struct TokenKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
    validation: Validation,
    ttl_secs: u64,
}

impl TokenKeys {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            validation: Validation::default(),
            ttl_secs: config.token_ttl_secs,
        }
    }

    pub fn ttl_secs(&self) -> u64 {
        self.ttl_secs
    }

    pub fn issue(&self, user: &User) -> Result<String, AppError> {
        let now = Utc::now().timestamp();
        let exp = i64::try_from(self.ttl_secs)
            .ok()
            .and_then(|ttl| now.checked_add(ttl))
            .ok_or_else(|| AppError::Internal(format!("token ttl {} out of range", self.ttl_secs)))?;
        let claims = Claims {
            sub: user.username.clone(),
            role: user.role,
            iat: now,
            exp,
        };

        encode(&Header::default(), &claims, &self.encoding)
            .map_err(|e| AppError::Internal(format!("failed to encode token: {e}")))
    }

    pub fn verify(&self, token: &str) -> Result<Claims, AppError> {
        decode::<Claims>(token, &self.decoding, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| AppError::Unauthorized(format!("invalid token: {e}")))
    }
}

/// Extract the Bearer token from the Authorization header.
fn bearer(parts: &Parts) -> Result<Option<&str>, AppError> {
    let Some(value) = parts.headers.get(AUTHORIZATION) else {
        return Ok(None);
    };

    value
        .to_str()
        .ok()
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(Some)
        .ok_or_else(|| AppError::Unauthorized("malformed authorization header".into()))
}

/// Resolves the request's principal to a stored user, if a token was sent.
async fn principal(parts: &Parts, state: &AppState) -> Result<Option<User>, AppError> {
    let Some(token) = bearer(parts)? else {
        return Ok(None);
    };

    let claims = state.tokens.verify(token)?;
    match state.identity.find_by_username(&claims.sub).await {
        Ok(user) => Ok(Some(user)),
        Err(AppError::NotFound(_)) => {
            warn!("Token presented for unknown user {}", claims.sub);
            Err(AppError::Unauthorized("unknown user".into()))
        }
        Err(e) => Err(e),
    }
}

/// An authenticated caller. Rejects with 401 when no valid token is sent.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        principal(parts, state)
            .await?
            .map(CurrentUser)
            .ok_or_else(|| AppError::Unauthorized("missing authorization token".into()))
    }
}

/// A caller who may be anonymous. A token that is sent must still be valid.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<User>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        Ok(MaybeUser(principal(parts, state).await?))
    }
}
