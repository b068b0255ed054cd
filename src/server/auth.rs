//! Bearer token authentication.
//!
//! Access tokens are HS256 JWTs whose subject is the user id. Handlers take
//! an [`AuthUser`] argument to require one.

use crate::server::error::AppError;
use crate::server::AppContext;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    typed_header::TypedHeader,
};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tubely_common::{Error, Result, UserId};

/// Issuer stamped on every access token.
pub const TOKEN_ISSUER: &str = "tubely-access";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    pub iss: String,
    pub iat: i64,
    pub exp: i64,
}

/// Sign an access token for `user_id` valid for `ttl`.
pub fn make_jwt(user_id: UserId, secret: &str, ttl: Duration) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        sub: user_id.to_string(),
        iss: TOKEN_ISSUER.to_string(),
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| Error::internal(format!("Failed to sign token: {}", e)))
}

/// Check signature, issuer and expiry, returning the token's user.
pub fn validate_jwt(token: &str, secret: &str) -> Result<UserId> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )
    .map_err(|e| {
        tracing::debug!("Rejected token: {}", e);
        Error::unauthorized("Couldn't validate JWT")
    })?;

    data.claims
        .sub
        .parse()
        .map_err(|_| Error::unauthorized("Couldn't validate JWT"))
}

/// The user identified by the request's bearer token.
#[derive(Debug, Clone, Copy)]
pub struct AuthUser(pub UserId);

#[async_trait]
impl FromRequestParts<AppContext> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &AppContext,
    ) -> std::result::Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, ctx)
                .await
                .map_err(|_| Error::unauthorized("Couldn't find JWT"))?;

        let user_id = validate_jwt(bearer.token(), &ctx.config.auth.jwt_secret)?;
        Ok(AuthUser(user_id))
    }
}
