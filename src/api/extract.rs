use crate::api::error::ApiError;
use crate::auth::AuthContext;
use crate::domains::participant::types::{ParticipantAttributes, ParticipantEnvelope};
use crate::errors::ServiceError;
use crate::server::AppState;
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
};

/// Caller identity taken from `Authorization: Bearer <jwt>`
#[derive(Debug, Clone)]
pub struct Authenticated(pub AuthContext);

#[async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Bearer "))
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .ok_or_else(|| ServiceError::Authentication("Missing bearer token".to_string()))?;

        let claims = state.jwt.verify_token(token)?;
        Ok(Authenticated(claims.into_context()))
    }
}

/// Parse a participant request body. An empty body carries no attributes.
pub fn parse_attributes(body: &Bytes) -> Result<ParticipantAttributes, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(ParticipantAttributes::default());
    }

    serde_json::from_slice::<ParticipantEnvelope>(body)
        .map(ParticipantEnvelope::into_attributes)
        .map_err(|e| ApiError::bad_request("malformed_body", format!("Invalid request body: {}", e)))
}
