use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::context::{AuthContext, Scope};
use crate::errors::{DomainError, ServiceError, ServiceResult};

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    pub iat: i64,
    pub exp: i64,
}

impl Claims {
    pub fn into_context(self) -> AuthContext {
        AuthContext::new(self.sub, Scope::from_project_id(self.project_id))
    }
}

/// HS256 signing and verification keys derived from the configured secret
#[derive(Clone)]
pub struct JwtKeys {
    encoding: Arc<EncodingKey>,
    decoding: Arc<DecodingKey>,
}

impl std::fmt::Debug for JwtKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtKeys").finish_non_exhaustive()
    }
}

impl JwtKeys {
    pub fn new(secret: &str) -> ServiceResult<Self> {
        if secret.is_empty() {
            return Err(ServiceError::Configuration("JWT secret must not be empty".to_string()));
        }
        Ok(Self {
            encoding: Arc::new(EncodingKey::from_secret(secret.as_bytes())),
            decoding: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
        })
    }

    /// Generate a JWT token
    pub fn generate_token(
        &self,
        subject: &str,
        project_id: Option<i64>,
        ttl: Duration,
    ) -> ServiceResult<(String, DateTime<Utc>)> {
        let now = Utc::now();
        let expiry = now + ttl;

        let claims = Claims {
            sub: subject.to_string(),
            project_id,
            iat: now.timestamp(),
            exp: expiry.timestamp(),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| ServiceError::Domain(DomainError::Internal(format!("JWT encoding error: {}", e))))?;

        Ok((token, expiry))
    }

    /// Verify a JWT token
    pub fn verify_token(&self, token: &str) -> ServiceResult<Claims> {
        let token_data = jsonwebtoken::decode::<Claims>(
            token,
            &self.decoding,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => ServiceError::SessionExpired,
            _ => ServiceError::Authentication(format!("Invalid token: {}", e)),
        })?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip_carries_scope() {
        let keys = JwtKeys::new("test-secret").unwrap();

        let (token, _) = keys.generate_token("importer", Some(7), Duration::minutes(5)).unwrap();
        let context = keys.verify_token(&token).unwrap().into_context();
        assert_eq!(context.subject, "importer");
        assert_eq!(context.scope, Scope::Project(7));

        let (token, _) = keys.generate_token("admin", None, Duration::minutes(5)).unwrap();
        assert_eq!(keys.verify_token(&token).unwrap().into_context().scope, Scope::AllProjects);
    }

    #[test]
    fn test_rejects_foreign_and_expired_tokens() {
        let keys = JwtKeys::new("test-secret").unwrap();
        let other = JwtKeys::new("other-secret").unwrap();

        let (token, _) = other.generate_token("importer", None, Duration::minutes(5)).unwrap();
        assert!(matches!(keys.verify_token(&token), Err(ServiceError::Authentication(_))));

        let (token, _) = keys.generate_token("importer", None, Duration::hours(-2)).unwrap();
        assert!(matches!(keys.verify_token(&token), Err(ServiceError::SessionExpired)));

        assert!(matches!(keys.verify_token("not-a-jwt"), Err(ServiceError::Authentication(_))));
        assert!(JwtKeys::new("").is_err());
    }
}
