//! Bearer token verification
//!
//! Tokens are issued by an external identity provider; the core only
//! validates them. Verified claims become an `AuthContext` request
//! extension that handlers extract.

use crate::errors::{AppError, Result};
use axum::{extract::FromRequestParts, http::request::Parts};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Claims carried by the identity provider's JWTs
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user ID)
    pub sub: String,

    /// User email, when the provider includes it
    #[serde(default)]
    pub email: Option<String>,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,
}

/// Extracted authentication context available to handlers
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Subject from the verified token
    pub user_id: String,

    /// Email from the verified token, if present
    pub email: Option<String>,

    /// Request ID for tracing
    pub request_id: String,
}

/// Verifies bearer tokens against the identity provider's signing secret
pub struct TokenVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenVerifier {
    /// Create a verifier for HS256 tokens signed with the given secret
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::default();
        // Identity providers commonly set aud to "authenticated"; we only
        // care about signature and expiry here.
        validation.validate_aud = false;

        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Validate and decode a bearer token
    pub fn verify(&self, token: &str) -> Result<Claims> {
        decode::<Claims>(token, &self.decoding_key, &self.validation)
            .map(|data| data.claims)
            .map_err(|e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::ExpiredToken,
                _ => AppError::InvalidToken,
            })
    }
}

/// Extract the token from a `Bearer <token>` Authorization header value
pub fn extract_bearer(auth_header: &str) -> Option<&str> {
    auth_header.strip_prefix("Bearer ")
}

/// Pull the request ID header, generating one if the edge did not set it
pub fn request_id_from(parts: &Parts) -> String {
    parts
        .headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Axum extractor for AuthContext
///
/// The auth middleware verifies the bearer token and inserts the context as
/// a request extension; handlers reaching this extractor without it means
/// the route was wired outside the middleware.
impl<S> FromRequestParts<S> for AuthContext
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self> {
        parts
            .extensions
            .get::<AuthContext>()
            .cloned()
            .ok_or_else(|| AppError::Unauthorized {
                message: "Missing authentication context".to_string(),
            })
    }
}
