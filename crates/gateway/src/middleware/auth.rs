//! Bearer token authentication middleware
//!
//! Every route nested under `/api` passes through here. A verified token
//! becomes an `AuthContext` request extension; anything else is a 401
//! before the handler runs.

use axum::{
    extract::{Request, State},
    http::header,
    middleware::Next,
    response::Response,
};
use medsearch_common::{
    auth::{extract_bearer, request_id_from, AuthContext},
    errors::Result,
    AppError,
};

use crate::AppState;

/// Verify the bearer token and attach the authentication context
pub async fn require_auth(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response> {
    let (mut parts, body) = request.into_parts();

    let header = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Unauthorized {
            message: "Missing Authorization header".to_string(),
        })?;

    let token = extract_bearer(header).ok_or_else(|| AppError::Unauthorized {
        message: "Authorization header is not a bearer token".to_string(),
    })?;

    let claims = state.verifier.verify(token)?;

    let context = AuthContext {
        user_id: claims.sub,
        email: claims.email,
        request_id: request_id_from(&parts),
    };
    parts.extensions.insert(context);

    Ok(next.run(Request::from_parts(parts, body)).await)
}
