//! Superuser gate for the protected routes

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;
use std::sync::Arc;
use crate::auth::{self, INVALID_CREDENTIALS};
use crate::Error;
use super::{blocking, AppState};
use super::routes::ApiError;

pub const USERNAME_HEADER: &str = "x-roster-username";
pub const PASSWORD_HEADER: &str = "x-roster-password";

/// Authenticate the request's credential headers against the identity
/// provider and hand the principal to the handlers as an extension.
pub async fn require_superuser(
    State(state): State<Arc<AppState>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let (username, password) = credentials(request.headers())
        .ok_or_else(|| Error::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

    let principal = blocking(&state, move |state| {
        auth::authorize_superuser(state.identity.as_ref(), &username, &password)
    })
    .await?;
    request.extensions_mut().insert(principal);

    Ok(next.run(request).await)
}

fn credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Some((header(USERNAME_HEADER)?, header(PASSWORD_HEADER)?))
}
