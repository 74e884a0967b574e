//! Bearer-token guard for the board routes.
//!
//! Verifies the token, resolves the username claim to a stored user and
//! places a `CurrentUser` into the request extensions. Ownership checks are
//! left to the board services.

use crate::{errors::AppError, models::user::CurrentUser, state::AppState};
use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

const UNAUTHORIZED: &str = "Unauthorized";

pub async fn require_auth(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers())
        .ok_or_else(|| {
            debug!("missing or malformed Authorization header");
            AppError::unauthorized(UNAUTHORIZED)
        })?
        .to_owned();

    let claims = state.tokens.verify(&token).map_err(|err| {
        warn!("rejected bearer token: {}", err);
        AppError::unauthorized(UNAUTHORIZED)
    })?;

    let user = state
        .credentials
        .find_by_username(&claims.username)
        .await?
        .ok_or_else(|| {
            warn!("token for unknown user {}", claims.username);
            AppError::unauthorized(UNAUTHORIZED)
        })?;

    req.extensions_mut().insert(CurrentUser::from(user));
    Ok(next.run(req).await)
}

/// Token from `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}
