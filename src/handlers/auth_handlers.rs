//! HTTP handlers for signup and signin.

use crate::{
    errors::AppError,
    models::user::{Credentials, CredentialsRequest},
    state::AppState,
};
use axum::{
    Json,
    extract::{State, rejection::JsonRejection},
    http::StatusCode,
};
use serde::Serialize;
use tracing::info;

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub access_token: String,
}

/// POST `/auth/signup`: create an account. `201` with an empty body.
pub async fn signup(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<StatusCode, AppError> {
    let Json(req) = payload?;
    let credentials = Credentials::try_from(req).map_err(AppError::bad_request)?;

    state.credentials.register(&credentials).await?;
    Ok(StatusCode::CREATED)
}

/// POST `/auth/signin`: exchange credentials for `{ accessToken }`.
pub async fn signin(
    State(state): State<AppState>,
    payload: Result<Json<CredentialsRequest>, JsonRejection>,
) -> Result<Json<SignInResponse>, AppError> {
    let Json(req) = payload?;
    let credentials = Credentials::try_from(req).map_err(AppError::bad_request)?;

    if !state.credentials.verify(&credentials).await? {
        return Err(AppError::unauthorized("login failed"));
    }

    let access_token = state.tokens.issue(credentials.username())?;
    info!("user {} signed in", credentials.username());
    Ok(Json(SignInResponse { access_token }))
}
