use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use std::sync::Arc;

use crate::auth::{issue_session_token, AuthUser};
use crate::db::{TokenRequest, TokenResponse};
use crate::AppState;

use super::error::ApiError;
use super::validation::require_email;

/// Issue a session token for an email, creating the user on first sight
pub async fn issue_token(
    State(state): State<Arc<AppState>>,
    body: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let Json(request) = body?;
    let email = request.email.trim();
    require_email(email)?;

    let tokens = state.tokens.as_ref().ok_or_else(|| {
        tracing::error!("Cannot issue session token: no token secret configured");
        ApiError::server_misconfigured()
    })?;

    let token = issue_session_token(
        state.store.as_ref(),
        tokens,
        email,
        chrono::Utc::now().timestamp(),
    )
    .await?;

    Ok(Json(TokenResponse { token }))
}

/// Echo the identity carried by the caller's token
pub async fn protected(user: AuthUser) -> Json<AuthUser> {
    Json(user)
}
