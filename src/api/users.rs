//! User account endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    response::{IntoResponse, Response},
    Json,
};
use std::sync::Arc;

use crate::auth::{AdminUser, AuthUser};
use crate::db::{
    users, AdminStatusResponse, CreateUserRequest, DeleteResult, Document, InsertOneResult,
    UpdateResult, UserExistsResponse,
};
use crate::AppState;

use super::error::ApiError;
use super::validation::{require_email, require_id};

/// List all users (admin only)
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    _admin: AdminUser,
) -> Result<Json<Vec<Document>>, ApiError> {
    let users = users::list(state.store.as_ref()).await?;
    Ok(Json(users))
}

/// Register a user unless one with the same email already exists
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    body: Result<Json<CreateUserRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = body?;
    let email = request.email.trim();
    require_email(email)?;

    let (user, created) = users::find_or_create(state.store.as_ref(), email, request.profile).await?;

    if created {
        Ok(Json(InsertOneResult::new(user.id)).into_response())
    } else {
        Ok(Json(UserExistsResponse {
            message: "User already exists".to_string(),
            inserted_id: None,
        })
        .into_response())
    }
}

/// Whether the caller is an administrator. Callers may only ask about
/// their own email.
pub async fn check_admin(
    State(state): State<Arc<AppState>>,
    user: AuthUser,
    Path(email): Path<String>,
) -> Result<Json<AdminStatusResponse>, ApiError> {
    if email != user.email {
        tracing::debug!("{} asked for the admin status of {}", user.email, email);
        return Err(ApiError::forbidden("forbidden access"));
    }

    let admin = users::find_by_email(state.store.as_ref(), &email)
        .await?
        .map(|stored| stored.role.is_admin())
        .unwrap_or(false);

    Ok(Json(AdminStatusResponse { admin }))
}

/// Grant the admin role (admin only)
pub async fn promote_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<UpdateResult>, ApiError> {
    require_id(&id)?;

    let result = users::promote_to_admin(state.store.as_ref(), &id).await?;
    if result.matched_count == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!("{} promoted user {} to admin", admin.email, id);
    Ok(Json(result))
}

/// Delete a user (admin only)
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    require_id(&id)?;

    let result = users::delete(state.store.as_ref(), &id).await?;
    if result.deleted_count == 0 {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!("{} deleted user {}", admin.email, id);
    Ok(Json(result))
}
