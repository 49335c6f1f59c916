//! Request gates implemented as extractors.
//!
//! Handlers opt in by naming the gate in their signature. Both gates run
//! before the handler body and before any body extractor, so a rejected
//! request never reaches handler logic.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderValue},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use crate::api::error::ApiError;
use crate::db::{users, DocumentStore};
use crate::AppState;

/// Identity decoded from a verified session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: String,
    pub email: String,
}

/// A caller whose stored role is administrator at request time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminUser(pub AuthUser);

/// Extract the token from an `Authorization: Bearer <token>` header value
fn bearer_token(header: &HeaderValue) -> Option<&str> {
    header
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let header = parts
            .headers
            .get(AUTHORIZATION)
            .ok_or_else(ApiError::missing_credential)?;

        let tokens = state.tokens.as_ref().ok_or_else(|| {
            tracing::error!("Rejecting authenticated request: no token secret configured");
            ApiError::server_misconfigured()
        })?;

        let token = bearer_token(header).ok_or_else(|| {
            debug!("Authorization header is not a bearer token");
            ApiError::invalid_credential()
        })?;

        let claims = tokens
            .verify(token, chrono::Utc::now().timestamp())
            .map_err(|e| {
                debug!("Rejected session token: {}", e);
                ApiError::invalid_credential()
            })?;

        Ok(AuthUser {
            user_id: claims.sub,
            email: claims.email,
        })
    }
}

/// Fail unless the stored user behind `user` currently has the admin role.
pub async fn require_admin(store: &dyn DocumentStore, user: &AuthUser) -> Result<(), ApiError> {
    match users::find_by_email(store, &user.email).await? {
        Some(stored) if stored.role.is_admin() => Ok(()),
        Some(_) => {
            debug!("Admin check failed for {}: not an admin", user.email);
            Err(ApiError::forbidden("forbidden access"))
        }
        None => {
            debug!("Admin check failed for {}: no such user", user.email);
            Err(ApiError::forbidden("forbidden access"))
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let user = AuthUser::from_request_parts(parts, state).await?;
        require_admin(state.store.as_ref(), &user).await?;
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::error::ErrorCode;
    use crate::auth::SessionTokens;
    use crate::config::Config;
    use crate::db::{Document, MemoryStore, Role, User};
    use axum::http::Request;

    const SECRET: &str = "gate-test-secret";

    fn state_with(store: Arc<MemoryStore>, secret: Option<&str>) -> Arc<AppState> {
        let mut config = Config::default();
        config.auth.token_secret = secret.map(str::to_string);
        Arc::new(AppState::new(&config, store))
    }

    fn token_for(user: &User) -> String {
        SessionTokens::new(SECRET, 3600)
            .issue(user, chrono::Utc::now().timestamp())
            .unwrap()
    }

    fn parts_with(authorization: Option<&str>) -> Parts {
        let mut builder = Request::builder().uri("/protected");
        if let Some(value) = authorization {
            builder = builder.header(AUTHORIZATION, value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    fn guest() -> User {
        User {
            id: "guest-id".to_string(),
            email: "guest@bistro.test".to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn test_bearer_token_parsing() {
        let value = HeaderValue::from_static("Bearer abc.def.ghi");
        assert_eq!(bearer_token(&value), Some("abc.def.ghi"));

        assert_eq!(bearer_token(&HeaderValue::from_static("Bearer ")), None);
        assert_eq!(bearer_token(&HeaderValue::from_static("Basic abc")), None);
        assert_eq!(bearer_token(&HeaderValue::from_static("abc.def.ghi")), None);
    }

    #[tokio::test]
    async fn test_missing_header_is_missing_credential() {
        let state = state_with(Arc::new(MemoryStore::new()), Some(SECRET));
        let mut parts = parts_with(None);

        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::MissingCredential);
    }

    #[tokio::test]
    async fn test_unconfigured_secret_is_server_error() {
        let state = state_with(Arc::new(MemoryStore::new()), None);
        let header = format!("Bearer {}", token_for(&guest()));
        let mut parts = parts_with(Some(&header));

        let err = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::ServerMisconfigured);
    }

    #[tokio::test]
    async fn test_bad_tokens_are_invalid_credential() {
        let state = state_with(Arc::new(MemoryStore::new()), Some(SECRET));
        let foreign = SessionTokens::new("another-secret", 3600)
            .issue(&guest(), chrono::Utc::now().timestamp())
            .unwrap();

        for header in [
            "Bearer not-a-jwt".to_string(),
            "Token abc".to_string(),
            "Bearer".to_string(),
            format!("Bearer {}", foreign),
        ] {
            let mut parts = parts_with(Some(&header));
            let err = AuthUser::from_request_parts(&mut parts, &state)
                .await
                .unwrap_err();
            assert_eq!(err.code(), ErrorCode::InvalidCredential, "{}", header);
        }
    }

    #[tokio::test]
    async fn test_valid_token_yields_identity() {
        let state = state_with(Arc::new(MemoryStore::new()), Some(SECRET));
        let header = format!("Bearer {}", token_for(&guest()));
        let mut parts = parts_with(Some(&header));

        let user = AuthUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(user.user_id, "guest-id");
        assert_eq!(user.email, "guest@bistro.test");
    }

    #[tokio::test]
    async fn test_admin_gate_reads_role_from_store() {
        let store = Arc::new(MemoryStore::new());
        let state = state_with(store.clone(), Some(SECRET));

        let (user, _) = users::find_or_create(store.as_ref(), "chef@bistro.test", Document::new())
            .await
            .unwrap();
        let header = format!("Bearer {}", token_for(&user));

        let mut parts = parts_with(Some(&header));
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);

        users::promote_to_admin(store.as_ref(), &user.id).await.unwrap();

        let mut parts = parts_with(Some(&header));
        let AdminUser(admin) = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap();
        assert_eq!(admin.email, "chef@bistro.test");

        users::delete(store.as_ref(), &user.id).await.unwrap();

        let mut parts = parts_with(Some(&header));
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .unwrap_err();
        assert_eq!(err.code(), ErrorCode::Forbidden);
    }
}
