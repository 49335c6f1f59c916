pub mod auth;
mod carts;
pub mod error;
mod menu;
mod reviews;
mod users;
pub mod validation;


use axum::{
    routing::{delete, get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Gates are declared per handler through the `AuthUser` / `AdminUser` extractors.
    let user_routes = Router::new()
        .route("/", get(users::list_users).post(users::create_user))
        // GET takes an email, PATCH takes a user id
        .route(
            "/admin/:target",
            get(users::check_admin).patch(users::promote_user),
        )
        .route("/:id", delete(users::delete_user));

    let cart_routes = Router::new()
        .route("/", get(carts::list_carts).post(carts::add_to_cart))
        .route("/:id", delete(carts::remove_from_cart));

    Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .route("/jwt", post(auth::issue_token))
        .route("/protected", get(auth::protected))
        .route("/menu", get(menu::list_menu))
        .route("/reviews", get(reviews::list_reviews))
        .nest("/users", user_routes)
        .nest("/carts", cart_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn root() -> &'static str {
    "Bistro is sitting"
}

async fn health_check() -> &'static str {
    "OK"
}
