use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    Json,
};
use std::sync::Arc;

use crate::db::{CartQuery, Collection, DeleteResult, Document, Filter, InsertOneResult};
use crate::AppState;

use super::error::ApiError;
use super::validation::require_id;

/// List the cart items belonging to `?email=`
pub async fn list_carts(
    State(state): State<Arc<AppState>>,
    query: Result<Query<CartQuery>, QueryRejection>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let Query(query) = query?;
    let email = query
        .email
        .filter(|email| !email.is_empty())
        .ok_or_else(|| ApiError::bad_request("email query parameter is required"))?;

    let items = state
        .store
        .find_all(Collection::Carts, &Filter::all().eq("email", email))
        .await?;
    Ok(Json(items))
}

/// Add an item to a cart
pub async fn add_to_cart(
    State(state): State<Arc<AppState>>,
    body: Result<Json<Document>, JsonRejection>,
) -> Result<Json<InsertOneResult>, ApiError> {
    let Json(item) = body?;
    let result = state.store.insert_one(Collection::Carts, item).await?;
    Ok(Json(result))
}

/// Remove an item from a cart
pub async fn remove_from_cart(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<DeleteResult>, ApiError> {
    require_id(&id)?;

    let result = state
        .store
        .delete_one(Collection::Carts, &Filter::by_id(id))
        .await?;
    Ok(Json(result))
}
