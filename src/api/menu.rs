use axum::{extract::State, Json};
use std::sync::Arc;

use crate::db::{Collection, Document, Filter};
use crate::AppState;

use super::error::ApiError;

/// List every menu item
pub async fn list_menu(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let items = state
        .store
        .find_all(Collection::Menu, &Filter::all())
        .await?;
    Ok(Json(items))
}
