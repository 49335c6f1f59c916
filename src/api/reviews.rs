use axum::{extract::State, Json};
use std::sync::Arc;

use crate::db::{Collection, Document, Filter};
use crate::AppState;

use super::error::ApiError;

/// List every review
pub async fn list_reviews(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Document>>, ApiError> {
    let reviews = state
        .store
        .find_all(Collection::Reviews, &Filter::all())
        .await?;
    Ok(Json(reviews))
}
