use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
};
use uuid::Uuid;

use hearth_types::models::{Listing, Session};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;

pub async fn list_favorites(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<Listing>>> {
    let listings = blocking(&state, move |wf| wf.list_favorites(&session)).await?;
    Ok(Json(listings))
}

/// PUT /favorites/{listing_id}. Saving twice is fine.
pub async fn add_favorite(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |wf| wf.add_favorite(&session, listing_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn remove_favorite(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |wf| wf.remove_favorite(&session, listing_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
