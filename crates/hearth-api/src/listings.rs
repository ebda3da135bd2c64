use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use hearth_types::api::{CreateListingRequest, UpdateListingRequest};
use hearth_types::models::{Listing, Session};
use hearth_workflow::{ListingUpdate, NewListing};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::extract::ApiJson;

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub limit: Option<u32>,
}

pub async fn create_listing(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<CreateListingRequest>,
) -> ApiResult<impl IntoResponse> {
    let new = NewListing {
        title: req.title,
        description: req.description,
        location: req.location,
        monthly_rent: req.monthly_rent,
    };
    let listing = blocking(&state, move |wf| wf.create_listing(&session, new)).await?;
    Ok((StatusCode::CREATED, Json(listing)))
}

pub async fn list_listings(
    State(state): State<AppState>,
    Query(query): Query<ListingQuery>,
) -> ApiResult<Json<Vec<Listing>>> {
    let listings = blocking(&state, move |wf| wf.list_listings(query.limit)).await?;
    Ok(Json(listings))
}

pub async fn get_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
) -> ApiResult<Json<Listing>> {
    let listing = blocking(&state, move |wf| wf.get_listing(listing_id)).await?;
    Ok(Json(listing))
}

/// GET /users/{id}/listings
pub async fn list_user_listings(
    State(state): State<AppState>,
    Path(owner_id): Path<Uuid>,
) -> ApiResult<Json<Vec<Listing>>> {
    let listings = blocking(&state, move |wf| wf.list_listings_for_owner(owner_id)).await?;
    Ok(Json(listings))
}

/// PATCH /listings/{id}: owner only, absent fields are left alone.
pub async fn update_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<UpdateListingRequest>,
) -> ApiResult<Json<Listing>> {
    let update = ListingUpdate {
        title: req.title,
        description: req.description,
        location: req.location,
        monthly_rent: req.monthly_rent,
    };
    let listing = blocking(&state, move |wf| wf.update_listing(&session, listing_id, update)).await?;
    Ok(Json(listing))
}

pub async fn delete_listing(
    State(state): State<AppState>,
    Path(listing_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> ApiResult<StatusCode> {
    blocking(&state, move |wf| wf.delete_listing(&session, listing_id)).await?;
    Ok(StatusCode::NO_CONTENT)
}
