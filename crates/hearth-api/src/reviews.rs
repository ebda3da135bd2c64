use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use uuid::Uuid;

use hearth_types::api::{CreateReviewRequest, UserReviewsResponse};
use hearth_types::models::{ReviewSummary, Session};
use hearth_workflow::NewReview;

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::extract::ApiJson;

pub async fn create_review(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<CreateReviewRequest>,
) -> ApiResult<impl IntoResponse> {
    let new = NewReview {
        target_user_id: req.target_user_id,
        rating: req.rating,
        comment: req.comment,
    };
    let review = blocking(&state, move |wf| wf.submit_review(&session, new)).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

/// GET /users/{id}/reviews
pub async fn list_user_reviews(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<UserReviewsResponse>> {
    let reviews = blocking(&state, move |wf| {
        wf.get_user(user_id)?;
        wf.list_reviews_for_user(user_id)
    })
    .await?;
    Ok(Json(UserReviewsResponse {
        summary: ReviewSummary::from_reviews(&reviews),
        reviews,
    }))
}
