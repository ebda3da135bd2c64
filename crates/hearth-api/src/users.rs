use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use hearth_types::api::{ProfileResponse, UpdateProfileRequest};
use hearth_types::models::{Session, User};

use crate::auth::{AppState, create_token};
use crate::blocking;
use crate::error::{ApiError, ApiResult};
use crate::extract::ApiJson;

/// GET /users/{id}: public profile, no password hash.
pub async fn get_user(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> ApiResult<Json<User>> {
    let user = blocking(&state, move |wf| wf.get_user(user_id)).await?;
    Ok(Json(user))
}

/// PATCH /profile. Returns a fresh token carrying the new display name;
/// older tokens keep the old one until they expire.
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<ProfileResponse>> {
    let user = blocking(&state, move |wf| wf.update_profile(&session, &req.display_name)).await?;
    let token = create_token(&state.jwt_secret, user.id, &user.username, &user.display_name)
        .map_err(|e| ApiError::internal("token encoding failed", e))?;
    Ok(Json(ProfileResponse { user, token }))
}
