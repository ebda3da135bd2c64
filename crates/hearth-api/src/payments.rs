use axum::{
    Extension, Json,
    extract::{Path, State},
};
use uuid::Uuid;

use hearth_types::api::{ProofsResponse, SubmitProofsRequest};
use hearth_types::models::{BookingRequest, Session};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::extract::ApiJson;

pub async fn list_proofs(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<ProofsResponse>> {
    let proofs = blocking(&state, move |wf| wf.list_payment_proofs(&session, booking_id)).await?;
    Ok(Json(ProofsResponse {
        booking_id,
        payment_proofs: proofs.payment_proofs,
        legit_proofs: proofs.legit_proofs,
    }))
}

/// POST /bookings/{id}/proofs. URLs usually come from `POST /artifacts`.
pub async fn submit_proofs(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<SubmitProofsRequest>,
) -> ApiResult<Json<BookingRequest>> {
    let booking = blocking(&state, move |wf| {
        wf.submit_payment_proofs(&session, booking_id, req.urls)
    })
    .await?;
    Ok(Json(booking))
}

pub async fn approve_proofs(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<BookingRequest>> {
    let booking = blocking(&state, move |wf| wf.approve_payment_proofs(&session, booking_id)).await?;
    Ok(Json(booking))
}
