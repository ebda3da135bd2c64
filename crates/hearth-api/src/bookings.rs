use axum::{
    Extension, Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use uuid::Uuid;

use hearth_types::api::{CreateBookingRequest, RespondRequest};
use hearth_types::models::{BookingRequest, Decision, Session};
use hearth_workflow::{BookingRole, NewBookingRequest};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;
use crate::extract::ApiJson;

pub async fn create_booking(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<CreateBookingRequest>,
) -> ApiResult<impl IntoResponse> {
    let new = NewBookingRequest {
        requester_id: session.user_id,
        recipient_id: req.recipient_id,
        listing_id: req.listing_id,
        message: req.message,
    };
    let booking = blocking(&state, move |wf| wf.create_booking_request(&session, new)).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// GET /bookings/incoming
pub async fn list_incoming(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<BookingRequest>>> {
    let list = blocking(&state, move |wf| {
        wf.list_booking_requests(&session, BookingRole::Recipient)
    })
    .await?;
    Ok(Json(list))
}

/// GET /bookings/outgoing
pub async fn list_outgoing(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<Vec<BookingRequest>>> {
    let list = blocking(&state, move |wf| {
        wf.list_booking_requests(&session, BookingRole::Requester)
    })
    .await?;
    Ok(Json(list))
}

pub async fn get_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Extension(session): Extension<Session>,
) -> ApiResult<Json<BookingRequest>> {
    let booking = blocking(&state, move |wf| wf.get_booking_request(&session, booking_id)).await?;
    Ok(Json(booking))
}

/// Accepting returns the updated booking; rejecting deletes it and returns
/// 204.
pub async fn respond(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    Extension(session): Extension<Session>,
    ApiJson(req): ApiJson<RespondRequest>,
) -> ApiResult<Response> {
    let decision = req.decision;
    let booking = blocking(&state, move |wf| {
        wf.respond_to_booking_request(&session, booking_id, decision)
    })
    .await?;

    Ok(match decision {
        Decision::Accept => Json(booking).into_response(),
        Decision::Reject => StatusCode::NO_CONTENT.into_response(),
    })
}
