use axum::{
    Extension, Json,
    extract::{Query, State},
};
use serde::Deserialize;

use hearth_types::models::{Notification, Session};

use crate::auth::AppState;
use crate::blocking;
use crate::error::ApiResult;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    50
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Query(query): Query<NotificationQuery>,
) -> ApiResult<Json<Vec<Notification>>> {
    let list = blocking(&state, move |wf| wf.list_notifications(&session, query.limit)).await?;
    Ok(Json(list))
}
