//! HTTP handlers for hearth, assembled by [`routes::router`]. Every handler
//! authenticates through [`middleware::require_auth`] unless routed as
//! public, and runs workflow calls on the blocking pool.

pub mod auth;
pub mod bookings;
pub mod chats;
pub mod error;
pub mod extract;
pub mod favorites;
pub mod files;
pub mod listings;
pub mod middleware;
pub mod notifications;
pub mod payments;
pub mod reviews;
pub mod routes;
pub mod storage;
pub mod users;

use hearth_workflow::{WorkflowResult, Workflows};

use crate::auth::AppState;
use crate::error::ApiResult;

pub use routes::router;

/// Run a synchronous workflow call off the async runtime.
pub(crate) async fn blocking<T, F>(state: &AppState, f: F) -> ApiResult<T>
where
    F: FnOnce(&Workflows) -> WorkflowResult<T> + Send + 'static,
    T: Send + 'static,
{
    let state = state.clone();
    let out = tokio::task::spawn_blocking(move || f(&state.workflows)).await?;
    Ok(out?)
}
