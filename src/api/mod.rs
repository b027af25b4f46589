//! HTTP API handlers and routing.

mod error;
mod health;
mod schedule;
mod tasks;

use std::time::Duration;

use axum::Router;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

pub use error::ApiError;
pub use schedule::ScheduleEntry;
pub use tasks::{AddTaskReq, ExtendTaskReq, MoveTaskReq, TaskResponse, DATETIME_FORMAT};

use crate::state::AppState;

/// Bound on request handling, matching the server's drain expectations.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);

/// Create the main API router with all routes and middleware.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .merge(health::routes())
        .merge(tasks::routes())
        .merge(schedule::routes())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(REQUEST_TIMEOUT))
        .with_state(state)
}
