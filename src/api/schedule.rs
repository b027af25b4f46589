//! Schedule view endpoint.

use std::collections::BTreeMap;

use axum::{extract::State, response::IntoResponse, routing::get, Json, Router};
use serde::Serialize;

use crate::state::AppState;

/// Display format for slot boundaries.
const SLOT_FORMAT: &str = "%H:%M %d/%m/%Y";

pub fn routes() -> Router<AppState> {
    Router::new().route("/schedule", get(show_schedule))
}

/// One occupied slot in a zone.
#[derive(Debug, Serialize)]
pub struct ScheduleEntry {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "StartTime")]
    pub start_time: String,
    #[serde(rename = "EndTime")]
    pub end_time: String,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Critical")]
    pub critical: bool,
}

/// Render every zone's timeline in start order.
///
/// GET /schedule
async fn show_schedule(State(state): State<AppState>) -> impl IntoResponse {
    let scheduler = state.scheduler().lock().await;
    let mut view: BTreeMap<String, Vec<ScheduleEntry>> = BTreeMap::new();
    for (zone, ids) in scheduler.zones() {
        let entries = ids
            .iter()
            .filter_map(|id| scheduler.task(id))
            .map(|task| ScheduleEntry {
                id: task.id.to_string(),
                name: task.name.clone(),
                start_time: task.start.format(SLOT_FORMAT).to_string(),
                end_time: task.end().format(SLOT_FORMAT).to_string(),
                kind: task.kind.as_str().to_string(),
                critical: task.critical,
            })
            .collect();
        view.insert(zone.clone(), entries);
    }
    Json(view)
}
