//! Task API endpoints: admission, lookup, deletion, extend and move.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use chrono::{NaiveDateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

use crate::api::error::ApiError;
use crate::scheduler::{Task, TaskId, TaskKind};
use crate::state::AppState;

/// Wire format for request and response datetimes.
pub const DATETIME_FORMAT: &str = "%d/%m/%Y %H:%M";

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(add_task))
        .route("/tasks/{id}", get(get_task).delete(delete_task))
        .route("/tasks/extend/{id}", put(extend_task))
        .route("/tasks/move/{id}", put(move_task))
}

// =============================================================================
// Request/Response Types
// =============================================================================

/// Request to admit a new task.
#[derive(Debug, Deserialize)]
pub struct AddTaskReq {
    #[serde(rename = "Name", default)]
    pub name: String,

    /// Preferred start, `DD/MM/YYYY HH:MM`.
    #[serde(rename = "PrefStartDatetime")]
    pub pref_start_datetime: String,

    /// Duration string such as `1h30m`.
    #[serde(rename = "Duration")]
    pub duration: String,

    /// Deadline, `DD/MM/YYYY HH:MM`.
    #[serde(rename = "Deadline")]
    pub deadline: String,

    #[serde(rename = "Zones")]
    pub zones: Vec<String>,

    /// `auto` or `manual`.
    #[serde(rename = "Type")]
    pub kind: String,

    /// Manual tasks only.
    #[serde(rename = "Critical", default)]
    pub critical: bool,

    /// Permissible shrink percentage on split; auto tasks only.
    #[serde(rename = "CompressionPerc", default)]
    pub compression_perc: u8,
}

/// Request to extend a running task.
#[derive(Debug, Deserialize)]
pub struct ExtendTaskReq {
    #[serde(rename = "Duration")]
    pub duration: String,
}

/// Request to move a waiting task.
#[derive(Debug, Deserialize)]
pub struct MoveTaskReq {
    #[serde(rename = "StartDatetime")]
    pub start_datetime: String,
}

/// Response for a single task.
#[derive(Debug, Serialize)]
pub struct TaskResponse {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "PrefStartDatetime")]
    pub pref_start_datetime: String,
    #[serde(rename = "StartDatetime")]
    pub start_datetime: String,
    #[serde(rename = "Duration")]
    pub duration: String,
    #[serde(rename = "Deadline")]
    pub deadline: String,
    #[serde(rename = "Zones")]
    pub zones: Vec<String>,
    #[serde(rename = "Type")]
    pub kind: String,
    #[serde(rename = "Critical")]
    pub critical: bool,
    #[serde(rename = "Priority")]
    pub priority: u8,
    #[serde(rename = "CompressionPerc")]
    pub compression_perc: u8,
    #[serde(rename = "Status")]
    pub status: String,
}

impl From<&Task> for TaskResponse {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            name: task.name.clone(),
            pref_start_datetime: task.preferred_start.format(DATETIME_FORMAT).to_string(),
            start_datetime: task.start.format(DATETIME_FORMAT).to_string(),
            duration: format_delta(task.duration),
            deadline: task.deadline.format(DATETIME_FORMAT).to_string(),
            zones: task.zones.clone(),
            kind: task.kind.as_str().to_string(),
            critical: task.critical,
            priority: task.priority,
            compression_perc: task.compression_pct,
            status: task.status.as_str().to_string(),
        }
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Admit a new task.
///
/// POST /tasks
async fn add_task(
    State(state): State<AppState>,
    Json(req): Json<AddTaskReq>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now().naive_utc();

    let start = parse_datetime(&req.pref_start_datetime)?;
    let duration = parse_duration(&req.duration)?;
    if start < now || start + duration < now {
        return Err(ApiError::bad_request("tasks cannot be scheduled in the past"));
    }

    let deadline = parse_datetime(&req.deadline)?;
    if deadline < start + duration {
        return Err(ApiError::bad_request(
            "deadline falls before the task would finish",
        ));
    }

    let durations = state.durations();
    let horizon = delta(durations.deadline_duration);
    if deadline > now + horizon {
        return Err(ApiError::bad_request(format!(
            "deadline cannot lie more than {} ahead",
            humantime::format_duration(durations.deadline_duration)
        )));
    }

    let kind = TaskKind::from_str(&req.kind)
        .ok_or_else(|| ApiError::bad_request("unknown type of task"))?;
    if kind == TaskKind::Auto && req.critical {
        return Err(ApiError::bad_request("auto tasks cannot be critical"));
    }
    if req.compression_perc > 100 {
        return Err(ApiError::bad_request(
            "compression percentage must be between 0 and 100",
        ));
    }
    if req.zones.is_empty() {
        return Err(ApiError::bad_request("at least one zone is required"));
    }

    let min_duration = match kind {
        TaskKind::Auto => durations.min_auto_duration,
        TaskKind::Manual => durations.min_manual_duration,
    };
    if duration < delta(min_duration) {
        return Err(ApiError::bad_request(format!(
            "{} tasks must run at least {}",
            kind.as_str(),
            humantime::format_duration(min_duration)
        )));
    }

    let max_duration = if req.critical {
        durations.max_crit_duration
    } else {
        durations.max_noncrit_duration
    };
    if duration > delta(max_duration) {
        return Err(ApiError::bad_request(format!(
            "task duration cannot exceed {}",
            humantime::format_duration(max_duration)
        )));
    }

    let lead = match kind {
        TaskKind::Auto => durations.preferred_auto_start_mult,
        TaskKind::Manual => durations.preferred_manual_start_mult,
    };
    if start < now + delta(lead) {
        return Err(ApiError::bad_request(format!(
            "{} tasks need a start at least {} from now",
            kind.as_str(),
            humantime::format_duration(lead)
        )));
    }

    let task = Task::new(
        req.name,
        start,
        duration,
        deadline,
        req.zones,
        kind,
        req.critical,
        req.compression_perc,
    );

    let mut scheduler = state.scheduler().lock().await;
    let task = scheduler.insert(task)?;
    info!(task = %task.id, zones = ?task.zones, "added task");

    Ok((StatusCode::CREATED, Json(TaskResponse::from(&task))))
}

/// List every known task, cancelled ones included.
///
/// GET /tasks
async fn list_tasks(State(state): State<AppState>) -> impl IntoResponse {
    let scheduler = state.scheduler().lock().await;
    let tasks: BTreeMap<String, TaskResponse> = scheduler
        .tasks()
        .map(|task| (task.id.to_string(), TaskResponse::from(task)))
        .collect();
    Json(tasks)
}

/// Get a single task by id.
///
/// GET /tasks/{id}
async fn get_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_task_id(&id)?;
    let scheduler = state.scheduler().lock().await;
    match scheduler.task(&id) {
        Some(task) => Ok(Json(TaskResponse::from(task))),
        None => Err(ApiError::bad_request(format!("no task with id {id}"))),
    }
}

/// Cancel a task in all of its zones.
///
/// DELETE /tasks/{id}
async fn delete_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_task_id(&id)?;
    let mut scheduler = state.scheduler().lock().await;
    scheduler.cancel(&id)?;
    info!(task = %id, "cancelled task");
    Ok(StatusCode::OK)
}

/// Extend a running manual task.
///
/// PUT /tasks/extend/{id}
async fn extend_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<ExtendTaskReq>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_task_id(&id)?;
    let duration = parse_duration(&req.duration)?;

    let mut scheduler = state.scheduler().lock().await;
    let task = scheduler.extend(&id, duration)?;
    info!(task = %id, "extended task");
    Ok(Json(TaskResponse::from(&task)))
}

/// Move a waiting task to a new start.
///
/// PUT /tasks/move/{id}
async fn move_task(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<MoveTaskReq>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_task_id(&id)?;
    let start = parse_datetime(&req.start_datetime)?;
    if start < Utc::now().naive_utc() {
        return Err(ApiError::bad_request("tasks cannot be scheduled in the past"));
    }

    let mut scheduler = state.scheduler().lock().await;
    let task = scheduler.move_start(&id, start)?;
    info!(task = %id, start = %task.start, "moved task");
    Ok(Json(TaskResponse::from(&task)))
}

// =============================================================================
// Parsing helpers
// =============================================================================

fn parse_task_id(raw: &str) -> Result<TaskId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::bad_request(format!("no task with id {raw}")))
}

fn parse_datetime(raw: &str) -> Result<NaiveDateTime, ApiError> {
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map_err(|err| ApiError::bad_request(format!("invalid datetime {raw:?}: {err}")))
}

fn parse_duration(raw: &str) -> Result<TimeDelta, ApiError> {
    let parsed = humantime::parse_duration(raw)
        .map_err(|err| ApiError::bad_request(format!("invalid duration {raw:?}: {err}")))?;
    TimeDelta::from_std(parsed)
        .map_err(|_| ApiError::bad_request(format!("duration {raw:?} is out of range")))
}

fn delta(duration: std::time::Duration) -> TimeDelta {
    TimeDelta::from_std(duration).unwrap_or(TimeDelta::MAX)
}

fn format_delta(duration: TimeDelta) -> String {
    let seconds = duration.num_seconds().max(0) as u64;
    humantime::format_duration(std::time::Duration::from_secs(seconds)).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_task_req_deserialization() {
        let json = r#"{
            "Name": "fan sweep",
            "PrefStartDatetime": "15/06/2026 10:00",
            "Duration": "1h30m",
            "Deadline": "15/06/2026 18:00",
            "Zones": ["alpha", "bravo"],
            "Type": "auto",
            "CompressionPerc": 25
        }"#;
        let req: AddTaskReq = serde_json::from_str(json).unwrap();
        assert_eq!(req.name, "fan sweep");
        assert_eq!(req.zones, vec!["alpha", "bravo"]);
        assert_eq!(req.kind, "auto");
        assert!(!req.critical);
        assert_eq!(req.compression_perc, 25);
    }

    #[test]
    fn test_parse_datetime() {
        let parsed = parse_datetime("02/01/2026 15:04").unwrap();
        assert_eq!(parsed.format(DATETIME_FORMAT).to_string(), "02/01/2026 15:04");
        assert!(parse_datetime("2026-01-02T15:04").is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("1h30m").unwrap(), TimeDelta::minutes(90));
        assert!(parse_duration("soon").is_err());
    }

    #[test]
    fn test_format_delta_roundtrip() {
        assert_eq!(format_delta(TimeDelta::minutes(90)), "1h 30m");
        assert_eq!(format_delta(TimeDelta::zero()), "0s");
    }

    #[test]
    fn test_task_response_serialization() {
        let start = parse_datetime("15/06/2026 10:00").unwrap();
        let task = Task::new(
            "sweep".to_string(),
            start,
            TimeDelta::hours(1),
            start + TimeDelta::hours(4),
            vec!["alpha".to_string()],
            TaskKind::Manual,
            true,
            0,
        );
        let json = serde_json::to_string(&TaskResponse::from(&task)).unwrap();
        assert!(json.contains("\"StartDatetime\":\"15/06/2026 10:00\""));
        assert!(json.contains("\"Priority\":0"));
        assert!(json.contains("\"Status\":\"wait\""));
    }
}
