//! Task records and their lifecycle states.

use chrono::{NaiveDateTime, TimeDelta};
use uuid::Uuid;

/// Unique task identifier.
pub type TaskId = Uuid;

/// How a task was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    /// Machine-generated work; may be compressed when split.
    Auto,
    /// Operator-requested work; may be critical.
    Manual,
}

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto" => Some(Self::Auto),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Lifecycle state of a task.
///
/// `Progress` and `Complete` are driven by an external actuator; the
/// scheduler only places, preempts and cancels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Admitted and scheduled, waiting to run.
    Wait,
    /// Probe placement used while computing start suggestions.
    Suggested,
    /// Running.
    Progress,
    /// Finished.
    Complete,
    /// Removed from all zone schedules.
    Cancel,
    /// Being moved or extended; equal-priority overlaps may be displaced.
    Change,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wait => "wait",
            Self::Suggested => "suggested",
            Self::Progress => "progress",
            Self::Complete => "complete",
            Self::Cancel => "cancel",
            Self::Change => "change",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "wait" => Some(Self::Wait),
            "suggested" => Some(Self::Suggested),
            "progress" => Some(Self::Progress),
            "complete" => Some(Self::Complete),
            "cancel" => Some(Self::Cancel),
            "change" => Some(Self::Change),
            _ => None,
        }
    }

    /// True when the task occupies slots in its zone schedules.
    pub fn is_scheduled(&self) -> bool {
        matches!(
            self,
            Self::Wait | Self::Suggested | Self::Progress | Self::Change
        )
    }
}

/// Priority class derived from kind and criticality. Lower wins.
pub fn priority_rule(kind: TaskKind, critical: bool) -> u8 {
    if critical {
        return 0;
    }
    match kind {
        TaskKind::Manual => 1,
        TaskKind::Auto => 2,
    }
}

/// An admitted unit of work occupying one slot in each of its zones.
#[derive(Debug, Clone)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub preferred_start: NaiveDateTime,
    pub start: NaiveDateTime,
    pub duration: TimeDelta,
    pub deadline: NaiveDateTime,
    pub zones: Vec<String>,
    pub kind: TaskKind,
    pub critical: bool,
    pub priority: u8,
    /// Permissible shrink factor in percent when the task is split; auto only.
    pub compression_pct: u8,
    pub status: TaskStatus,
}

impl Task {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        name: String,
        preferred_start: NaiveDateTime,
        duration: TimeDelta,
        deadline: NaiveDateTime,
        zones: Vec<String>,
        kind: TaskKind,
        critical: bool,
        compression_pct: u8,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name,
            preferred_start,
            start: preferred_start,
            duration,
            deadline,
            zones,
            kind,
            critical,
            priority: priority_rule(kind, critical),
            compression_pct,
            status: TaskStatus::Wait,
        }
    }

    /// Instant at which the task stops occupying its zones (pause excluded).
    pub fn end(&self) -> NaiveDateTime {
        self.start + self.duration
    }
}
