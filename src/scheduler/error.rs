//! Scheduling error types.

use thiserror::Error;

use super::task::TaskId;

/// Errors from admission, planning and lifecycle operations.
#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("zone {0} is not present in the whitelist or blacklist")]
    UnknownZone(String),

    #[error("zone {0} is blacklisted and the task is not critical")]
    BlacklistedZone(String),

    #[error("task does not fit any whitelist window of zone {0}")]
    OutsideWindow(String),

    #[error("{required} zones must stay free of work at all times")]
    InsufficientFreeZones { required: usize },

    #[error("overlap in zone {zone} with task {task} of priority {priority}")]
    PriorityConflict {
        zone: String,
        task: TaskId,
        priority: u8,
    },

    #[error("no task with id {0}")]
    UnknownTask(TaskId),

    #[error("{0}")]
    IllegalTransition(&'static str),
}

/// Independent per-task failures accumulated by a full reschedule.
#[derive(Debug, Default)]
pub struct RescheduleErrors {
    errors: Vec<(TaskId, ScheduleError)>,
}

impl RescheduleErrors {
    pub fn push(&mut self, task: TaskId, error: ScheduleError) {
        self.errors.push((task, error));
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(TaskId, ScheduleError)> {
        self.errors.iter()
    }
}

impl std::fmt::Display for RescheduleErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (task, error)) in self.errors.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{task}: {error}")?;
        }
        Ok(())
    }
}

impl std::error::Error for RescheduleErrors {}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_reschedule_errors_display() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut errors = RescheduleErrors::default();
        assert!(errors.is_empty());

        errors.push(a, ScheduleError::UnknownZone("alpha".to_string()));
        errors.push(b, ScheduleError::InsufficientFreeZones { required: 2 });

        assert_eq!(errors.len(), 2);
        let rendered = errors.to_string();
        assert!(rendered.contains(&a.to_string()));
        assert!(rendered.contains("; "));
        assert!(rendered.contains("2 zones must stay free"));
    }
}
