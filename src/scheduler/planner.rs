//! Per-zone placement planning.

use super::error::ScheduleError;
use super::task::{Task, TaskId, TaskStatus};
use super::timeline::overlap;
use super::Scheduler;

/// A planned mutation of one zone timeline: tasks to preempt plus the
/// insertion index for the incoming task.
#[derive(Debug, Clone)]
pub struct Order {
    pub zone: String,
    pub task: TaskId,
    pub insert_index: usize,
    pub preempt: Vec<TaskId>,
}

impl Scheduler {
    /// Walk `zone` and decide where `task` lands and who has to make room.
    ///
    /// Each scheduled task's interval is extended by the zone pause before
    /// the overlap test. An overlap with a task of equal or higher priority
    /// is a conflict unless that task is already marked cancelled or the
    /// incoming task is on the change path, which may displace equals.
    pub(crate) fn plan(&self, task: &Task, zone: &str) -> Result<Order, ScheduleError> {
        let pause = self.config.pause(zone);
        let mut insert_index = 0usize;
        let mut overlapping = Vec::new();

        for (i, id) in self.timelines.iter(zone).enumerate() {
            let Some(scheduled) = self.tasks.get(id) else {
                continue;
            };
            let scheduled_end = scheduled.end() + pause;
            if overlap(scheduled.start, scheduled_end, task.start, task.end()) {
                overlapping.push(*id);
            }
            if task.start >= scheduled_end {
                insert_index = i + 1;
            }
        }

        for id in &overlapping {
            let Some(scheduled) = self.tasks.get(id) else {
                continue;
            };
            if scheduled.priority <= task.priority
                && scheduled.status != TaskStatus::Cancel
                && task.status != TaskStatus::Change
            {
                return Err(ScheduleError::PriorityConflict {
                    zone: zone.to_string(),
                    task: *id,
                    priority: scheduled.priority,
                });
            }
        }

        Ok(Order {
            zone: zone.to_string(),
            task: task.id,
            insert_index,
            preempt: overlapping,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RawZoneConfig, ZoneConfig};
    use crate::scheduler::task::TaskKind;
    use chrono::{NaiveDate, NaiveDateTime, TimeDelta};

    fn config(yaml: &str) -> ZoneConfig {
        ZoneConfig::compile(serde_yaml::from_str::<RawZoneConfig>(yaml).unwrap()).unwrap()
    }

    fn at(hour: u32, minute: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 10)
            .unwrap()
            .and_hms_opt(hour, minute, 0)
            .unwrap()
    }

    fn task(kind: TaskKind, critical: bool, start: NaiveDateTime, hours: i64) -> Task {
        Task::new(
            String::new(),
            start,
            TimeDelta::hours(hours),
            start + TimeDelta::hours(hours + 8),
            vec!["alpha".to_string()],
            kind,
            critical,
            0,
        )
    }

    fn scheduler_with_pause(pause: &str) -> Scheduler {
        Scheduler::new(config(&format!(
            r#"
            whiteList:
              alpha: ["00:00-23:59"]
            pauses:
              alpha: {pause}
            "#
        )))
    }

    #[test]
    fn test_plan_empty_zone() {
        let scheduler = scheduler_with_pause("0s");
        let incoming = task(TaskKind::Manual, false, at(10, 0), 1);
        let order = scheduler.plan(&incoming, "alpha").unwrap();
        assert_eq!(order.insert_index, 0);
        assert!(order.preempt.is_empty());
    }

    #[test]
    fn test_plan_appends_after_existing() {
        let mut scheduler = scheduler_with_pause("0s");
        scheduler
            .insert(task(TaskKind::Manual, false, at(9, 0), 1))
            .unwrap();

        let incoming = task(TaskKind::Manual, false, at(11, 0), 1);
        let order = scheduler.plan(&incoming, "alpha").unwrap();
        assert_eq!(order.insert_index, 1);
        assert!(order.preempt.is_empty());
    }

    #[test]
    fn test_plan_equal_priority_conflict() {
        let mut scheduler = scheduler_with_pause("0s");
        let existing = scheduler
            .insert(task(TaskKind::Manual, false, at(10, 0), 1))
            .unwrap();

        let incoming = task(TaskKind::Manual, false, at(10, 30), 1);
        let err = scheduler.plan(&incoming, "alpha").unwrap_err();
        assert!(
            matches!(err, ScheduleError::PriorityConflict { task, priority: 1, .. } if task == existing.id)
        );
    }

    #[test]
    fn test_plan_preempts_lower_priority() {
        let mut scheduler = scheduler_with_pause("0s");
        let auto = scheduler
            .insert(task(TaskKind::Auto, false, at(10, 0), 1))
            .unwrap();

        let incoming = task(TaskKind::Manual, false, at(10, 30), 1);
        let order = scheduler.plan(&incoming, "alpha").unwrap();
        assert_eq!(order.preempt, vec![auto.id]);
        assert_eq!(order.insert_index, 0);
    }

    #[test]
    fn test_plan_change_path_displaces_equal_priority() {
        let mut scheduler = scheduler_with_pause("0s");
        let existing = scheduler
            .insert(task(TaskKind::Manual, false, at(10, 0), 1))
            .unwrap();

        let mut incoming = task(TaskKind::Manual, false, at(10, 30), 1);
        incoming.status = TaskStatus::Change;
        let order = scheduler.plan(&incoming, "alpha").unwrap();
        assert_eq!(order.preempt, vec![existing.id]);
    }

    #[test]
    fn test_plan_pause_extends_occupancy() {
        // With a 30 minute pause, a task starting right at the previous end
        // still collides.
        let mut scheduler = scheduler_with_pause("30m");
        scheduler
            .insert(task(TaskKind::Manual, false, at(9, 0), 1))
            .unwrap();

        let touching = task(TaskKind::Manual, false, at(10, 0), 1);
        assert!(matches!(
            scheduler.plan(&touching, "alpha").unwrap_err(),
            ScheduleError::PriorityConflict { .. }
        ));

        let clear = task(TaskKind::Manual, false, at(10, 30), 1);
        let order = scheduler.plan(&clear, "alpha").unwrap();
        assert_eq!(order.insert_index, 1);
        assert!(order.preempt.is_empty());
    }
}
