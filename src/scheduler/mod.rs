//! The scheduling engine.
//!
//! A single `Scheduler` value owns the task store, the per-zone timelines
//! and the compiled zone config, and mediates every mutation. Admission,
//! planning, execution and rescheduling run to completion without yielding;
//! callers serialize access with one exclusive lock around the whole value.
//!
//! Placement of a multi-zone task computes one `Order` per zone against the
//! pre-execution snapshot and then commits them sequentially in zone order.
//! A planning failure leaves the timelines untouched; a failure surfacing
//! after the first commit is not rolled back.

mod admission;
mod error;
mod planner;
mod store;
mod suggest;
mod task;
mod timeline;

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, TimeDelta};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::config::ZoneConfig;

pub use error::{RescheduleErrors, ScheduleError};
pub use planner::Order;
pub use task::{priority_rule, Task, TaskId, TaskKind, TaskStatus};

use store::TaskStore;
use timeline::ZoneTimelines;

pub struct Scheduler {
    config: ZoneConfig,
    tasks: TaskStore,
    timelines: ZoneTimelines,
}

impl Scheduler {
    pub fn new(config: ZoneConfig) -> Self {
        Self {
            config,
            tasks: TaskStore::default(),
            timelines: ZoneTimelines::default(),
        }
    }

    pub fn config(&self) -> &ZoneConfig {
        &self.config
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    /// Ordered task ids per zone.
    pub fn zones(&self) -> &BTreeMap<String, Vec<TaskId>> {
        self.timelines.view()
    }

    /// Admit and place a new task, preempting lower-priority overlaps.
    ///
    /// On success the task is stored and occupies a slot in each of its
    /// zones; preempted tasks have been cancelled and offered new slots. On
    /// failure nothing changed.
    pub fn insert(&mut self, task: Task) -> Result<Task, ScheduleError> {
        self.admit(&task)?;
        let orders = self.plan_all(&task)?;
        let snapshot = task.clone();
        self.tasks.put(task);
        self.execute_all(orders);
        debug!(task = %snapshot.id, zones = ?snapshot.zones, "task placed");
        Ok(snapshot)
    }

    /// Cancel a task in all of its zones.
    pub fn cancel(&mut self, id: &TaskId) -> Result<(), ScheduleError> {
        if self.tasks.get(id).is_none() {
            return Err(ScheduleError::UnknownTask(*id));
        }
        self.cancel_scheduled(id);
        Ok(())
    }

    /// Move a waiting task to a new start.
    ///
    /// The task leaves its current slots and re-enters admission on the
    /// change path, so overlapping tasks of equal priority are displaced
    /// rather than blocking. On failure the previous placement is restored.
    pub fn move_start(
        &mut self,
        id: &TaskId,
        new_start: NaiveDateTime,
    ) -> Result<Task, ScheduleError> {
        let stored = self.tasks.get(id).ok_or(ScheduleError::UnknownTask(*id))?;
        if stored.status != TaskStatus::Wait {
            return Err(ScheduleError::IllegalTransition(
                "only tasks in wait can be moved",
            ));
        }
        if new_start + stored.duration > stored.deadline {
            return Err(ScheduleError::IllegalTransition(
                "cannot move a task past its deadline",
            ));
        }

        let old_start = stored.start;
        let mut probe = stored.clone();
        self.unlink(id);

        probe.start = new_start;
        probe.status = TaskStatus::Change;
        match self.admit(&probe).and_then(|_| self.plan_all(&probe)) {
            Ok(orders) => {
                let snapshot = match self.tasks.get_mut(id) {
                    Some(task) => {
                        task.start = new_start;
                        task.clone()
                    }
                    None => return Err(ScheduleError::UnknownTask(*id)),
                };
                self.execute_all(orders);
                debug!(task = %id, start = %new_start, "task moved");
                Ok(snapshot)
            }
            Err(err) => {
                probe.start = old_start;
                probe.status = TaskStatus::Wait;
                self.restore_placement(&probe);
                Err(err)
            }
        }
    }

    /// Extend a running manual task. Shrinking is refused, as is growing
    /// past the deadline. Re-admission runs on the change path.
    pub fn extend(
        &mut self,
        id: &TaskId,
        new_duration: TimeDelta,
    ) -> Result<Task, ScheduleError> {
        let stored = self.tasks.get(id).ok_or(ScheduleError::UnknownTask(*id))?;
        if stored.kind != TaskKind::Manual || stored.status != TaskStatus::Progress {
            return Err(ScheduleError::IllegalTransition(
                "only manual tasks in progress can be extended",
            ));
        }
        if new_duration < stored.duration {
            return Err(ScheduleError::IllegalTransition(
                "tasks can only be extended, not shrunk",
            ));
        }
        if stored.start + new_duration > stored.deadline {
            return Err(ScheduleError::IllegalTransition(
                "cannot extend a task past its deadline",
            ));
        }

        let old_duration = stored.duration;
        let prior_status = stored.status;
        let mut probe = stored.clone();
        self.unlink(id);

        probe.duration = new_duration;
        probe.status = TaskStatus::Change;
        match self.admit(&probe).and_then(|_| self.plan_all(&probe)) {
            Ok(orders) => {
                let snapshot = match self.tasks.get_mut(id) {
                    Some(task) => {
                        task.duration = new_duration;
                        task.clone()
                    }
                    None => return Err(ScheduleError::UnknownTask(*id)),
                };
                self.execute_all(orders);
                debug!(task = %id, "task extended");
                Ok(snapshot)
            }
            Err(err) => {
                probe.duration = old_duration;
                probe.status = prior_status;
                self.restore_placement(&probe);
                Err(err)
            }
        }
    }

    /// Lifecycle hook for an external actuator: wait to progress, progress
    /// to complete. Cancelling through here vacates the task's slots.
    pub fn set_status(&mut self, id: &TaskId, status: TaskStatus) -> Result<(), ScheduleError> {
        if self.tasks.get(id).is_none() {
            return Err(ScheduleError::UnknownTask(*id));
        }
        match status {
            TaskStatus::Cancel | TaskStatus::Complete => {
                self.cancel_scheduled(id);
                if let Some(task) = self.tasks.get_mut(id) {
                    task.status = status;
                }
            }
            _ => {
                if let Some(task) = self.tasks.get_mut(id) {
                    task.status = status;
                }
            }
        }
        Ok(())
    }

    /// Swap in a new zone config and rebuild the whole schedule.
    pub fn update_config(&mut self, config: ZoneConfig) -> Result<(), RescheduleErrors> {
        self.config = config;
        self.reschedule()
    }

    /// Cancel everything and re-admit, in sorted id order, every task that
    /// was waiting. Failures accumulate and leave the task cancelled; tasks
    /// that were not waiting stay cancelled.
    pub fn reschedule(&mut self) -> Result<(), RescheduleErrors> {
        let ids = self.tasks.ids();
        let mut statuses = BTreeMap::new();
        for id in &ids {
            if let Some(task) = self.tasks.get(id) {
                statuses.insert(*id, task.status);
            }
            self.cancel_scheduled(id);
        }

        let mut errors = RescheduleErrors::default();
        for id in &ids {
            if statuses.get(id) != Some(&TaskStatus::Wait) {
                continue;
            }
            let Some(stored) = self.tasks.get(id) else {
                continue;
            };
            let mut probe = stored.clone();
            probe.status = TaskStatus::Wait;
            match self.admit(&probe).and_then(|_| self.plan_all(&probe)) {
                Ok(orders) => {
                    if let Some(task) = self.tasks.get_mut(id) {
                        task.status = TaskStatus::Wait;
                    }
                    self.execute_all(orders);
                }
                Err(err) => {
                    warn!(task = %id, error = %err, "task dropped during reschedule");
                    errors.push(*id, err);
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    // Internals shared by the operations above and by the suggester.

    pub(crate) fn plan_all(&self, task: &Task) -> Result<Vec<Order>, ScheduleError> {
        task.zones.iter().map(|zone| self.plan(task, zone)).collect()
    }

    pub(crate) fn execute_all(&mut self, orders: Vec<Order>) {
        for order in orders {
            self.execute(order);
        }
    }

    /// Commit one order: cancel the preempted tasks everywhere, insert the
    /// incoming id, then try to find the preempted tasks new slots.
    pub(crate) fn execute(&mut self, order: Order) {
        for id in &order.preempt {
            self.cancel_scheduled(id);
        }
        self.timelines.insert(&order.zone, order.insert_index, order.task);
        for id in &order.preempt {
            let Some(parent) = self.tasks.get(id).cloned() else {
                continue;
            };
            self.replace_preempted(parent);
        }
    }

    /// Remove a task from every zone it occupies and mark it cancelled.
    fn cancel_scheduled(&mut self, id: &TaskId) {
        let Some(task) = self.tasks.get(id) else {
            return;
        };
        debug!(task = %id, "cancelling task");
        let zones = task.zones.clone();
        for zone in &zones {
            self.timelines.remove(zone, id);
        }
        if let Some(task) = self.tasks.get_mut(id) {
            task.status = TaskStatus::Cancel;
        }
    }

    /// Remove a task's timeline entries without touching its status.
    fn unlink(&mut self, id: &TaskId) {
        let Some(task) = self.tasks.get(id) else {
            return;
        };
        let zones = task.zones.clone();
        for zone in &zones {
            self.timelines.remove(zone, id);
        }
    }

    /// Drop a task from the store and all timelines.
    pub(crate) fn wipe(&mut self, id: &TaskId) {
        self.cancel_scheduled(id);
        self.tasks.remove(id);
    }

    /// Split a preempted task into per-zone children and offer each a
    /// suggested slot. Children that cannot be placed are left cancelled.
    fn replace_preempted(&mut self, parent: Task) {
        let parent_id = parent.id;
        for child_id in self.split(parent) {
            let Some(child) = self.tasks.get(&child_id).cloned() else {
                continue;
            };
            let Some(points) = self.suggest(&child) else {
                warn!(
                    task = %child_id,
                    parent = %parent_id,
                    zones = ?child.zones,
                    "no slot available for preempted task"
                );
                if let Some(task) = self.tasks.get_mut(&child_id) {
                    task.status = TaskStatus::Cancel;
                }
                continue;
            };
            let Some(&start) = child.zones.first().and_then(|zone| points.get(zone)) else {
                continue;
            };

            let mut probe = child;
            probe.start = start;
            probe.status = TaskStatus::Wait;
            match self.admit(&probe).and_then(|_| self.plan_all(&probe)) {
                Ok(orders) => {
                    if let Some(task) = self.tasks.get_mut(&child_id) {
                        task.start = start;
                        task.status = TaskStatus::Wait;
                    }
                    self.execute_all(orders);
                    debug!(task = %child_id, parent = %parent_id, start = %start, "preempted task replaced");
                }
                Err(err) => {
                    warn!(
                        task = %child_id,
                        parent = %parent_id,
                        error = %err,
                        "failed to replace preempted task"
                    );
                    if let Some(task) = self.tasks.get_mut(&child_id) {
                        task.status = TaskStatus::Cancel;
                    }
                }
            }
        }
    }

    /// A single-zone task is its own split. A multi-zone task becomes one
    /// child per zone, starting from the preferred start, with the duration
    /// shrunk by the compression percentage.
    fn split(&mut self, parent: Task) -> Vec<TaskId> {
        if parent.zones.len() == 1 {
            return vec![parent.id];
        }
        let mut children = Vec::with_capacity(parent.zones.len());
        for zone in &parent.zones {
            let mut child = parent.clone();
            child.id = Uuid::new_v4();
            child.zones = vec![zone.clone()];
            child.start = parent.preferred_start;
            child.duration = parent.duration * i32::from(100 - parent.compression_pct) / 100;
            child.status = TaskStatus::Wait;
            children.push(child.id);
            self.tasks.put(child);
        }
        children
    }

    /// Put a previously valid placement back after a failed move or extend.
    fn restore_placement(&mut self, task: &Task) {
        match self.plan_all(task) {
            Ok(orders) => self.execute_all(orders),
            Err(err) => {
                warn!(task = %task.id, error = %err, "failed to restore placement; cancelling");
                if let Some(stored) = self.tasks.get_mut(&task.id) {
                    stored.status = TaskStatus::Cancel;
                }
            }
        }
    }
}
