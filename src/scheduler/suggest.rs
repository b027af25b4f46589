//! Start-time suggestions via dummy-probe placement.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, NaiveTime};
use uuid::Uuid;

use crate::config::DAY_SECONDS;

use super::task::{Task, TaskStatus};
use super::timeline::dedup_sorted;
use super::Scheduler;

impl Scheduler {
    /// Propose a start per requested zone, or `None` when any zone has no
    /// feasible slot before the deadline.
    ///
    /// Candidate starts are the points of interest at or after the task's
    /// current start. Zones are probed in order with a dummy copy of the
    /// task; a successful probe is committed so later zones cannot be
    /// offered the same capacity, and every dummy is wiped before returning.
    /// Suggestions never preempt.
    pub fn suggest(&mut self, task: &Task) -> Option<BTreeMap<String, NaiveDateTime>> {
        let mut additions = vec![task.start];
        for zone in &task.zones {
            additions.push(task.end() + self.config.pause(zone));
        }
        let points = self.points_of_interest(additions);

        let mut suggestions = BTreeMap::new();
        let mut dummies = Vec::new();
        for zone in &task.zones {
            let mut dummy = task.clone();
            dummy.id = Uuid::new_v4();
            dummy.status = TaskStatus::Suggested;
            dummy.zones = vec![zone.clone()];

            for &point in &points {
                if point < task.start {
                    continue;
                }
                if point + task.duration > task.deadline {
                    break;
                }
                dummy.start = point;
                if self.admit(&dummy).is_err() {
                    continue;
                }
                let Ok(mut order) = self.plan(&dummy, zone) else {
                    continue;
                };
                order.preempt.clear();
                self.tasks.put(dummy.clone());
                self.execute(order);
                dummies.push(dummy.id);
                suggestions.insert(zone.clone(), point);
                break;
            }
        }

        for id in &dummies {
            self.wipe(id);
        }

        if suggestions.len() < task.zones.len() {
            return None;
        }
        Some(suggestions)
    }

    /// Candidate instants: every scheduled task's start and pause-extended
    /// end, the explicit additions, and each whitelist window boundary
    /// materialized on every calendar day the span covers.
    fn points_of_interest(&self, additions: Vec<NaiveDateTime>) -> Vec<NaiveDateTime> {
        let mut points = Vec::new();
        for (zone, ids) in self.timelines.view() {
            let pause = self.config.pause(zone);
            for id in ids {
                if let Some(task) = self.tasks.get(id) {
                    points.push(task.start);
                    points.push(task.end() + pause);
                }
            }
        }
        points.extend(additions);
        let mut points = dedup_sorted(points);

        let mut day_marks: Vec<i64> = self
            .config
            .whitelist
            .values()
            .flatten()
            .flat_map(|window| [window.start, window.end])
            .collect();
        day_marks.sort_unstable();
        day_marks.dedup();

        let (Some(&earliest), Some(&latest)) = (points.first(), points.last()) else {
            return points;
        };
        let days = (latest - earliest).num_hours() / 24 + 1;
        let mut day = earliest.date();
        for _ in 0..days {
            day = day.succ_opt().unwrap_or(day);
            for &mark in &day_marks {
                let seconds = (mark % DAY_SECONDS) as u32;
                if let Some(time) = NaiveTime::from_num_seconds_from_midnight_opt(seconds, 0) {
                    points.push(day.and_time(time));
                }
            }
        }

        dedup_sorted(points)
    }
}
