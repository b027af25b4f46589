//! Admission checks: whitelist windows, blacklist gating and the
//! minimum-free-zones invariant.

use std::collections::BTreeMap;

use chrono::{NaiveDateTime, Timelike};

use crate::config::DAY_SECONDS;

use super::error::ScheduleError;
use super::task::{Task, TaskStatus};
use super::timeline::{dedup_sorted, overlap};
use super::Scheduler;

impl Scheduler {
    /// Gate a task against every zone it requests.
    ///
    /// Checks, per zone: the zone is known; blacklisted zones take only
    /// critical tasks; the task interval, folded to time of day, meets a
    /// whitelist window; and placing the task leaves at least the configured
    /// number of zones entirely free at every instant.
    pub(crate) fn admit(&self, task: &Task) -> Result<(), ScheduleError> {
        let start = task.start;
        let end = task.end();
        let start_of_day = i64::from(start.time().num_seconds_from_midnight());
        let end_of_day = i64::from(end.time().num_seconds_from_midnight());

        for zone in &task.zones {
            let mut known = false;

            if self.config.blacklist.contains(zone) {
                known = true;
                if !task.critical {
                    return Err(ScheduleError::BlacklistedZone(zone.clone()));
                }
            }

            if let Some(windows) = self.config.whitelist.get(zone) {
                known = true;
                // A window wrapping midnight extends past DAY_SECONDS, so the
                // folded interval is also tried shifted one day forward.
                let fits = windows.iter().any(|window| {
                    overlap(start_of_day, end_of_day, window.start, window.end)
                        || overlap(
                            start_of_day + DAY_SECONDS,
                            end_of_day + DAY_SECONDS,
                            window.start,
                            window.end,
                        )
                });
                if !fits {
                    return Err(ScheduleError::OutsideWindow(zone.clone()));
                }
            }

            if !known {
                return Err(ScheduleError::UnknownZone(zone.clone()));
            }

            let unavailable =
                self.unavailable_zones(task.zones.len(), zone, task.priority, start, end);
            if (self.config.whitelist.len() as i64) - (unavailable as i64)
                < self.config.available_zones as i64
            {
                return Err(ScheduleError::InsufficientFreeZones {
                    required: self.config.available_zones,
                });
            }
        }

        Ok(())
    }

    /// Peak number of zones unavailable over `[start, end)` if a task of
    /// `priority` claiming `claimed` zones were placed.
    ///
    /// Every other whitelisted zone contributes its tasks of equal or higher
    /// priority that overlap the interval. The interval is segmented at each
    /// contributing boundary falling inside it and the peak is the largest
    /// per-segment count of busy zones, so the invariant is judged at the
    /// tightest instant.
    fn unavailable_zones(
        &self,
        claimed: usize,
        zone: &str,
        priority: u8,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> usize {
        let mut boundaries = Vec::new();
        let mut busy: BTreeMap<&str, Vec<(NaiveDateTime, NaiveDateTime)>> = BTreeMap::new();

        for (other, ids) in self.timelines.view() {
            if other == zone || !self.config.whitelist.contains_key(other) {
                continue;
            }
            for id in ids {
                let Some(scheduled) = self.tasks.get(id) else {
                    continue;
                };
                if scheduled.priority > priority || scheduled.status == TaskStatus::Cancel {
                    continue;
                }
                let sched_start = scheduled.start;
                let sched_end = scheduled.end();
                if !overlap(sched_start, sched_end, start, end) {
                    continue;
                }
                if sched_start > start && sched_start < end {
                    boundaries.push(sched_start);
                }
                if sched_end > start && sched_end < end {
                    boundaries.push(sched_end);
                }
                busy.entry(other.as_str())
                    .or_default()
                    .push((sched_start, sched_end));
            }
        }

        let boundaries = dedup_sorted(boundaries);
        let mut peak = 0usize;
        let mut segment_start = start;
        for segment_end in boundaries.into_iter().chain(std::iter::once(end)) {
            let count = busy
                .values()
                .filter(|intervals| {
                    intervals
                        .iter()
                        .any(|&(s, e)| overlap(segment_start, segment_end, s, e))
                })
                .count();
            peak = peak.max(count);
            segment_start = segment_end;
        }

        claimed + peak
    }
}
