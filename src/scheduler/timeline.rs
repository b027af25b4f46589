//! Interval predicates and per-zone task ordering.

use std::collections::BTreeMap;

use chrono::NaiveDateTime;

use super::task::TaskId;

/// True iff the half-open intervals `[s1, e1)` and `[s2, e2)` share an
/// instant. Total and symmetric.
pub fn overlap<T: PartialOrd + Copy>(s1: T, e1: T, s2: T, e2: T) -> bool {
    if s1 > s2 {
        return overlap(s2, e2, s1, e1);
    }
    e1 > s2
}

/// Unique instants, ascending.
pub fn dedup_sorted(mut points: Vec<NaiveDateTime>) -> Vec<NaiveDateTime> {
    points.sort();
    points.dedup();
    points
}

/// Ordered task ids per zone, kept sorted by task start time.
///
/// The timelines hold ids only; task records live in the store. A zone keeps
/// its entry once created, even when all of its tasks are gone.
#[derive(Debug, Default)]
pub struct ZoneTimelines {
    zones: BTreeMap<String, Vec<TaskId>>,
}

impl ZoneTimelines {
    /// Insert `id` at `index`; at the end of the sequence this appends,
    /// otherwise the tail shifts right.
    pub fn insert(&mut self, zone: &str, index: usize, id: TaskId) {
        let ids = self.zones.entry(zone.to_string()).or_default();
        if index >= ids.len() {
            ids.push(id);
        } else {
            ids.insert(index, id);
        }
    }

    /// Remove `id` from `zone`; no-op when absent.
    pub fn remove(&mut self, zone: &str, id: &TaskId) {
        if let Some(ids) = self.zones.get_mut(zone) {
            if let Some(index) = ids.iter().position(|entry| entry == id) {
                ids.remove(index);
            }
        }
    }

    pub fn index_of(&self, zone: &str, id: &TaskId) -> Option<usize> {
        self.zones.get(zone)?.iter().position(|entry| entry == id)
    }

    pub fn iter(&self, zone: &str) -> impl Iterator<Item = &TaskId> {
        self.zones.get(zone).into_iter().flatten()
    }

    pub fn view(&self) -> &BTreeMap<String, Vec<TaskId>> {
        &self.zones
    }
}
