//! Multi-zone task scheduler.
//!
//! Tasks run across one or more named zones at once. Admission checks each
//! zone's daily whitelist windows, the blacklist (critical tasks only), and
//! a floor on how many zones must stay entirely free at every instant.
//! Overlaps resolve by priority: critical, then manual, then auto. A
//! preempted task is split per zone, optionally compressed, and offered the
//! next feasible slot. The zone configuration hot-reloads; every known task
//! is then re-admitted from scratch.
//!
//! The HTTP layer is a thin wrapper: all state lives in one [`Scheduler`]
//! value behind a single lock.

pub mod api;
pub mod config;
pub mod scheduler;
pub mod state;
pub mod watch;

pub use config::{ConfigError, Durations, ZoneConfig};
pub use scheduler::{RescheduleErrors, ScheduleError, Scheduler, Task, TaskKind, TaskStatus};
pub use state::AppState;
