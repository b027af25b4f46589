//! Zone config hot reload.
//!
//! The config file is polled for modification-time changes. On change it is
//! re-parsed and, under the scheduler lock, swapped in followed by a full
//! reschedule. A file that fails to parse leaves the previous configuration
//! in effect.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tracing::{info, warn};

use crate::config::ZoneConfig;
use crate::state::AppState;

/// Poll `path` every `interval` and reload the zone config when it changes.
/// Runs until the process exits.
pub async fn watch_config(state: AppState, path: PathBuf, interval: Duration) {
    let mut last_modified = modified_at(&path);
    loop {
        tokio::time::sleep(interval).await;

        let modified = modified_at(&path);
        if modified == last_modified {
            continue;
        }
        last_modified = modified;
        info!(path = %path.display(), "config file changed");

        let config = match ZoneConfig::load(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "config reload failed; keeping previous configuration");
                continue;
            }
        };

        let mut scheduler = state.scheduler().lock().await;
        match scheduler.update_config(config) {
            Ok(()) => info!("schedule rebuilt"),
            Err(errors) => {
                warn!(dropped = errors.len(), errors = %errors, "rescheduling errors");
            }
        }
    }
}

fn modified_at(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).and_then(|meta| meta.modified()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Durations;
    use crate::scheduler::Scheduler;
    use std::time::Instant;

    fn durations() -> Durations {
        Durations {
            min_auto_duration: Duration::ZERO,
            min_manual_duration: Duration::ZERO,
            max_noncrit_duration: Duration::from_secs(24 * 3600),
            max_crit_duration: Duration::from_secs(48 * 3600),
            deadline_duration: Duration::from_secs(365 * 24 * 3600),
            preferred_manual_start_mult: Duration::ZERO,
            preferred_auto_start_mult: Duration::ZERO,
        }
    }

    async fn wait_for_zone_count(state: &AppState, expected: usize) {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            {
                let scheduler = state.scheduler().lock().await;
                if scheduler.config().whitelist.len() == expected {
                    return;
                }
            }
            assert!(Instant::now() < deadline, "config change never applied");
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    #[tokio::test]
    async fn test_reload_applies_change_and_survives_parse_failure() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "whiteList:\n  alpha: [\"09:00-18:00\"]\n").unwrap();

        let state = AppState::new(
            Scheduler::new(ZoneConfig::load(&path).unwrap()),
            durations(),
        );
        tokio::spawn(watch_config(
            state.clone(),
            path.clone(),
            Duration::from_millis(25),
        ));

        // Coarse filesystems round mtimes to whole seconds.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        std::fs::write(
            &path,
            "whiteList:\n  alpha: [\"09:00-18:00\"]\n  bravo: [\"09:00-18:00\"]\n",
        )
        .unwrap();
        wait_for_zone_count(&state, 2).await;

        // A broken file leaves the previous config in effect.
        tokio::time::sleep(Duration::from_millis(1100)).await;
        std::fs::write(&path, "whiteList: {broken").unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;

        let scheduler = state.scheduler().lock().await;
        assert_eq!(scheduler.config().whitelist.len(), 2);
    }
}
