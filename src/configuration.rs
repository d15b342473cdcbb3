//! Per-task refresh intervals and per-host scheduling flags.
//!
//! Grounded on the upstream `Configuration` (`configuration.h`/`.cc`):
//! a fixed table of default intervals indexed by [`PeriodicTask`], and a
//! per-host override of "run periodic tasks at all" / "only while the
//! UI considers the host active".

use std::collections::HashMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::types::{HostId, PeriodicTask};

/// Default refresh interval for each [`PeriodicTask`] kind, matching the
/// upstream `Configuration::Intervals` defaults exactly.
fn default_interval(task: PeriodicTask) -> Duration {
    match task {
        PeriodicTask::CCStatus => Duration::from_secs(1),
        PeriodicTask::ClientState => Duration::from_secs(3600),
        PeriodicTask::DiskUsage => Duration::from_secs(60),
        PeriodicTask::FileTransfers => Duration::from_secs(1),
        PeriodicTask::Messages => Duration::from_secs(1),
        PeriodicTask::Notices => Duration::from_secs(60),
        PeriodicTask::ProjectStatus => Duration::from_secs(1),
        PeriodicTask::Statistics => Duration::from_secs(60),
        PeriodicTask::Tasks => Duration::from_secs(1),
    }
}

/// Per-host scheduling flags.
#[derive(Debug, Clone, Copy)]
pub struct HostConfiguration {
    /// Whether the scheduler runs periodic tasks for this host at all.
    pub schedule_periodic_tasks: bool,
    /// Whether periodic tasks should only run while the application
    /// considers this host "active" (e.g. visible in the UI).
    pub active_only: bool,
}

impl Default for HostConfiguration {
    fn default() -> Self {
        Self {
            schedule_periodic_tasks: false,
            active_only: false,
        }
    }
}

struct Inner {
    intervals: HashMap<PeriodicTask, Duration>,
    hosts: HashMap<HostId, HostConfiguration>,
}

/// Shared, mutex-guarded configuration consulted by the scheduler on
/// every wake-up. Cheap to clone; clones share the same state.
#[derive(Clone)]
pub struct Configuration {
    inner: std::sync::Arc<Mutex<Inner>>,
}

impl Configuration {
    /// Creates a configuration with upstream-default intervals and no
    /// host overrides yet.
    pub fn new() -> Self {
        let intervals = PeriodicTask::ALL
            .iter()
            .map(|&task| (task, default_interval(task)))
            .collect();
        Self {
            inner: std::sync::Arc::new(Mutex::new(Inner {
                intervals,
                hosts: HashMap::new(),
            })),
        }
    }

    /// Current refresh interval for `task`.
    pub fn interval(&self, task: PeriodicTask) -> Duration {
        self.inner.lock().intervals[&task]
    }

    /// Overrides the refresh interval for `task`.
    pub fn set_interval(&self, task: PeriodicTask, interval: Duration) {
        self.inner.lock().intervals.insert(task, interval);
    }

    /// The smallest configured interval across all task kinds; used by
    /// the scheduler to bound how long it may sleep between checks.
    pub fn min_interval(&self) -> Duration {
        self.inner
            .lock()
            .intervals
            .values()
            .copied()
            .min()
            .unwrap_or(Duration::from_secs(1))
    }

    /// Per-host scheduling flags, defaulted if the host has none set yet.
    pub fn host_configuration(&self, host: HostId) -> HostConfiguration {
        self.inner
            .lock()
            .hosts
            .get(&host)
            .copied()
            .unwrap_or_default()
    }

    /// Replaces the scheduling flags for `host`.
    pub fn set_host_configuration(&self, host: HostId, config: HostConfiguration) {
        self.inner.lock().hosts.insert(host, config);
    }

    /// Drops a host's configuration entry (called when a host is removed).
    pub fn remove_host(&self, host: HostId) {
        self.inner.lock().hosts.remove(&host);
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_intervals_match_upstream() {
        let config = Configuration::new();
        assert_eq!(config.interval(PeriodicTask::CCStatus), Duration::from_secs(1));
        assert_eq!(config.interval(PeriodicTask::ClientState), Duration::from_secs(3600));
        assert_eq!(config.interval(PeriodicTask::DiskUsage), Duration::from_secs(60));
        assert_eq!(config.interval(PeriodicTask::FileTransfers), Duration::from_secs(1));
        assert_eq!(config.interval(PeriodicTask::Messages), Duration::from_secs(1));
        assert_eq!(config.interval(PeriodicTask::Notices), Duration::from_secs(60));
        assert_eq!(config.interval(PeriodicTask::ProjectStatus), Duration::from_secs(1));
        assert_eq!(config.interval(PeriodicTask::Statistics), Duration::from_secs(60));
        assert_eq!(config.interval(PeriodicTask::Tasks), Duration::from_secs(1));
    }

    #[test]
    fn min_interval_tracks_overrides() {
        let config = Configuration::new();
        assert_eq!(config.min_interval(), Duration::from_secs(1));
        config.set_interval(PeriodicTask::FileTransfers, Duration::from_millis(100));
        assert_eq!(config.min_interval(), Duration::from_millis(100));
    }

    #[test]
    fn host_configuration_defaults_then_can_be_overridden() {
        let config = Configuration::new();
        let host = HostId::new("h7");
        let default = config.host_configuration(host.clone());
        assert!(!default.schedule_periodic_tasks);
        assert!(!default.active_only);
        config.set_host_configuration(
            host.clone(),
            HostConfiguration {
                schedule_periodic_tasks: false,
                active_only: true,
            },
        );
        let updated = config.host_configuration(host);
        assert!(!updated.schedule_periodic_tasks);
        assert!(updated.active_only);
    }
}
