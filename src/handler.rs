//! Observer traits applications implement to receive periodic refreshes
//! and host lifecycle notifications.
//!
//! Every method has a default no-op body (grounded on the upstream
//! `HostHandler`/`PeriodicTaskHandler` interfaces, which are likewise
//! "implement only what you care about"), so an application only
//! overrides the callbacks it needs.

use crate::error::Error;
use crate::types::*;

/// Receives host-level lifecycle notifications: the six events
/// [`crate::controller::Controller`] raises outside the result of a
/// specific in-flight async request (spec §6).
pub trait HostHandler: Send + Sync {
    /// A host was registered with the controller; its connection attempt
    /// is starting in the background.
    fn on_host_added(&self, _host: HostId) {}
    /// The host's connection was (re-)established.
    fn on_host_connected(&self, _host: HostId) {}
    /// A previously submitted authorization succeeded.
    fn on_host_authorized(&self, _host: HostId) {}
    /// Authorization against the host failed.
    fn on_host_authorization_failed(&self, _host: HostId) {}
    /// Either the connection attempt for a newly added host failed, or a
    /// periodic refresh for this host failed; in the latter case the
    /// scheduler retries at the task's next due instant, it does not
    /// stop scheduling it.
    fn on_host_error(&self, _host: HostId, _error: Error) {}
    /// The host was removed from the controller.
    fn on_host_removed(&self, _host: HostId) {}
}

/// Receives the decoded result of each successful periodic refresh.
///
/// One method per [`PeriodicTask`] kind; implement only the ones you
/// subscribe a host to via [`crate::configuration::Configuration`].
pub trait PeriodicTaskHandler: Send + Sync {
    /// New [`CCStatus`] for `host`.
    fn on_cc_status(&self, _host: HostId, _status: CCStatus) {}
    /// New [`ClientState`] for `host`.
    fn on_client_state(&self, _host: HostId, _state: ClientState) {}
    /// New [`DiskUsage`] for `host`.
    fn on_disk_usage(&self, _host: HostId, _usage: DiskUsage) {}
    /// New [`FileTransfers`] for `host`.
    fn on_file_transfers(&self, _host: HostId, _transfers: FileTransfers) {}
    /// New [`Messages`] for `host`.
    fn on_messages(&self, _host: HostId, _messages: Messages) {}
    /// New [`Notices`] for `host`. `refreshed` is carried through from
    /// the response and is true only when the daemon actually had new
    /// notices to report (as opposed to an empty keep-alive poll).
    fn on_notices(&self, _host: HostId, _notices: Notices, _refreshed: bool) {}
    /// New [`ProjectStatusList`] for `host`.
    fn on_project_status(&self, _host: HostId, _status: ProjectStatusList) {}
    /// New [`Statistics`] for `host`.
    fn on_statistics(&self, _host: HostId, _statistics: Statistics) {}
    /// New [`Tasks`] for `host`.
    fn on_tasks(&self, _host: HostId, _tasks: Tasks) {}
}
