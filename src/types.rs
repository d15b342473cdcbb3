//! Opaque payload types carried between hosts and application observers.
//!
//! The wire format and the full BOINC data model are out of scope for
//! this crate (see spec §1); these types exist only so the public API
//! has something concrete to name. Fields are a representative subset
//! of the upstream model, not an exhaustive transcription.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifies one configured remote host: a non-empty name chosen by the
/// caller at [`crate::controller::Controller::add_host`] time, unique
/// within that controller for as long as the host is registered.
///
/// Cheap to clone (an `Arc<str>` handle); remains valid until
/// `remove_host`, after which the same name may be reused for a
/// completely fresh host (spec: fresh scheduler state, seqnos reset).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HostId(pub(crate) std::sync::Arc<str>);

impl HostId {
    /// Wraps `name` as a host id. Does not validate non-emptiness itself;
    /// callers that accept a name from an application (`add_host`) must
    /// reject an empty string before constructing one.
    pub(crate) fn new(name: impl AsRef<str>) -> Self {
        Self(std::sync::Arc::from(name.as_ref()))
    }

    /// The host name this id was created from.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HostId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kinds of periodic refresh a host can subscribe to.
///
/// Mirrors the upstream `ui::PeriodicTask` enum one-to-one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PeriodicTask {
    /// CC status (run mode, network state, suspend reasons).
    CCStatus,
    /// Full client state snapshot (projects, apps, tasks, app versions).
    ClientState,
    /// Disk usage per project.
    DiskUsage,
    /// In-flight file transfers.
    FileTransfers,
    /// Notice-board messages.
    Messages,
    /// Client notices.
    Notices,
    /// Per-project status.
    ProjectStatus,
    /// Host-wide statistics.
    Statistics,
    /// Scheduled/running tasks.
    Tasks,
}

impl PeriodicTask {
    /// All known periodic task kinds, in a stable order.
    pub const ALL: [PeriodicTask; 9] = [
        PeriodicTask::CCStatus,
        PeriodicTask::ClientState,
        PeriodicTask::DiskUsage,
        PeriodicTask::FileTransfers,
        PeriodicTask::Messages,
        PeriodicTask::Notices,
        PeriodicTask::ProjectStatus,
        PeriodicTask::Statistics,
        PeriodicTask::Tasks,
    ];
}

macro_rules! payload {
    ($(#[$meta:meta])* $name:ident { $($(#[$fmeta:meta])* $field:ident : $ty:ty),* $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            $($(#[$fmeta])* pub $field: $ty,)*
        }
    };
}

payload!(
    /// CC (core client) status: run mode, network mode, suspend reasons.
    CCStatus {
        run_mode: i32,
        gpu_mode: i32,
        network_mode: i32,
        task_suspend_reason: i32,
        network_suspend_reason: i32,
    }
);

payload!(
    /// One project as seen in a full client-state snapshot.
    Project {
        master_url: String,
        project_name: String,
        user_name: String,
        suspended_via_gui: bool,
    }
);

payload!(
    /// Full client-state snapshot.
    ClientState {
        projects: Vec<Project>,
    }
);

payload!(
    /// Disk usage for one project.
    ProjectDiskUsage {
        master_url: String,
        disk_usage: f64,
    }
);

payload!(
    /// Disk usage across all known projects.
    DiskUsage {
        total: f64,
        projects: Vec<ProjectDiskUsage>,
    }
);

payload!(
    /// One in-flight file transfer.
    FileTransfer {
        project_url: String,
        filename: String,
        bytes_xferred: f64,
        nbytes: f64,
        is_upload: bool,
    }
);

payload!(
    /// All in-flight file transfers.
    FileTransfers {
        transfers: Vec<FileTransfer>,
    }
);

payload!(
    /// A single notice-board message.
    Message {
        seqno: u32,
        project: String,
        body: String,
    }
);

payload!(
    /// A batch of notice-board messages with the highest seqno seen.
    Messages {
        msgs: Vec<Message>,
    }
);

payload!(
    /// A single client notice.
    Notice {
        seqno: u32,
        title: String,
        description: String,
    }
);

payload!(
    /// A batch of client notices with the highest seqno seen.
    Notices {
        notices: Vec<Notice>,
        /// Whether the daemon reports having had new notices to send
        /// (vs. an empty keep-alive poll). Carried through to
        /// [`crate::handler::PeriodicTaskHandler::on_notices`].
        refreshed: bool,
    }
);

payload!(
    /// Status of one project (subset of [`ClientState`]'s project view).
    ProjectStatus {
        master_url: String,
        attached_via_acct_mgr: bool,
        suspended_via_gui: bool,
    }
);

payload!(
    /// Per-project status, as refreshed by [`PeriodicTask::ProjectStatus`].
    ProjectStatusList {
        projects: Vec<ProjectStatus>,
    }
);

payload!(
    /// Host-wide statistics sample.
    Statistics {
        host_total_credit: f64,
        host_expavg_credit: f64,
    }
);

payload!(
    /// One scheduled or running task.
    Task {
        project_url: String,
        name: String,
        state: i32,
        fraction_done: f64,
    }
);

payload!(
    /// All scheduled/running tasks.
    Tasks {
        tasks: Vec<Task>,
    }
);

payload!(
    /// Static host information (CPU, memory, OS).
    HostInfo {
        domain_name: String,
        p_vendor: String,
        os_name: String,
        os_version: String,
        m_nbytes: f64,
        p_ncpus: i32,
    }
);

payload!(
    /// Global compute preferences.
    GlobalPreferences {
        run_on_batteries: bool,
        max_cpus_pct: f64,
        disk_max_used_gb: f64,
    }
);

payload!(
    /// Field-presence mask accompanying a [`GlobalPreferences`] update.
    GlobalPreferencesMask {
        run_on_batteries: bool,
        max_cpus_pct: bool,
        disk_max_used_gb: bool,
    }
);

payload!(
    /// Core client configuration (log flags, proxy info).
    CCConfig {
        proxy_server: String,
        log_flags: Vec<String>,
    }
);

payload!(
    /// A project entry from the all-projects-list feed.
    ProjectListEntry {
        name: String,
        url: String,
        general_area: String,
    }
);

payload!(
    /// The full all-projects-list feed.
    AllProjectsList {
        projects: Vec<ProjectListEntry>,
    }
);

payload!(
    /// Project-specific configuration served before account lookup/attach.
    ProjectConfig {
        name: String,
        master_url: String,
        min_passwd_length: i32,
        uses_username: bool,
    }
);

payload!(
    /// Outcome of an account lookup.
    AccountOut {
        authenticator: String,
        error_msg: String,
    }
);
