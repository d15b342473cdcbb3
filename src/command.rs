//! One type per RPC request/response pair, grounded directly in the
//! upstream `BOINCCommand<REQUEST, RESPONSE, AUTH>` instantiations.
//!
//! Each concrete command knows how to render its own request body and
//! decode its own response; [`crate::client::Client::execute`] is
//! generic over [`Command`] rather than dispatching on a closed enum, so
//! adding a new RPC never touches the client or job machinery.

use crate::error::{Error, Result};
use crate::types::*;

/// A single RPC: a request payload that can render itself to the wire
/// and a response payload that can parse itself back.
///
/// `requires_authorization` matches the upstream `AUTH` template
/// parameter: some commands (e.g. reading global preferences) may be
/// issued before a session is authorized, most may not.
pub trait Command: Send + 'static {
    /// Type returned to the caller on success.
    type Response: Send + 'static;

    /// Renders this command's request body for [`crate::connection::Connection::transact`].
    fn request_body(&self) -> String;

    /// Parses a response body into [`Command::Response`].
    fn decode_response(&self, body: &str) -> Result<Self::Response>;

    /// Whether this command requires a prior successful [`crate::client::Client::authorize`].
    fn requires_authorization(&self) -> bool {
        true
    }
}

fn fail_if_error_tag(body: &str) -> Result<()> {
    if let Some(msg) = body.strip_prefix("error:") {
        return Err(Error::client(msg.trim()));
    }
    Ok(())
}

/// Generates a zero-field command whose response is a bare success/failure
/// acknowledgement: `Ok(true)` unless the body carries an `error:` tag.
macro_rules! unit_command {
    ($(#[$meta:meta])* $name:ident, $body:literal $(, auth = $auth:literal)?) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Default)]
        pub struct $name;

        impl Command for $name {
            type Response = bool;

            fn request_body(&self) -> String {
                $body.to_string()
            }

            fn decode_response(&self, body: &str) -> Result<bool> {
                fail_if_error_tag(body)?;
                Ok(true)
            }

            $(fn requires_authorization(&self) -> bool { $auth })?
        }
    };
}

/// Generates a command whose request carries `$field: $ty` and whose
/// response is a bare success/failure acknowledgement (no body parsing
/// beyond the `error:` tag check).
macro_rules! typed_command {
    ($(#[$meta:meta])* $name:ident { $($field:ident : $ty:ty),* $(,)? } -> bool, $tag:literal $(, auth = $auth:literal)?) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl Command for $name {
            type Response = bool;

            fn request_body(&self) -> String {
                let mut parts = vec![$tag.to_string()];
                $(parts.push(format!("{}={:?}", stringify!($field), self.$field));)*
                parts.join(" ")
            }

            fn decode_response(&self, body: &str) -> Result<bool> {
                fail_if_error_tag(body)?;
                Ok(true)
            }

            $(fn requires_authorization(&self) -> bool { $auth })?
        }
    };
    // Generates a command whose request carries `$field: $ty` and whose
    // response decodes as `$resp` from a JSON body.
    ($(#[$meta:meta])* $name:ident { $($field:ident : $ty:ty),* $(,)? } -> $resp:ty, $tag:literal $(, auth = $auth:literal)?) => {
        $(#[$meta])*
        #[derive(Debug, Clone)]
        pub struct $name {
            $(pub $field: $ty,)*
        }

        impl Command for $name {
            type Response = $resp;

            fn request_body(&self) -> String {
                let mut parts = vec![$tag.to_string()];
                $(parts.push(format!("{}={:?}", stringify!($field), self.$field));)*
                parts.join(" ")
            }

            fn decode_response(&self, body: &str) -> Result<$resp> {
                fail_if_error_tag(body)?;
                serde_json::from_str(body).map_err(Error::parsing)
            }

            $(fn requires_authorization(&self) -> bool { $auth })?
        }
    };
}

// -- file transfer / project / task operations ----------------------------

/// File transfer operations (retry, abort) as defined by the upstream
/// `FileTransferOp` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileTransferOp {
    /// Retry a stalled transfer.
    Retry,
    /// Abort a transfer.
    Abort,
}

typed_command!(
    /// Perform a file transfer operation on one project/file.
    FileTransferOpCommand {
        project_url: String,
        filename: String,
        op: FileTransferOp,
    } -> bool, "file_transfer_op"
);

/// Project operations (reset, detach, suspend/resume, ...), per the
/// upstream `ProjectOp` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectOp {
    /// Reset all of a project's work.
    Reset,
    /// Detach from the project.
    Detach,
    /// Suspend a project.
    Suspend,
    /// Resume a suspended project.
    Resume,
    /// Allow new tasks for a project.
    AllowMoreWork,
    /// Don't request new tasks for a project.
    NoMoreWork,
}

typed_command!(
    /// Perform a project-level operation.
    ProjectOpCommand {
        project_url: String,
        op: ProjectOp,
    } -> bool, "project_op"
);

/// Task operations (suspend/resume/abort), per the upstream `TaskOp` enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskOp {
    /// Suspend a running/scheduled task.
    Suspend,
    /// Resume a suspended task.
    Resume,
    /// Abort a task permanently.
    Abort,
}

typed_command!(
    /// Perform a task-level operation.
    TaskOpCommand {
        project_url: String,
        task_name: String,
        op: TaskOp,
    } -> bool, "task_op"
);

// -- preferences / cc config -----------------------------------------------

typed_command!(
    /// Request the client reload global preferences from disk and return
    /// the resulting effective preferences.
    LoadGlobalPreferencesCommand {} -> GlobalPreferences, "load_global_preferences"
);

typed_command!(
    /// Persist global preferences overrides.
    SaveGlobalPreferencesCommand {
        preferences: GlobalPreferences,
        mask: GlobalPreferencesMask,
    } -> bool, "save_global_preferences"
);

unit_command!(
    /// Requests the client re-read `global_prefs_override.xml`.
    ReadGlobalPrefsOverrideCommand,
    "read_global_prefs_override"
);

typed_command!(
    /// Fetch the current cc_config.xml content.
    GetCCConfigCommand {} -> CCConfig, "get_cc_config"
);

typed_command!(
    /// Replace the current cc_config.xml content.
    SetCCConfigCommand {
        config: CCConfig,
    } -> bool, "set_cc_config"
);

unit_command!(
    /// Request the client reread its config files.
    ReadConfigFilesCommand,
    "read_cc_config"
);

// -- run/gpu/network mode ---------------------------------------------------

typed_command!(
    /// Set the overall run mode (always/auto/never) with an optional
    /// auto-revert duration.
    SetRunModeCommand {
        mode: i32,
        duration: f64,
    } -> bool, "set_run_mode"
);

typed_command!(
    /// Set the GPU run mode.
    SetGpuModeCommand {
        mode: i32,
        duration: f64,
    } -> bool, "set_gpu_mode"
);

typed_command!(
    /// Set the network run mode.
    SetNetworkModeCommand {
        mode: i32,
        duration: f64,
    } -> bool, "set_network_mode"
);

// -- periodic refreshes -------------------------------------------------------
//
// One command per `PeriodicTask` kind (src/types.rs), issued by the
// scheduler on the host's worker thread.

typed_command!(
    /// Fetch [`CCStatus`].
    GetCCStatusCommand {} -> CCStatus, "get_cc_status"
);

typed_command!(
    /// Fetch a full [`ClientState`] snapshot.
    GetClientStateCommand {} -> ClientState, "get_state"
);

typed_command!(
    /// Fetch [`DiskUsage`].
    GetDiskUsageCommand {} -> DiskUsage, "get_disk_usage"
);

typed_command!(
    /// Fetch in-flight [`FileTransfers`].
    GetFileTransfersCommand {} -> FileTransfers, "get_file_transfers"
);

typed_command!(
    /// Fetch [`Messages`] newer than `seqno`.
    GetMessagesCommand {
        seqno: u32,
    } -> Messages, "get_messages"
);

typed_command!(
    /// Fetch [`Notices`] newer than `seqno`.
    GetNoticesCommand {
        seqno: u32,
    } -> Notices, "get_notices"
);

typed_command!(
    /// Fetch [`ProjectStatusList`].
    GetProjectStatusCommand {} -> ProjectStatusList, "get_project_status"
);

typed_command!(
    /// Fetch [`Statistics`].
    GetStatisticsCommand {} -> Statistics, "get_statistics"
);

typed_command!(
    /// Fetch [`Tasks`], restricted to active tasks only when `active_only`.
    GetTasksCommand {
        active_only: bool,
    } -> Tasks, "get_tasks"
);

// -- project directory / attach ---------------------------------------------

/// Fetch the all-projects-list feed.
#[derive(Debug, Clone, Default)]
pub struct GetAllProjectsListCommand;

impl Command for GetAllProjectsListCommand {
    type Response = AllProjectsList;

    fn request_body(&self) -> String {
        "get_all_projects_list".to_string()
    }

    fn decode_response(&self, body: &str) -> Result<AllProjectsList> {
        fail_if_error_tag(body)?;
        serde_json::from_str(body).map_err(Error::parsing)
    }

    fn requires_authorization(&self) -> bool {
        false
    }
}

typed_command!(
    /// Begin fetching a project's configuration (async, poll to complete).
    GetProjectConfigStartCommand {
        master_url: String,
    } -> bool, "get_project_config", auth = false
);

typed_command!(
    /// Poll the in-flight project-config fetch.
    GetProjectConfigPollCommand {
        master_url: String,
    } -> ProjectConfig, "get_project_config_poll", auth = false
);

typed_command!(
    /// Begin an account lookup against a project (async, poll to complete).
    LookupAccountStartCommand {
        master_url: String,
        email: String,
        password_hash: String,
    } -> bool, "lookup_account", auth = false
);

typed_command!(
    /// Poll the in-flight account lookup.
    LookupAccountPollCommand {
        master_url: String,
    } -> AccountOut, "lookup_account_poll", auth = false
);

typed_command!(
    /// Attach the client to a project with an established account.
    AttachProjectCommand {
        master_url: String,
        project_name: String,
        authenticator: String,
    } -> bool, "project_attach"
);

// -- misc --------------------------------------------------------------------

typed_command!(
    /// Tell the client whether the network is reachable right now.
    NetworkAvailableCommand {
        available: bool,
    } -> bool, "network_available"
);

unit_command!(
    /// Request the client run CPU benchmarks.
    RunBenchmarksCommand,
    "run_benchmarks"
);

unit_command!(
    /// Ask the client to quit.
    QuitCommand,
    "quit"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_transfer_op_command_renders_expected_request_body() {
        let cmd = FileTransferOpCommand {
            project_url: "http://example.com/project".to_string(),
            filename: "a.txt".to_string(),
            op: FileTransferOp::Retry,
        };
        insta::assert_snapshot!(cmd.request_body(), @r###"file_transfer_op project_url="http://example.com/project" filename="a.txt" op=Retry"###);
    }

    #[test]
    fn get_messages_command_renders_seqno_in_request_body() {
        let cmd = GetMessagesCommand { seqno: 42 };
        insta::assert_snapshot!(cmd.request_body(), @"get_messages seqno=42");
    }

    #[test]
    fn fail_if_error_tag_rejects_error_prefixed_body() {
        let err = fail_if_error_tag("error:not authorized").unwrap_err();
        assert!(matches!(err, Error::ClientError(_)));
    }

    #[test]
    fn fail_if_error_tag_accepts_plain_body() {
        assert!(fail_if_error_tag("ok").is_ok());
    }

    #[test]
    fn get_all_projects_list_command_does_not_require_authorization() {
        assert!(!GetAllProjectsListCommand.requires_authorization());
        let op = FileTransferOpCommand {
            project_url: String::new(),
            filename: String::new(),
            op: FileTransferOp::Abort,
        };
        assert!(op.requires_authorization());
    }

    #[test]
    fn typed_unit_response_does_not_attempt_json_parsing() {
        let cmd = NetworkAvailableCommand { available: true };
        assert!(cmd.decode_response("ok").is_ok());
    }

    #[test]
    fn typed_json_response_decodes_payload() {
        let cmd = GetCCStatusCommand {};
        let status = cmd.decode_response(r#"{"network_suspend_reason":0}"#).unwrap();
        assert_eq!(status.network_suspend_reason, 0);
    }
}
