//! The public façade applications drive: host lifecycle, handler
//! registration, and the full set of request methods.
//!
//! Grounded on the upstream `ui::Controller` interface
//! (`libui/include/woinc/ui/controller.h`). Every request method returns
//! a one-shot future rather than blocking the caller's thread; the
//! actual RPC runs on the owning host's worker thread.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::client::Client;
use crate::command::{
    AttachProjectCommand, Command, FileTransferOp, FileTransferOpCommand, GetAllProjectsListCommand,
    GetCCConfigCommand, GetProjectConfigPollCommand, GetProjectConfigStartCommand,
    LoadGlobalPreferencesCommand, LookupAccountPollCommand, LookupAccountStartCommand,
    NetworkAvailableCommand, ProjectOp, ProjectOpCommand, QuitCommand, ReadConfigFilesCommand,
    ReadGlobalPrefsOverrideCommand, RunBenchmarksCommand, SaveGlobalPreferencesCommand, SetCCConfigCommand,
    SetGpuModeCommand, SetNetworkModeCommand, SetRunModeCommand, TaskOp, TaskOpCommand,
};
use crate::configuration::Configuration;
use crate::connection::TcpConnection;
use crate::error::{ControllerError, Result};
use crate::handler::{HostHandler, PeriodicTaskHandler};
use crate::handler_registry::HandlerRegistry;
use crate::host_controller::HostController;
use crate::job::{AsyncJob, AuthorizationJob, Job, JobKind};
use crate::scheduler::PeriodicTasksScheduler;
use crate::types::*;

/// A caller-held handle to an in-flight async request's result.
pub type RequestFuture<T> = oneshot::Receiver<Result<T>>;

type HostMap = Arc<Mutex<HashMap<HostId, HostController>>>;

/// Drives multiple remote hosts concurrently: one connection and worker
/// thread per host, one shared periodic-task scheduler, fan-out of
/// results to registered observers.
pub struct Controller {
    hosts: HostMap,
    configuration: Configuration,
    registry: Arc<HandlerRegistry>,
    scheduler: PeriodicTasksScheduler,
    shutdown: Arc<AtomicBool>,
}

fn check_non_empty(value: &str, field: &'static str) -> std::result::Result<(), ControllerError> {
    if value.is_empty() {
        Err(ControllerError::InvalidArgument(format!("{field} must not be empty")))
    } else {
        Ok(())
    }
}

impl Controller {
    /// Creates a controller with no hosts yet. Spawns the shared
    /// periodic-task scheduler thread immediately.
    pub fn new() -> Self {
        let configuration = Configuration::new();
        let registry = Arc::new(HandlerRegistry::new());
        let hosts: HostMap = Arc::new(Mutex::new(HashMap::new()));
        let submit_hosts = hosts.clone();
        let scheduler = PeriodicTasksScheduler::spawn(configuration.clone(), registry.clone(), move |host, job| {
            if let Some(controller) = submit_hosts.lock().get(&host) {
                controller.submit(job);
            }
        });
        Self {
            hosts,
            configuration,
            registry,
            scheduler,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Read-only access to the shared task-interval/host-flag configuration.
    pub fn configuration(&self) -> &Configuration {
        &self.configuration
    }

    fn check_not_shut_down(&self) -> std::result::Result<(), ControllerError> {
        if self.shutdown.load(Ordering::Acquire) {
            Err(ControllerError::Shutdown)
        } else {
            Ok(())
        }
    }

    /// Registers a new host named `name`, reachable at `url:port`.
    /// Validates that `name` and `url` are non-empty, synchronously.
    ///
    /// Registration itself is synchronous: the host gets scheduler and
    /// configuration rows, a [`HostController`] is constructed, and every
    /// registered [`HostHandler`] is told `on_host_added` before this
    /// call returns. The network connection, however, is attempted on a
    /// detached thread, which then reports `on_host_connected` or
    /// `on_host_error` -- this call never blocks on network I/O.
    pub fn add_host(&self, name: &str, url: &str, port: u16) -> std::result::Result<HostId, ControllerError> {
        self.check_not_shut_down()?;
        check_non_empty(name, "host name")?;
        check_non_empty(url, "url")?;
        let id = HostId::new(name);
        {
            let mut hosts = self.hosts.lock();
            if hosts.contains_key(&id) {
                return Err(ControllerError::InvalidArgument(format!("host {name:?} already exists")));
            }
            let client = Client::new(Box::new(TcpConnection::new(url, port)), format!("{url}:{port}"));
            hosts.insert(id.clone(), HostController::new(id.clone(), client));
        }
        self.scheduler.add_host(id.clone());
        tracing::debug!(%id, url, port, "host added");
        self.registry.for_each_host_handler(|h| h.on_host_added(id.clone()));

        let hosts = self.hosts.clone();
        let registry = self.registry.clone();
        let connect_id = id.clone();
        std::thread::spawn(move || {
            let connected = hosts.lock().get_mut(&connect_id).map(|c| c.connect()).unwrap_or(false);
            if connected {
                registry.for_each_host_handler(|h| h.on_host_connected(connect_id.clone()));
            } else {
                registry.for_each_host_handler(|h| {
                    h.on_host_error(connect_id.clone(), crate::error::Error::connection("failed to connect"))
                });
            }
        });
        Ok(id)
    }

    /// Shuts down and removes a host synchronously: its job queue is
    /// drained (cancelling anything pending with
    /// [`crate::error::Error::Disconnected`]) and its worker thread
    /// joined before this call returns. Do not call this from within a
    /// [`HostHandler`] callback running on that host's own worker
    /// thread -- use [`Controller::async_remove_host`] there instead.
    pub fn remove_host(&self, host: HostId) {
        self.scheduler.remove_host(host.clone());
        self.configuration.remove_host(host.clone());
        let controller = self.hosts.lock().remove(&host);
        if let Some(mut controller) = controller {
            controller.shutdown();
        }
        self.registry.for_each_host_handler(|h| h.on_host_removed(host.clone()));
    }

    /// Like [`Controller::remove_host`], but never blocks on joining the
    /// host's worker thread -- safe to call from a handler callback
    /// running on that thread, since it detaches the shutdown onto a
    /// fresh thread instead of joining in place.
    pub fn async_remove_host(&self, host: HostId) {
        self.scheduler.remove_host(host.clone());
        self.configuration.remove_host(host.clone());
        let controller = self.hosts.lock().remove(&host);
        let registry = self.registry.clone();
        let removed_id = host.clone();
        std::thread::spawn(move || {
            if let Some(mut controller) = controller {
                controller.shutdown();
            }
            registry.for_each_host_handler(|h| h.on_host_removed(removed_id.clone()));
        });
    }

    /// Enables or disables periodic-task scheduling for `host`. A host
    /// is never refreshed until this is called with `true`.
    pub fn schedule_periodic_tasks(&self, host: HostId, enabled: bool) -> std::result::Result<(), ControllerError> {
        self.with_host(host.clone(), |_| {})?;
        let mut config = self.configuration.host_configuration(host.clone());
        config.schedule_periodic_tasks = enabled;
        self.configuration.set_host_configuration(host, config);
        Ok(())
    }

    /// Restricts the [`PeriodicTask::Tasks`] refresh for `host` to active
    /// tasks only (passed through to the daemon as a request parameter).
    pub fn set_active_only(&self, host: HostId, active_only: bool) -> std::result::Result<(), ControllerError> {
        self.with_host(host.clone(), |_| {})?;
        let mut config = self.configuration.host_configuration(host.clone());
        config.active_only = active_only;
        self.configuration.set_host_configuration(host, config);
        Ok(())
    }

    /// Registers an observer for host lifecycle notifications.
    pub fn register_host_handler(&self, handler: Arc<dyn HostHandler>) {
        self.registry.register_host_handler(handler);
    }

    /// Deregisters a previously registered [`HostHandler`].
    pub fn deregister_host_handler(&self, handler: &Arc<dyn HostHandler>) {
        self.registry.deregister_host_handler(handler);
    }

    /// Registers an observer for periodic refresh results.
    pub fn register_periodic_handler(&self, handler: Arc<dyn PeriodicTaskHandler>) {
        self.registry.register_periodic_handler(handler);
    }

    /// Deregisters a previously registered [`PeriodicTaskHandler`].
    pub fn deregister_periodic_handler(&self, handler: &Arc<dyn PeriodicTaskHandler>) {
        self.registry.deregister_periodic_handler(handler);
    }

    /// Authorizes (or re-authorizes) a host's session. Runs ahead of
    /// anything already queued for the host. On success every
    /// [`HostHandler`] is told `on_host_authorized`; on an `Unauthorized`
    /// outcome, `on_host_authorization_failed`.
    pub fn authorize_host(&self, host: HostId, password: &str) -> std::result::Result<RequestFuture<()>, ControllerError> {
        self.check_not_shut_down()?;
        check_non_empty(password, "password")?;
        let (tx, rx) = oneshot::channel();
        let password_hash = password.to_string();
        let registry = self.registry.clone();
        let notify_id = host.clone();
        let on_result: Box<dyn FnOnce(&Result<()>) + Send> = Box::new(move |result| match result {
            Ok(()) => registry.for_each_host_handler(|h| h.on_host_authorized(notify_id.clone())),
            Err(crate::error::Error::Unauthorized) => {
                registry.for_each_host_handler(|h| h.on_host_authorization_failed(notify_id.clone()))
            }
            Err(_) => {}
        });
        self.with_host(host, move |controller| {
            controller.submit_now(Job::new(JobKind::Authorization(AuthorizationJob::new(
                password_hash,
                tx,
                on_result,
            ))));
        })?;
        Ok(rx)
    }

    fn with_host(&self, host: HostId, f: impl FnOnce(&HostController)) -> std::result::Result<(), ControllerError> {
        self.check_not_shut_down()?;
        let hosts = self.hosts.lock();
        match hosts.get(&host) {
            Some(controller) => {
                f(controller);
                Ok(())
            }
            None => Err(ControllerError::UnknownHost),
        }
    }

    fn submit_async<C: Command>(
        &self,
        host: HostId,
        command: C,
        related_task: Option<PeriodicTask>,
    ) -> std::result::Result<RequestFuture<C::Response>, ControllerError> {
        let (tx, rx) = oneshot::channel();
        self.with_host(host.clone(), move |controller| {
            controller.submit_now(Job::new(JobKind::Async(Box::new(AsyncJob::new(command, tx)))));
        })?;
        if let Some(task) = related_task {
            self.scheduler.reschedule_now(host, task);
        }
        Ok(rx)
    }

    /// Requests a file-transfer operation (retry/abort) on `host`.
    /// Triggers a [`PeriodicTask::FileTransfers`] refresh once it completes.
    pub fn file_transfer_op(
        &self,
        host: HostId,
        project_url: impl Into<String>,
        filename: impl Into<String>,
        op: FileTransferOp,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        let project_url = project_url.into();
        let filename = filename.into();
        check_non_empty(&project_url, "project_url")?;
        check_non_empty(&filename, "filename")?;
        self.submit_async(
            host,
            FileTransferOpCommand { project_url, filename, op },
            Some(PeriodicTask::FileTransfers),
        )
    }

    /// Requests a project-level operation on `host`. Triggers a
    /// [`PeriodicTask::ProjectStatus`] refresh once it completes.
    pub fn project_op(
        &self,
        host: HostId,
        project_url: impl Into<String>,
        op: ProjectOp,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        let project_url = project_url.into();
        check_non_empty(&project_url, "project_url")?;
        self.submit_async(host, ProjectOpCommand { project_url, op }, Some(PeriodicTask::ProjectStatus))
    }

    /// Requests a task-level operation on `host`. Triggers a
    /// [`PeriodicTask::Tasks`] refresh once it completes.
    pub fn task_op(
        &self,
        host: HostId,
        project_url: impl Into<String>,
        task_name: impl Into<String>,
        op: TaskOp,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        let project_url = project_url.into();
        let task_name = task_name.into();
        check_non_empty(&project_url, "project_url")?;
        check_non_empty(&task_name, "task_name")?;
        self.submit_async(
            host,
            TaskOpCommand { project_url, task_name, op },
            Some(PeriodicTask::Tasks),
        )
    }

    /// Requests the client reload global preferences from disk, and
    /// returns the resulting effective preferences.
    pub fn load_global_preferences(&self, host: HostId) -> std::result::Result<RequestFuture<GlobalPreferences>, ControllerError> {
        self.submit_async(host, LoadGlobalPreferencesCommand {}, None)
    }

    /// Persists a global preferences override.
    pub fn save_global_preferences(
        &self,
        host: HostId,
        preferences: GlobalPreferences,
        mask: GlobalPreferencesMask,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, SaveGlobalPreferencesCommand { preferences, mask }, None)
    }

    /// Requests the client re-read its global preferences override file.
    pub fn read_global_preferences_override(&self, host: HostId) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, ReadGlobalPrefsOverrideCommand, None)
    }

    /// Fetches the current cc_config.
    pub fn get_cc_config(&self, host: HostId) -> std::result::Result<RequestFuture<CCConfig>, ControllerError> {
        self.submit_async(host, GetCCConfigCommand {}, None)
    }

    /// Replaces the current cc_config.
    pub fn set_cc_config(
        &self,
        host: HostId,
        config: CCConfig,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, SetCCConfigCommand { config }, None)
    }

    /// Requests the client reread its config files.
    pub fn read_config_files(&self, host: HostId) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, ReadConfigFilesCommand, None)
    }

    /// Sets the overall run mode. Triggers a [`PeriodicTask::CCStatus`]
    /// refresh once it completes.
    pub fn run_mode(
        &self,
        host: HostId,
        mode: i32,
        duration: f64,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, SetRunModeCommand { mode, duration }, Some(PeriodicTask::CCStatus))
    }

    /// Sets the GPU run mode. Triggers a [`PeriodicTask::CCStatus`]
    /// refresh once it completes.
    pub fn gpu_mode(
        &self,
        host: HostId,
        mode: i32,
        duration: f64,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, SetGpuModeCommand { mode, duration }, Some(PeriodicTask::CCStatus))
    }

    /// Sets the network run mode. Triggers a [`PeriodicTask::CCStatus`]
    /// refresh once it completes.
    pub fn network_mode(
        &self,
        host: HostId,
        mode: i32,
        duration: f64,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, SetNetworkModeCommand { mode, duration }, Some(PeriodicTask::CCStatus))
    }

    /// Fetches the all-projects-list feed. Does not require prior
    /// authorization.
    pub fn all_projects_list(&self, host: HostId) -> std::result::Result<RequestFuture<AllProjectsList>, ControllerError> {
        self.submit_async(host, GetAllProjectsListCommand, None)
    }

    /// Begins fetching a project's configuration. Poll with
    /// [`Controller::project_config_poll`].
    pub fn project_config_load(
        &self,
        host: HostId,
        master_url: impl Into<String>,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        let master_url = master_url.into();
        check_non_empty(&master_url, "master_url")?;
        self.submit_async(host, GetProjectConfigStartCommand { master_url }, None)
    }

    /// Polls an in-flight project-config fetch.
    pub fn project_config_poll(
        &self,
        host: HostId,
        master_url: impl Into<String>,
    ) -> std::result::Result<RequestFuture<ProjectConfig>, ControllerError> {
        let master_url = master_url.into();
        check_non_empty(&master_url, "master_url")?;
        self.submit_async(host, GetProjectConfigPollCommand { master_url }, None)
    }

    /// Begins an account lookup against a project. Poll with
    /// [`Controller::account_lookup_poll`].
    pub fn account_lookup_start(
        &self,
        host: HostId,
        master_url: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        let master_url = master_url.into();
        let email = email.into();
        let password_hash = password_hash.into();
        check_non_empty(&master_url, "master_url")?;
        check_non_empty(&email, "email")?;
        check_non_empty(&password_hash, "password_hash")?;
        self.submit_async(
            host,
            LookupAccountStartCommand { master_url, email, password_hash },
            None,
        )
    }

    /// Polls an in-flight account lookup.
    pub fn account_lookup_poll(
        &self,
        host: HostId,
        master_url: impl Into<String>,
    ) -> std::result::Result<RequestFuture<AccountOut>, ControllerError> {
        let master_url = master_url.into();
        check_non_empty(&master_url, "master_url")?;
        self.submit_async(host, LookupAccountPollCommand { master_url }, None)
    }

    /// Attaches the client to a project with an established account.
    /// Triggers a [`PeriodicTask::ProjectStatus`] refresh once it completes.
    pub fn attach_project(
        &self,
        host: HostId,
        master_url: impl Into<String>,
        project_name: impl Into<String>,
        authenticator: impl Into<String>,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        let master_url = master_url.into();
        let project_name = project_name.into();
        let authenticator = authenticator.into();
        check_non_empty(&master_url, "master_url")?;
        check_non_empty(&authenticator, "authenticator")?;
        self.submit_async(
            host,
            AttachProjectCommand { master_url, project_name, authenticator },
            Some(PeriodicTask::ProjectStatus),
        )
    }

    /// Tells the client whether the network is reachable.
    pub fn network_available(
        &self,
        host: HostId,
        available: bool,
    ) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, NetworkAvailableCommand { available }, None)
    }

    /// Requests the client run CPU benchmarks.
    pub fn run_benchmarks(&self, host: HostId) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, RunBenchmarksCommand, None)
    }

    /// Asks the client to quit.
    pub fn quit(&self, host: HostId) -> std::result::Result<RequestFuture<bool>, ControllerError> {
        self.submit_async(host, QuitCommand, None)
    }

    /// Shuts down every host and the scheduler. After this call returns,
    /// every method that looks up a host returns
    /// [`ControllerError::UnknownHost`] (all hosts have been removed),
    /// and further calls of any kind return [`ControllerError::Shutdown`].
    /// Idempotent.
    pub fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::AcqRel) {
            return;
        }
        self.scheduler.shutdown();
        let hosts: Vec<HostController> = self.hosts.lock().drain().map(|(_, c)| c).collect();
        for mut controller in hosts {
            controller.shutdown();
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for Controller {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_host_rejects_empty_name() {
        let controller = Controller::new();
        let err = controller.add_host("", "127.0.0.1", 1).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidArgument(_)));
    }

    #[test]
    fn add_host_rejects_duplicate_name() {
        let controller = Controller::new();
        controller.add_host("h", "127.0.0.1", 1).unwrap();
        let err = controller.add_host("h", "127.0.0.1", 2).unwrap_err();
        assert!(matches!(err, ControllerError::InvalidArgument(_)));
    }

    #[test]
    fn requests_against_an_unknown_host_fail_fast_without_touching_any_worker() {
        let controller = Controller::new();
        let unknown = HostId::new("nope");
        let err = controller.quit(unknown).unwrap_err();
        assert!(matches!(err, ControllerError::UnknownHost));
    }

    #[test]
    fn removed_host_is_unknown_to_later_requests() {
        let controller = Controller::new();
        let host = controller.add_host("h", "127.0.0.1", 1).unwrap();
        controller.remove_host(host.clone());
        let err = controller.quit(host).unwrap_err();
        assert!(matches!(err, ControllerError::UnknownHost));
    }

    #[test]
    fn set_active_only_on_unknown_host_fails() {
        let controller = Controller::new();
        let err = controller.set_active_only(HostId::new("nope"), true).unwrap_err();
        assert!(matches!(err, ControllerError::UnknownHost));
    }

    #[test]
    fn calls_after_shutdown_fail_with_shutdown_error() {
        let mut controller = Controller::new();
        let host = controller.add_host("h", "127.0.0.1", 1).unwrap();
        controller.shutdown();
        let err = controller.quit(host).unwrap_err();
        assert!(matches!(err, ControllerError::Shutdown));
        let err = controller.add_host("h2", "127.0.0.1", 1).unwrap_err();
        assert!(matches!(err, ControllerError::Shutdown));
    }

    #[test]
    fn shutdown_is_idempotent() {
        let mut controller = Controller::new();
        controller.shutdown();
        controller.shutdown();
    }

    #[test]
    fn file_transfer_op_rejects_empty_filename() {
        let controller = Controller::new();
        let host = controller.add_host("h", "127.0.0.1", 1).unwrap();
        let err = controller
            .file_transfer_op(host, "http://example.com/p", "", FileTransferOp::Abort)
            .unwrap_err();
        assert!(matches!(err, ControllerError::InvalidArgument(_)));
    }
}
