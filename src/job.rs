//! Units of work dispatched onto a host's [`crate::job_queue::JobQueue`]
//! and executed on that host's single worker thread.
//!
//! The upstream design has a small class hierarchy (`Job`, `PeriodicJob`,
//! `AuthorizationJob`, `AsyncJob<RESULT>`). Rust prefers a tagged enum
//! over a hierarchy here (spec §9 Design Notes), so [`JobKind`] plays
//! that role; the one place a trait object still earns its keep is
//! [`AsyncExecutable`], because an async job's `Result` type varies per
//! command and the queue needs to hold heterogeneous pending jobs.

use crate::client::Client;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::types::PeriodicTask;

/// Runs on the worker thread after a [`Job`] completes, win or lose.
///
/// Used by the scheduler to record `last_execution` bookkeeping without
/// making the worker thread call back into the scheduler's internals
/// directly.
pub type PostExecuteHook = Box<dyn FnOnce() + Send>;

/// An async command: renders a request, sends the typed result to the
/// caller's future, and can resolve that future with [`Error::Disconnected`]
/// if the queue is shut down before the job runs.
pub trait AsyncExecutable: Send {
    /// Executes the command against `client` and resolves the caller's future.
    fn execute(self: Box<Self>, client: &mut Client);
    /// Resolves the caller's future with [`Error::Disconnected`] without
    /// ever touching a client.
    fn cancel(self: Box<Self>);
}

/// One pending async command plus the sink its result is delivered to.
pub struct AsyncJob<C: Command> {
    command: C,
    sink: oneshot::Sender<Result<C::Response>>,
}

impl<C: Command> AsyncJob<C> {
    /// Pairs a command with its result sink.
    pub fn new(command: C, sink: oneshot::Sender<Result<C::Response>>) -> Self {
        Self { command, sink }
    }
}

impl<C: Command> AsyncExecutable for AsyncJob<C> {
    fn execute(self: Box<Self>, client: &mut Client) {
        let result = client.execute(&self.command);
        let _ = self.sink.send(result);
    }

    fn cancel(self: Box<Self>) {
        let _ = self.sink.send(Err(Error::Disconnected));
    }
}

/// A one-shot authorization attempt, submitted ahead of ordinary jobs
/// so it runs before anything depending on an authorized session.
pub struct AuthorizationJob {
    password_hash: String,
    sink: oneshot::Sender<Result<()>>,
    on_result: Box<dyn FnOnce(&Result<()>) + Send>,
}

impl AuthorizationJob {
    /// Pairs a password hash with the result sink for the caller's
    /// future, plus a callback run with the outcome before the sink is
    /// resolved -- used by [`crate::controller::Controller`] to raise
    /// `on_host_authorized`/`on_host_authorization_failed`.
    pub fn new(
        password_hash: String,
        sink: oneshot::Sender<Result<()>>,
        on_result: Box<dyn FnOnce(&Result<()>) + Send>,
    ) -> Self {
        Self {
            password_hash,
            sink,
            on_result,
        }
    }

    fn execute(self, client: &mut Client) {
        let result = client.authorize(&self.password_hash);
        (self.on_result)(&result);
        let _ = self.sink.send(result);
    }

    fn cancel(self) {
        let result = Err(Error::Disconnected);
        (self.on_result)(&result);
        let _ = self.sink.send(result);
    }
}

/// A refresh of one [`PeriodicTask`] kind for a host.
///
/// The runner closure is built by [`crate::scheduler::PeriodicTasksScheduler`]
/// at schedule time: it captures the host id, a handle to the
/// [`crate::handler_registry::HandlerRegistry`] and to
/// [`crate::configuration::Configuration`] for seqno bookkeeping, and
/// fans the decoded result out to registered `on_host_*` callbacks
/// itself, so `Job`/`JobQueue` stay ignorant of handler plumbing.
pub struct PeriodicJob {
    /// Which periodic refresh this job performs.
    pub task: PeriodicTask,
    runner: Box<dyn FnOnce(&mut Client) + Send>,
}

impl PeriodicJob {
    /// Builds a periodic job from its task kind and execution closure.
    pub fn new(task: PeriodicTask, runner: Box<dyn FnOnce(&mut Client) + Send>) -> Self {
        Self { task, runner }
    }

    fn execute(self, client: &mut Client) {
        (self.runner)(client);
    }
}

/// The kind of work one [`Job`] carries.
pub enum JobKind {
    /// Authorize (or re-authorize) the host's session.
    Authorization(AuthorizationJob),
    /// Refresh one periodic task kind.
    Periodic(PeriodicJob),
    /// An arbitrary async command issued by the application.
    Async(Box<dyn AsyncExecutable>),
}

/// A queued unit of work plus an optional post-execution hook.
pub struct Job {
    kind: JobKind,
    post_execute: Option<PostExecuteHook>,
}

impl Job {
    /// Wraps a job kind with no post-execution hook.
    pub fn new(kind: JobKind) -> Self {
        Self {
            kind,
            post_execute: None,
        }
    }

    /// Wraps a job kind with a post-execution hook run after `execute`
    /// returns, regardless of outcome.
    pub fn with_post_execute(kind: JobKind, hook: PostExecuteHook) -> Self {
        Self {
            kind,
            post_execute: Some(hook),
        }
    }

    /// Runs this job against `client`, then its post-execution hook if any.
    pub fn execute(self, client: &mut Client) {
        match self.kind {
            JobKind::Authorization(job) => job.execute(client),
            JobKind::Periodic(job) => job.execute(client),
            JobKind::Async(job) => job.execute(client),
        }
        if let Some(hook) = self.post_execute {
            hook();
        }
    }

    /// Resolves this job's result sink with [`Error::Disconnected`]
    /// without running it, then still invokes the post-execution hook
    /// so scheduler bookkeeping stays consistent after a shutdown drain.
    pub fn cancel(self) {
        match self.kind {
            JobKind::Authorization(job) => job.cancel(),
            JobKind::Periodic(_) => {}
            JobKind::Async(job) => job.cancel(),
        }
        if let Some(hook) = self.post_execute {
            hook();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::QuitCommand;
    use crate::connection::Connection;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct AlwaysOkConnection;

    impl Connection for AlwaysOkConnection {
        fn connect(&mut self) -> std::io::Result<()> {
            Ok(())
        }
        fn transact(&mut self, _request: &str) -> std::io::Result<String> {
            Ok("ok".to_string())
        }
        fn disconnect(&mut self) {}
        fn is_connected(&self) -> bool {
            true
        }
    }

    fn authorized_client() -> Client {
        let mut client = Client::new(Box::new(AlwaysOkConnection), "h");
        client.connect();
        client.authorize("hash").unwrap();
        client
    }

    #[test]
    fn async_job_cancel_resolves_sink_with_disconnected() {
        let (tx, rx) = oneshot::channel();
        let job: Box<dyn AsyncExecutable> = Box::new(AsyncJob::new(QuitCommand, tx));
        job.cancel();
        assert!(matches!(rx.recv(), Ok(Err(Error::Disconnected))));
    }

    #[test]
    fn async_job_execute_resolves_sink_with_command_result() {
        let mut client = authorized_client();
        let (tx, rx) = oneshot::channel();
        let job: Box<dyn AsyncExecutable> = Box::new(AsyncJob::new(QuitCommand, tx));
        job.execute(&mut client);
        assert!(matches!(rx.recv(), Ok(Ok(true))));
    }

    #[test]
    fn authorization_job_cancel_resolves_sink_with_disconnected() {
        let (tx, rx) = oneshot::channel();
        let job = AuthorizationJob::new("hash".to_string(), tx, Box::new(|_| {}));
        job.cancel();
        assert!(matches!(rx.recv(), Ok(Err(Error::Disconnected))));
    }

    #[test]
    fn job_execute_runs_post_execute_hook_exactly_once() {
        let mut client = authorized_client();
        let (tx, _rx) = oneshot::channel();
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let hook_calls_clone = hook_calls.clone();
        let job = Job::with_post_execute(
            JobKind::Async(Box::new(AsyncJob::new(QuitCommand, tx))),
            Box::new(move || {
                hook_calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        job.execute(&mut client);
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn job_cancel_runs_post_execute_hook_and_resolves_sink() {
        let (tx, rx) = oneshot::channel();
        let hook_calls = Arc::new(AtomicUsize::new(0));
        let hook_calls_clone = hook_calls.clone();
        let job = Job::with_post_execute(
            JobKind::Async(Box::new(AsyncJob::new(QuitCommand, tx))),
            Box::new(move || {
                hook_calls_clone.fetch_add(1, Ordering::SeqCst);
            }),
        );
        job.cancel();
        assert_eq!(hook_calls.load(Ordering::SeqCst), 1);
        assert!(matches!(rx.recv(), Ok(Err(Error::Disconnected))));
    }
}
