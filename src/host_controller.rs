//! Binds one [`Client`] to one [`JobQueue`] and a dedicated worker
//! thread, matching the upstream `HostController` (`host_controller.h`/`.cc`):
//! `connect` opens the network and, only on success, spawns the worker
//! loop `while let Some(job) = job_queue.pop() { job.execute(&mut client) }`.

use std::thread::JoinHandle;

use crate::client::Client;
use crate::job::Job;
use crate::job_queue::JobQueue;
use crate::types::HostId;

/// Owns one host's connection, job queue, and worker thread.
///
/// Lifecycle (spec §3): *constructed* (client held, no worker yet),
/// *connected* (worker thread running), *shut down* (worker joined,
/// client disconnected). There is no distinct *connecting* state exposed
/// here -- [`HostController::connect`] blocks on the network probe and
/// returns the outcome directly; [`crate::controller::Controller::add_host`]
/// is what runs it off the caller's thread.
pub struct HostController {
    id: HostId,
    queue: JobQueue,
    worker: Option<JoinHandle<()>>,
    client: Option<Client>,
}

fn worker_loop(host: HostId, mut client: Client, queue: JobQueue) {
    tracing::debug!(%host, "host worker started");
    while let Some(job) = queue.pop() {
        job.execute(&mut client);
    }
    client.disconnect();
    tracing::debug!(%host, "host worker stopped");
}

impl HostController {
    /// Constructs a controller holding `client`, idle until [`HostController::connect`]
    /// succeeds. No thread is spawned yet.
    pub fn new(id: HostId, client: Client) -> Self {
        Self {
            id,
            queue: JobQueue::new(),
            worker: None,
            client: Some(client),
        }
    }

    /// This host's id.
    pub fn id(&self) -> HostId {
        self.id.clone()
    }

    /// The host's job queue, for submitting jobs (used by
    /// [`crate::controller::Controller`] and the scheduler's injected
    /// submit closure).
    pub fn queue(&self) -> &JobQueue {
        &self.queue
    }

    /// Opens the network connection and, only on success, spawns the
    /// worker thread. Returns `false` and spawns nothing on failure, so
    /// the caller can retry later without having leaked a dead thread.
    /// A no-op returning `true` if the worker is already running.
    pub fn connect(&mut self) -> bool {
        if self.worker.is_some() {
            return true;
        }
        let mut client = match self.client.take() {
            Some(client) => client,
            None => return false,
        };
        if !client.connect() {
            self.client = Some(client);
            return false;
        }
        let worker_queue = self.queue.clone();
        let id = self.id.clone();
        let worker = std::thread::Builder::new()
            .name(format!("daemonctl-host-{id}"))
            .spawn(move || worker_loop(id, client, worker_queue))
            .expect("failed to spawn host worker thread");
        self.worker = Some(worker);
        true
    }

    /// Submits `job`, running it as soon as the worker reaches it.
    pub fn submit(&self, job: Job) {
        self.queue.push_back(job);
    }

    /// Submits `job` ahead of everything already queued.
    pub fn submit_now(&self, job: Job) {
        self.queue.push_front(job);
    }

    /// Shuts down the job queue (cancelling anything still pending) and
    /// joins the worker thread. Idempotent; safe to call more than once,
    /// and safe to call on a host that never successfully connected.
    pub fn shutdown(&mut self) {
        self.queue.shutdown();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                tracing::warn!(host = %self.id, "host worker thread panicked");
            }
        }
    }
}

impl Drop for HostController {
    fn drop(&mut self) {
        self.shutdown();
    }
}
