#![doc = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/", "README.md"))]
#![warn(missing_docs)]

/// The public façade: host lifecycle, handler registration, request methods.
pub mod controller;
/// Closed RPC outcome and controller-lifecycle error enums.
pub mod error;
/// Observer traits for host lifecycle and periodic refresh results.
pub mod handler;
/// Mutex-guarded fan-out of notifications to registered observers.
pub mod handler_registry;
/// Per-host worker thread binding a [`client::Client`] to a [`job_queue::JobQueue`].
pub mod host_controller;
/// Per-host job queue feeding its worker thread.
pub mod job_queue;
/// The single shared thread deciding when periodic refreshes are due.
pub mod scheduler;
/// Opaque payload types exchanged with hosts.
pub mod types;

/// Per-host RPC transport.
pub mod connection;

/// One RPC request/response pair per upstream command.
pub mod command;

/// Per-host RPC façade (connect/authorize/execute).
pub mod client;

/// Units of work queued onto a host's worker thread.
pub mod job;

/// Task-interval and per-host scheduling configuration.
pub mod configuration;

pub use command::{FileTransferOp, ProjectOp, TaskOp};
pub use configuration::{Configuration, HostConfiguration};
pub use connection::{Connection, TcpConnection};
pub use controller::{Controller, RequestFuture};
pub use error::{ControllerError, Error, Result};
pub use handler::{HostHandler, PeriodicTaskHandler};
pub use types::{HostId, PeriodicTask};

/// Prelude module: the small set of types most applications need.
pub mod prelude {
    pub use crate::command::{FileTransferOp, ProjectOp, TaskOp};
    pub use crate::configuration::{Configuration, HostConfiguration};
    pub use crate::controller::{Controller, RequestFuture};
    pub use crate::error::{ControllerError, Error, Result};
    pub use crate::handler::{HostHandler, PeriodicTaskHandler};
    pub use crate::types::{HostId, PeriodicTask};
}
