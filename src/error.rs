use std::fmt;

/// Outcome of a single RPC dispatched through a [`crate::client::Client`].
///
/// This is the closed error taxonomy every command, periodic task and
/// async request resolves to on failure. Nothing outside this enum is
/// ever returned from `execute`.
#[derive(thiserror::Error, Debug, Clone)]
pub enum Error {
    /// The host's [`crate::job_queue::JobQueue`] was shut down before the
    /// job could run, or the underlying connection dropped while a
    /// command was in flight.
    #[error("disconnected")]
    Disconnected,
    /// The daemon rejected the request because no (or an invalid)
    /// authorization has been established for this session.
    #[error("unauthorized")]
    Unauthorized,
    /// The connection could not be opened or a read/write failed at the
    /// transport layer.
    #[error("connection error: {0}")]
    ConnectionError(String),
    /// The daemon returned a well-formed but semantically invalid
    /// response (e.g. a documented failure code for the request kind).
    #[error("client error: {0}")]
    ClientError(String),
    /// The response body could not be decoded into the expected type.
    #[error("parsing error: {0}")]
    ParsingError(String),
    /// The request itself was invalid independent of any host (e.g. an
    /// out-of-range parameter), caught before dispatch.
    #[error("logic error: {0}")]
    LogicError(String),
}

impl Error {
    /// Builds a [`Error::ConnectionError`] from any displayable cause.
    pub fn connection<S: fmt::Display>(msg: S) -> Self {
        Error::ConnectionError(msg.to_string())
    }

    /// Builds a [`Error::ClientError`] from any displayable cause.
    pub fn client<S: fmt::Display>(msg: S) -> Self {
        Error::ClientError(msg.to_string())
    }

    /// Builds a [`Error::ParsingError`] from any displayable cause.
    pub fn parsing<S: fmt::Display>(msg: S) -> Self {
        Error::ParsingError(msg.to_string())
    }

    /// Builds a [`Error::LogicError`] from any displayable cause.
    pub fn logic<S: fmt::Display>(msg: S) -> Self {
        Error::LogicError(msg.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::ConnectionError(err.to_string())
    }
}

impl From<oneshot::RecvError> for Error {
    fn from(_err: oneshot::RecvError) -> Self {
        Error::Disconnected
    }
}

/// Result alias for fallible RPC outcomes.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures of the [`crate::controller::Controller`] façade itself, as
/// opposed to failures of an individual RPC against a host.
#[derive(thiserror::Error, Debug, Clone)]
pub enum ControllerError {
    /// The controller has already been shut down; no further requests
    /// can be submitted.
    #[error("controller is shut down")]
    Shutdown,
    /// The given [`crate::types::HostId`] is not known to the controller.
    #[error("unknown host")]
    UnknownHost,
    /// A precondition on one of the call's arguments was violated (e.g.
    /// an empty host name, url, password, or filename). Raised
    /// synchronously, before anything is enqueued.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}
