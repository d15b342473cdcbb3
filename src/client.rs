//! Per-host RPC façade. A [`Client`] owns exactly one [`Connection`] and
//! is driven exclusively from its host's worker thread — it carries no
//! internal locking of its own.

use crate::command::Command;
use crate::connection::Connection;
use crate::error::{Error, Result};

/// Authentication state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No authorization attempt has succeeded yet.
    Unauthorized,
    /// The last `authorize` call against this connection succeeded.
    Authorized,
}

/// Drives RPCs against one remote daemon over one [`Connection`].
///
/// Not `Sync`: a `Client` is owned by a single [`crate::host_controller::HostController`]
/// and only ever touched from that host's worker thread. Mirrors the
/// upstream `Client` (`client.h`/`.cc`) exactly: a `connected_` flag
/// driven only by `connect`/`disconnect`, and `execute` refusing to
/// touch the transport at all while it is false (spec §4.1).
pub struct Client {
    host: String,
    connection: Box<dyn Connection>,
    connected: bool,
    auth_state: AuthState,
}

impl Client {
    /// Creates a client bound to the given transport. No network I/O
    /// happens until [`Client::connect`]. `host` is a display label only
    /// (e.g. `"host:port"`); the transport already knows where to dial.
    pub fn new(connection: Box<dyn Connection>, host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            connection,
            connected: false,
            auth_state: AuthState::Unauthorized,
        }
    }

    /// The `host:port` label this client was constructed with.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Current authorization state.
    pub fn auth_state(&self) -> AuthState {
        self.auth_state
    }

    /// Opens the underlying transport. Returns `true` on success; on
    /// failure the client remains disconnected and nothing is spawned by
    /// [`crate::host_controller::HostController::connect`].
    pub fn connect(&mut self) -> bool {
        self.connected = self.connection.connect().is_ok();
        self.connected
    }

    /// Authorizes this session using a password hash computed by the
    /// application. Fails with [`Error::Disconnected`] without touching
    /// the transport if not currently connected.
    pub fn authorize(&mut self, password_hash: &str) -> Result<()> {
        if !self.connected {
            return Err(Error::Disconnected);
        }
        let body = self
            .connection
            .transact(&format!("authorize password_hash={password_hash:?}"))?;
        if let Some(msg) = body.strip_prefix("error:") {
            tracing::debug!(detail = msg, "authorization rejected");
            self.auth_state = AuthState::Unauthorized;
            return Err(Error::Unauthorized);
        }
        self.auth_state = AuthState::Authorized;
        Ok(())
    }

    /// Drops the underlying connection. Idempotent. A fresh [`Client::connect`]
    /// is required before `execute`/`authorize` will touch the transport again.
    pub fn disconnect(&mut self) {
        if self.connected {
            self.connection.disconnect();
            self.connected = false;
        }
        self.auth_state = AuthState::Unauthorized;
    }

    /// True once [`Client::connect`] has succeeded and no `disconnect`
    /// has followed it.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Executes one [`Command`] against the connected transport.
    ///
    /// Fails fast with [`Error::Disconnected`] without touching the
    /// transport if not connected (spec §4.1), and with
    /// [`Error::Unauthorized`] without touching the transport if the
    /// command requires a prior successful [`Client::authorize`] that
    /// hasn't happened yet -- this client never re-authorizes itself
    /// implicitly; that is the application's job via a dedicated
    /// authorization [`crate::job::Job`].
    pub fn execute<C: Command>(&mut self, command: &C) -> Result<C::Response> {
        if !self.connected {
            return Err(Error::Disconnected);
        }
        if command.requires_authorization() && self.auth_state != AuthState::Authorized {
            return Err(Error::Unauthorized);
        }
        let body = self.connection.transact(&command.request_body())?;
        command.decode_response(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::QuitCommand;

    struct FakeConnection {
        connected: bool,
        scripted_responses: Vec<&'static str>,
        requests: Vec<String>,
    }

    impl FakeConnection {
        fn new(scripted_responses: Vec<&'static str>) -> Self {
            Self {
                connected: false,
                scripted_responses,
                requests: Vec::new(),
            }
        }
    }

    impl Connection for FakeConnection {
        fn connect(&mut self) -> std::io::Result<()> {
            self.connected = true;
            Ok(())
        }

        fn transact(&mut self, request: &str) -> std::io::Result<String> {
            self.connected = true;
            self.requests.push(request.to_string());
            if self.scripted_responses.is_empty() {
                return Err(std::io::Error::new(std::io::ErrorKind::Other, "no scripted response"));
            }
            Ok(self.scripted_responses.remove(0).to_string())
        }

        fn disconnect(&mut self) {
            self.connected = false;
        }

        fn is_connected(&self) -> bool {
            self.connected
        }
    }

    #[test]
    fn authorize_success_flips_auth_state() {
        let mut client = Client::new(Box::new(FakeConnection::new(vec!["ok"])), "h");
        client.connect();
        assert_eq!(client.auth_state(), AuthState::Unauthorized);
        client.authorize("hash").unwrap();
        assert_eq!(client.auth_state(), AuthState::Authorized);
    }

    #[test]
    fn authorize_failure_reports_unauthorized_and_keeps_state_unauthorized() {
        let mut client = Client::new(Box::new(FakeConnection::new(vec!["error:bad hash"])), "h");
        client.connect();
        let err = client.authorize("hash").unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
        assert_eq!(client.auth_state(), AuthState::Unauthorized);
    }

    #[test]
    fn authorize_while_disconnected_fails_without_touching_transport() {
        let mut client = Client::new(Box::new(FakeConnection::new(vec!["ok"])), "h");
        let err = client.authorize("hash").unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }

    #[test]
    fn execute_while_disconnected_fails_without_touching_transport() {
        let mut client = Client::new(Box::new(FakeConnection::new(vec!["ok"])), "h");
        let err = client.execute(&QuitCommand).unwrap_err();
        assert!(matches!(err, Error::Disconnected));
        assert!(!client.is_connected());
    }

    #[test]
    fn execute_without_prior_authorization_fails_with_unauthorized() {
        let mut client = Client::new(Box::new(FakeConnection::new(vec!["ok"])), "h");
        client.connect();
        let err = client.execute(&QuitCommand).unwrap_err();
        assert!(matches!(err, Error::Unauthorized));
    }

    #[test]
    fn execute_does_not_implicitly_reauthorize_after_disconnect() {
        let mut client = Client::new(Box::new(FakeConnection::new(vec!["ok", "ok"])), "h");
        client.connect();
        client.authorize("hash").unwrap();
        client.disconnect();
        assert_eq!(client.auth_state(), AuthState::Unauthorized);
        let err = client.execute(&QuitCommand).unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }

    #[test]
    fn commands_not_requiring_authorization_skip_the_authorize_check() {
        use crate::command::GetAllProjectsListCommand;
        let mut client = Client::new(Box::new(FakeConnection::new(vec![r#"{"projects":[]}"#])), "h");
        client.connect();
        // no authorize() call, yet this command still succeeds since it
        // does not require a prior authorized session.
        let result = client.execute(&GetAllProjectsListCommand).unwrap();
        assert!(result.projects.is_empty());
    }
}
