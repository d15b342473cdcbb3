//! Transport used by a [`crate::client::Client`] to reach one remote
//! daemon. The wire protocol itself (framing, challenge/response
//! authentication, payload parsing) is out of scope for this crate; this
//! module only owns the socket.

use std::io::{self, BufRead, BufReader, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::Duration;

/// A single request/response transport to one daemon.
///
/// Implementations are not required to be thread-safe: a `Connection` is
/// only ever driven from its owning host's single worker thread.
pub trait Connection: Send {
    /// Opens the transport eagerly if it is not already open. Used by
    /// [`crate::host_controller::HostController::connect`] to probe
    /// reachability before spawning a worker thread; `transact` opens
    /// lazily on its own, so this is never required before calling it.
    fn connect(&mut self) -> io::Result<()>;

    /// Sends `request` and returns the raw response body.
    ///
    /// Implementations should treat any I/O failure as a reason to drop
    /// their internal connection state so the next call retries opening
    /// a fresh one, matching the reconnect-on-error idiom the daemon
    /// worker relies on.
    fn transact(&mut self, request: &str) -> io::Result<String>;

    /// Drops any open connection. Idempotent.
    fn disconnect(&mut self);

    /// True if a connection is currently believed open.
    fn is_connected(&self) -> bool;
}

/// A [`Connection`] over a single newline-delimited TCP stream, opened
/// lazily on first use and torn down on any I/O error.
pub struct TcpConnection {
    addr: String,
    connect_timeout: Duration,
    stream: Option<BufReader<TcpStream>>,
}

impl TcpConnection {
    /// Creates a connection to `host:port`. No socket is opened until
    /// the first [`Connection::transact`] call.
    pub fn new(host: &str, port: u16) -> Self {
        Self {
            addr: format!("{host}:{port}"),
            connect_timeout: Duration::from_secs(10),
            stream: None,
        }
    }

    /// Overrides the connect timeout (default 10s).
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn ensure_connected(&mut self) -> io::Result<&mut BufReader<TcpStream>> {
        if self.stream.is_none() {
            let mut addrs = self.addr.clone().to_socket_addrs()?;
            let addr = addrs
                .next()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))?;
            let stream = TcpStream::connect_timeout(&addr, self.connect_timeout)?;
            stream.set_nodelay(true)?;
            tracing::debug!(addr = %self.addr, "tcp connection established");
            self.stream = Some(BufReader::new(stream));
        }
        Ok(self.stream.as_mut().expect("just set"))
    }
}

impl Connection for TcpConnection {
    fn connect(&mut self) -> io::Result<()> {
        self.ensure_connected().map(|_| ())
    }

    fn transact(&mut self, request: &str) -> io::Result<String> {
        let result = (|| {
            let reader = self.ensure_connected()?;
            reader.get_mut().write_all(request.as_bytes())?;
            reader.get_mut().write_all(b"\n")?;
            reader.get_mut().flush()?;
            let mut line = String::new();
            let n = reader.read_line(&mut line)?;
            if n == 0 {
                return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed"));
            }
            Ok(line)
        })();
        if result.is_err() {
            self.disconnect();
        }
        result
    }

    fn disconnect(&mut self) {
        if self.stream.take().is_some() {
            tracing::debug!(addr = %self.addr, "tcp connection dropped");
        }
    }

    fn is_connected(&self) -> bool {
        self.stream.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader as StdBufReader};
    use std::net::TcpListener;

    #[test]
    fn transact_sends_request_and_reads_one_line_response() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = StdBufReader::new(stream.try_clone().unwrap());
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            assert_eq!(line.trim(), "ping");
            let mut writer = stream;
            writer.write_all(b"pong\n").unwrap();
        });
        let mut conn = TcpConnection::new(&addr.ip().to_string(), addr.port());
        let response = conn.transact("ping").unwrap();
        assert_eq!(response.trim(), "pong");
        server.join().unwrap();
    }

    #[test]
    fn failed_transact_leaves_connection_disconnected() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = std::thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            drop(stream);
        });
        let mut conn = TcpConnection::new(&addr.ip().to_string(), addr.port());
        let _ = conn.transact("ping");
        assert!(!conn.is_connected());
        server.join().unwrap();
    }
}
