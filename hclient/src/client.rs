//! # Synchronous Client API
//!
//! Purpose: Drive one request/response exchange over a pooled connection and
//! expose a compact blocking facade on top of the pool.
//!
//! ## Design Principles
//! 1. **Facade Pattern**: `Client` hides pooling and protocol details.
//! 2. **Incremental Decoding**: Each socket read becomes one tokenizer chunk;
//!    the parser resumes after every read until the response is complete.
//! 3. **Fail Closed**: Any error during an exchange closes the transport before
//!    it propagates, so the pool discards the connection on release.
//! 4. **No Hidden Retries**: Errors surface to the caller as-is.

use std::io::{self, ErrorKind};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::{trace, warn};

use hclient_proto::{
    encode_request, AddressError, ByteTokenizer, HostPort, ParseError, Request, Response,
    ResponseParser,
};

use crate::connection::Connection;
use crate::pool::{ConnectionPool, PoolConfig};
use crate::transport::{Connector, Transport};

/// Result type for the client.
pub type ClientResult<T> = Result<T, ClientError>;

/// Errors surfaced by the client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Establishing a new connection exceeded the connect timeout.
    #[error("connect timed out")]
    ConnectTimeout,
    /// No response bytes arrived within the read timeout.
    #[error("read timed out")]
    ReadTimeout,
    /// Peer closed the connection before the response was complete.
    #[error("connection closed before the response was complete")]
    UnexpectedEndOfStream,
    /// Response framing was malformed.
    #[error("malformed response: {0}")]
    Parse(#[from] ParseError),
    /// Remote or local address could not be resolved.
    #[error(transparent)]
    InvalidAddress(#[from] AddressError),
    /// Any other transport failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),
}

impl ClientError {
    /// Maps a connect failure, recognizing timeouts.
    pub(crate) fn from_connect(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => ClientError::ConnectTimeout,
            _ => ClientError::Io(err),
        }
    }

    /// Maps a read failure. Socket read timeouts surface as `WouldBlock` on
    /// Unix and `TimedOut` on Windows.
    pub(crate) fn from_read(err: io::Error) -> Self {
        match err.kind() {
            ErrorKind::TimedOut | ErrorKind::WouldBlock => ClientError::ReadTimeout,
            _ => ClientError::Io(err),
        }
    }
}

/// Configuration for the client and its pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address.
    pub remote: HostPort,
    /// Optional local address to bind outgoing sockets to.
    pub local_bind_address: Option<HostPort>,
    /// Timeout for establishing a TCP connection.
    pub socket_connect_timeout: Duration,
    /// Optional TCP read timeout.
    pub socket_read_timeout: Option<Duration>,
    /// Optional TCP write timeout.
    pub socket_write_timeout: Option<Duration>,
    /// Idle connections older than this (since last release) are evicted.
    pub idle_timeout: Duration,
    /// Time between eviction sweeps.
    pub eviction_poll_period: Duration,
    /// Bytes requested per socket read.
    pub read_buffer_size: usize,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            remote: HostPort::new("127.0.0.1", 80),
            local_bind_address: None,
            socket_connect_timeout: Duration::from_secs(5),
            socket_read_timeout: Some(Duration::from_secs(5)),
            socket_write_timeout: Some(Duration::from_secs(5)),
            idle_timeout: Duration::from_secs(10),
            eviction_poll_period: Duration::from_secs(1),
            read_buffer_size: 4096,
        }
    }
}

impl ClientConfig {
    /// Default configuration for `remote`.
    pub fn new(remote: HostPort) -> Self {
        ClientConfig {
            remote,
            ..Self::default()
        }
    }

    /// The pool subset of this configuration.
    pub fn pool_config(&self) -> PoolConfig {
        PoolConfig {
            remote: self.remote.clone(),
            local_bind_address: self.local_bind_address.clone(),
            connect_timeout: self.socket_connect_timeout,
            read_timeout: self.socket_read_timeout,
            write_timeout: self.socket_write_timeout,
            idle_timeout: self.idle_timeout,
            eviction_poll_period: self.eviction_poll_period,
        }
    }
}

/// Runs request/response exchanges over a borrowed connection.
#[derive(Debug, Clone)]
pub struct HttpClient {
    read_buffer_size: usize,
}

impl HttpClient {
    /// `read_buffer_size` is clamped to at least one byte.
    pub fn new(read_buffer_size: usize) -> Self {
        HttpClient {
            read_buffer_size: read_buffer_size.max(1),
        }
    }

    pub fn read_buffer_size(&self) -> usize {
        self.read_buffer_size
    }

    /// Writes `request` and reads until a complete response is parsed.
    ///
    /// On error the connection's transport is closed, so releasing it to the
    /// pool afterwards discards it.
    pub fn send(&self, connection: &mut Connection, request: &Request) -> ClientResult<Response> {
        let result = self.exchange(connection.transport_mut(), request);
        if let Err(err) = &result {
            warn!(
                remote = %connection.remote_address(),
                borrow_counter = connection.borrow_counter(),
                error = %err,
                "exchange failed, closing connection"
            );
            connection.close();
        }
        result
    }

    fn exchange(&self, transport: &mut dyn Transport, request: &Request) -> ClientResult<Response> {
        let mut wire = Vec::new();
        encode_request(request, &mut wire);
        transport.write_all(&wire)?;
        transport.flush()?;

        let mut tokenizer = ByteTokenizer::new();
        let mut parser = ResponseParser::new();
        let mut buffer = vec![0u8; self.read_buffer_size];

        while !parser.parse(&mut tokenizer)? {
            let read = match transport.read(&mut buffer) {
                Ok(0) => return Err(ClientError::UnexpectedEndOfStream),
                Ok(read) => read,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(ClientError::from_read(err)),
            };
            trace!(bytes = read, "received response chunk");
            // Copy out only the filled prefix; the read buffer is reused.
            tokenizer.add(Bytes::copy_from_slice(&buffer[..read]));
        }

        let response = parser
            .into_response()
            .ok_or(ClientError::UnexpectedEndOfStream)?;
        trace!(
            status = response.status,
            body_len = response.body.len(),
            "response complete"
        );
        Ok(response)
    }
}

/// Blocking HTTP/1.1 client with connection pooling.
///
/// This is a facade over the pool and the exchange driver. Each call borrows a
/// connection, runs one exchange, and returns the connection to the pool; a
/// connection that failed is closed and therefore dropped on release.
pub struct Client {
    pool: ConnectionPool,
    http: HttpClient,
}

impl Client {
    /// Creates a client with default configuration for `remote`.
    pub fn connect(remote: HostPort) -> ClientResult<Self> {
        Self::with_config(ClientConfig::new(remote))
    }

    /// Creates a TCP client and starts idle eviction.
    pub fn with_config(config: ClientConfig) -> ClientResult<Self> {
        let pool = ConnectionPool::new(config.pool_config());
        Self::from_pool(pool, config.read_buffer_size)
    }

    /// Creates a client whose transports come from `connector`.
    pub fn with_connector(config: ClientConfig, connector: Arc<dyn Connector>) -> ClientResult<Self> {
        let pool = ConnectionPool::with_connector(config.pool_config(), connector);
        Self::from_pool(pool, config.read_buffer_size)
    }

    fn from_pool(pool: ConnectionPool, read_buffer_size: usize) -> ClientResult<Self> {
        pool.start()?;
        Ok(Client {
            pool,
            http: HttpClient::new(read_buffer_size),
        })
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Sends `request` over a pooled connection and returns the response.
    pub fn execute(&self, request: &Request) -> ClientResult<Response> {
        let mut connection = self.pool.borrow()?;
        let result = self.http.send(&mut connection, request);
        self.pool.release(connection);
        result
    }

    /// Stops idle eviction and closes idle connections.
    pub fn shutdown(&self) {
        self.pool.stop();
        self.pool.close_idle();
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.shutdown();
    }
}
