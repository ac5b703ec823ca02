//! # Transport Seam
//!
//! Purpose: Separate the pool and exchange logic from how bytes actually move,
//! so plain TCP, an encrypted stream, or an in-memory fake can sit underneath.
//!
//! ## Design Principles
//! 1. **Strategy Pattern**: `Connector` creates transports, `Transport` moves
//!    bytes; both are trait objects chosen once per pool.
//! 2. **Local Close Tracking**: `is_closed` reports whether *this side* closed
//!    the transport. The pool relies on it to drop broken connections.
//! 3. **Handshake Hook**: Encrypted transports finish their handshake during
//!    connect so a borrowed connection is always ready for requests.

use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use socket2::{Domain, Protocol, Socket, Type};

use hclient_proto::HostPort;

use crate::client::{ClientError, ClientResult};

/// Byte stream underneath a pooled connection.
pub trait Transport: Read + Write + Send {
    /// Closes the transport. Errors are ignored; the transport is unusable
    /// afterwards either way.
    fn close(&mut self);

    /// True once `close` has been called on this transport.
    fn is_closed(&self) -> bool;

    /// Completes a protocol handshake. Plain transports have none.
    fn complete_handshake(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Opens new transports for the pool.
pub trait Connector: Send + Sync {
    /// Connects to `remote`, optionally binding `local` first. A connect that
    /// exceeds `timeout` fails with `ClientError::ConnectTimeout`.
    fn connect(
        &self,
        local: Option<&HostPort>,
        remote: &HostPort,
        timeout: Duration,
    ) -> ClientResult<Box<dyn Transport>>;
}

/// Plain TCP connector.
#[derive(Debug, Clone, Default)]
pub struct TcpConnector {
    /// Read timeout applied to every new socket.
    pub read_timeout: Option<Duration>,
    /// Write timeout applied to every new socket.
    pub write_timeout: Option<Duration>,
}

impl TcpConnector {
    pub fn new(read_timeout: Option<Duration>, write_timeout: Option<Duration>) -> Self {
        TcpConnector {
            read_timeout,
            write_timeout,
        }
    }
}

impl Connector for TcpConnector {
    fn connect(
        &self,
        local: Option<&HostPort>,
        remote: &HostPort,
        timeout: Duration,
    ) -> ClientResult<Box<dyn Transport>> {
        let addr = remote.to_socket_addr()?;
        let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
        if let Some(local) = local {
            socket.bind(&local.to_socket_addr()?.into())?;
        }

        let connected = if timeout.is_zero() {
            socket.connect(&addr.into())
        } else {
            socket.connect_timeout(&addr.into(), timeout)
        };
        connected.map_err(ClientError::from_connect)?;

        let stream: TcpStream = socket.into();
        // std rejects a zero timeout, treat it as "no timeout".
        stream.set_read_timeout(self.read_timeout.filter(|t| !t.is_zero()))?;
        stream.set_write_timeout(self.write_timeout.filter(|t| !t.is_zero()))?;
        // Disable Nagle to keep request latency low for small payloads.
        stream.set_nodelay(true)?;

        Ok(Box::new(TcpTransport::new(stream)))
    }
}

/// TCP stream that remembers whether it was closed locally.
#[derive(Debug)]
pub struct TcpTransport {
    stream: TcpStream,
    closed: bool,
}

impl TcpTransport {
    pub fn new(stream: TcpStream) -> Self {
        TcpTransport {
            stream,
            closed: false,
        }
    }

    pub fn stream(&self) -> &TcpStream {
        &self.stream
    }
}

impl Read for TcpTransport {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.stream.read(buf)
    }
}

impl Write for TcpTransport {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.stream.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.stream.flush()
    }
}

impl Transport for TcpTransport {
    fn close(&mut self) {
        if !self.closed {
            let _ = self.stream.shutdown(Shutdown::Both);
            self.closed = true;
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}
