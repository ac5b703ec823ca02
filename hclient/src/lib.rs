//! # hclient: pooled HTTP/1.1 client
//!
//! Purpose: Send HTTP/1.1 requests over reused TCP connections and decode the
//! responses incrementally as socket reads arrive.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Reuse connections to one endpoint, evicting the
//!    ones idle past a timeout from a background thread.
//! 2. **Strategy Pattern**: `Connector`/`Transport` keep the pool independent
//!    of how sockets are opened (plain TCP ships by default).
//! 3. **Ownership as Exclusivity**: A `Connection` moves between the pool and a
//!    single caller; it is never shared.
//! 4. **Fail Closed**: A failed exchange closes its connection so it is never
//!    recycled in an unknown framing state.
//!
//! ## Usage
//!
//! ```no_run
//! use hclient::{Client, ClientConfig, HostPort, Request};
//!
//! let client = Client::with_config(ClientConfig::new(HostPort::new("example.com", 80)))?;
//! let response = client.execute(&Request::get("/").header("Host", "example.com"))?;
//! println!("{} {}", response.status, response.reason);
//! # Ok::<(), hclient::ClientError>(())
//! ```

mod client;
mod connection;
mod pool;
mod transport;

pub use client::{Client, ClientConfig, ClientError, ClientResult, HttpClient};
pub use connection::Connection;
pub use pool::{ConnectionPool, PoolConfig};
pub use transport::{Connector, TcpConnector, TcpTransport, Transport};

pub use hclient_proto::{Header, HostPort, ParseError, Request, Response};
