//! # Pooled Connection
//!
//! A connection is a value that moves between the pool and exactly one caller.
//! Its bookkeeping fields never change in place: `borrowed` and `used` consume
//! the value and return an updated one around the same transport.

use std::fmt;
use std::time::{Duration, Instant};

use hclient_proto::HostPort;

use crate::transport::Transport;

/// Transport plus the metadata the pool needs for reuse and eviction.
///
/// Not `Clone`: ownership is the guarantee that two callers never share one
/// socket.
pub struct Connection {
    local_address: Option<HostPort>,
    remote_address: HostPort,
    transport: Box<dyn Transport>,
    create_time: Instant,
    last_use_time: Instant,
    borrow_counter: u32,
}

impl Connection {
    /// Wraps a freshly connected transport. The first borrow is implied.
    pub fn new(
        local_address: Option<HostPort>,
        remote_address: HostPort,
        transport: Box<dyn Transport>,
    ) -> Self {
        let now = Instant::now();
        Connection {
            local_address,
            remote_address,
            transport,
            create_time: now,
            last_use_time: now,
            borrow_counter: 1,
        }
    }

    /// Same transport, lent out one more time.
    pub fn borrowed(self) -> Self {
        Connection {
            borrow_counter: self.borrow_counter.saturating_add(1),
            ..self
        }
    }

    /// Same transport, marked idle as of now.
    pub fn used(self) -> Self {
        Connection {
            last_use_time: Instant::now(),
            ..self
        }
    }

    pub fn local_address(&self) -> Option<&HostPort> {
        self.local_address.as_ref()
    }

    pub fn remote_address(&self) -> &HostPort {
        &self.remote_address
    }

    pub fn create_time(&self) -> Instant {
        self.create_time
    }

    /// When the connection last went back to the pool (creation time if never).
    pub fn last_use_time(&self) -> Instant {
        self.last_use_time
    }

    pub fn borrow_counter(&self) -> u32 {
        self.borrow_counter
    }

    /// True when the connection has been idle for longer than `idle_timeout`
    /// at `now`.
    pub fn is_idle_expired(&self, now: Instant, idle_timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_use_time) > idle_timeout
    }

    pub fn transport_mut(&mut self) -> &mut dyn Transport {
        self.transport.as_mut()
    }

    pub fn is_closed(&self) -> bool {
        self.transport.is_closed()
    }

    /// Closes the transport; a later `ConnectionPool::release` drops it.
    pub fn close(&mut self) {
        self.transport.close();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("local_address", &self.local_address)
            .field("remote_address", &self.remote_address)
            .field("create_time", &self.create_time)
            .field("last_use_time", &self.last_use_time)
            .field("borrow_counter", &self.borrow_counter)
            .field("closed", &self.transport.is_closed())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::{self, Read, Write};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// In-memory transport. Reads yield its id so tests can tell transports
    /// apart; the close flag is shared so it stays observable after the
    /// connection is consumed.
    pub(crate) struct FakeTransport {
        pub id: u8,
        pub closed: Arc<AtomicBool>,
    }

    impl FakeTransport {
        pub fn new(id: u8) -> Self {
            FakeTransport {
                id,
                closed: Arc::new(AtomicBool::new(false)),
            }
        }
    }

    impl Read for FakeTransport {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            match buf.first_mut() {
                Some(slot) => {
                    *slot = self.id;
                    Ok(1)
                }
                None => Ok(0),
            }
        }
    }

    impl Write for FakeTransport {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for FakeTransport {
        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }

        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    pub(crate) fn transport_id(conn: &mut Connection) -> u8 {
        let mut buf = [0u8; 1];
        conn.transport_mut().read_exact(&mut buf).unwrap();
        buf[0]
    }

    #[test]
    fn new_connection_is_borrowed_once() {
        let conn = Connection::new(None, HostPort::new("example.com", 80), Box::new(FakeTransport::new(1)));
        assert_eq!(conn.borrow_counter(), 1);
        assert_eq!(conn.last_use_time(), conn.create_time());
        assert!(conn.local_address().is_none());
    }

    #[test]
    fn borrowed_keeps_transport_and_times() {
        let local = HostPort::new("127.0.0.1", 0);
        let conn = Connection::new(
            Some(local.clone()),
            HostPort::new("example.com", 80),
            Box::new(FakeTransport::new(7)),
        );
        let created = conn.create_time();
        let mut conn = conn.borrowed().borrowed();
        assert_eq!(conn.borrow_counter(), 3);
        assert_eq!(conn.create_time(), created);
        assert_eq!(conn.last_use_time(), created);
        assert_eq!(conn.local_address(), Some(&local));
        assert_eq!(transport_id(&mut conn), 7);
    }

    #[test]
    fn used_refreshes_idle_clock_only() {
        let conn = Connection::new(None, HostPort::new("example.com", 80), Box::new(FakeTransport::new(1)));
        let created = conn.create_time();
        std::thread::sleep(Duration::from_millis(2));
        let conn = conn.used();
        assert!(conn.last_use_time() > created);
        assert_eq!(conn.create_time(), created);
        assert_eq!(conn.borrow_counter(), 1);
    }

    #[test]
    fn idle_expiry_is_relative_to_last_use() {
        let conn = Connection::new(None, HostPort::new("example.com", 80), Box::new(FakeTransport::new(1)));
        let idle = Duration::from_secs(10);
        let last = conn.last_use_time();
        assert!(!conn.is_idle_expired(last, idle));
        assert!(!conn.is_idle_expired(last + idle, idle));
        assert!(conn.is_idle_expired(last + idle + Duration::from_millis(1), idle));
    }

    #[test]
    fn close_marks_transport_closed() {
        let transport = FakeTransport::new(1);
        let flag = Arc::clone(&transport.closed);
        let mut conn = Connection::new(None, HostPort::new("example.com", 80), Box::new(transport));
        assert!(!conn.is_closed());
        conn.close();
        assert!(conn.is_closed());
        assert!(flag.load(Ordering::SeqCst));
    }
}
