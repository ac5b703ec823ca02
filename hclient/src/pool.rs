//! # Connection Pool
//!
//! Purpose: Reuse connections to a single remote endpoint across requests and
//! close the ones that sit idle for too long.
//!
//! ## Design Principles
//! 1. **Object Pool Pattern**: Idle connections wait in a FIFO queue; release
//!    pushes to the tail, borrow pops the head.
//! 2. **Minimal Locking**: The mutex guards only the idle queue. Connect,
//!    handshake and close all run outside it, so concurrent misses connect in
//!    parallel.
//! 3. **Ordered Eviction**: Because release appends with a fresh idle clock,
//!    the queue is sorted by idle-since time and a sweep stops at the first
//!    fresh entry.
//! 4. **Owned Lifecycle**: The eviction thread holds only a weak reference and
//!    a stop signal; `stop` wakes and joins it, dropping the pool ends it.
//!
//! ## Structure Overview
//!
//! ```text
//! ConnectionPool (Clone)
//!   └── inner: Arc<PoolInner>
//!         ├── idle: Mutex<VecDeque<Connection>>   head = idle longest
//!         ├── connector: Arc<dyn Connector>
//!         └── evictor: Mutex<Option<EvictionHandle>>
//!                └── thread: Weak<PoolInner> + StopSignal
//! ```
//!
//! Borrowed connections are not tracked. A caller that never releases a
//! connection simply keeps it; the pool never hands it to anyone else.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use tracing::{debug, trace};

use hclient_proto::HostPort;

use crate::client::{ClientError, ClientResult};
use crate::connection::Connection;
use crate::transport::{Connector, TcpConnector};

/// Poll period used when a zero period is configured.
const MIN_EVICTION_POLL_PERIOD: Duration = Duration::from_millis(1);

/// Pool configuration.
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Endpoint every pooled connection talks to.
    pub remote: HostPort,
    /// Optional local address to bind before connecting.
    pub local_bind_address: Option<HostPort>,
    /// Upper bound on establishing a new connection.
    pub connect_timeout: Duration,
    /// Read timeout for new TCP sockets.
    pub read_timeout: Option<Duration>,
    /// Write timeout for new TCP sockets.
    pub write_timeout: Option<Duration>,
    /// Idle connections older than this (since last release) are evicted.
    pub idle_timeout: Duration,
    /// Time between eviction sweeps.
    pub eviction_poll_period: Duration,
}

struct PoolInner {
    config: PoolConfig,
    connector: Arc<dyn Connector>,
    idle: Mutex<VecDeque<Connection>>,
    evictor: Mutex<Option<EvictionHandle>>,
}

impl PoolInner {
    fn purge_expired(&self, now: Instant) -> usize {
        let expired = {
            let mut idle = self.idle.lock();
            let mut expired = Vec::new();
            while idle
                .front()
                .is_some_and(|conn| conn.is_idle_expired(now, self.config.idle_timeout))
            {
                if let Some(conn) = idle.pop_front() {
                    expired.push(conn);
                }
            }
            expired
        };

        let count = expired.len();
        for mut conn in expired {
            conn.close();
        }
        if count > 0 {
            debug!(remote = %self.config.remote, evicted = count, "evicted idle connections");
        }
        count
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        // Never join here: the last strong reference may be the eviction
        // thread's own temporary upgrade.
        if let Some(handle) = self.evictor.get_mut().take() {
            handle.signal.stop();
        }
        for conn in self.idle.get_mut().iter_mut() {
            conn.close();
        }
    }
}

/// Shared handle to a connection pool.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Creates a pool of plain TCP connections.
    ///
    /// The eviction task is not running until `start` is called.
    pub fn new(config: PoolConfig) -> Self {
        let connector = TcpConnector::new(config.read_timeout, config.write_timeout);
        Self::with_connector(config, Arc::new(connector))
    }

    /// Creates a pool that opens transports through `connector`.
    pub fn with_connector(config: PoolConfig, connector: Arc<dyn Connector>) -> Self {
        ConnectionPool {
            inner: Arc::new(PoolInner {
                config,
                connector,
                idle: Mutex::new(VecDeque::new()),
                evictor: Mutex::new(None),
            }),
        }
    }

    pub fn config(&self) -> &PoolConfig {
        &self.inner.config
    }

    pub fn remote_address(&self) -> &HostPort {
        &self.inner.config.remote
    }

    /// Takes the longest-idle connection, or opens a new one on a miss.
    pub fn borrow(&self) -> ClientResult<Connection> {
        let reused = self.inner.idle.lock().pop_front();
        if let Some(conn) = reused {
            let conn = conn.borrowed();
            trace!(
                remote = %self.inner.config.remote,
                borrow_counter = conn.borrow_counter(),
                "reusing pooled connection"
            );
            return Ok(conn);
        }
        self.connect()
    }

    /// Hands a connection back. Closed connections are dropped instead of
    /// being queued.
    pub fn release(&self, connection: Connection) {
        if connection.is_closed() {
            trace!(
                remote = %self.inner.config.remote,
                borrow_counter = connection.borrow_counter(),
                "discarding closed connection"
            );
            return;
        }
        let connection = connection.used();
        self.inner.idle.lock().push_back(connection);
    }

    /// Number of idle connections currently queued.
    pub fn idle_count(&self) -> usize {
        self.inner.idle.lock().len()
    }

    /// Evicts and closes idle connections that expired before `now`.
    ///
    /// This is what each eviction sweep runs; returns the number evicted.
    pub fn purge_expired(&self, now: Instant) -> usize {
        self.inner.purge_expired(now)
    }

    /// Closes every idle connection. Returns the number closed.
    pub fn close_idle(&self) -> usize {
        let drained: Vec<Connection> = self.inner.idle.lock().drain(..).collect();
        let count = drained.len();
        for mut conn in drained {
            conn.close();
        }
        count
    }

    /// Starts the background eviction thread. Calling it again while the
    /// thread runs has no effect.
    pub fn start(&self) -> ClientResult<()> {
        let mut evictor = self.inner.evictor.lock();
        if evictor.is_some() {
            return Ok(());
        }

        let period = if self.inner.config.eviction_poll_period.is_zero() {
            MIN_EVICTION_POLL_PERIOD
        } else {
            self.inner.config.eviction_poll_period
        };
        let signal = Arc::new(StopSignal::default());
        let signal_thread = Arc::clone(&signal);
        let pool = Arc::downgrade(&self.inner);

        let join = std::thread::Builder::new()
            .name("hclient-evictor".to_string())
            .spawn(move || run_eviction(pool, signal_thread, period))?;

        debug!(remote = %self.inner.config.remote, ?period, "eviction task started");
        *evictor = Some(EvictionHandle {
            signal,
            join: Some(join),
        });
        Ok(())
    }

    /// Stops the eviction thread and waits for it to exit.
    pub fn stop(&self) {
        let handle = self.inner.evictor.lock().take();
        if let Some(handle) = handle {
            handle.stop();
        }
    }

    /// True while the eviction thread is running.
    pub fn is_running(&self) -> bool {
        self.inner.evictor.lock().is_some()
    }

    fn connect(&self) -> ClientResult<Connection> {
        let config = &self.inner.config;
        let mut transport = self.inner.connector.connect(
            config.local_bind_address.as_ref(),
            &config.remote,
            config.connect_timeout,
        )?;
        if let Err(err) = transport.complete_handshake() {
            transport.close();
            return Err(ClientError::from_read(err));
        }
        debug!(remote = %config.remote, "opened new connection");
        Ok(Connection::new(
            config.local_bind_address.clone(),
            config.remote.clone(),
            transport,
        ))
    }
}

/// Wakes the eviction thread early and tells it to exit.
#[derive(Default)]
struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

impl StopSignal {
    fn stop(&self) {
        *self.stopped.lock() = true;
        self.wake.notify_all();
    }

    fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Sleeps up to `period`; returns true if stop was requested.
    fn wait(&self, period: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.wake.wait_for(&mut stopped, period);
        }
        *stopped
    }
}

/// Handle for the background eviction thread.
struct EvictionHandle {
    signal: Arc<StopSignal>,
    join: Option<JoinHandle<()>>,
}

impl EvictionHandle {
    fn stop(mut self) {
        self.signal.stop();
        if let Some(join) = self.join.take() {
            let _ = join.join();
        }
    }
}

fn run_eviction(pool: Weak<PoolInner>, signal: Arc<StopSignal>, period: Duration) {
    while !signal.is_stopped() {
        match pool.upgrade() {
            Some(inner) => {
                inner.purge_expired(Instant::now());
            }
            None => break,
        }
        if signal.wait(period) {
            break;
        }
    }
    debug!("eviction task stopped");
}
