//! Remote queue sink
//!
//! Presents a push-capable list store as a byte-stream sink. Each record is
//! appended to the tail of a fixed list and the list's expiry is pushed out
//! to 24 hours from now, so an abandoned queue removes itself while an
//! active one never expires.

use crate::core::{LoggerError, LoggerMetrics, Result, Sink};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
#[cfg(feature = "redis-queue")]
use std::io::{self, Write};
#[cfg(feature = "redis-queue")]
use std::net::{TcpStream, ToSocketAddrs};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// List key consumed by the log-shipping pipeline
pub const DEFAULT_QUEUE_KEY: &str = "ELK_LOG";

/// Expiry applied to the list key on every push
pub const DEFAULT_QUEUE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Minimal list operations the queue sink needs from a remote store
pub trait QueueClient: Send + Sync {
    /// Append `payload` to the tail of `key`, returning the new list length
    fn rpush(&self, key: &str, payload: &[u8]) -> Result<u64>;

    /// Set `key` to expire `ttl` from now
    fn expire(&self, key: &str, ttl: Duration) -> Result<()>;
}

impl<C: QueueClient + ?Sized> QueueClient for Arc<C> {
    fn rpush(&self, key: &str, payload: &[u8]) -> Result<u64> {
        (**self).rpush(key, payload)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        (**self).expire(key, ttl)
    }
}

/// Whether the expiry refresh runs after a failed push
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExpiryPolicy {
    /// Refresh after every push attempt
    #[default]
    Always,

    /// Skip the refresh when the push failed
    OnSuccess,
}

/// Sink that pushes each record onto a remote list.
///
/// The reported byte count is the list length after the push. Expiry
/// refresh failures are never returned to the caller; they are counted in
/// the attached [`LoggerMetrics`].
///
/// # Example
///
/// ```
/// use fanout_logger::sinks::{MemoryQueue, QueueSink};
/// use fanout_logger::core::Sink;
/// use std::sync::Arc;
///
/// let queue = Arc::new(MemoryQueue::new());
/// let sink = QueueSink::new(Arc::clone(&queue));
///
/// assert_eq!(sink.write(b"first\n").unwrap(), 1);
/// assert_eq!(sink.write(b"second\n").unwrap(), 2);
/// assert_eq!(queue.lpop("ELK_LOG"), Some(b"first\n".to_vec()));
/// ```
pub struct QueueSink {
    client: Arc<dyn QueueClient>,
    key: String,
    ttl: Duration,
    expiry_policy: ExpiryPolicy,
    metrics: Arc<LoggerMetrics>,
}

impl QueueSink {
    pub fn new<C: QueueClient + 'static>(client: C) -> Self {
        Self::with_key(client, DEFAULT_QUEUE_KEY)
    }

    pub fn with_key<C: QueueClient + 'static>(client: C, key: impl Into<String>) -> Self {
        Self {
            client: Arc::new(client),
            key: key.into(),
            ttl: DEFAULT_QUEUE_TTL,
            expiry_policy: ExpiryPolicy::default(),
            metrics: Arc::new(LoggerMetrics::new()),
        }
    }

    #[must_use]
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_expiry_policy(mut self, policy: ExpiryPolicy) -> Self {
        self.expiry_policy = policy;
        self
    }

    /// Count refresh failures in a shared metrics instance
    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<LoggerMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn metrics(&self) -> &LoggerMetrics {
        &self.metrics
    }

    fn refresh_expiry(&self) {
        if self.client.expire(&self.key, self.ttl).is_err() {
            self.metrics.record_expiry_refresh_failure();
        }
    }
}

impl Sink for QueueSink {
    fn write(&self, payload: &[u8]) -> Result<usize> {
        let pushed = self.client.rpush(&self.key, payload);

        if pushed.is_ok() || self.expiry_policy == ExpiryPolicy::Always {
            self.refresh_expiry();
        }

        let len = pushed?;
        Ok(usize::try_from(len).unwrap_or(usize::MAX))
    }

    fn flush(&self) -> Result<()> {
        Ok(())
    }

    fn name(&self) -> &str {
        "queue"
    }
}

#[derive(Debug, Default)]
struct MemoryList {
    items: VecDeque<Vec<u8>>,
    deadline: Option<Instant>,
}

#[derive(Debug, Default)]
struct MemoryState {
    lists: HashMap<String, MemoryList>,
    expire_calls: Vec<(String, Instant)>,
    fail_pushes: bool,
    fail_expires: bool,
}

impl MemoryState {
    /// Drop the key if its deadline has passed
    fn purge_expired(&mut self, key: &str) {
        let expired = self
            .lists
            .get(key)
            .and_then(|list| list.deadline)
            .is_some_and(|deadline| deadline <= Instant::now());
        if expired {
            self.lists.remove(key);
        }
    }
}

/// In-process list store with the queue's wire semantics.
///
/// Every expiry call is recorded, even for keys that do not exist, and
/// push or expiry failures can be switched on to exercise error paths.
#[derive(Debug, Default)]
pub struct MemoryQueue {
    state: Mutex<MemoryState>,
}

impl MemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent pushes fail
    pub fn set_fail_pushes(&self, fail: bool) {
        self.state.lock().fail_pushes = fail;
    }

    /// Make subsequent expiry refreshes fail
    pub fn set_fail_expires(&self, fail: bool) {
        self.state.lock().fail_expires = fail;
    }

    /// Remove and return the head of the list
    pub fn lpop(&self, key: &str) -> Option<Vec<u8>> {
        let mut state = self.state.lock();
        state.purge_expired(key);
        let list = state.lists.get_mut(key)?;
        let item = list.items.pop_front();
        if list.items.is_empty() {
            state.lists.remove(key);
        }
        item
    }

    /// Copy of the whole list, head first
    pub fn range(&self, key: &str) -> Vec<Vec<u8>> {
        let mut state = self.state.lock();
        state.purge_expired(key);
        state
            .lists
            .get(key)
            .map(|list| list.items.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn len(&self, key: &str) -> usize {
        let mut state = self.state.lock();
        state.purge_expired(key);
        state.lists.get(key).map_or(0, |list| list.items.len())
    }

    pub fn is_empty(&self, key: &str) -> bool {
        self.len(key) == 0
    }

    /// Current expiry deadline of `key`, if it exists and has one
    pub fn ttl_deadline(&self, key: &str) -> Option<Instant> {
        let mut state = self.state.lock();
        state.purge_expired(key);
        state.lists.get(key).and_then(|list| list.deadline)
    }

    /// Deadlines requested by every expiry call for `key`, oldest first
    pub fn expire_calls(&self, key: &str) -> Vec<Instant> {
        self.state
            .lock()
            .expire_calls
            .iter()
            .filter(|(k, _)| k == key)
            .map(|(_, deadline)| *deadline)
            .collect()
    }
}

impl QueueClient for MemoryQueue {
    fn rpush(&self, key: &str, payload: &[u8]) -> Result<u64> {
        let mut state = self.state.lock();
        if state.fail_pushes {
            return Err(LoggerError::queue("RPUSH", "connection refused"));
        }
        state.purge_expired(key);
        let list = state.lists.entry(key.to_string()).or_default();
        list.items.push_back(payload.to_vec());
        Ok(list.items.len() as u64)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut state = self.state.lock();
        let deadline = Instant::now() + ttl;
        state.expire_calls.push((key.to_string(), deadline));
        if state.fail_expires {
            return Err(LoggerError::queue("EXPIRE", "connection reset"));
        }
        state.purge_expired(key);
        if let Some(list) = state.lists.get_mut(key) {
            list.deadline = Some(deadline);
        }
        Ok(())
    }
}

/// Connection settings for [`RedisQueue`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueConfig {
    /// `host:port` of the server
    pub address: String,
    pub password: String,
    pub db: i64,
    /// Bound on connecting and on each command round-trip
    pub timeout: Duration,
}

impl QueueConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            password: String::new(),
            db: 0,
            timeout: Duration::from_secs(1),
        }
    }

    /// Connection URL, with the password percent-encoded
    #[cfg(feature = "redis-queue")]
    pub fn url(&self) -> String {
        if self.password.is_empty() {
            format!("redis://{}/{}", self.address, self.db)
        } else {
            format!(
                "redis://:{}@{}/{}",
                urlencoding::encode(&self.password),
                self.address,
                self.db
            )
        }
    }
}

/// Idle connections kept for reuse by [`RedisQueue`]
#[cfg(feature = "redis-queue")]
const MAX_IDLE_CONNECTIONS: usize = 4;

/// Where and how to log in, decoded from [`QueueConfig::url`]
#[cfg(feature = "redis-queue")]
#[derive(Debug, Clone)]
struct RedisTarget {
    host: String,
    port: u16,
    db: i64,
    username: Option<String>,
    password: Option<String>,
}

/// A single Redis connection over a socket that carries read and write
/// timeouts from the moment it is opened, so the AUTH/SELECT handshake is
/// bounded like every later command.
#[cfg(feature = "redis-queue")]
struct QueueConnection {
    stream: TcpStream,
    parser: redis::Parser,
    db: i64,
    open: bool,
}

#[cfg(feature = "redis-queue")]
impl QueueConnection {
    fn open(target: &RedisTarget, timeout: Duration) -> redis::RedisResult<Self> {
        let mut last_err = None;
        for addr in (target.host.as_str(), target.port).to_socket_addrs()? {
            match TcpStream::connect_timeout(&addr, timeout) {
                Ok(stream) => {
                    stream.set_read_timeout(Some(timeout))?;
                    stream.set_write_timeout(Some(timeout))?;
                    stream.set_nodelay(true)?;

                    let mut conn = Self {
                        stream,
                        parser: redis::Parser::new(),
                        db: target.db,
                        open: true,
                    };
                    conn.handshake(target)?;
                    return Ok(conn);
                }
                Err(e) => last_err = Some(e),
            }
        }

        Err(last_err
            .unwrap_or_else(|| {
                io::Error::new(io::ErrorKind::AddrNotAvailable, "address resolved to nothing")
            })
            .into())
    }

    fn handshake(&mut self, target: &RedisTarget) -> redis::RedisResult<()> {
        if let Some(ref password) = target.password {
            let mut auth = redis::cmd("AUTH");
            if let Some(ref username) = target.username {
                auth.arg(username);
            }
            auth.arg(password);
            auth.query::<()>(self)?;
        }
        if target.db != 0 {
            redis::cmd("SELECT").arg(target.db).query::<()>(self)?;
        }
        Ok(())
    }

    fn send(&mut self, bytes: &[u8]) -> redis::RedisResult<()> {
        if let Err(e) = self.stream.write_all(bytes) {
            self.open = false;
            return Err(e.into());
        }
        Ok(())
    }

    fn read(&mut self) -> redis::RedisResult<redis::Value> {
        loop {
            match self.parser.parse_value(&mut self.stream) {
                Ok(redis::Value::Push { .. }) => continue,
                Ok(value) => return Ok(value),
                Err(e) => {
                    // A partial reply leaves the stream out of sync
                    self.open = false;
                    return Err(e);
                }
            }
        }
    }
}

#[cfg(feature = "redis-queue")]
impl redis::ConnectionLike for QueueConnection {
    fn req_packed_command(&mut self, cmd: &[u8]) -> redis::RedisResult<redis::Value> {
        self.send(cmd)?;
        self.read()
    }

    fn req_packed_commands(
        &mut self,
        cmd: &[u8],
        offset: usize,
        count: usize,
    ) -> redis::RedisResult<Vec<redis::Value>> {
        self.send(cmd)?;
        let mut values = Vec::with_capacity(count);
        for idx in 0..offset + count {
            let value = self.read()?;
            if idx >= offset {
                values.push(value);
            }
        }
        Ok(values)
    }

    fn get_db(&self) -> i64 {
        self.db
    }

    fn check_connection(&mut self) -> bool {
        redis::cmd("PING").query::<String>(self).is_ok()
    }

    fn is_open(&self) -> bool {
        self.open
    }
}

/// Redis-backed queue client.
///
/// Connections are opened lazily and pooled. A caller that finds no idle
/// connection opens its own instead of waiting for another caller, and a
/// connection that hits an I/O error or timeout is discarded. Connecting,
/// the login handshake and every command are each bounded by the
/// configured timeout.
#[cfg(feature = "redis-queue")]
pub struct RedisQueue {
    target: RedisTarget,
    idle: Mutex<Vec<QueueConnection>>,
    timeout: Duration,
}

#[cfg(feature = "redis-queue")]
impl RedisQueue {
    /// Validate the configuration; no connection is made until first use
    pub fn open(config: &QueueConfig) -> Result<Self> {
        use redis::IntoConnectionInfo;

        if config.address.is_empty() {
            return Err(LoggerError::config("RedisQueue", "address is empty"));
        }
        let info = config
            .url()
            .as_str()
            .into_connection_info()
            .map_err(|e| LoggerError::config("RedisQueue", e.to_string()))?;

        let (host, port) = match info.addr {
            redis::ConnectionAddr::Tcp(host, port) => (host, port),
            other => {
                return Err(LoggerError::config(
                    "RedisQueue",
                    format!("unsupported address {:?}", other),
                ))
            }
        };

        Ok(Self {
            target: RedisTarget {
                host,
                port,
                db: info.redis.db,
                username: info.redis.username,
                password: info.redis.password,
            },
            idle: Mutex::new(Vec::new()),
            timeout: config.timeout.max(Duration::from_millis(1)),
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn checkout(&self) -> redis::RedisResult<QueueConnection> {
        let pooled = self.idle.lock().pop();
        match pooled {
            Some(conn) => Ok(conn),
            None => QueueConnection::open(&self.target, self.timeout),
        }
    }

    fn checkin(&self, conn: QueueConnection) {
        if !conn.open {
            return;
        }
        let mut idle = self.idle.lock();
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
    }

    fn run<T: redis::FromRedisValue>(&self, command: &str, cmd: &redis::Cmd) -> Result<T> {
        let mut conn = self
            .checkout()
            .map_err(|e| LoggerError::queue(command, format!("connect failed: {}", e)))?;

        let result = cmd.query::<T>(&mut conn);
        self.checkin(conn);
        result.map_err(|e| LoggerError::queue(command, e.to_string()))
    }
}

#[cfg(feature = "redis-queue")]
impl QueueClient for RedisQueue {
    fn rpush(&self, key: &str, payload: &[u8]) -> Result<u64> {
        let mut cmd = redis::cmd("RPUSH");
        cmd.arg(key).arg(payload);
        self.run("RPUSH", &cmd)
    }

    fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        let mut cmd = redis::cmd("EXPIRE");
        cmd.arg(key).arg(ttl.as_secs());
        self.run::<i64>("EXPIRE", &cmd).map(|_| ())
    }
}
