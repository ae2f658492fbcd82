//! Memcached ASCII protocol cache client
//!
//! Talks to memcached (or any compatible server) over a single TCP
//! connection. The connection is opened lazily, dropped after any transport
//! or protocol failure, and re-opened by the next call.

use super::CacheTier;
use crate::config::CacheConfig;
use crate::error::{CacheError, ProtocolError};
use crate::protocol::request::{write_get, write_set, write_version};
use crate::protocol::{Reply, ReplyResult, parse_reply};
use crate::record::{Record, cache_key};
use async_trait::async_trait;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const BUFFER_SIZE: usize = 4096;

/// Flags stored with every cached record
const RECORD_FLAGS: u32 = 0;

enum Request<'a> {
    Get(&'a [u8]),
    Set {
        key: &'a [u8],
        exptime: u64,
        data: &'a [u8],
    },
    Version,
}

enum Response {
    Value(Option<Vec<u8>>),
    Stored,
    Version(String),
}

struct Connection {
    stream: TcpStream,
    read_buf: BytesMut,
    write_buf: BytesMut,
}

impl Connection {
    async fn open(address: &str) -> Result<Self, CacheError> {
        let stream = TcpStream::connect(address).await?;
        stream.set_nodelay(true)?;
        debug!("Opened cache connection to {}", address);

        Ok(Self {
            stream,
            read_buf: BytesMut::with_capacity(BUFFER_SIZE),
            write_buf: BytesMut::with_capacity(BUFFER_SIZE),
        })
    }

    async fn execute(&mut self, request: &Request<'_>) -> Result<Response, CacheError> {
        self.write_buf.clear();
        match request {
            Request::Get(key) => write_get(&mut self.write_buf, key),
            Request::Set { key, exptime, data } => {
                write_set(&mut self.write_buf, key, RECORD_FLAGS, *exptime, data);
            }
            Request::Version => write_version(&mut self.write_buf),
        }
        self.stream.write_all(&self.write_buf).await?;

        match request {
            Request::Get(_) => {
                let mut value = None;
                loop {
                    match self.read_reply().await? {
                        Reply::Value { data, .. } => value = Some(data),
                        Reply::End => return Ok(Response::Value(value)),
                        other => return Err(unexpected(other)),
                    }
                }
            }
            Request::Set { .. } => match self.read_reply().await? {
                Reply::Stored => Ok(Response::Stored),
                other => Err(unexpected(other)),
            },
            Request::Version => match self.read_reply().await? {
                Reply::Version(version) => Ok(Response::Version(version)),
                other => Err(unexpected(other)),
            },
        }
    }

    async fn read_reply(&mut self) -> Result<Reply, CacheError> {
        loop {
            match parse_reply(&self.read_buf) {
                ReplyResult::Complete(reply, consumed) => {
                    let _ = self.read_buf.split_to(consumed);
                    return Ok(reply);
                }
                ReplyResult::NeedMoreData => {
                    if self.stream.read_buf(&mut self.read_buf).await? == 0 {
                        return Err(CacheError::Closed);
                    }
                }
                ReplyResult::Error(e) => return Err(e.into()),
            }
        }
    }
}

fn unexpected(reply: Reply) -> CacheError {
    match reply {
        Reply::Error(line) => CacheError::Server(line),
        Reply::NotStored => CacheError::Server("NOT_STORED".to_string()),
        other => CacheError::Protocol(ProtocolError::UnexpectedReply(format!("{other:?}"))),
    }
}

/// Cache tier backed by a memcached-compatible server
pub struct MemcachedCache {
    address: String,
    io_timeout: Duration,
    conn: Mutex<Option<Connection>>,
}

impl MemcachedCache {
    /// Create a client without touching the network
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            address: config.address.clone(),
            io_timeout: config.io_timeout(),
            conn: Mutex::new(None),
        }
    }

    /// Create a client and verify the server answers
    pub async fn connect(config: &CacheConfig) -> Result<Self, CacheError> {
        let cache = Self::new(config);
        let version = cache.version().await?;
        info!("Connected to cache at {} (version {})", config.address, version);
        Ok(cache)
    }

    /// Ask the server for its version string
    pub async fn version(&self) -> Result<String, CacheError> {
        match self.call(Request::Version).await? {
            Response::Version(version) => Ok(version),
            _ => Err(ProtocolError::UnexpectedReply("expected VERSION".to_string()).into()),
        }
    }

    async fn call(&self, request: Request<'_>) -> Result<Response, CacheError> {
        let mut guard = self.conn.lock().await;

        let mut conn = match guard.take() {
            Some(conn) => conn,
            None => timeout(self.io_timeout, Connection::open(&self.address))
                .await
                .map_err(|_| CacheError::Timeout)??,
        };

        match timeout(self.io_timeout, conn.execute(&request)).await {
            Ok(Ok(response)) => {
                *guard = Some(conn);
                Ok(response)
            }
            Ok(Err(e)) => {
                debug!(error = %e, "Dropping cache connection");
                Err(e)
            }
            Err(_) => {
                debug!("Dropping cache connection after timeout");
                Err(CacheError::Timeout)
            }
        }
    }
}

#[async_trait]
impl CacheTier for MemcachedCache {
    async fn get(&self, id: i64) -> Result<Option<Record>, CacheError> {
        let key = cache_key(id);

        let data = match self.call(Request::Get(key.as_bytes())).await? {
            Response::Value(Some(data)) => data,
            Response::Value(None) => return Ok(None),
            _ => return Err(ProtocolError::UnexpectedReply("expected END".to_string()).into()),
        };

        match Record::from_json(&data) {
            Ok(record) if record.id == id => Ok(Some(record)),
            Ok(record) => {
                warn!(key = %key, found = record.id, "Cache entry holds another id, treating as miss");
                Ok(None)
            }
            Err(e) => {
                warn!(key = %key, error = %e, "Undecodable cache entry, treating as miss");
                Ok(None)
            }
        }
    }

    async fn set(&self, record: &Record, ttl: Duration) -> Result<(), CacheError> {
        let key = record.cache_key();
        let data = record
            .to_json()
            .map_err(|e| CacheError::Encoding(e.to_string()))?;

        let request = Request::Set {
            key: key.as_bytes(),
            exptime: ttl.as_secs().max(1),
            data: &data,
        };

        match self.call(request).await? {
            Response::Stored => Ok(()),
            _ => Err(ProtocolError::UnexpectedReply("expected STORED".to_string()).into()),
        }
    }
}
