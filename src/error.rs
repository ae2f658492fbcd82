//! Error types for readthrough

use thiserror::Error;

/// Main error type for readthrough (startup, provisioning, serving)
#[derive(Error, Debug)]
pub enum ReadThroughError {
    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),

    #[error("Durable store error: {0}")]
    Durable(#[from] DurableError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Memcached ASCII protocol errors (front-end commands and cache replies)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("Invalid command: {0}")]
    InvalidCommand(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Key too long (max 250 bytes)")]
    KeyTooLong,

    #[error("Unexpected data")]
    UnexpectedData,

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),
}

/// Cache tier errors. A miss is never an error.
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Timed out waiting for cache server")]
    Timeout,

    #[error("Connection closed by cache server")]
    Closed,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Cache server error: {0}")]
    Server(String),

    #[error("Value encoding error: {0}")]
    Encoding(String),
}

/// Durable tier errors
#[derive(Error, Debug)]
pub enum DurableError {
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Connection pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("RocksDB error: {0}")]
    RocksDb(#[from] rust_rocksdb::Error),

    #[error("Value encoding error: {0}")]
    Encoding(String),

    #[error("Value decoding error: {0}")]
    Decoding(String),

    #[error("Record {0} already exists")]
    Conflict(i64),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Origin source errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OriginError {
    #[error("request timed out")]
    Timeout,

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("non-success status {0}")]
    Status(u16),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Failure of a single `resolve()` call.
///
/// Misses and duplicate-insert conflicts are handled inside the resolver and
/// never show up here.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("origin unavailable for post {id}: {source}")]
    OriginUnavailable { id: i64, source: OriginError },

    #[error("malformed origin payload for post {id}: {reason}")]
    MalformedPayload { id: i64, reason: String },

    #[error("durable tier unavailable for post {id}: {source}")]
    DurableUnavailable { id: i64, source: DurableError },

    #[error("cache tier unavailable for post {id}: {source}")]
    CacheUnavailable { id: i64, source: CacheError },
}

impl ResolveError {
    /// Map an origin failure onto the surfaced taxonomy
    pub fn from_origin(id: i64, err: OriginError) -> Self {
        match err {
            OriginError::Malformed(reason) => Self::MalformedPayload { id, reason },
            source => Self::OriginUnavailable { id, source },
        }
    }

    /// Short label used for metrics and logs
    pub fn kind(&self) -> &'static str {
        match self {
            Self::OriginUnavailable { .. } => "origin_unavailable",
            Self::MalformedPayload { .. } => "malformed_payload",
            Self::DurableUnavailable { .. } => "durable_unavailable",
            Self::CacheUnavailable { .. } => "cache_unavailable",
        }
    }

    /// True when the origin answered 404 for this id
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::OriginUnavailable {
                source: OriginError::Status(404),
                ..
            }
        )
    }
}

pub type Result<T> = std::result::Result<T, ReadThroughError>;
