//! RocksDB durable backend
//!
//! Embedded store: key = big-endian id, value = record JSON. The WAL stays
//! on, this is the system of record.

use super::DurableTier;
use crate::config::DurableConfig;
use crate::error::DurableError;
use crate::record::Record;
use async_trait::async_trait;
use parking_lot::Mutex;
use rust_rocksdb::{BlockBasedOptions, DB, DBCompactionStyle, LogLevel, Options, WriteOptions};
use std::path::Path;
use tracing::{info, trace, warn};

const BLOCK_CACHE_SIZE: usize = 64 * 1024 * 1024;

/// RocksDB-backed durable store
pub struct RocksStore {
    db: DB,
    write_opts: WriteOptions,
    // Serializes check-then-put so two inserts of one id cannot both succeed
    insert_lock: Mutex<()>,
}

impl RocksStore {
    /// Open or create the database at `config.address`
    pub fn open(config: &DurableConfig) -> Result<Self, DurableError> {
        Self::open_path(Path::new(&config.address))
    }

    /// Open or create the database at `path`
    pub fn open_path(path: &Path) -> Result<Self, DurableError> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.set_max_background_jobs(2);
        opts.set_compaction_style(DBCompactionStyle::Level);
        opts.set_compression_type(rust_rocksdb::DBCompressionType::Lz4);
        opts.set_log_level(LogLevel::Error);
        opts.set_keep_log_file_num(5);

        let mut block_opts = BlockBasedOptions::default();
        let cache = rust_rocksdb::Cache::new_lru_cache(BLOCK_CACHE_SIZE);
        block_opts.set_block_cache(&cache);
        // Point lookups only
        block_opts.set_bloom_filter(10.0, false);
        block_opts.set_cache_index_and_filter_blocks(true);
        opts.set_block_based_table_factory(&block_opts);

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DurableError::Internal(format!("Failed to create directory: {e}"))
            })?;
        }

        let db = DB::open(&opts, path)?;
        info!("RocksDB durable store opened: path={:?}", path);

        Ok(Self {
            db,
            write_opts: WriteOptions::default(),
            insert_lock: Mutex::new(()),
        })
    }
}

fn record_key(id: i64) -> [u8; 8] {
    id.to_be_bytes()
}

#[async_trait]
impl DurableTier for RocksStore {
    async fn get(&self, id: i64) -> Result<Option<Record>, DurableError> {
        match self.db.get(record_key(id))? {
            Some(bytes) => Record::from_json(&bytes)
                .map(Some)
                .map_err(|e| DurableError::Decoding(e.to_string())),
            None => Ok(None),
        }
    }

    async fn insert(&self, record: &Record) -> Result<(), DurableError> {
        let key = record_key(record.id);
        let encoded = record
            .to_json()
            .map_err(|e| DurableError::Encoding(e.to_string()))?;

        let _guard = self.insert_lock.lock();
        if self.db.get_pinned(key)?.is_some() {
            return Err(DurableError::Conflict(record.id));
        }
        self.db.put_opt(key, &encoded, &self.write_opts)?;
        trace!(id = record.id, "Inserted record");
        Ok(())
    }

    fn close(&self) {
        if let Err(e) = self.db.flush() {
            warn!("RocksDB flush on close failed: {}", e);
        }
    }
}
