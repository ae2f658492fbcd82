//! In-memory tier fakes with call counters and failure injection

use crate::cache::CacheTier;
use crate::error::{CacheError, DurableError, OriginError};
use crate::origin::OriginSource;
use crate::record::{Record, cache_key};
use crate::storage::DurableTier;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::Barrier;
use tokio::time::Instant;

type CacheFailure = Box<dyn Fn() -> CacheError + Send + Sync>;
type DurableFailure = Box<dyn Fn() -> DurableError + Send + Sync>;

/// Cache fake; expiry follows tokio's clock so paused tests can advance it
#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Record, Duration, Instant)>>,
    sets: AtomicUsize,
    failure: Mutex<Option<CacheFailure>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn preload(&self, record: Record, ttl: Duration) {
        self.entries
            .lock()
            .insert(record.cache_key(), (record, ttl, Instant::now() + ttl));
    }

    /// Live entry and the TTL it was written with
    pub fn entry(&self, key: &str) -> Option<(Record, Duration)> {
        let entries = self.entries.lock();
        let (record, ttl, expires_at) = entries.get(key)?;
        (Instant::now() < *expires_at).then(|| (record.clone(), *ttl))
    }

    pub fn sets(&self) -> usize {
        self.sets.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, failure: impl Fn() -> CacheError + Send + Sync + 'static) {
        *self.failure.lock() = Some(Box::new(failure));
    }

    fn check_failure(&self) -> Result<(), CacheError> {
        match self.failure.lock().as_ref() {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl CacheTier for MemoryCache {
    async fn get(&self, id: i64) -> Result<Option<Record>, CacheError> {
        self.check_failure()?;
        Ok(self.entry(&cache_key(id)).map(|(record, _)| record))
    }

    async fn set(&self, record: &Record, ttl: Duration) -> Result<(), CacheError> {
        self.check_failure()?;
        self.sets.fetch_add(1, Ordering::SeqCst);
        self.preload(record.clone(), ttl);
        Ok(())
    }
}

/// Durable fake: a row list with a unique id constraint
#[derive(Default)]
pub struct MemoryDurable {
    rows: Mutex<Vec<Record>>,
    calls: AtomicUsize,
    failure: Mutex<Option<DurableFailure>>,
    sneak_in: Mutex<Option<Record>>,
    rendezvous: Mutex<Option<Arc<Barrier>>>,
    rendezvous_left: AtomicUsize,
}

impl MemoryDurable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let durable = Self::new();
        durable.rows.lock().extend(records);
        durable
    }

    pub fn row_count(&self, id: i64) -> usize {
        self.rows.lock().iter().filter(|r| r.id == id).count()
    }

    /// Total get and insert calls
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail_with(&self, failure: impl Fn() -> DurableError + Send + Sync + 'static) {
        *self.failure.lock() = Some(Box::new(failure));
    }

    /// Simulate a concurrent writer landing `record` right before our insert
    pub fn insert_before_next_write(&self, record: Record) {
        *self.sneak_in.lock() = Some(record);
    }

    /// Hold the next `n` gets until all `n` have arrived
    pub fn rendezvous_misses(&self, n: usize) {
        *self.rendezvous.lock() = Some(Arc::new(Barrier::new(n)));
        self.rendezvous_left.store(n, Ordering::SeqCst);
    }

    fn check_failure(&self) -> Result<(), DurableError> {
        match self.failure.lock().as_ref() {
            Some(failure) => Err(failure()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DurableTier for MemoryDurable {
    async fn get(&self, id: i64) -> Result<Option<Record>, DurableError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let waiting = self
            .rendezvous_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if waiting {
            let barrier = self.rendezvous.lock().clone();
            if let Some(barrier) = barrier {
                barrier.wait().await;
            }
        }

        Ok(self.rows.lock().iter().find(|r| r.id == id).cloned())
    }

    async fn insert(&self, record: &Record) -> Result<(), DurableError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.check_failure()?;

        let mut rows = self.rows.lock();
        if let Some(earlier) = self.sneak_in.lock().take() {
            rows.push(earlier);
        }
        if rows.iter().any(|r| r.id == record.id) {
            return Err(DurableError::Conflict(record.id));
        }
        rows.push(record.clone());
        Ok(())
    }
}

/// Origin stub answering from a fixed table; unknown ids get a 404
#[derive(Default)]
pub struct StubOrigin {
    answers: HashMap<i64, Result<Record, OriginError>>,
    calls: AtomicUsize,
}

impl StubOrigin {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_record(mut self, record: Record) -> Self {
        self.answers.insert(record.id, Ok(record));
        self
    }

    pub fn with_error(mut self, id: i64, err: OriginError) -> Self {
        self.answers.insert(id, Err(err));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OriginSource for StubOrigin {
    async fn fetch(&self, id: i64) -> Result<Record, OriginError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.answers
            .get(&id)
            .cloned()
            .unwrap_or(Err(OriginError::Status(404)))
    }
}
