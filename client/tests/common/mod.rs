//! Shared test fixtures: an in-memory remote store with counters and
//! switchable failures.

#![allow(dead_code)]

use async_trait::async_trait;
use lumina_client::{
    LocalStore, MemoryStorage, ProfileStore, RemoteError, RemoteStore, SyncCoordinator,
};
use lumina_engine::{ConflictPolicy, RemoteRecord};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Default)]
pub struct MockRemote {
    records: Mutex<BTreeMap<String, RemoteRecord>>,
    fetches: AtomicUsize,
    upserts: AtomicUsize,
    fetch_delay: Mutex<Duration>,
    upsert_delay: Mutex<Duration>,
    fail_fetch: AtomicBool,
    fail_upsert: AtomicBool,
}

impl MockRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn fetches(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    pub fn record(&self, id: &str) -> Option<RemoteRecord> {
        self.records.lock().get(id).cloned()
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.lock().keys().cloned().collect()
    }

    pub fn insert(&self, record: RemoteRecord) {
        self.records.lock().insert(record.id.clone(), record);
    }

    pub fn set_fetch_delay(&self, delay: Duration) {
        *self.fetch_delay.lock() = delay;
    }

    pub fn set_upsert_delay(&self, delay: Duration) {
        *self.upsert_delay.lock() = delay;
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub fn fail_upserts(&self, fail: bool) {
        self.fail_upsert.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn upsert(&self, record: &RemoteRecord) -> Result<(), RemoteError> {
        let delay = *self.upsert_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_upsert.load(Ordering::SeqCst) {
            return Err(RemoteError::Status {
                status: 503,
                body: "unavailable".into(),
            });
        }
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.insert(record.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<RemoteRecord>, RemoteError> {
        Ok(self.record(id))
    }

    async fn get_by_pin(&self, pin: &str) -> Result<Vec<RemoteRecord>, RemoteError> {
        Ok(self
            .records
            .lock()
            .values()
            .filter(|r| r.pin.as_deref() == Some(pin))
            .cloned()
            .collect())
    }

    async fn get_all(&self) -> Result<Vec<RemoteRecord>, RemoteError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let delay = *self.fetch_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(RemoteError::Transport("connection reset".into()));
        }
        Ok(self.records.lock().values().cloned().collect())
    }
}

pub fn coordinator(remote: &Arc<MockRemote>) -> SyncCoordinator {
    SyncCoordinator::new(
        Some(remote.clone() as Arc<dyn RemoteStore>),
        ConflictPolicy::PreferNewer,
    )
}

/// A device with in-memory storage syncing against `remote`.
pub fn device(remote: &Arc<MockRemote>) -> ProfileStore {
    ProfileStore::new(LocalStore::new(Arc::new(MemoryStorage::new())), coordinator(remote))
}

/// Poll `condition` until it holds or a second has passed.
pub async fn eventually(condition: impl Fn() -> bool) -> bool {
    for _ in 0..100 {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
