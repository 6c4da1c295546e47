//! Sync coordination between the device document and the remote store.
//!
//! The coordinator never owns the document. Callers hand it snapshots; it
//! returns merged documents and pushes records. At most one full sync runs
//! at a time, background pushes are tracked by their task handle, and a
//! periodic push-only timer can be started and stopped.

use crate::config::SyncConfig;
use crate::error::{ClientError, RemoteError, Result};
use crate::remote::{HttpRemoteStore, RemoteStore};
use chrono::Utc;
use futures::future::join_all;
use lumina_engine::{ConflictPolicy, Document, MergeReport, RemoteRecord, Resolver, Timestamp};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Why a full sync did not run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    /// Another full sync is still in flight
    InFlight,
    /// Offline, shut down, or no remote store configured
    Offline,
}

/// Result of a completed pull-merge-push cycle.
#[derive(Debug, Clone)]
pub struct SyncReport {
    /// The local snapshot with the remote records merged in
    pub document: Document,
    pub merge: MergeReport,
    /// What was fetched; empty if the fetch failed
    pub records: Vec<RemoteRecord>,
    pub fetch_failed: bool,
    /// Records accepted by the remote store
    pub pushed: usize,
}

#[derive(Debug, Clone)]
pub enum SyncOutcome {
    Completed(SyncReport),
    Skipped(SkipReason),
}

impl SyncOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, SyncOutcome::Completed(_))
    }
}

/// What `shutdown` does with outstanding background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Wait for the timer to stop and the last push to finish
    Await,
    /// Cancel both immediately
    Abandon,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncStatus {
    /// A full sync has completed at least once
    pub initialized: bool,
    pub online: bool,
    pub last_sync: Option<Timestamp>,
    pub auto_sync_enabled: bool,
}

struct AutoSync {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Clears the in-flight flag however the sync exits.
struct InFlightGuard<'a>(&'a AtomicBool);

impl<'a> InFlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct SyncCoordinator {
    remote: Option<Arc<dyn RemoteStore>>,
    resolver: Resolver,
    sync_on_reconnect: bool,
    online: AtomicBool,
    closed: AtomicBool,
    in_flight: AtomicBool,
    initialized: AtomicBool,
    last_sync: Mutex<Option<Timestamp>>,
    pending_push: Mutex<Option<JoinHandle<()>>>,
    auto_sync: Mutex<Option<AutoSync>>,
}

impl SyncCoordinator {
    /// A coordinator for `remote`; `None` keeps the device offline for good.
    pub fn new(remote: Option<Arc<dyn RemoteStore>>, policy: ConflictPolicy) -> Self {
        Self {
            remote,
            resolver: Resolver::new(policy),
            sync_on_reconnect: true,
            online: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            initialized: AtomicBool::new(false),
            last_sync: Mutex::new(None),
            pending_push: Mutex::new(None),
            auto_sync: Mutex::new(None),
        }
    }

    pub fn offline() -> Self {
        Self::new(None, ConflictPolicy::default())
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let remote = HttpRemoteStore::from_config(config)?
            .map(|store| Arc::new(store) as Arc<dyn RemoteStore>);
        Ok(Self::new(remote, config.conflict_policy)
            .with_sync_on_reconnect(config.sync_on_reconnect))
    }

    pub fn with_sync_on_reconnect(mut self, enabled: bool) -> Self {
        self.sync_on_reconnect = enabled;
        self
    }

    pub fn resolver(&self) -> Resolver {
        self.resolver
    }

    /// The remote store, if one is configured and currently reachable.
    fn active_remote(&self) -> Option<Arc<dyn RemoteStore>> {
        if self.closed.load(Ordering::Acquire) || !self.online.load(Ordering::Acquire) {
            return None;
        }
        self.remote.clone()
    }

    /// Record the host's connectivity signal. Returns `true` when the device
    /// just came back online and a full sync should follow.
    pub fn set_online(&self, online: bool) -> bool {
        let was_online = self.online.swap(online, Ordering::AcqRel);
        match (was_online, online) {
            (false, true) => {
                info!("connectivity restored");
                self.sync_on_reconnect && self.active_remote().is_some()
            }
            (true, false) => {
                info!("connectivity lost, sync paused");
                false
            }
            _ => false,
        }
    }

    pub fn status(&self) -> SyncStatus {
        SyncStatus {
            initialized: self.initialized.load(Ordering::Acquire),
            online: self.online.load(Ordering::Acquire),
            last_sync: *self.last_sync.lock(),
            auto_sync_enabled: self.auto_sync.lock().is_some(),
        }
    }

    /// Fetch every remote record, merge them into `local`, and push the
    /// merged result back.
    ///
    /// A failed fetch counts as an empty remote; a failed push is logged and
    /// not rolled back. A call made while another is in flight returns
    /// `Skipped(InFlight)` without touching the network.
    pub async fn full_sync(&self, local: &Document) -> SyncOutcome {
        let Some(remote) = self.active_remote() else {
            return SyncOutcome::Skipped(SkipReason::Offline);
        };
        let Some(_guard) = InFlightGuard::acquire(&self.in_flight) else {
            debug!("full sync already in flight");
            return SyncOutcome::Skipped(SkipReason::InFlight);
        };

        let (records, fetch_failed) = match remote.get_all().await {
            Ok(records) => (records, false),
            Err(e) => {
                warn!(error = %e, "fetch failed, merging against an empty remote");
                (Vec::new(), true)
            }
        };

        let (document, merge) = self.resolver.merge(local, &records);
        for skipped in merge.skipped() {
            warn!(id = %skipped.id, outcome = ?skipped.outcome, "remote record skipped");
        }

        let pushed = match document.remote_records() {
            Ok(outgoing) => push_records(remote.as_ref(), &outgoing).await,
            Err(e) => {
                warn!(error = %e, "could not encode merged document");
                0
            }
        };

        *self.last_sync.lock() = Some(Utc::now());
        self.initialized.store(true, Ordering::Release);
        info!(
            fetched = records.len(),
            pushed,
            family_quest_replaced = merge.family_quest_replaced,
            "full sync complete"
        );

        SyncOutcome::Completed(SyncReport {
            document,
            merge,
            records,
            fetch_failed,
            pushed,
        })
    }

    /// Upsert one record per non-guest profile, concurrently. Returns how
    /// many the remote store accepted.
    pub async fn push(&self, doc: &Document) -> usize {
        let Some(remote) = self.active_remote() else {
            return 0;
        };
        match doc.remote_records() {
            Ok(records) => push_records(remote.as_ref(), &records).await,
            Err(e) => {
                warn!(error = %e, "could not encode document for push");
                0
            }
        }
    }

    /// Push `doc` in the background. A push still running from an earlier
    /// call is cancelled, since this one carries newer state.
    pub fn schedule_push(&self, doc: &Document) -> bool {
        let Some(remote) = self.active_remote() else {
            return false;
        };
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime, background push skipped");
            return false;
        };
        let records = match doc.remote_records() {
            Ok(records) if !records.is_empty() => records,
            Ok(_) => return false,
            Err(e) => {
                warn!(error = %e, "could not encode document for push");
                return false;
            }
        };

        let handle = runtime.spawn(async move {
            let pushed = push_records(remote.as_ref(), &records).await;
            debug!(pushed, "background push finished");
        });
        if let Some(previous) = self.pending_push.lock().replace(handle) {
            if !previous.is_finished() {
                debug!("superseding unfinished background push");
                previous.abort();
            }
        }
        true
    }

    /// Start the push-only timer, replacing any running one. `snapshot`
    /// supplies the document to push and ends the timer by returning `None`.
    pub fn start_auto_sync<F>(self: &Arc<Self>, interval: Duration, snapshot: F) -> bool
    where
        F: Fn() -> Option<Document> + Send + Sync + 'static,
    {
        if interval.is_zero() || self.remote.is_none() || self.closed.load(Ordering::Acquire) {
            return false;
        }
        let Ok(runtime) = Handle::try_current() else {
            debug!("no async runtime, auto sync not started");
            return false;
        };
        // detach the old timer; a push it is running still completes
        drop(self.take_timer());

        let (stop, mut stopped) = watch::channel(false);
        let weak: Weak<Self> = Arc::downgrade(self);
        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = stopped.changed() => break,
                }
                let Some(coordinator) = weak.upgrade() else {
                    break;
                };
                let Some(doc) = snapshot() else {
                    break;
                };
                let pushed = coordinator.push(&doc).await;
                debug!(pushed, "periodic push");
            }
            debug!("auto sync stopped");
        });

        *self.auto_sync.lock() = Some(AutoSync { stop, handle });
        info!(?interval, "auto sync started");
        true
    }

    /// Stop the timer. A push it is in the middle of still completes.
    pub fn stop_auto_sync(&self) -> bool {
        self.take_timer().is_some()
    }

    fn take_timer(&self) -> Option<JoinHandle<()>> {
        let auto_sync = self.auto_sync.lock().take()?;
        let _ = auto_sync.stop.send(true);
        Some(auto_sync.handle)
    }

    /// Stop all background work. Afterwards the coordinator behaves as if
    /// offline.
    pub async fn shutdown(&self, mode: ShutdownMode) {
        self.closed.store(true, Ordering::Release);
        let timer = self.take_timer();
        let push = self.pending_push.lock().take();

        match mode {
            ShutdownMode::Await => {
                for handle in timer.into_iter().chain(push) {
                    let _ = handle.await;
                }
            }
            ShutdownMode::Abandon => {
                for handle in timer.into_iter().chain(push) {
                    handle.abort();
                }
            }
        }
        info!(?mode, "sync coordinator shut down");
    }

    /// One remote record by profile id.
    pub async fn fetch_by_id(&self, id: &str) -> Result<Option<RemoteRecord>> {
        let remote = self.active_remote().ok_or(ClientError::Offline)?;
        Ok(remote.get_by_id(id).await?)
    }

    /// Remote records whose profile PIN matches.
    pub async fn fetch_by_pin(&self, pin: &str) -> Result<Vec<RemoteRecord>> {
        let remote = self.active_remote().ok_or(ClientError::Offline)?;
        Ok(remote.get_by_pin(pin).await?)
    }
}

async fn push_records(remote: &dyn RemoteStore, records: &[RemoteRecord]) -> usize {
    let results: Vec<std::result::Result<(), RemoteError>> =
        join_all(records.iter().map(|record| remote.upsert(record))).await;

    let mut pushed = 0;
    for (record, result) in records.iter().zip(results) {
        match result {
            Ok(()) => pushed += 1,
            Err(e) => warn!(id = %record.id, error = %e, "push failed"),
        }
    }
    pushed
}
