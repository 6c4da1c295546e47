//! The profile store: the in-memory document every screen reads and
//! mutates.
//!
//! Each mutation runs the engine operation under the document lock, saves
//! the whole document, then (outside the lock) notifies subscribers and
//! schedules a background push. The lock is never held across an await.

use crate::config::SyncConfig;
use crate::coordinator::{ShutdownMode, SyncCoordinator, SyncOutcome, SyncStatus};
use crate::error::Result;
use crate::local::LocalStore;
use chrono::{Local, Utc};
use lumina_engine::{
    AchievementUnlock, CoinBalance, DailyChallenges, Document, FamilyQuest, GameEnd,
    LeaderboardCategory, LeaderboardEntry, MigrationReport, Profile, Purchase, RemoteRecord, RewardClaim,
    RewardClaimed, SessionStart, Settings, SettingsPatch, StatBag, StreakUpdate, XpGain,
    XpProgress,
};
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

pub type SubscriptionId = u64;

type Subscriber = Arc<dyn Fn(&Document) + Send + Sync>;

struct Inner {
    document: Mutex<Document>,
    local: LocalStore,
    coordinator: Arc<SyncCoordinator>,
    subscribers: Mutex<Vec<(SubscriptionId, Subscriber)>>,
    next_subscription: AtomicU64,
}

/// Shared handle to the device's profiles. Cloning is cheap; all clones see
/// the same document.
#[derive(Clone)]
pub struct ProfileStore {
    inner: Arc<Inner>,
}

impl ProfileStore {
    /// Load the stored document. No network I/O happens until `sync`.
    pub fn new(local: LocalStore, coordinator: SyncCoordinator) -> Self {
        let document = local.load();
        Self {
            inner: Arc::new(Inner {
                document: Mutex::new(document),
                local,
                coordinator: Arc::new(coordinator),
                subscribers: Mutex::new(Vec::new()),
                next_subscription: AtomicU64::new(1),
            }),
        }
    }

    pub fn from_config(config: &SyncConfig) -> Result<Self> {
        let coordinator = SyncCoordinator::from_config(config)?;
        Ok(Self::new(LocalStore::file(&config.data_path), coordinator))
    }

    /// Load, pull-and-merge once, and start the periodic push if configured.
    pub async fn open(config: &SyncConfig) -> Result<Self> {
        let store = Self::from_config(config)?;
        store.sync().await;
        if let Some(interval) = config.sync_interval {
            store.start_auto_sync(interval);
        }
        Ok(store)
    }

    // ------------------------------------------------------------------
    // Plumbing
    // ------------------------------------------------------------------

    /// Run an engine operation against the live document. On success the
    /// document is saved, subscribers see the new state and a push is
    /// scheduled; on error nothing happens.
    fn mutate<T>(
        &self,
        op: impl FnOnce(&mut Document) -> lumina_engine::error::Result<T>,
    ) -> Result<T> {
        let (value, snapshot) = {
            let mut doc = self.inner.document.lock();
            let value = op(&mut doc)?;
            self.inner.local.save(&mut doc);
            (value, doc.clone())
        };
        self.notify(&snapshot);
        self.inner.coordinator.schedule_push(&snapshot);
        Ok(value)
    }

    fn read<T>(&self, op: impl FnOnce(&Document) -> T) -> T {
        op(&self.inner.document.lock())
    }

    fn notify(&self, snapshot: &Document) {
        let subscribers: Vec<(SubscriptionId, Subscriber)> = self.inner.subscribers.lock().clone();
        for (id, callback) in subscribers {
            if panic::catch_unwind(AssertUnwindSafe(|| callback(snapshot))).is_err() {
                warn!(subscription = id, "subscriber panicked");
            }
        }
    }

    /// A copy of the current document.
    pub fn snapshot(&self) -> Document {
        self.read(Document::clone)
    }

    /// Call `callback` with a snapshot after every save.
    pub fn subscribe(&self, callback: impl Fn(&Document) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.inner.next_subscription.fetch_add(1, Ordering::Relaxed);
        self.inner.subscribers.lock().push((id, Arc::new(callback)));
        id
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let mut subscribers = self.inner.subscribers.lock();
        let before = subscribers.len();
        subscribers.retain(|(sub, _)| *sub != id);
        subscribers.len() != before
    }

    // ------------------------------------------------------------------
    // Sync
    // ------------------------------------------------------------------

    /// Pull every remote record, merge, save and push.
    ///
    /// The fetched records are merged again into the live document, so
    /// mutations made during the round trip are kept.
    pub async fn sync(&self) -> SyncOutcome {
        let snapshot = self.snapshot();
        let outcome = self.inner.coordinator.full_sync(&snapshot).await;

        if let SyncOutcome::Completed(report) = &outcome {
            let merged = {
                let mut doc = self.inner.document.lock();
                let (mut merged, _) = self.inner.coordinator.resolver().merge(&doc, &report.records);
                self.inner.local.save(&mut merged);
                *doc = merged.clone();
                merged
            };
            self.notify(&merged);
        }
        outcome
    }

    /// Feed the host's connectivity signal. Coming back online starts a
    /// full sync in the background.
    pub fn set_online(&self, online: bool) {
        if !self.inner.coordinator.set_online(online) {
            return;
        }
        match Handle::try_current() {
            Ok(runtime) => {
                let store = self.clone();
                runtime.spawn(async move {
                    store.sync().await;
                });
            }
            Err(_) => debug!("no async runtime, reconnect sync skipped"),
        }
    }

    pub fn status(&self) -> SyncStatus {
        self.inner.coordinator.status()
    }

    /// Push the current document every `interval` until stopped.
    pub fn start_auto_sync(&self, interval: Duration) -> bool {
        let weak = Arc::downgrade(&self.inner);
        self.inner.coordinator.start_auto_sync(interval, move || {
            let inner = weak.upgrade()?;
            let doc = inner.document.lock().clone();
            Some(doc)
        })
    }

    pub fn stop_auto_sync(&self) -> bool {
        self.inner.coordinator.stop_auto_sync()
    }

    pub async fn shutdown(&self, mode: ShutdownMode) {
        self.inner.coordinator.shutdown(mode).await;
    }

    /// Look a profile up remotely and adopt it into this device's document.
    pub async fn fetch_profile(&self, id: &str) -> Result<Option<Profile>> {
        let Some(record) = self.inner.coordinator.fetch_by_id(id).await? else {
            return Ok(None);
        };
        let mut adopted = self.adopt(&[record]);
        Ok(adopted.pop())
    }

    /// Adopt every remote profile with this PIN, e.g. when a child logs in
    /// on a new device.
    pub async fn fetch_profile_by_pin(&self, pin: &str) -> Result<Vec<Profile>> {
        let records = self.inner.coordinator.fetch_by_pin(pin).await?;
        Ok(self.adopt(&records))
    }

    fn adopt(&self, records: &[RemoteRecord]) -> Vec<Profile> {
        if records.is_empty() {
            return Vec::new();
        }
        let (adopted, snapshot) = {
            let mut doc = self.inner.document.lock();
            let (mut merged, report) = self.inner.coordinator.resolver().merge(&doc, records);
            for skipped in report.skipped() {
                warn!(id = %skipped.id, outcome = ?skipped.outcome, "fetched record skipped");
            }
            self.inner.local.save(&mut merged);
            *doc = merged;
            let adopted: Vec<Profile> = records
                .iter()
                .filter_map(|record| doc.profiles.get(&record.id).cloned())
                .collect();
            (adopted, doc.clone())
        };
        info!(count = adopted.len(), "adopted remote profiles");
        self.notify(&snapshot);
        adopted
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    pub fn create_profile(&self, id: &str, name: &str, pin: Option<String>) -> Result<Profile> {
        self.mutate(|doc| doc.create_profile(id, name, pin, Utc::now()).cloned())
    }

    pub fn set_current_player(&self, id: &str) -> Result<Profile> {
        self.mutate(|doc| doc.set_current_player(id).cloned())
    }

    pub fn current_player(&self) -> Option<Profile> {
        self.read(|doc| doc.current_player().cloned())
    }

    pub fn profile(&self, id: &str) -> Result<Profile> {
        Ok(self.read(|doc| doc.profile(id).cloned())?)
    }

    /// Every profile except the guest.
    pub fn players(&self) -> Vec<Profile> {
        self.read(|doc| doc.players().cloned().collect())
    }

    pub fn reset_profile(&self, id: &str) -> Result<Profile> {
        self.mutate(|doc| doc.reset_profile(id, Utc::now()).cloned())
    }

    pub fn reset_all_data(&self) -> Result<()> {
        self.mutate(|doc| {
            doc.reset_all_data(Utc::now());
            Ok(())
        })
    }

    // ------------------------------------------------------------------
    // Progress
    // ------------------------------------------------------------------

    pub fn add_xp(&self, id: &str, amount: u64) -> Result<XpGain> {
        self.mutate(|doc| doc.add_xp(id, amount))
    }

    pub fn add_coins(&self, id: &str, amount: u64) -> Result<CoinBalance> {
        self.mutate(|doc| doc.add_coins(id, amount))
    }

    pub fn spend_coins(&self, id: &str, amount: u64) -> Result<CoinBalance> {
        self.mutate(|doc| doc.spend_coins(id, amount))
    }

    pub fn add_reward_points(&self, id: &str, amount: u64) -> Result<u64> {
        self.mutate(|doc| doc.add_reward_points(id, amount))
    }

    pub fn check_achievement(&self, id: &str, achievement: &str) -> Result<Option<AchievementUnlock>> {
        self.mutate(|doc| doc.check_achievement(id, achievement))
    }

    pub fn update_streak(&self, id: &str) -> Result<StreakUpdate> {
        self.mutate(|doc| doc.update_streak(id, Local::now().fixed_offset()))
    }

    pub fn xp_progress(&self, id: &str) -> Result<XpProgress> {
        Ok(self.read(|doc| doc.xp_progress(id))?)
    }

    pub fn leaderboard(&self, category: LeaderboardCategory) -> Vec<LeaderboardEntry> {
        self.read(|doc| doc.leaderboard(category))
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    pub fn record_game_start(&self, id: &str, game: &str) -> Result<SessionStart> {
        self.mutate(|doc| doc.record_game_start(id, game, Local::now().fixed_offset()))
    }

    pub fn record_game_end(&self, id: &str, game: &str, delta: &StatBag) -> Result<GameEnd> {
        self.mutate(|doc| doc.record_game_end(id, game, delta, Local::now().fixed_offset()))
    }

    pub fn game_stats(&self, id: &str, game: &str) -> Result<Option<StatBag>> {
        Ok(self.read(|doc| doc.game_stats(id, game).map(|stats| stats.cloned()))?)
    }

    /// Today's challenges, picking a new set when the day has changed.
    pub fn daily_challenges(&self) -> Result<DailyChallenges> {
        let today = Local::now().date_naive();
        let stale = self.read(|doc| doc.daily_challenges.date != Some(today));
        if stale {
            self.mutate(|doc| {
                doc.refresh_daily_challenges(today);
                Ok(doc.daily_challenges.clone())
            })
        } else {
            Ok(self.read(|doc| doc.daily_challenges.clone()))
        }
    }

    // ------------------------------------------------------------------
    // Rewards, shop and family quest
    // ------------------------------------------------------------------

    pub fn claim_reward(&self, player: &str, reward: &str, parent_pin: &str) -> Result<RewardClaimed> {
        self.mutate(|doc| doc.claim_reward(player, reward, parent_pin, Utc::now()))
    }

    pub fn fulfill_reward(&self, index: usize, parent_pin: &str) -> Result<RewardClaim> {
        self.mutate(|doc| doc.fulfill_reward(index, parent_pin, Utc::now()))
    }

    pub fn pending_rewards(&self) -> Vec<RewardClaim> {
        self.read(|doc| doc.pending_rewards.clone())
    }

    pub fn buy_item(&self, id: &str, item: &str) -> Result<Purchase> {
        self.mutate(|doc| doc.buy_item(id, item))
    }

    pub fn use_power_up(&self, id: &str, item: &str) -> Result<u64> {
        self.mutate(|doc| doc.use_power_up(id, item))
    }

    pub fn has_item(&self, id: &str, item: &str) -> Result<bool> {
        Ok(self.read(|doc| doc.has_item(id, item))?)
    }

    pub fn family_quest(&self) -> FamilyQuest {
        self.read(|doc| doc.family_quest.clone())
    }

    pub fn start_family_quest(&self, goal: u64, reward: &str, days: i64) -> Result<FamilyQuest> {
        self.mutate(|doc| Ok(doc.start_family_quest(goal, reward, days, Utc::now()).clone()))
    }

    pub fn complete_family_quest(&self) -> Result<FamilyQuest> {
        self.mutate(|doc| doc.complete_family_quest())
    }

    // ------------------------------------------------------------------
    // Settings, PINs and backups
    // ------------------------------------------------------------------

    pub fn settings(&self) -> Settings {
        self.read(|doc| doc.settings.clone())
    }

    pub fn update_settings(&self, patch: SettingsPatch) -> Result<Settings> {
        self.mutate(|doc| Ok(doc.update_settings(patch).clone()))
    }

    pub fn verify_parent_pin(&self, pin: &str) -> bool {
        self.read(|doc| doc.verify_parent_pin(pin))
    }

    pub fn change_parent_pin(&self, old_pin: &str, new_pin: &str) -> Result<()> {
        self.mutate(|doc| doc.change_parent_pin(old_pin, new_pin))
    }

    pub fn verify_profile_pin(&self, id: &str, pin: &str) -> Result<bool> {
        Ok(self.read(|doc| doc.verify_profile_pin(id, pin))?)
    }

    pub fn change_profile_pin(&self, id: &str, old_pin: &str, new_pin: &str) -> Result<()> {
        self.mutate(|doc| doc.change_profile_pin(id, old_pin, new_pin))
    }

    pub fn export_json(&self) -> Result<String> {
        Ok(self.read(Document::export_json)?)
    }

    /// Replace every local profile with an exported backup.
    pub fn import_json(&self, json: &str) -> Result<MigrationReport> {
        self.mutate(|doc| doc.import_json(json, Utc::now()))
    }
}
