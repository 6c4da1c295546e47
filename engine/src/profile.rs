//! Player profiles.

use crate::catalog::GAMES;
use crate::progression::level_for;
use crate::stats::StatBag;
use crate::{AchievementId, GameId, ProfileId, Timestamp};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, BTreeSet};

/// Id of the built-in guest profile.
pub const GUEST_ID: &str = "guest";

pub const GUEST_AVATAR: &str = "./assets/guest-avatar.svg";
pub const DEFAULT_AVATAR: &str = "./assets/player-avatar.svg";

/// Items a player owns.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Inventory {
    /// Consumables by kind
    pub power_ups: BTreeMap<String, u64>,
    pub themes: BTreeSet<String>,
    pub cosmetics: BTreeSet<String>,
}

/// A single player's progression.
///
/// `level` and `title` are derived from `total_xp` and are only readable;
/// every path that changes experience calls [`Profile::refresh_level`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Profile {
    pub id: ProfileId,
    pub name: String,
    pub role: String,
    pub avatar: String,
    pub pin: Option<String>,

    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    pub(crate) level: u32,
    pub(crate) title: String,

    pub current_coins: u64,
    pub lifetime_coins: u64,
    pub reward_points: u64,

    pub last_played: Option<Timestamp>,
    pub last_played_game: Option<GameId>,
    pub streak_days: u64,
    pub streak_last_date: Option<NaiveDate>,
    pub total_play_time_minutes: u64,

    pub achievements: BTreeSet<AchievementId>,
    pub game_stats: BTreeMap<GameId, StatBag>,
    pub inventory: Inventory,

    pub created_at: Timestamp,
    /// Reset marker copied from the owning document when pushed
    pub reset_at_version: Option<String>,

    /// Keys this version does not know about, kept verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Profile {
    fn default() -> Self {
        let first = level_for(0);
        Self {
            id: String::new(),
            name: String::new(),
            role: "The Player".to_string(),
            avatar: DEFAULT_AVATAR.to_string(),
            pin: None,
            total_xp: 0,
            level: first.level,
            title: first.title.to_string(),
            current_coins: 0,
            lifetime_coins: 0,
            reward_points: 0,
            last_played: None,
            last_played_game: None,
            streak_days: 0,
            streak_last_date: None,
            total_play_time_minutes: 0,
            achievements: BTreeSet::new(),
            game_stats: BTreeMap::new(),
            inventory: Inventory::default(),
            created_at: Timestamp::default(),
            reset_at_version: None,
            extra: Map::new(),
        }
    }
}

impl Profile {
    /// Fresh player with every catalog game's default stats.
    pub fn new(
        id: impl Into<ProfileId>,
        name: impl Into<String>,
        pin: Option<String>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            pin,
            game_stats: default_game_stats(),
            created_at: now,
            ..Self::default()
        }
    }

    /// The built-in guest profile.
    pub fn guest(now: Timestamp) -> Self {
        Self {
            role: "The Visitor".to_string(),
            avatar: GUEST_AVATAR.to_string(),
            ..Self::new(GUEST_ID, "Guest", None, now)
        }
    }

    pub fn is_guest(&self) -> bool {
        self.id == GUEST_ID
    }

    pub fn level(&self) -> u32 {
        self.level
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    /// Recompute level and title from experience.
    pub fn refresh_level(&mut self) {
        let info = level_for(self.total_xp);
        self.level = info.level;
        self.title = info.title.to_string();
    }

    /// Stats for a game, created from catalog defaults if missing.
    pub fn stats_mut(&mut self, game_id: &str) -> &mut StatBag {
        self.game_stats
            .entry(game_id.to_string())
            .or_insert_with(|| {
                crate::catalog::game_by_id(game_id)
                    .map(|g| g.default_stats())
                    .unwrap_or_default()
            })
    }

    /// Wipe progression, keeping identity (id, name, role, avatar, PIN,
    /// creation time) and unknown keys.
    pub fn reset(&mut self, marker: &str) {
        let kept = Profile {
            id: std::mem::take(&mut self.id),
            name: std::mem::take(&mut self.name),
            role: std::mem::take(&mut self.role),
            avatar: std::mem::take(&mut self.avatar),
            pin: self.pin.take(),
            created_at: self.created_at,
            extra: std::mem::take(&mut self.extra),
            game_stats: default_game_stats(),
            reset_at_version: Some(marker.to_string()),
            ..Profile::default()
        };
        *self = kept;
    }
}

pub(crate) fn default_game_stats() -> BTreeMap<GameId, StatBag> {
    GAMES
        .iter()
        .map(|game| (game.id.to_string(), game.default_stats()))
        .collect()
}

/// Profile counters reconciled by keeping the larger side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileCounter {
    TotalXp,
    LifetimeCoins,
    RewardPoints,
    StreakDays,
    PlayTimeMinutes,
}

impl ProfileCounter {
    pub const ALL: [ProfileCounter; 5] = [
        ProfileCounter::TotalXp,
        ProfileCounter::LifetimeCoins,
        ProfileCounter::RewardPoints,
        ProfileCounter::StreakDays,
        ProfileCounter::PlayTimeMinutes,
    ];

    pub fn get(self, profile: &Profile) -> u64 {
        match self {
            ProfileCounter::TotalXp => profile.total_xp,
            ProfileCounter::LifetimeCoins => profile.lifetime_coins,
            ProfileCounter::RewardPoints => profile.reward_points,
            ProfileCounter::StreakDays => profile.streak_days,
            ProfileCounter::PlayTimeMinutes => profile.total_play_time_minutes,
        }
    }

    pub fn set(self, profile: &mut Profile, value: u64) {
        let slot = match self {
            ProfileCounter::TotalXp => &mut profile.total_xp,
            ProfileCounter::LifetimeCoins => &mut profile.lifetime_coins,
            ProfileCounter::RewardPoints => &mut profile.reward_points,
            ProfileCounter::StreakDays => &mut profile.streak_days,
            ProfileCounter::PlayTimeMinutes => &mut profile.total_play_time_minutes,
        };
        *slot = value;
    }

    /// JSON key of the counter.
    pub fn key(self) -> &'static str {
        match self {
            ProfileCounter::TotalXp => "totalXP",
            ProfileCounter::LifetimeCoins => "lifetimeCoins",
            ProfileCounter::RewardPoints => "rewardPoints",
            ProfileCounter::StreakDays => "streakDays",
            ProfileCounter::PlayTimeMinutes => "totalPlayTimeMinutes",
        }
    }
}
