//! # Lumina Engine
//!
//! Deterministic profile model and sync rules for the Lumina game hub.
//!
//! This crate holds everything about player progression that does not touch
//! a disk or a network: the persisted [`Document`], the [`Profile`] it
//! contains, the level table, the achievement/reward/shop catalogs, schema
//! migration, and the [`Resolver`] that merges a local document with records
//! fetched from the remote profile table.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine never reads files or talks to the network
//! - **Explicit time**: every mutation takes the current time as an argument
//! - **Deterministic**: ordered maps and sets, so the same inputs serialize
//!   to the same bytes
//!
//! ## Core Concepts
//!
//! ### Document and profiles
//!
//! A [`Document`] is the single JSON blob a device persists. It maps profile
//! ids to [`Profile`]s and carries shared state (family quest, daily
//! challenges, reward claims, settings). A profile's level and title are
//! always derived from its experience through [`progression::level_for`].
//!
//! ### Stat bags
//!
//! Per-game statistics are open-ended [`StatBag`]s. Every field name has a
//! declared [`StatPolicy`] that decides how session deltas are applied and
//! how two copies are reconciled.
//!
//! ### Reconciliation
//!
//! The [`Resolver`] merges remote records into a local document. A winner is
//! picked per profile by [`ConflictPolicy`]; cumulative counters then keep
//! the maximum of both sides so progress recorded on either device survives.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{TimeZone, Utc};
//! use lumina_engine::Document;
//!
//! let now = Utc.with_ymd_and_hms(2026, 3, 14, 16, 0, 0).unwrap();
//!
//! let mut doc = Document::new(now);
//! doc.create_profile("ada", "Ada", Some("2468".into()), now).unwrap();
//!
//! let gain = doc.add_xp("ada", 120).unwrap();
//! assert_eq!(gain.level, 2);
//! assert!(gain.leveled_up);
//! ```

pub mod catalog;
pub mod daily;
pub mod document;
pub mod error;
pub mod family;
pub mod migrate;
pub mod players;
pub mod profile;
pub mod progress;
pub mod progression;
pub mod reconcile;
pub mod record;
pub mod rewards;
pub mod session;
pub mod shop;
pub mod stats;

// Re-export main types at crate root
pub use daily::{CompletedChallenge, DailyChallenge, DailyChallenges};
pub use document::{Document, FamilyQuest, RewardClaim, RewardStatus, Settings, SettingsPatch};
pub use document::{GUEST_ID, SCHEMA_VERSION};
pub use error::Error;
pub use migrate::MigrationReport;
pub use profile::{Inventory, Profile, ProfileCounter};
pub use progress::{
    AchievementUnlock, CoinBalance, LeaderboardCategory, LeaderboardEntry, StreakUpdate, XpGain,
};
pub use progression::{LevelInfo, XpProgress};
pub use reconcile::{
    ConflictPolicy, MergeOutcome, MergeReport, ParsePolicyError, ProfileMerge, Resolver,
};
pub use record::RemoteRecord;
pub use rewards::RewardClaimed;
pub use session::{GameEnd, SessionStart};
pub use shop::Purchase;
pub use stats::{StatBag, StatPolicy, StatValue};

/// Type aliases for clarity
pub type ProfileId = String;
pub type GameId = String;
pub type AchievementId = String;
/// Instants stored in the document.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
/// The caller's wall clock, including its UTC offset.
///
/// Streaks, daily challenges and the time-of-day achievements follow the
/// player's calendar, so mutations that care about "today" take this type.
pub type LocalTime = chrono::DateTime<chrono::FixedOffset>;
