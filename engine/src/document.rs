//! The persisted document and its shared sections.

use crate::daily::DailyChallenges;
use crate::error::{Error, Result};
use crate::migrate::{migrate, MigrationReport};
use crate::profile::Profile;
use crate::record::RemoteRecord;
use crate::{ProfileId, Timestamp};
use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

pub use crate::profile::GUEST_ID;

/// Version written by this crate; older documents are migrated up to it.
pub const SCHEMA_VERSION: &str = "1.2.0";

/// Everything a device persists, as one JSON blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Document {
    pub version: String,
    pub current_player: Option<ProfileId>,
    pub profiles: BTreeMap<ProfileId, Profile>,
    pub family_quest: FamilyQuest,
    pub daily_challenges: DailyChallenges,
    pub claimed_rewards: Vec<RewardClaim>,
    pub pending_rewards: Vec<RewardClaim>,
    pub settings: Settings,
    /// Set by a reset; local state then beats remote copies taken before it
    pub reset_at_version: Option<String>,
    pub last_updated: Timestamp,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Document {
    fn default() -> Self {
        Self::new(Timestamp::default())
    }
}

impl Document {
    /// Fresh document holding only the guest profile.
    pub fn new(now: Timestamp) -> Self {
        let mut profiles = BTreeMap::new();
        profiles.insert(GUEST_ID.to_string(), Profile::guest(now));
        Self {
            version: SCHEMA_VERSION.to_string(),
            current_player: None,
            profiles,
            family_quest: FamilyQuest::default(),
            daily_challenges: DailyChallenges::default(),
            claimed_rewards: Vec::new(),
            pending_rewards: Vec::new(),
            settings: Settings::default(),
            reset_at_version: None,
            last_updated: now,
            extra: Map::new(),
        }
    }

    pub fn profile(&self, id: &str) -> Result<&Profile> {
        self.profiles
            .get(id)
            .ok_or_else(|| Error::ProfileNotFound(id.to_string()))
    }

    pub fn profile_mut(&mut self, id: &str) -> Result<&mut Profile> {
        self.profiles
            .get_mut(id)
            .ok_or_else(|| Error::ProfileNotFound(id.to_string()))
    }

    /// Restore derived fields: ids match map keys, levels match experience,
    /// the guest exists and has no PIN.
    pub fn normalize(&mut self) {
        for (id, profile) in self.profiles.iter_mut() {
            if profile.id != *id {
                profile.id = id.clone();
            }
            profile.refresh_level();
        }

        let now = self.last_updated;
        let guest = self
            .profiles
            .entry(GUEST_ID.to_string())
            .or_insert_with(|| Profile::guest(now));
        guest.pin = None;
    }

    /// Parse a stored blob, migrating it to the current schema.
    ///
    /// `now` is only used to stamp sections the blob is missing.
    pub fn from_json(json: &str, now: Timestamp) -> Result<(Document, MigrationReport)> {
        let mut value: Value =
            serde_json::from_str(json).map_err(|e| Error::InvalidDocument(e.to_string()))?;
        let report = migrate(&mut value, now)?;
        let mut doc: Document =
            serde_json::from_value(value).map_err(|e| Error::InvalidDocument(e.to_string()))?;
        doc.normalize();
        Ok((doc, report))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(self).map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::InvalidDocument(e.to_string()))
    }

    /// One remote record per non-guest profile, each carrying the
    /// document's reset marker (falling back to the profile's own), family
    /// quest and settings.
    pub fn remote_records(&self) -> Result<Vec<RemoteRecord>> {
        let family_quest = to_value(&self.family_quest)?;
        let settings = to_value(&self.settings)?;

        self.profiles
            .values()
            .filter(|profile| !profile.is_guest())
            .map(|profile| {
                let mut data = to_value(profile)?;
                if let (Some(marker), Value::Object(map)) = (&self.reset_at_version, &mut data) {
                    map.insert("resetAtVersion".to_string(), Value::String(marker.clone()));
                }
                Ok(RemoteRecord {
                    id: profile.id.clone(),
                    pin: profile.pin.clone(),
                    data,
                    family_quest: Some(family_quest.clone()),
                    settings: Some(settings.clone()),
                    last_updated: self.last_updated,
                })
            })
            .collect()
    }
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::InvalidDocument(e.to_string()))
}

/// Reset marker for a reset performed at `now`.
pub fn reset_marker(now: Timestamp) -> String {
    format!(
        "{SCHEMA_VERSION}@{}",
        now.to_rfc3339_opts(SecondsFormat::Millis, true)
    )
}

/// Shared experience goal for the whole family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FamilyQuest {
    pub active: bool,
    pub goal: u64,
    pub current: u64,
    pub reward: String,
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub contributions: BTreeMap<ProfileId, u64>,
}

impl Default for FamilyQuest {
    fn default() -> Self {
        Self {
            active: false,
            goal: 500,
            current: 0,
            reward: "Pizza Night Pick".to_string(),
            start_date: None,
            end_date: None,
            contributions: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
    Pending,
    Fulfilled,
}

/// A real-world reward a player paid for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardClaim {
    pub player_id: ProfileId,
    pub reward_id: String,
    pub reward_name: String,
    pub points_spent: u64,
    pub claimed_at: Timestamp,
    pub status: RewardStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fulfilled_at: Option<Timestamp>,
}

/// Hub settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Settings {
    pub show_leaderboard: bool,
    pub sound_enabled: bool,
    #[serde(rename = "parentPIN")]
    pub parent_pin: String,
    pub tutorial_seen: bool,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            show_leaderboard: true,
            sound_enabled: true,
            parent_pin: "1234".to_string(),
            tutorial_seen: false,
            extra: Map::new(),
        }
    }
}

/// Partial settings update; `None` leaves a field as is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsPatch {
    pub show_leaderboard: Option<bool>,
    pub sound_enabled: Option<bool>,
    pub tutorial_seen: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Settings {
    pub fn apply(&mut self, patch: SettingsPatch) {
        if let Some(v) = patch.show_leaderboard {
            self.show_leaderboard = v;
        }
        if let Some(v) = patch.sound_enabled {
            self.sound_enabled = v;
        }
        if let Some(v) = patch.tutorial_seen {
            self.tutorial_seen = v;
        }
        // The parent PIN only changes through `change_parent_pin`.
        self.extra.extend(
            patch
                .extra
                .into_iter()
                .filter(|(key, _)| !SETTINGS_KEYS.contains(&key.as_str())),
        );
    }
}

const SETTINGS_KEYS: &[&str] = &["showLeaderboard", "soundEnabled", "parentPIN", "tutorialSeen"];

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn now() -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 14, 16, 0, 0).unwrap()
    }

    #[test]
    fn new_document_has_guest_only() {
        let doc = Document::new(now());
        assert_eq!(doc.version, SCHEMA_VERSION);
        assert_eq!(doc.profiles.len(), 1);
        assert!(doc.profiles[GUEST_ID].is_guest());
        assert_eq!(doc.settings.parent_pin, "1234");
        assert_eq!(doc.family_quest.goal, 500);
    }

    #[test]
    fn missing_profile_is_an_error() {
        let mut doc = Document::new(now());
        assert_eq!(
            doc.profile_mut("nobody").unwrap_err(),
            Error::ProfileNotFound("nobody".into())
        );
    }

    #[test]
    fn unknown_top_level_keys_survive_a_round_trip() {
        let mut doc = Document::new(now());
        doc.extra.insert("hubLayout".into(), json!({"grid": true}));
        let json = doc.to_json().unwrap();

        let (parsed, report) = Document::from_json(&json, now()).unwrap();
        assert_eq!(parsed.extra["hubLayout"], json!({"grid": true}));
        assert!(report.steps.is_empty());
    }

    #[test]
    fn from_json_rejects_garbage() {
        assert!(matches!(
            Document::from_json("{not json", now()),
            Err(Error::InvalidDocument(_))
        ));
        assert!(matches!(
            Document::from_json("[1, 2]", now()),
            Err(Error::InvalidDocument(_))
        ));
    }

    #[test]
    fn normalize_fixes_ids_and_levels() {
        let mut doc = Document::new(now());
        let mut ada = Profile::new("wrong", "Ada", None, now());
        ada.total_xp = 1200;
        doc.profiles.insert("ada".into(), ada);
        doc.profiles.remove(GUEST_ID);

        doc.normalize();
        assert_eq!(doc.profiles["ada"].id, "ada");
        assert_eq!(doc.profiles["ada"].level(), 5);
        assert!(doc.profiles.contains_key(GUEST_ID));
    }

    #[test]
    fn remote_records_skip_guest_and_carry_marker() {
        let mut doc = Document::new(now());
        doc.profiles
            .insert("ada".into(), Profile::new("ada", "Ada", Some("2468".into()), now()));
        doc.reset_at_version = Some(reset_marker(now()));

        let records = doc.remote_records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "ada");
        assert_eq!(records[0].pin.as_deref(), Some("2468"));
        assert_eq!(
            records[0].data["resetAtVersion"],
            json!("1.2.0@2026-03-14T16:00:00.000Z")
        );
        assert_eq!(records[0].last_updated, now());
    }

    #[test]
    fn settings_patch_merges() {
        let mut settings = Settings::default();
        let mut patch = SettingsPatch {
            sound_enabled: Some(false),
            ..SettingsPatch::default()
        };
        patch.extra.insert("volume".into(), json!(0.4));
        settings.apply(patch);

        assert!(!settings.sound_enabled);
        assert!(settings.show_leaderboard);
        assert_eq!(settings.extra["volume"], json!(0.4));
        assert_eq!(serde_json::to_value(&settings).unwrap()["parentPIN"], json!("1234"));
    }
}
