//! Forward migration of stored documents.
//!
//! Migration works on the raw JSON value before typed decoding so that
//! documents written by older versions (or by hand) can be repaired without
//! losing keys this version does not model. Every step is additive and
//! idempotent: running it on an already-current document changes nothing.

use crate::catalog::{game_by_id, GAMES};
use crate::daily::DailyChallenges;
use crate::document::{FamilyQuest, RewardClaim, Settings, SCHEMA_VERSION};
use crate::error::{Error, Result};
use crate::profile::{Inventory, Profile, GUEST_AVATAR, GUEST_ID};
use crate::{ProfileId, Timestamp};
use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

/// Guest avatar used before the SVG asset existed.
const LEGACY_GUEST_AVATAR: &str = "👤";

/// Profile fields holding unsigned counters.
const PROFILE_COUNTERS: &[&str] = &[
    "totalXP",
    "currentCoins",
    "lifetimeCoins",
    "rewardPoints",
    "streakDays",
    "totalPlayTimeMinutes",
];
const PROFILE_TEXT: &[&str] = &["name", "role", "avatar", "title"];
const PROFILE_OPTIONAL_TEXT: &[&str] = &["pin", "lastPlayedGame", "resetAtVersion"];
const SETTINGS_FLAGS: &[&str] = &["showLeaderboard", "soundEnabled", "tutorialSeen"];

/// What a migration run changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationReport {
    /// Version found in the blob, if any
    pub from_version: Option<String>,
    /// Human-readable list of applied repairs
    pub steps: Vec<String>,
}

impl MigrationReport {
    pub fn changed(&self) -> bool {
        !self.steps.is_empty()
    }
}

/// Bring a raw document up to [`SCHEMA_VERSION`].
pub fn migrate(doc: &mut Value, now: Timestamp) -> Result<MigrationReport> {
    let kind = json_type_name(doc);
    let Some(root) = doc.as_object_mut() else {
        return Err(Error::InvalidDocument(format!(
            "expected an object, got {kind}"
        )));
    };

    let mut report = MigrationReport {
        from_version: root
            .get("version")
            .and_then(Value::as_str)
            .map(str::to_string),
        steps: Vec::new(),
    };

    if !root.get("profiles").is_some_and(Value::is_object) {
        root.insert("profiles".to_string(), Value::Object(Map::new()));
        report.steps.push("added profiles section".to_string());
    }
    if let Some(Value::Object(profiles)) = root.get_mut("profiles") {
        let before = profiles.len();
        profiles.retain(|_, profile| profile.is_object());
        if profiles.len() != before {
            report
                .steps
                .push(format!("dropped {} non-object profiles", before - profiles.len()));
        }
        for (key, profile) in profiles.iter_mut() {
            if let Value::Object(profile) = profile {
                migrate_profile(key, profile, &mut report.steps)?;
            }
        }

        if !profiles.contains_key(GUEST_ID) {
            profiles.insert(GUEST_ID.to_string(), to_value(&Profile::guest(now))?);
            report.steps.push("added guest profile".to_string());
        }
    }

    fill(root, "familyQuest", &mut report.steps, || {
        to_value(&FamilyQuest::default())
    })?;
    fill(root, "dailyChallenges", &mut report.steps, || {
        to_value(&crate::daily::DailyChallenges::default())
    })?;
    fill(root, "claimedRewards", &mut report.steps, || {
        Ok(Value::Array(Vec::new()))
    })?;
    fill(root, "pendingRewards", &mut report.steps, || {
        Ok(Value::Array(Vec::new()))
    })?;
    fill(root, "settings", &mut report.steps, || {
        to_value(&Settings::default())
    })?;
    fill(root, "lastUpdated", &mut report.steps, || to_value(&now))?;

    repair_settings(root, &mut report.steps)?;
    repair_section(root, "familyQuest", &mut report.steps, FamilyQuest::default)?;
    repair_section(root, "dailyChallenges", &mut report.steps, DailyChallenges::default)?;
    repair_section(root, "lastUpdated", &mut report.steps, || now)?;
    repair_section(root, "currentPlayer", &mut report.steps, || None::<ProfileId>)?;
    repair_section(root, "resetAtVersion", &mut report.steps, || None::<String>)?;
    repair_claims(root, "claimedRewards", &mut report.steps);
    repair_claims(root, "pendingRewards", &mut report.steps);

    if report.from_version.as_deref() != Some(SCHEMA_VERSION) {
        root.insert(
            "version".to_string(),
            Value::String(SCHEMA_VERSION.to_string()),
        );
        report.steps.push(format!(
            "version {} -> {SCHEMA_VERSION}",
            report.from_version.as_deref().unwrap_or("none")
        ));
    }

    Ok(report)
}

fn migrate_profile(key: &str, profile: &mut Map<String, Value>, steps: &mut Vec<String>) -> Result<()> {
    if !profile.get("id").is_some_and(Value::is_string) {
        profile.insert("id".to_string(), Value::String(key.to_string()));
        steps.push(format!("{key}: added id"));
    }

    if key == GUEST_ID
        && profile.get("avatar").and_then(Value::as_str) == Some(LEGACY_GUEST_AVATAR)
    {
        profile.insert(
            "avatar".to_string(),
            Value::String(GUEST_AVATAR.to_string()),
        );
        steps.push(format!("{key}: replaced emoji avatar"));
    }

    if !profile.contains_key("pin") {
        profile.insert("pin".to_string(), Value::Null);
        steps.push(format!("{key}: added pin"));
    }

    if !profile.get("gameStats").is_some_and(Value::is_object) {
        profile.insert("gameStats".to_string(), Value::Object(Map::new()));
    }
    if let Some(Value::Object(stats)) = profile.get_mut("gameStats") {
        for game in GAMES {
            if !stats.contains_key(game.id) {
                stats.insert(game.id.to_string(), to_value(&game.default_stats())?);
                steps.push(format!("{key}: added {} stats", game.id));
            }
        }
    }

    if !profile.get("inventory").is_some_and(Value::is_object) {
        profile.insert("inventory".to_string(), to_value(&Inventory::default())?);
        steps.push(format!("{key}: added inventory"));
    }

    repair_profile(key, profile, steps);
    Ok(())
}

/// Coerce mistyped profile fields so that one bad value cannot make the
/// whole blob undecodable. Counters fall back to zero, text fields to their
/// defaults, and malformed list entries are dropped.
pub(crate) fn repair_profile(key: &str, profile: &mut Map<String, Value>, steps: &mut Vec<String>) {
    for field in PROFILE_COUNTERS {
        repair_count(profile, field, key, steps);
    }
    if profile
        .get("level")
        .is_some_and(|v| v.as_u64().and_then(|n| u32::try_from(n).ok()).is_none())
    {
        // derived from totalXP after decoding
        profile.remove("level");
        steps.push(format!("{key}: dropped invalid level"));
    }

    for field in PROFILE_TEXT {
        if let Some(value) = profile.get(*field).filter(|v| !v.is_string()) {
            match scalar_text(value) {
                Some(text) => profile.insert(field.to_string(), Value::String(text)),
                None => profile.remove(*field),
            };
            steps.push(format!("{key}: repaired {field}"));
        }
    }
    for field in PROFILE_OPTIONAL_TEXT {
        if let Some(value) = profile.get(*field).filter(|v| !v.is_string() && !v.is_null()) {
            let text = scalar_text(value).map_or(Value::Null, Value::String);
            profile.insert(field.to_string(), text);
            steps.push(format!("{key}: repaired {field}"));
        }
    }

    if profile.get("lastPlayed").is_some_and(|v| !v.is_null() && !is_timestamp(v)) {
        profile.insert("lastPlayed".to_string(), Value::Null);
        steps.push(format!("{key}: cleared invalid lastPlayed"));
    }
    if profile.get("createdAt").is_some_and(|v| !is_timestamp(v)) {
        profile.remove("createdAt");
        steps.push(format!("{key}: dropped invalid createdAt"));
    }
    if let Some(raw) = profile
        .get("streakLastDate")
        .and_then(Value::as_str)
        .map(str::to_string)
    {
        let next = parse_streak_date(&raw)
            .map(|date| Value::String(date.format("%Y-%m-%d").to_string()))
            .unwrap_or(Value::Null);
        if next != Value::String(raw.clone()) {
            steps.push(format!("{key}: converted streakLastDate '{raw}'"));
            profile.insert("streakLastDate".to_string(), next);
        }
    }

    if profile
        .get("streakLastDate")
        .is_some_and(|v| !v.is_null() && !v.is_string())
    {
        profile.insert("streakLastDate".to_string(), Value::Null);
        steps.push(format!("{key}: cleared invalid streakLastDate"));
    }

    repair_string_list(profile, "achievements", key, steps);

    if let Some(Value::Object(stats)) = profile.get_mut("gameStats") {
        let before = stats.len();
        stats.retain(|game, bag| bag.is_object() || game_by_id(game).is_some());
        if stats.len() != before {
            steps.push(format!("{key}: dropped malformed stats of unknown games"));
        }
        for (game, bag) in stats.iter_mut() {
            if !bag.is_object() {
                if let Some(known) = game_by_id(game) {
                    *bag = to_value(&known.default_stats()).unwrap_or_default();
                }
                steps.push(format!("{key}: reset malformed {game} stats"));
                continue;
            }
            let Some(fields) = bag.as_object_mut() else {
                continue;
            };
            let before = fields.len();
            fields.retain(|_, value| !value.is_object());
            for value in fields.values_mut() {
                if let Value::Array(items) = value {
                    items.retain(Value::is_string);
                }
            }
            if fields.len() != before {
                steps.push(format!("{key}: dropped malformed {game} stats"));
            }
        }
    }

    if let Some(Value::Object(inventory)) = profile.get_mut("inventory") {
        if inventory.get("powerUps").is_some_and(|v| !v.is_object()) {
            inventory.remove("powerUps");
            steps.push(format!("{key}: dropped invalid powerUps"));
        }
        if let Some(Value::Object(power_ups)) = inventory.get_mut("powerUps") {
            let names: Vec<String> = power_ups.keys().cloned().collect();
            for name in names {
                repair_count(power_ups, &name, key, steps);
            }
        }
        repair_string_list(inventory, "themes", key, steps);
        repair_string_list(inventory, "cosmetics", key, steps);
    }
}

fn repair_count(map: &mut Map<String, Value>, field: &str, key: &str, steps: &mut Vec<String>) {
    let Some(value) = map.get(field).filter(|v| !v.is_u64()) else {
        return;
    };
    let count = count_value(value);
    map.insert(field.to_string(), Value::from(count));
    steps.push(format!("{key}: repaired {field}"));
}

/// Salvage a counter: numeric strings and floats are truncated, anything
/// else (null, negative, non-numeric) is zero.
fn count_value(value: &Value) -> u64 {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number
        .filter(|n| n.is_finite() && *n > 0.0)
        .map_or(0, |n| n as u64)
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn is_timestamp(value: &Value) -> bool {
    value
        .as_str()
        .is_some_and(|s| s.parse::<DateTime<FixedOffset>>().is_ok())
}

fn repair_string_list(map: &mut Map<String, Value>, field: &str, key: &str, steps: &mut Vec<String>) {
    match map.get_mut(field) {
        None => {}
        Some(Value::Array(items)) => {
            let before = items.len();
            items.retain(Value::is_string);
            if items.len() != before {
                steps.push(format!("{key}: dropped malformed {field} entries"));
            }
        }
        Some(_) => {
            map.insert(field.to_string(), Value::Array(Vec::new()));
            steps.push(format!("{key}: reset invalid {field}"));
        }
    }
}

/// Settings are repaired field by field so that a bad flag does not cost
/// the parent PIN.
fn repair_settings(root: &mut Map<String, Value>, steps: &mut Vec<String>) -> Result<()> {
    if !root.get("settings").is_some_and(Value::is_object) {
        root.insert("settings".to_string(), to_value(&Settings::default())?);
        steps.push("reset invalid settings".to_string());
        return Ok(());
    }
    if let Some(Value::Object(settings)) = root.get_mut("settings") {
        for flag in SETTINGS_FLAGS {
            if settings.get(*flag).is_some_and(|v| !v.is_boolean()) {
                settings.remove(*flag);
                steps.push(format!("settings: dropped invalid {flag}"));
            }
        }
        if let Some(value) = settings.get("parentPIN").filter(|v| !v.is_string()) {
            match scalar_text(value) {
                Some(pin) => settings.insert("parentPIN".to_string(), Value::String(pin)),
                None => settings.remove("parentPIN"),
            };
            steps.push("settings: repaired parentPIN".to_string());
        }
    }
    Ok(())
}

/// Replace a shared section that no longer decodes with its default.
fn repair_section<T>(
    root: &mut Map<String, Value>,
    key: &str,
    steps: &mut Vec<String>,
    default: impl FnOnce() -> T,
) -> Result<()>
where
    T: Serialize + DeserializeOwned,
{
    let Some(value) = root.get(key) else {
        return Ok(());
    };
    if serde_json::from_value::<T>(value.clone()).is_err() {
        root.insert(key.to_string(), to_value(&default())?);
        steps.push(format!("reset malformed {key}"));
    }
    Ok(())
}

/// Keep the reward claims that still decode.
fn repair_claims(root: &mut Map<String, Value>, key: &str, steps: &mut Vec<String>) {
    match root.get_mut(key) {
        Some(Value::Array(claims)) => {
            let before = claims.len();
            claims.retain(|claim| serde_json::from_value::<RewardClaim>(claim.clone()).is_ok());
            if claims.len() != before {
                steps.push(format!("dropped {} malformed {key}", before - claims.len()));
            }
        }
        Some(_) => {
            root.insert(key.to_string(), Value::Array(Vec::new()));
            steps.push(format!("reset invalid {key}"));
        }
        None => {}
    }
}

/// Parse the streak date formats that have been written over time:
/// ISO dates, full RFC 3339 timestamps and the legacy `Sat Mar 14 2026`.
fn parse_streak_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(raw, "%a %b %d %Y").ok())
        .or_else(|| {
            DateTime::parse_from_rfc3339(raw)
                .ok()
                .map(|dt| dt.date_naive())
        })
}

fn fill(
    root: &mut Map<String, Value>,
    key: &str,
    steps: &mut Vec<String>,
    default: impl FnOnce() -> Result<Value>,
) -> Result<()> {
    if root.get(key).map_or(true, Value::is_null) {
        root.insert(key.to_string(), default()?);
        steps.push(format!("added {key}"));
    }
    Ok(())
}

fn to_value<T: Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| Error::InvalidDocument(e.to_string()))
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
