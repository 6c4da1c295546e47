//! Reconciliation of a local document with remote records.
//!
//! Given the local document and the rows fetched from the remote table,
//! this module produces the merged document that both sides converge on.
//!
//! # Algorithm
//!
//! For every remote record (the guest is never synced):
//!
//! 1. Unknown locally: adopt the remote profile
//! 2. Local document carries a reset marker the record does not: keep local
//! 3. Pick a winner by [`ConflictPolicy`]
//! 4. Reconcile fields: counters keep the maximum, collections union, game
//!    stats follow their [`StatPolicy`](crate::StatPolicy), everything else
//!    comes from the winner
//! 5. Replace the family quest if the record's started strictly later
//!
//! Merging is idempotent: applying the same records twice yields the same
//! document as applying them once.

use crate::document::{Document, FamilyQuest, GUEST_ID};
use crate::profile::{Profile, ProfileCounter};
use crate::record::RemoteRecord;
use crate::stats::{merge_bags, StatBag};
use crate::{ProfileId, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::str::FromStr;
use thiserror::Error;

/// Which copy of a profile wins a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConflictPolicy {
    /// Strictly later timestamp wins, ties keep local (default)
    #[default]
    PreferNewer,
    PreferLocal,
    PreferRemote,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown conflict policy '{0}' (expected newer, local or remote)")]
pub struct ParsePolicyError(pub String);

impl FromStr for ConflictPolicy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "newer" => Ok(ConflictPolicy::PreferNewer),
            "local" => Ok(ConflictPolicy::PreferLocal),
            "remote" | "cloud" => Ok(ConflictPolicy::PreferRemote),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

/// How one remote record was handled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", tag = "outcome")]
pub enum MergeOutcome {
    /// Profile did not exist locally
    Adopted,
    LocalWins,
    RemoteWins,
    /// Local reset marker beat the remote copy
    KeptLocalReset,
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMerge {
    pub id: ProfileId,
    #[serde(flatten)]
    pub outcome: MergeOutcome,
}

/// Result of a merge, one entry per remote record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub profiles: Vec<ProfileMerge>,
    pub family_quest_replaced: bool,
}

impl MergeReport {
    fn push(&mut self, id: &str, outcome: MergeOutcome) {
        self.profiles.push(ProfileMerge {
            id: id.to_string(),
            outcome,
        });
    }

    pub fn skipped(&self) -> impl Iterator<Item = &ProfileMerge> {
        self.profiles
            .iter()
            .filter(|p| matches!(p.outcome, MergeOutcome::Skipped { .. }))
    }
}

/// Merges remote records into a local document.
#[derive(Debug, Clone, Copy, Default)]
pub struct Resolver {
    policy: ConflictPolicy,
}

impl Resolver {
    pub fn new(policy: ConflictPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ConflictPolicy {
        self.policy
    }

    /// Merge `records` into a copy of `local`.
    ///
    /// Every local field not named by a record is preserved.
    pub fn merge(&self, local: &Document, records: &[RemoteRecord]) -> (Document, MergeReport) {
        let mut merged = local.clone();
        let mut report = MergeReport::default();

        for record in records {
            if record.id == GUEST_ID {
                report.push(
                    &record.id,
                    MergeOutcome::Skipped {
                        reason: "guest profile is never synced".to_string(),
                    },
                );
                continue;
            }

            let remote = match record.profile() {
                Ok(profile) => profile,
                Err(e) => {
                    report.push(
                        &record.id,
                        MergeOutcome::Skipped {
                            reason: e.to_string(),
                        },
                    );
                    continue;
                }
            };

            let outcome = match merged.profiles.get(&record.id) {
                None => {
                    merged.profiles.insert(record.id.clone(), remote);
                    MergeOutcome::Adopted
                }
                Some(_) if local_reset_wins(local, record) => {
                    report.push(&record.id, MergeOutcome::KeptLocalReset);
                    // the record's family quest predates the reset
                    continue;
                }
                Some(existing) => {
                    let local_updated = existing.last_played.unwrap_or_default();
                    let remote_wins = self.remote_wins(local_updated, record.last_updated);
                    let (profile, outcome) = if remote_wins {
                        (merge_profiles(&remote, existing), MergeOutcome::RemoteWins)
                    } else {
                        (merge_profiles(existing, &remote), MergeOutcome::LocalWins)
                    };
                    merged.profiles.insert(record.id.clone(), profile);
                    outcome
                }
            };
            report.push(&record.id, outcome);

            if let Some(quest) = newer_family_quest(&merged.family_quest, record) {
                merged.family_quest = quest;
                report.family_quest_replaced = true;
            }
        }

        (merged, report)
    }

    fn remote_wins(&self, local_updated: Timestamp, remote_updated: Timestamp) -> bool {
        match self.policy {
            ConflictPolicy::PreferRemote => true,
            ConflictPolicy::PreferLocal => false,
            ConflictPolicy::PreferNewer => remote_updated > local_updated,
        }
    }
}

fn local_reset_wins(local: &Document, record: &RemoteRecord) -> bool {
    match local.reset_at_version.as_deref() {
        Some(marker) => record.reset_marker() != Some(marker),
        None => false,
    }
}

/// The record's family quest, if it parses and started strictly later.
fn newer_family_quest(current: &FamilyQuest, record: &RemoteRecord) -> Option<FamilyQuest> {
    let quest: FamilyQuest = serde_json::from_value(record.family_quest.clone()?).ok()?;
    let remote_start = quest.start_date.unwrap_or_default();
    let local_start = current.start_date.unwrap_or_default();
    (remote_start > local_start).then_some(quest)
}

/// Reconcile two copies of one profile.
///
/// Starts from `winner`; counters keep the larger side, achievements and
/// owned permanent items union, game stats merge field by field.
pub fn merge_profiles(winner: &Profile, loser: &Profile) -> Profile {
    let mut merged = winner.clone();

    for counter in ProfileCounter::ALL {
        counter.set(&mut merged, counter.get(winner).max(counter.get(loser)));
    }

    merged.achievements = union(&winner.achievements, &loser.achievements);
    merged.inventory.themes = union(&winner.inventory.themes, &loser.inventory.themes);
    merged.inventory.cosmetics = union(&winner.inventory.cosmetics, &loser.inventory.cosmetics);

    let empty = StatBag::new();
    let games: BTreeSet<&String> = winner
        .game_stats
        .keys()
        .chain(loser.game_stats.keys())
        .collect();
    merged.game_stats = games
        .into_iter()
        .map(|game| {
            let bag = merge_bags(
                winner.game_stats.get(game).unwrap_or(&empty),
                loser.game_stats.get(game).unwrap_or(&empty),
            );
            (game.clone(), bag)
        })
        .collect();

    merged.refresh_level();
    merged
}

fn union(a: &BTreeSet<String>, b: &BTreeSet<String>) -> BTreeSet<String> {
    a.union(b).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatValue;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;

    fn t(hour: u32) -> Timestamp {
        Utc.with_ymd_and_hms(2026, 3, 14, hour, 0, 0).unwrap()
    }

    fn local_doc() -> Document {
        let mut doc = Document::new(t(8));
        let mut ada = Profile::new("ada", "Ada", Some("2468".into()), t(8));
        ada.total_xp = 400;
        ada.current_coins = 30;
        ada.last_played = Some(t(10));
        ada.achievements.insert("first_game".into());
        ada.stats_mut("spellSiege")
            .insert("highScore".into(), StatValue::Int(300));
        ada.refresh_level();
        doc.profiles.insert("ada".into(), ada);
        doc
    }

    fn remote_record(updated: Timestamp, edit: impl FnOnce(&mut Profile)) -> RemoteRecord {
        let mut profile = local_doc().profiles["ada"].clone();
        edit(&mut profile);
        RemoteRecord {
            id: "ada".into(),
            pin: profile.pin.clone(),
            data: serde_json::to_value(&profile).unwrap(),
            family_quest: None,
            settings: None,
            last_updated: updated,
        }
    }

    #[test]
    fn parse_policy() {
        assert_eq!("newer".parse(), Ok(ConflictPolicy::PreferNewer));
        assert_eq!("LOCAL".parse(), Ok(ConflictPolicy::PreferLocal));
        assert_eq!("cloud".parse(), Ok(ConflictPolicy::PreferRemote));
        assert!("sideways".parse::<ConflictPolicy>().is_err());
    }

    #[test]
    fn empty_records_is_identity() {
        let local = local_doc();
        let (merged, report) = Resolver::default().merge(&local, &[]);
        assert_eq!(merged, local);
        assert!(report.profiles.is_empty());
    }

    #[test]
    fn newer_remote_wins_but_keeps_best_stats() {
        let record = remote_record(t(12), |p| {
            p.name = "Ada L.".into();
            p.total_xp = 350;
            p.current_coins = 5;
            p.achievements.insert("streak_3".into());
            p.stats_mut("spellSiege")
                .insert("highScore".into(), StatValue::Int(500));
        });

        let (merged, report) = Resolver::default().merge(&local_doc(), &[record]);
        let ada = &merged.profiles["ada"];

        assert_eq!(report.profiles[0].outcome, MergeOutcome::RemoteWins);
        assert_eq!(ada.name, "Ada L.");
        assert_eq!(ada.current_coins, 5);
        assert_eq!(ada.total_xp, 400);
        assert_eq!(ada.level(), 3);
        assert!(ada.achievements.contains("first_game"));
        assert!(ada.achievements.contains("streak_3"));
        assert_eq!(
            ada.game_stats["spellSiege"]["highScore"],
            StatValue::Int(500)
        );
    }

    #[test]
    fn timestamp_tie_keeps_local() {
        let record = remote_record(t(10), |p| p.name = "Remote".into());
        let (merged, report) = Resolver::default().merge(&local_doc(), &[record]);
        assert_eq!(report.profiles[0].outcome, MergeOutcome::LocalWins);
        assert_eq!(merged.profiles["ada"].name, "Ada");
    }

    #[test]
    fn explicit_policies_ignore_timestamps() {
        let record = remote_record(t(1), |p| p.name = "Remote".into());

        let (merged, _) = Resolver::new(ConflictPolicy::PreferRemote).merge(&local_doc(), &[record.clone()]);
        assert_eq!(merged.profiles["ada"].name, "Remote");

        let record = remote_record(t(23), |p| p.name = "Remote".into());
        let (merged, _) = Resolver::new(ConflictPolicy::PreferLocal).merge(&local_doc(), &[record]);
        assert_eq!(merged.profiles["ada"].name, "Ada");
    }

    #[test]
    fn unknown_profile_is_adopted() {
        let mut record = remote_record(t(12), |p| {
            p.name = "Bo".into();
            p.total_xp = 1600;
        });
        record.id = "bo".into();

        let (merged, report) = Resolver::default().merge(&local_doc(), &[record]);
        assert_eq!(report.profiles[0].outcome, MergeOutcome::Adopted);
        let bo = &merged.profiles["bo"];
        assert_eq!(bo.id, "bo");
        assert_eq!(bo.level(), 6);
    }

    #[test]
    fn guest_and_malformed_records_are_skipped() {
        let mut guest = remote_record(t(12), |_| {});
        guest.id = GUEST_ID.into();
        let mut broken = remote_record(t(12), |_| {});
        broken.data = json!({ "gameStats": "lots" });

        let local = local_doc();
        let (merged, report) = Resolver::default().merge(&local, &[guest, broken]);
        assert_eq!(merged, local);
        assert_eq!(report.skipped().count(), 2);
    }

    #[test]
    fn local_reset_beats_remote_progress() {
        let mut local = local_doc();
        local.reset_at_version = Some("1.2.0@2026-03-14T09:00:00.000Z".into());
        let mut record = remote_record(t(12), |p| p.total_xp = 5000);
        record.family_quest = Some(json!({ "active": true, "goal": 900, "startDate": t(11) }));

        let (merged, report) = Resolver::default().merge(&local, &[record]);
        assert_eq!(report.profiles[0].outcome, MergeOutcome::KeptLocalReset);
        assert_eq!(merged.profiles["ada"].total_xp, 400);
        assert!(!report.family_quest_replaced);
        assert_eq!(merged.family_quest.goal, 500);
    }

    #[test]
    fn matching_reset_marker_merges_normally() {
        let marker = "1.2.0@2026-03-14T09:00:00.000Z";
        let mut local = local_doc();
        local.reset_at_version = Some(marker.into());
        let mut record = remote_record(t(12), |p| p.total_xp = 700);
        record.data["resetAtVersion"] = json!(marker);

        let (merged, _) = Resolver::default().merge(&local, &[record]);
        assert_eq!(merged.profiles["ada"].total_xp, 700);
    }

    #[test]
    fn family_quest_replaced_only_when_started_later() {
        let mut local = local_doc();
        local.family_quest.start_date = Some(t(9));

        let mut record = remote_record(t(12), |_| {});
        record.family_quest = Some(json!({ "active": true, "goal": 800, "startDate": t(9) }));
        let (merged, report) = Resolver::default().merge(&local, &[record.clone()]);
        assert!(!report.family_quest_replaced);
        assert_eq!(merged.family_quest.goal, 500);

        record.family_quest = Some(json!({
            "active": true,
            "goal": 800,
            "startDate": t(9) + Duration::minutes(1)
        }));
        let (merged, report) = Resolver::default().merge(&local, &[record]);
        assert!(report.family_quest_replaced);
        assert_eq!(merged.family_quest.goal, 800);
    }

    #[test]
    fn counters_take_max_never_sum() {
        let mut a = Profile::new("ada", "Ada", None, t(0));
        a.lifetime_coins = 120;
        a.total_play_time_minutes = 40;
        let mut b = a.clone();
        b.lifetime_coins = 90;
        b.total_play_time_minutes = 55;

        let merged = merge_profiles(&a, &b);
        assert_eq!(merged.lifetime_coins, 120);
        assert_eq!(merged.total_play_time_minutes, 55);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn arb_profile() -> impl Strategy<Value = Profile> {
            (
                0u64..12_000,
                0u64..3_000,
                0u64..500,
                0i64..10_000,
                prop::collection::btree_set("[a-z_]{3,8}", 0..4),
                prop::option::of(0u32..24),
            )
                .prop_map(|(xp, coins, minutes, score, achievements, hour)| {
                    let mut p = Profile::new("ada", "Ada", None, t(0));
                    p.total_xp = xp;
                    p.lifetime_coins = coins;
                    p.total_play_time_minutes = minutes;
                    p.achievements = achievements;
                    p.last_played = hour.map(t);
                    p.stats_mut("spellSiege")
                        .insert("highScore".into(), StatValue::Int(score));
                    p.refresh_level();
                    p
                })
        }

        fn doc_with(profile: Profile) -> Document {
            let mut doc = Document::new(t(0));
            doc.profiles.insert(profile.id.clone(), profile);
            doc
        }

        fn record_of(profile: &Profile, hour: u32) -> RemoteRecord {
            RemoteRecord {
                id: profile.id.clone(),
                pin: None,
                data: serde_json::to_value(profile).unwrap(),
                family_quest: None,
                settings: None,
                last_updated: t(hour),
            }
        }

        proptest! {
            #[test]
            fn prop_merge_idempotent(
                local in arb_profile(),
                remote in arb_profile(),
                hour in 0u32..24,
            ) {
                let doc = doc_with(local);
                let records = vec![record_of(&remote, hour)];
                let resolver = Resolver::default();

                let (once, _) = resolver.merge(&doc, &records);
                let (twice, _) = resolver.merge(&once, &records);
                prop_assert_eq!(once, twice);
            }

            #[test]
            fn prop_counters_are_max_of_both(
                local in arb_profile(),
                remote in arb_profile(),
                hour in 0u32..24,
            ) {
                let doc = doc_with(local.clone());
                let (merged, _) = Resolver::default().merge(&doc, &[record_of(&remote, hour)]);
                let ada = &merged.profiles["ada"];

                for counter in ProfileCounter::ALL {
                    prop_assert_eq!(
                        counter.get(ada),
                        counter.get(&local).max(counter.get(&remote))
                    );
                }
                prop_assert_eq!(ada.level(), crate::progression::level_for(ada.total_xp).level);
                prop_assert!(ada.achievements.is_superset(&local.achievements));
                prop_assert!(ada.achievements.is_superset(&remote.achievements));
            }

            #[test]
            fn prop_empty_merge_is_identity(local in arb_profile()) {
                let doc = doc_with(local);
                let (merged, report) = Resolver::default().merge(&doc, &[]);
                prop_assert_eq!(merged, doc);
                prop_assert!(report.profiles.is_empty());
            }
        }
    }
}
