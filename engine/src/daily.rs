//! Daily challenges.
//!
//! Three challenges are drawn from the template catalog per calendar day.
//! The draw depends only on the date, so every device shows the same set.

use crate::catalog::{ChallengeTemplate, CHALLENGE_TEMPLATES};
use crate::document::Document;
use crate::error::Result;
use crate::stats::{policy_for, StatBag, StatPolicy, StatValue};
use crate::{GameId, ProfileId};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

pub const CHALLENGES_PER_DAY: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct DailyChallenges {
    /// Local day the set was drawn for
    pub date: Option<NaiveDate>,
    pub challenges: Vec<DailyChallenge>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyChallenge {
    pub id: String,
    pub game_id: GameId,
    pub stat: String,
    pub target: u64,
    pub reward_coins: u64,
    pub description: String,
    #[serde(default)]
    pub progress: BTreeMap<ProfileId, u64>,
    #[serde(default)]
    pub completed_by: BTreeSet<ProfileId>,
}

impl From<&ChallengeTemplate> for DailyChallenge {
    fn from(t: &ChallengeTemplate) -> Self {
        Self {
            id: t.id.to_string(),
            game_id: t.game_id.to_string(),
            stat: t.stat.to_string(),
            target: t.target,
            reward_coins: t.reward_coins,
            description: t.description.to_string(),
            progress: BTreeMap::new(),
            completed_by: BTreeSet::new(),
        }
    }
}

/// A challenge a player just finished.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedChallenge {
    pub id: String,
    pub reward_coins: u64,
}

/// Templates for a day: consecutive entries starting at an offset derived
/// from the day number.
pub fn challenges_for(day: NaiveDate) -> Vec<DailyChallenge> {
    let len = CHALLENGE_TEMPLATES.len();
    if len == 0 {
        return Vec::new();
    }
    let start = (day.num_days_from_ce().unsigned_abs() as usize).wrapping_mul(CHALLENGES_PER_DAY) % len;
    (0..CHALLENGES_PER_DAY.min(len))
        .map(|k| DailyChallenge::from(&CHALLENGE_TEMPLATES[(start + k) % len]))
        .collect()
}

impl Document {
    /// Draw today's challenges unless they are already current.
    ///
    /// Returns whether a new set was drawn.
    pub fn refresh_daily_challenges(&mut self, today: NaiveDate) -> bool {
        if self.daily_challenges.date == Some(today) {
            return false;
        }
        self.daily_challenges = DailyChallenges {
            date: Some(today),
            challenges: challenges_for(today),
        };
        true
    }

    /// Feed a game-end delta into today's challenges and pay out any that
    /// the player completes. Each challenge pays a player at most once.
    pub(crate) fn advance_daily_challenges(
        &mut self,
        id: &str,
        game_id: &str,
        delta: &StatBag,
        today: NaiveDate,
    ) -> Result<Vec<CompletedChallenge>> {
        self.profile(id)?;
        self.refresh_daily_challenges(today);

        let mut completed = Vec::new();
        for challenge in self
            .daily_challenges
            .challenges
            .iter_mut()
            .filter(|c| c.game_id == game_id && !c.completed_by.contains(id))
        {
            let Some(value) = delta.get(&challenge.stat).and_then(StatValue::as_i64) else {
                continue;
            };
            let value = value.max(0) as u64;
            let progress = challenge.progress.entry(id.to_string()).or_default();
            *progress = match policy_for(&challenge.stat) {
                StatPolicy::Max => (*progress).max(value),
                _ => progress.saturating_add(value),
            };

            if *progress >= challenge.target {
                challenge.completed_by.insert(id.to_string());
                completed.push(CompletedChallenge {
                    id: challenge.id.clone(),
                    reward_coins: challenge.reward_coins,
                });
            }
        }

        let coins: u64 = completed.iter().map(|c| c.reward_coins).sum();
        if coins > 0 {
            self.add_coins(id, coins)?;
        }
        Ok(completed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use crate::Timestamp;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, d).unwrap()
    }

    fn doc() -> Document {
        let mut doc = Document::new(Timestamp::default());
        doc.profiles
            .insert("ada".into(), Profile::new("ada", "Ada", None, Timestamp::default()));
        doc
    }

    #[test]
    fn draw_is_deterministic_and_distinct() {
        let a = challenges_for(day(14));
        let b = challenges_for(day(14));
        assert_eq!(a, b);
        assert_eq!(a.len(), CHALLENGES_PER_DAY);

        let ids: BTreeSet<_> = a.iter().map(|c| c.id.clone()).collect();
        assert_eq!(ids.len(), CHALLENGES_PER_DAY);
        assert_ne!(challenges_for(day(15)), a);
    }

    #[test]
    fn refresh_only_once_per_day() {
        let mut doc = doc();
        assert!(doc.refresh_daily_challenges(day(14)));
        assert!(!doc.refresh_daily_challenges(day(14)));
        assert!(doc.refresh_daily_challenges(day(15)));
        assert_eq!(doc.daily_challenges.date, Some(day(15)));
    }

    #[test]
    fn completing_a_challenge_pays_once() {
        let mut doc = doc();
        doc.refresh_daily_challenges(day(14));
        let challenge = doc.daily_challenges.challenges[0].clone();

        let mut delta = StatBag::new();
        delta.insert(challenge.stat.clone(), StatValue::Int(challenge.target as i64));

        let done = doc
            .advance_daily_challenges("ada", &challenge.game_id, &delta, day(14))
            .unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].id, challenge.id);
        assert_eq!(doc.profile("ada").unwrap().current_coins, challenge.reward_coins);

        let again = doc
            .advance_daily_challenges("ada", &challenge.game_id, &delta, day(14))
            .unwrap();
        assert!(again.is_empty());
        assert_eq!(doc.profile("ada").unwrap().current_coins, challenge.reward_coins);
    }

    #[test]
    fn partial_progress_accumulates() {
        let mut doc = doc();
        doc.refresh_daily_challenges(day(14));
        let challenge = doc.daily_challenges.challenges[0].clone();
        let half = (challenge.target / 2).max(1) as i64;

        let mut delta = StatBag::new();
        delta.insert(challenge.stat.clone(), StatValue::Int(half));
        doc.advance_daily_challenges("ada", &challenge.game_id, &delta, day(14))
            .unwrap();

        assert_eq!(doc.daily_challenges.challenges[0].progress["ada"], half as u64);
    }
}
