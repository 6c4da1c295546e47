//! Game session start and end.

use crate::catalog::{earned_game_achievements, game_by_id};
use crate::daily::CompletedChallenge;
use crate::document::Document;
use crate::error::{Error, Result};
use crate::progress::StreakUpdate;
use crate::stats::{apply_delta, StatBag, StatValue};
use crate::{AchievementId, LocalTime};
use chrono::{Datelike, Days, Timelike, Utc, Weekday};
use serde::Serialize;

/// Hour (local, 24h) from which the night owl achievement unlocks.
const NIGHT_HOUR: u32 = 20;

/// Stat field that also feeds the profile's total play time.
pub const PLAY_TIME_FIELD: &str = "playTimeMinutes";
pub const GAMES_PLAYED_FIELD: &str = "gamesPlayed";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionStart {
    pub streak: StreakUpdate,
    /// Achievements unlocked by starting this session
    pub unlocked: Vec<AchievementId>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnd {
    /// The game's stats after the session was applied
    pub stats: StatBag,
    pub unlocked: Vec<AchievementId>,
    pub challenges_completed: Vec<CompletedChallenge>,
}

impl Document {
    /// Mark the start of a session: last played, streak and the
    /// time-of-day achievements follow the caller's local clock.
    pub fn record_game_start(
        &mut self,
        id: &str,
        game_id: &str,
        now: LocalTime,
    ) -> Result<SessionStart> {
        let profile = self.profile_mut(id)?;
        let game = game_by_id(game_id).ok_or_else(|| Error::UnknownGame(game_id.to_string()))?;

        let today = now.date_naive();
        let previous_day = profile
            .last_played
            .map(|at| at.with_timezone(now.offset()).date_naive());
        profile.last_played = Some(now.with_timezone(&Utc));
        profile.last_played_game = Some(game.id.to_string());

        let streak = self.update_streak_on(id, today)?;

        let mut candidates = vec!["first_game"];
        if now.hour() >= NIGHT_HOUR {
            candidates.push("secret_night");
        }
        // Saturday then Sunday of the same weekend
        if today.weekday() == Weekday::Sun && previous_day == today.checked_sub_days(Days::new(1)) {
            candidates.push("secret_weekend");
        }
        let mut unlocked = streak.unlocked.clone();
        unlocked.extend(self.unlock_all(id, candidates)?);

        Ok(SessionStart { streak, unlocked })
    }

    /// Apply a finished session's stat delta.
    ///
    /// `gamesPlayed` always goes up by one; every delta field follows its
    /// stat policy, `playTimeMinutes` also adds to the profile total, and the
    /// delta advances today's daily challenges.
    pub fn record_game_end(
        &mut self,
        id: &str,
        game_id: &str,
        delta: &StatBag,
        now: LocalTime,
    ) -> Result<GameEnd> {
        let profile = self.profile_mut(id)?;
        let game = game_by_id(game_id).ok_or_else(|| Error::UnknownGame(game_id.to_string()))?;

        let stats = profile.stats_mut(game.id);
        apply_delta(stats, GAMES_PLAYED_FIELD, &StatValue::Int(1));
        for (field, value) in delta {
            apply_delta(stats, field, value);
        }
        let stats = stats.clone();

        if let Some(minutes) = delta.get(PLAY_TIME_FIELD).and_then(StatValue::as_i64) {
            profile.total_play_time_minutes = profile
                .total_play_time_minutes
                .saturating_add(minutes.max(0) as u64);
        }

        let challenges_completed =
            self.advance_daily_challenges(id, game.id, delta, now.date_naive())?;
        let unlocked = self.unlock_all(id, earned_game_achievements(game.id, &stats))?;

        Ok(GameEnd {
            stats,
            unlocked,
            challenges_completed,
        })
    }

    pub fn game_stats(&self, id: &str, game_id: &str) -> Result<Option<&StatBag>> {
        Ok(self.profile(id)?.game_stats.get(game_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::Profile;
    use crate::stats::{policy_for, StatPolicy};
    use crate::Timestamp;
    use chrono::{FixedOffset, TimeZone};

    fn local(d: u32, hour: u32) -> LocalTime {
        FixedOffset::west_opt(5 * 3600)
            .unwrap()
            .with_ymd_and_hms(2026, 3, d, hour, 0, 0)
            .unwrap()
    }

    fn doc() -> Document {
        let mut doc = Document::new(Timestamp::default());
        doc.profiles
            .insert("ada".into(), Profile::new("ada", "Ada", None, Timestamp::default()));
        doc
    }

    fn delta(entries: &[(&str, StatValue)]) -> StatBag {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn first_session_unlocks_first_game() {
        let mut doc = doc();
        let start = doc.record_game_start("ada", "spellSiege", local(10, 15)).unwrap();
        assert_eq!(start.streak.streak_days, 1);
        assert_eq!(start.unlocked, vec!["first_game".to_string()]);

        let ada = doc.profile("ada").unwrap();
        assert_eq!(ada.last_played_game.as_deref(), Some("spellSiege"));
        assert_eq!(ada.last_played, Some(local(10, 15).with_timezone(&Utc)));
    }

    #[test]
    fn unknown_game_is_rejected_without_changes() {
        let mut doc = doc();
        let before = doc.clone();
        assert_eq!(
            doc.record_game_start("ada", "pong", local(10, 15)).unwrap_err(),
            Error::UnknownGame("pong".into())
        );
        assert!(doc.record_game_end("ada", "pong", &StatBag::new(), local(10, 15)).is_err());
        assert_eq!(doc, before);
    }

    #[test]
    fn night_session_uses_local_hour() {
        let mut doc = doc();
        // 21:00 at UTC-5 is 02:00 UTC the next day
        let start = doc.record_game_start("ada", "wordForge", local(10, 21)).unwrap();
        assert!(start.unlocked.contains(&"secret_night".to_string()));
        assert_eq!(
            doc.profile("ada").unwrap().streak_last_date,
            Some(local(10, 21).date_naive())
        );
    }

    #[test]
    fn weekend_warrior_needs_saturday_then_sunday() {
        let mut doc = doc();
        // 2026-03-14 is a Saturday
        doc.record_game_start("ada", "spellSiege", local(14, 10)).unwrap();
        let sunday = doc.record_game_start("ada", "spellSiege", local(15, 10)).unwrap();
        assert!(sunday.unlocked.contains(&"secret_weekend".to_string()));
        assert_eq!(sunday.streak.streak_days, 2);
    }

    #[test]
    fn game_end_applies_policies() {
        let mut doc = doc();
        doc.record_game_end(
            "ada",
            "spellSiege",
            &delta(&[("highScore", 500.into()), ("wordsSpelled", 40.into())]),
            local(10, 15),
        )
        .unwrap();
        let end = doc
            .record_game_end(
                "ada",
                "spellSiege",
                &delta(&[
                    ("highScore", 300.into()),
                    ("wordsSpelled", 70.into()),
                    ("playTimeMinutes", 12.into()),
                ]),
                local(10, 16),
            )
            .unwrap();

        assert_eq!(end.stats["gamesPlayed"], StatValue::Int(2));
        assert_eq!(end.stats["highScore"], StatValue::Int(500));
        assert_eq!(end.stats["wordsSpelled"], StatValue::Int(110));
        assert!(end.unlocked.contains(&"ss_words_100".to_string()));
        assert_eq!(doc.profile("ada").unwrap().total_play_time_minutes, 12);
    }

    #[test]
    fn undeclared_counters_accumulate() {
        let mut doc = doc();
        for (regions, streak) in [(2_i64, 5_i64), (3, 4)] {
            doc.record_game_end(
                "ada",
                "canadaAdventure",
                &delta(&[("regionsUnlocked", regions.into()), ("bestStreak", streak.into())]),
                local(10, 15),
            )
            .unwrap();
        }
        let stats = doc.game_stats("ada", "canadaAdventure").unwrap().unwrap();
        // the catalog default starts one region unlocked
        assert_eq!(stats["regionsUnlocked"], StatValue::Int(6));
        assert_eq!(stats["bestStreak"], StatValue::Int(9));
        assert_eq!(policy_for("regionsUnlocked"), StatPolicy::Accumulate);
    }

    #[test]
    fn racer_best_time_keeps_lowest() {
        let mut doc = doc();
        for time in [61.5, 58.25, 70.0] {
            doc.record_game_end("ada", "luminaRacer", &delta(&[("bestTime", time.into())]), local(10, 15))
                .unwrap();
        }
        let stats = doc.game_stats("ada", "luminaRacer").unwrap().unwrap();
        assert_eq!(stats["bestTime"], StatValue::Float(58.25));
        assert!(doc.has_achievement("ada", "lr_first_race").unwrap());
    }
}
