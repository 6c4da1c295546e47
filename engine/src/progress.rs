//! Experience, coins, reward points, achievements and streaks.

use crate::catalog::{achievement_by_id, COIN_MILESTONES, LEVEL_MILESTONES, STREAK_MILESTONES};
use crate::document::Document;
use crate::error::{Error, Result};
use crate::profile::Profile;
use crate::progression::{xp_progress, XpProgress};
use crate::{AchievementId, LocalTime, ProfileId};
use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Outcome of an experience change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct XpGain {
    #[serde(rename = "newXP")]
    pub new_xp: u64,
    pub level: u32,
    pub title: String,
    pub leveled_up: bool,
    pub old_level: u32,
    /// Achievements unlocked as a consequence
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unlocked: Vec<AchievementId>,
}

impl XpGain {
    fn observe(profile: &Profile, old_level: u32) -> Self {
        Self {
            new_xp: profile.total_xp,
            level: profile.level(),
            title: profile.title().to_string(),
            leveled_up: profile.level() > old_level,
            old_level,
            unlocked: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoinBalance {
    pub current_coins: u64,
    pub lifetime_coins: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unlocked: Vec<AchievementId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AchievementUnlock {
    pub achievement_id: AchievementId,
    pub name: String,
    #[serde(rename = "xpBonus")]
    pub xp_bonus: u64,
    pub xp: XpGain,
    pub total_achievements: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakUpdate {
    pub streak_days: u64,
    /// False when the player already played today
    pub updated: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub unlocked: Vec<AchievementId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LeaderboardCategory {
    #[default]
    #[serde(rename = "totalXP")]
    TotalXp,
    LifetimeCoins,
    RewardPoints,
    AchievementCount,
    StreakDays,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub id: ProfileId,
    pub name: String,
    pub avatar: String,
    pub level: u32,
    pub title: String,
    #[serde(rename = "totalXP")]
    pub total_xp: u64,
    pub lifetime_coins: u64,
    pub reward_points: u64,
    pub achievement_count: usize,
    pub streak_days: u64,
}

impl LeaderboardEntry {
    fn score(&self, category: LeaderboardCategory) -> u64 {
        match category {
            LeaderboardCategory::TotalXp => self.total_xp,
            LeaderboardCategory::LifetimeCoins => self.lifetime_coins,
            LeaderboardCategory::RewardPoints => self.reward_points,
            LeaderboardCategory::AchievementCount => self.achievement_count as u64,
            LeaderboardCategory::StreakDays => self.streak_days,
        }
    }
}

/// Milestone achievements reached by `value`.
fn reached(milestones: &'static [(u64, &'static str)], value: u64) -> impl Iterator<Item = &'static str> {
    milestones
        .iter()
        .filter(move |(min, _)| value >= *min)
        .map(|(_, id)| *id)
}

impl Document {
    /// Add experience, contributing to an active family quest.
    pub fn add_xp(&mut self, id: &str, amount: u64) -> Result<XpGain> {
        let profile = self.profile_mut(id)?;
        let old_level = profile.level();
        profile.total_xp = profile.total_xp.saturating_add(amount);
        profile.refresh_level();

        if self.family_quest.active {
            self.family_quest.current = self.family_quest.current.saturating_add(amount);
            let contribution = self
                .family_quest
                .contributions
                .entry(id.to_string())
                .or_default();
            *contribution = contribution.saturating_add(amount);
        }

        let unlocked = self.unlock_all(id, std::iter::empty())?;
        let mut gain = XpGain::observe(self.profile(id)?, old_level);
        gain.unlocked = unlocked;
        Ok(gain)
    }

    pub fn add_coins(&mut self, id: &str, amount: u64) -> Result<CoinBalance> {
        let profile = self.profile_mut(id)?;
        profile.current_coins = profile.current_coins.saturating_add(amount);
        profile.lifetime_coins = profile.lifetime_coins.saturating_add(amount);
        let lifetime = profile.lifetime_coins;

        let unlocked = self.unlock_all(id, reached(COIN_MILESTONES, lifetime))?;
        let profile = self.profile(id)?;
        Ok(CoinBalance {
            current_coins: profile.current_coins,
            lifetime_coins: profile.lifetime_coins,
            unlocked,
        })
    }

    /// Spend coins; the balance is untouched when it is too low.
    pub fn spend_coins(&mut self, id: &str, amount: u64) -> Result<CoinBalance> {
        let profile = self.profile_mut(id)?;
        if profile.current_coins < amount {
            return Err(Error::InsufficientCoins {
                needed: amount,
                available: profile.current_coins,
            });
        }
        profile.current_coins -= amount;
        Ok(CoinBalance {
            current_coins: profile.current_coins,
            lifetime_coins: profile.lifetime_coins,
            unlocked: Vec::new(),
        })
    }

    /// Returns the new reward point balance.
    pub fn add_reward_points(&mut self, id: &str, amount: u64) -> Result<u64> {
        let profile = self.profile_mut(id)?;
        profile.reward_points = profile.reward_points.saturating_add(amount);
        Ok(profile.reward_points)
    }

    /// Unlock an achievement and pay its experience bonus.
    ///
    /// `None` when the player already holds it or the id is not in the
    /// catalog; calling it again is a no-op.
    pub fn check_achievement(
        &mut self,
        id: &str,
        achievement_id: &str,
    ) -> Result<Option<AchievementUnlock>> {
        let old_level = self.profile(id)?.level();
        let Some(mut unlock) = self.unlock_one(id, achievement_id)? else {
            return Ok(None);
        };

        // A bonus can cross a level milestone.
        let chained = self.unlock_all(id, std::iter::empty())?;
        let profile = self.profile(id)?;
        unlock.xp = XpGain::observe(profile, old_level);
        unlock.xp.unlocked = chained;
        unlock.total_achievements = profile.achievements.len();
        Ok(Some(unlock))
    }

    pub fn has_achievement(&self, id: &str, achievement_id: &str) -> Result<bool> {
        Ok(self.profile(id)?.achievements.contains(achievement_id))
    }

    /// Advance the daily play streak for the caller's local calendar day.
    pub fn update_streak(&mut self, id: &str, now: LocalTime) -> Result<StreakUpdate> {
        self.update_streak_on(id, now.date_naive())
    }

    pub(crate) fn update_streak_on(&mut self, id: &str, today: NaiveDate) -> Result<StreakUpdate> {
        let profile = self.profile_mut(id)?;
        if profile.streak_last_date == Some(today) {
            return Ok(StreakUpdate {
                streak_days: profile.streak_days,
                updated: false,
                unlocked: Vec::new(),
            });
        }

        let yesterday = today.checked_sub_days(Days::new(1));
        profile.streak_days = if profile.streak_last_date.is_some() && profile.streak_last_date == yesterday {
            profile.streak_days.saturating_add(1)
        } else {
            1
        };
        profile.streak_last_date = Some(today);
        let streak_days = profile.streak_days;

        let unlocked = self.unlock_all(id, reached(STREAK_MILESTONES, streak_days))?;
        Ok(StreakUpdate {
            streak_days,
            updated: true,
            unlocked,
        })
    }

    pub fn xp_progress(&self, id: &str) -> Result<XpProgress> {
        Ok(xp_progress(self.profile(id)?.total_xp))
    }

    /// All profiles ranked by `category`, highest first; ties keep id order.
    pub fn leaderboard(&self, category: LeaderboardCategory) -> Vec<LeaderboardEntry> {
        let mut entries: Vec<LeaderboardEntry> = self
            .profiles
            .values()
            .map(|p| LeaderboardEntry {
                id: p.id.clone(),
                name: p.name.clone(),
                avatar: p.avatar.clone(),
                level: p.level(),
                title: p.title().to_string(),
                total_xp: p.total_xp,
                lifetime_coins: p.lifetime_coins,
                reward_points: p.reward_points,
                achievement_count: p.achievements.len(),
                streak_days: p.streak_days,
            })
            .collect();
        entries.sort_by(|a, b| b.score(category).cmp(&a.score(category)));
        entries
    }

    /// Unlock `candidates`, then any level milestones the bonuses reached.
    pub(crate) fn unlock_all(
        &mut self,
        id: &str,
        candidates: impl IntoIterator<Item = &'static str>,
    ) -> Result<Vec<AchievementId>> {
        let mut unlocked = Vec::new();
        for achievement_id in candidates {
            if let Some(unlock) = self.unlock_one(id, achievement_id)? {
                unlocked.push(unlock.achievement_id);
            }
        }

        loop {
            let profile = self.profile(id)?;
            let due = reached(LEVEL_MILESTONES, u64::from(profile.level()))
                .find(|a| !profile.achievements.contains(*a));
            match due {
                Some(achievement_id) => {
                    if let Some(unlock) = self.unlock_one(id, achievement_id)? {
                        unlocked.push(unlock.achievement_id);
                    }
                }
                None => break,
            }
        }
        Ok(unlocked)
    }

    fn unlock_one(&mut self, id: &str, achievement_id: &str) -> Result<Option<AchievementUnlock>> {
        let profile = self.profile_mut(id)?;
        let Some(achievement) = achievement_by_id(achievement_id) else {
            return Ok(None);
        };
        if !profile.achievements.insert(achievement.id.to_string()) {
            return Ok(None);
        }

        let old_level = profile.level();
        profile.total_xp = profile.total_xp.saturating_add(achievement.xp_bonus);
        profile.refresh_level();

        Ok(Some(AchievementUnlock {
            achievement_id: achievement.id.to_string(),
            name: achievement.name.to_string(),
            xp_bonus: achievement.xp_bonus,
            xp: XpGain::observe(profile, old_level),
            total_achievements: profile.achievements.len(),
        }))
    }
}
