//! The shared family quest.

use crate::document::{Document, FamilyQuest};
use crate::error::{Error, Result};
use crate::Timestamp;
use chrono::Duration;

pub const DEFAULT_QUEST_DAYS: i64 = 7;

impl Document {
    /// Start a new quest, replacing any current one. Every non-guest
    /// profile starts with a zero contribution.
    pub fn start_family_quest(
        &mut self,
        goal: u64,
        reward: impl Into<String>,
        days: i64,
        now: Timestamp,
    ) -> &FamilyQuest {
        let contributions = self
            .profiles
            .values()
            .filter(|p| !p.is_guest())
            .map(|p| (p.id.clone(), 0))
            .collect();

        self.family_quest = FamilyQuest {
            active: true,
            goal,
            current: 0,
            reward: reward.into(),
            start_date: Some(now),
            end_date: now.checked_add_signed(Duration::days(days)),
            contributions,
        };
        &self.family_quest
    }

    /// Close an active quest whose goal was reached; returns the final state.
    pub fn complete_family_quest(&mut self) -> Result<FamilyQuest> {
        let quest = &mut self.family_quest;
        if !quest.active || quest.current < quest.goal {
            return Err(Error::QuestNotComplete);
        }
        let finished = quest.clone();
        quest.active = false;
        Ok(finished)
    }
}
