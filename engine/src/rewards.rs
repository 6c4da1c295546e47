//! Real-world rewards bought with reward points, approved by a parent.

use crate::catalog::reward_by_id;
use crate::document::{Document, RewardClaim, RewardStatus};
use crate::error::{Error, Result};
use crate::Timestamp;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardClaimed {
    pub claim: RewardClaim,
    pub remaining_points: u64,
}

impl Document {
    /// Spend reward points on a catalog reward; the claim waits for a parent
    /// to fulfill it.
    pub fn claim_reward(
        &mut self,
        player_id: &str,
        reward_id: &str,
        parent_pin: &str,
        now: Timestamp,
    ) -> Result<RewardClaimed> {
        self.profile(player_id)?;
        let reward =
            reward_by_id(reward_id).ok_or_else(|| Error::UnknownReward(reward_id.to_string()))?;
        if !self.verify_parent_pin(parent_pin) {
            return Err(Error::InvalidPin);
        }

        let profile = self.profile_mut(player_id)?;
        if profile.reward_points < reward.points {
            return Err(Error::InsufficientPoints {
                needed: reward.points,
                available: profile.reward_points,
            });
        }
        profile.reward_points -= reward.points;
        let remaining_points = profile.reward_points;

        let claim = RewardClaim {
            player_id: player_id.to_string(),
            reward_id: reward.id.to_string(),
            reward_name: reward.name.to_string(),
            points_spent: reward.points,
            claimed_at: now,
            status: RewardStatus::Pending,
            fulfilled_at: None,
        };
        self.pending_rewards.push(claim.clone());

        Ok(RewardClaimed {
            claim,
            remaining_points,
        })
    }

    /// Move a pending claim to the claimed list.
    pub fn fulfill_reward(
        &mut self,
        index: usize,
        parent_pin: &str,
        now: Timestamp,
    ) -> Result<RewardClaim> {
        if !self.verify_parent_pin(parent_pin) {
            return Err(Error::InvalidPin);
        }
        if index >= self.pending_rewards.len() {
            return Err(Error::NoPendingReward(index));
        }

        let mut claim = self.pending_rewards.remove(index);
        claim.status = RewardStatus::Fulfilled;
        claim.fulfilled_at = Some(now);
        self.claimed_rewards.push(claim.clone());
        Ok(claim)
    }
}
