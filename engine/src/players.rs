//! Player management, PINs, settings and import/export.

use crate::document::{reset_marker, Document, FamilyQuest, Settings, SettingsPatch, GUEST_ID};
use crate::daily::DailyChallenges;
use crate::error::{Error, Result};
use crate::migrate::MigrationReport;
use crate::profile::Profile;
use crate::Timestamp;

/// PINs are exactly four ASCII digits.
pub fn validate_pin(pin: &str) -> Result<()> {
    if pin.len() == 4 && pin.bytes().all(|b| b.is_ascii_digit()) {
        Ok(())
    } else {
        Err(Error::InvalidPinFormat(pin.to_string()))
    }
}

impl Document {
    pub fn create_profile(
        &mut self,
        id: &str,
        name: &str,
        pin: Option<String>,
        now: Timestamp,
    ) -> Result<&Profile> {
        if self.profiles.contains_key(id) {
            return Err(Error::ProfileExists(id.to_string()));
        }
        if id.trim().is_empty() {
            return Err(Error::InvalidDocument("profile id must not be empty".to_string()));
        }
        if let Some(pin) = &pin {
            validate_pin(pin)?;
        }

        let profile = self
            .profiles
            .entry(id.to_string())
            .or_insert_with(|| Profile::new(id, name, pin, now));
        Ok(profile)
    }

    pub fn set_current_player(&mut self, id: &str) -> Result<&Profile> {
        self.profile(id)?;
        self.current_player = Some(id.to_string());
        self.profile(id)
    }

    /// The selected player, if one is selected and still exists.
    pub fn current_player(&self) -> Option<&Profile> {
        self.current_player
            .as_deref()
            .and_then(|id| self.profiles.get(id))
    }

    /// Wipe one player's progression and stamp the reset marker, so remote
    /// copies from before the reset do not bring the progress back.
    pub fn reset_profile(&mut self, id: &str, now: Timestamp) -> Result<&Profile> {
        let marker = reset_marker(now);
        self.profile_mut(id)?.reset(&marker);
        self.family_quest.contributions.remove(id);
        self.reset_at_version = Some(marker);
        self.profile(id)
    }

    /// Wipe every player's progression and all shared progress. Profile
    /// identities, PINs and settings are kept.
    pub fn reset_all_data(&mut self, now: Timestamp) {
        let marker = reset_marker(now);
        for profile in self.profiles.values_mut() {
            profile.reset(&marker);
        }
        self.family_quest = FamilyQuest::default();
        self.daily_challenges = DailyChallenges::default();
        self.claimed_rewards.clear();
        self.pending_rewards.clear();
        self.current_player = None;
        self.reset_at_version = Some(marker);
    }

    pub fn verify_parent_pin(&self, pin: &str) -> bool {
        self.settings.parent_pin == pin
    }

    pub fn change_parent_pin(&mut self, old_pin: &str, new_pin: &str) -> Result<()> {
        if !self.verify_parent_pin(old_pin) {
            return Err(Error::InvalidPin);
        }
        validate_pin(new_pin)?;
        self.settings.parent_pin = new_pin.to_string();
        Ok(())
    }

    /// The guest has no PIN and always verifies.
    pub fn verify_profile_pin(&self, id: &str, pin: &str) -> Result<bool> {
        let profile = self.profile(id)?;
        if profile.is_guest() {
            return Ok(true);
        }
        Ok(profile.pin.as_deref() == Some(pin))
    }

    pub fn change_profile_pin(&mut self, id: &str, old_pin: &str, new_pin: &str) -> Result<()> {
        let profile = self.profile_mut(id)?;
        if profile.is_guest() {
            return Err(Error::GuestPinNotAllowed);
        }
        if profile.pin.as_deref() != Some(old_pin) {
            return Err(Error::InvalidPin);
        }
        validate_pin(new_pin)?;
        profile.pin = Some(new_pin.to_string());
        Ok(())
    }

    pub fn update_settings(&mut self, patch: SettingsPatch) -> &Settings {
        self.settings.apply(patch);
        &self.settings
    }

    pub fn export_json(&self) -> Result<String> {
        self.to_json_pretty()
    }

    /// Replace this document with an exported one, migrating it first.
    /// On error nothing changes.
    pub fn import_json(&mut self, json: &str, now: Timestamp) -> Result<MigrationReport> {
        let (doc, report) = Document::from_json(json, now)?;
        *self = doc;
        Ok(report)
    }

    /// Profiles other than the guest.
    pub fn players(&self) -> impl Iterator<Item = &Profile> {
        self.profiles.values().filter(|p| p.id != GUEST_ID)
    }
}
