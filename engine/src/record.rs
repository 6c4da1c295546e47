//! The remote table row.

use crate::error::{Error, Result};
use crate::migrate::repair_profile;
use crate::profile::Profile;
use crate::{ProfileId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the remote profile table, keyed by profile id.
///
/// Column names are snake_case; `data` holds the profile blob exactly as the
/// pushing device serialized it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRecord {
    pub id: ProfileId,
    #[serde(default)]
    pub pin: Option<String>,
    pub data: Value,
    #[serde(default)]
    pub family_quest: Option<Value>,
    #[serde(default)]
    pub settings: Option<Value>,
    pub last_updated: Timestamp,
}

impl RemoteRecord {
    /// Reset marker the pushing device carried, if any.
    pub fn reset_marker(&self) -> Option<&str> {
        self.data.get("resetAtVersion").and_then(Value::as_str)
    }

    /// Decode the profile blob. Mistyped fields are coerced the same way a
    /// stored document is; the id always comes from the record, and the
    /// level is recomputed.
    pub fn profile(&self) -> Result<Profile> {
        let Value::Object(mut data) = self.data.clone() else {
            return Err(Error::InvalidDocument(format!(
                "record '{}' has a non-object profile blob",
                self.id
            )));
        };
        repair_profile(&self.id, &mut data, &mut Vec::new());
        let mut profile: Profile = serde_json::from_value(Value::Object(data))
            .map_err(|e| Error::InvalidDocument(format!("record '{}': {e}", self.id)))?;
        profile.id = self.id.clone();
        profile.refresh_level();
        Ok(profile)
    }
}
