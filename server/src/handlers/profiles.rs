//! Profile handlers - list, fetch and upsert player records.

use crate::db;
use crate::error::{AppError, Result};
use lumina_engine::{RemoteRecord, GUEST_ID};
use serde::Deserialize;
use sqlx::PgPool;

/// Query parameters for listing profiles.
#[derive(Debug, Default, Deserialize)]
pub struct ProfileQuery {
    /// Only records whose profile PIN matches
    pub pin: Option<String>,
}

/// All records, or those matching `?pin=`.
pub async fn handle_list(pool: &PgPool, query: ProfileQuery) -> Result<Vec<RemoteRecord>> {
    let records = match query.pin.as_deref() {
        Some(pin) => db::get_profiles_by_pin(pool, pin).await?,
        None => db::get_all_profiles(pool).await?,
    };
    tracing::debug!("Serving {} profile records", records.len());
    Ok(records)
}

pub async fn handle_get(pool: &PgPool, id: &str) -> Result<RemoteRecord> {
    db::get_profile(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("profile '{id}'")))
}

/// Check that a pushed record can be stored under `id`. Nothing is written
/// unless it passes.
pub fn validate_record(id: &str, record: &RemoteRecord) -> Result<()> {
    if record.id != id {
        return Err(AppError::BadRequest(format!(
            "record id '{}' does not match path id '{id}'",
            record.id
        )));
    }
    if record.id == GUEST_ID {
        return Err(AppError::BadRequest(
            "the guest profile is device-local".to_string(),
        ));
    }
    // the blob must decode as a profile
    record.profile()?;
    Ok(())
}

/// Insert or replace the record stored under `id`.
pub async fn handle_put(pool: &PgPool, id: &str, record: RemoteRecord) -> Result<RemoteRecord> {
    validate_record(id, &record)?;
    db::upsert_profile(pool, &record).await?;
    tracing::debug!("Stored profile {}", record.id);
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn record(id: &str, data: serde_json::Value) -> RemoteRecord {
        RemoteRecord {
            id: id.to_string(),
            pin: Some("2468".into()),
            data,
            family_quest: None,
            settings: None,
            last_updated: Utc.with_ymd_and_hms(2026, 3, 14, 16, 0, 0).unwrap(),
        }
    }

    #[test]
    fn accepts_a_profile_blob() {
        let rec = record("ada", json!({ "name": "Ada", "totalXP": 40 }));
        assert!(validate_record("ada", &rec).is_ok());
    }

    #[test]
    fn rejects_mismatched_ids() {
        let rec = record("bo", json!({ "name": "Bo" }));
        assert!(matches!(
            validate_record("ada", &rec),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_the_guest() {
        let rec = record(GUEST_ID, json!({ "name": "Guest" }));
        assert!(matches!(
            validate_record(GUEST_ID, &rec),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn rejects_malformed_blobs() {
        let rec = record("ada", json!(["not", "a", "profile"]));
        assert!(matches!(
            validate_record("ada", &rec),
            Err(AppError::Engine(_))
        ));
    }
}
