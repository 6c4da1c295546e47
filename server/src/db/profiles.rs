//! Queries on the `player_profiles` table.

use chrono::{DateTime, Utc};
use lumina_engine::RemoteRecord;
use sqlx::{PgPool, Row};

/// A stored profile row.
#[derive(Debug)]
pub struct StoredProfile {
    pub id: String,
    pub pin: Option<String>,
    pub data: serde_json::Value,
    pub family_quest: Option<serde_json::Value>,
    pub settings: Option<serde_json::Value>,
    pub last_updated: DateTime<Utc>,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredProfile {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredProfile {
            id: row.try_get("id")?,
            pin: row.try_get("pin")?,
            data: row.try_get("data")?,
            family_quest: row.try_get("family_quest")?,
            settings: row.try_get("settings")?,
            last_updated: row.try_get("last_updated")?,
        })
    }
}

impl From<StoredProfile> for RemoteRecord {
    fn from(row: StoredProfile) -> Self {
        RemoteRecord {
            id: row.id,
            pin: row.pin,
            data: row.data,
            family_quest: row.family_quest,
            settings: row.settings,
            last_updated: row.last_updated,
        }
    }
}

const SELECT_PROFILES: &str = r#"
    SELECT id, pin, data, family_quest, settings, last_updated
    FROM player_profiles
"#;

/// Insert a record, or replace the row with the same id.
pub async fn upsert_profile(pool: &PgPool, record: &RemoteRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO player_profiles (id, pin, data, family_quest, settings, last_updated)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (id) DO UPDATE SET
            pin = EXCLUDED.pin,
            data = EXCLUDED.data,
            family_quest = EXCLUDED.family_quest,
            settings = EXCLUDED.settings,
            last_updated = EXCLUDED.last_updated
        "#,
    )
    .bind(&record.id)
    .bind(&record.pin)
    .bind(&record.data)
    .bind(&record.family_quest)
    .bind(&record.settings)
    .bind(record.last_updated)
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_profile(pool: &PgPool, id: &str) -> Result<Option<RemoteRecord>, sqlx::Error> {
    let row: Option<StoredProfile> = sqlx::query_as(&format!("{SELECT_PROFILES} WHERE id = $1"))
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(RemoteRecord::from))
}

pub async fn get_profiles_by_pin(pool: &PgPool, pin: &str) -> Result<Vec<RemoteRecord>, sqlx::Error> {
    let rows: Vec<StoredProfile> =
        sqlx::query_as(&format!("{SELECT_PROFILES} WHERE pin = $1 ORDER BY id"))
            .bind(pin)
            .fetch_all(pool)
            .await?;

    Ok(rows.into_iter().map(RemoteRecord::from).collect())
}

pub async fn get_all_profiles(pool: &PgPool) -> Result<Vec<RemoteRecord>, sqlx::Error> {
    let rows: Vec<StoredProfile> = sqlx::query_as(&format!("{SELECT_PROFILES} ORDER BY id"))
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(RemoteRecord::from).collect())
}
