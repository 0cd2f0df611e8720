//! The persisted-store boundary.
//!
//! The synchronization layer talks to three operations: upsert a location,
//! upsert an activity, and tombstone whatever a run did not re-observe.
//! `PostgresStore` is the production implementation; `MemoryStore` backs
//! tests and artifact-only runs where no database is configured.

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tokio::sync::Mutex;

use crate::normalize::FacilityType;
use crate::records::CanonicalActivity;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record rejected: {0}")]
    Rejected(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

#[async_trait]
pub trait ActivityStore: Send + Sync {
    /// Resolves (or creates) the `(name, address)`-keyed location row and
    /// returns its id, so the activity referencing it holds a stable link.
    async fn upsert_location(
        &self,
        name: &str,
        address: &str,
        facility_type: Option<FacilityType>,
    ) -> Result<i64, StoreError>;

    /// Upserts by `(provider, external_id)`: insert sets every field, update
    /// overwrites every field and re-activates the record.
    async fn upsert_activity(
        &self,
        activity: &CanonicalActivity,
        location_id: Option<i64>,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Tombstones every active record for `provider` not named in `seen`,
    /// leaving all other fields untouched. Returns the number of rows
    /// flipped to inactive.
    async fn mark_inactive_except(&self, provider: &str, seen: &[String])
    -> Result<u64, StoreError>;
}

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub async fn connect(database_url: &str) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(4)
            .connect(database_url)
            .await?;
        Ok(PostgresStore { pool })
    }

    /// Bootstraps the schema. Idempotent.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::raw_sql(include_str!("../sql/up.sql"))
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for PostgresStore {
    async fn upsert_location(
        &self,
        name: &str,
        address: &str,
        facility_type: Option<FacilityType>,
    ) -> Result<i64, StoreError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO locations (name, address, facility_type)
            VALUES ($1, $2, $3)
            ON CONFLICT (name, address) DO UPDATE
                SET facility_type = COALESCE(EXCLUDED.facility_type, locations.facility_type)
            RETURNING id
            "#,
        )
        .bind(name)
        .bind(address)
        .bind(facility_type.map(FacilityType::as_str))
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn upsert_activity(
        &self,
        activity: &CanonicalActivity,
        location_id: Option<i64>,
    ) -> Result<UpsertOutcome, StoreError> {
        // Runs are single-writer per provider, so a select-then-write pair
        // is race-free enough and keeps created/updated reporting explicit.
        let existing = sqlx::query("SELECT id FROM activities WHERE provider = $1 AND external_id = $2")
            .bind(&activity.provider)
            .bind(&activity.external_id)
            .fetch_optional(&self.pool)
            .await?;

        let raw_data = activity.raw_data.to_string();
        match existing {
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO activities (
                        provider, external_id, name, category, subcategory, description,
                        schedule_text, days_of_week, date_start, date_end, time_start, time_end,
                        age_min, age_max, age_grade_text, cost, spots_available, total_spots,
                        location_id, registration_url, registration_status,
                        is_active, last_seen_at, raw_data
                    ) VALUES (
                        $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12,
                        $13, $14, $15, $16, $17, $18, $19, $20, $21, TRUE, $22, $23
                    )
                    "#,
                )
                .bind(&activity.provider)
                .bind(&activity.external_id)
                .bind(&activity.name)
                .bind(&activity.category)
                .bind(&activity.subcategory)
                .bind(&activity.description)
                .bind(&activity.schedule_text)
                .bind(&activity.days_of_week)
                .bind(activity.date_start)
                .bind(activity.date_end)
                .bind(activity.time_start)
                .bind(activity.time_end)
                .bind(activity.age_min)
                .bind(activity.age_max)
                .bind(&activity.age_grade_text)
                .bind(activity.cost)
                .bind(activity.spots_available)
                .bind(activity.total_spots)
                .bind(location_id)
                .bind(&activity.registration_url)
                .bind(activity.registration_status.as_str())
                .bind(activity.last_seen_at)
                .bind(raw_data)
                .execute(&self.pool)
                .await?;
                Ok(UpsertOutcome::Created)
            }
            Some(row) => {
                let id: i64 = row.try_get("id")?;
                sqlx::query(
                    r#"
                    UPDATE activities SET
                        name = $2, category = $3, subcategory = $4, description = $5,
                        schedule_text = $6, days_of_week = $7, date_start = $8, date_end = $9,
                        time_start = $10, time_end = $11, age_min = $12, age_max = $13,
                        age_grade_text = $14, cost = $15, spots_available = $16,
                        total_spots = $17, location_id = $18, registration_url = $19,
                        registration_status = $20, is_active = TRUE, last_seen_at = $21,
                        raw_data = $22
                    WHERE id = $1
                    "#,
                )
                .bind(id)
                .bind(&activity.name)
                .bind(&activity.category)
                .bind(&activity.subcategory)
                .bind(&activity.description)
                .bind(&activity.schedule_text)
                .bind(&activity.days_of_week)
                .bind(activity.date_start)
                .bind(activity.date_end)
                .bind(activity.time_start)
                .bind(activity.time_end)
                .bind(activity.age_min)
                .bind(activity.age_max)
                .bind(&activity.age_grade_text)
                .bind(activity.cost)
                .bind(activity.spots_available)
                .bind(activity.total_spots)
                .bind(location_id)
                .bind(&activity.registration_url)
                .bind(activity.registration_status.as_str())
                .bind(activity.last_seen_at)
                .bind(raw_data)
                .execute(&self.pool)
                .await?;
                Ok(UpsertOutcome::Updated)
            }
        }
    }

    async fn mark_inactive_except(
        &self,
        provider: &str,
        seen: &[String],
    ) -> Result<u64, StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE activities
            SET is_active = FALSE
            WHERE provider = $1 AND is_active = TRUE AND NOT (external_id = ANY($2))
            "#,
        )
        .bind(provider)
        .bind(seen)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

#[derive(Default)]
struct MemoryInner {
    locations: HashMap<(String, String), i64>,
    next_location_id: i64,
    activities: HashMap<(String, String), CanonicalActivity>,
}

/// In-memory store for tests and artifact-only runs.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of every record for a provider, in no particular order.
    pub async fn activities(&self, provider: &str) -> Vec<CanonicalActivity> {
        let inner = self.inner.lock().await;
        inner
            .activities
            .iter()
            .filter(|((p, _), _)| p == provider)
            .map(|(_, activity)| activity.clone())
            .collect()
    }

    pub async fn get(&self, provider: &str, external_id: &str) -> Option<CanonicalActivity> {
        let inner = self.inner.lock().await;
        inner
            .activities
            .get(&(provider.to_string(), external_id.to_string()))
            .cloned()
    }
}

#[async_trait]
impl ActivityStore for MemoryStore {
    async fn upsert_location(
        &self,
        name: &str,
        address: &str,
        _facility_type: Option<FacilityType>,
    ) -> Result<i64, StoreError> {
        let mut inner = self.inner.lock().await;
        let key = (name.to_string(), address.to_string());
        if let Some(id) = inner.locations.get(&key) {
            return Ok(*id);
        }
        inner.next_location_id += 1;
        let id = inner.next_location_id;
        inner.locations.insert(key, id);
        Ok(id)
    }

    async fn upsert_activity(
        &self,
        activity: &CanonicalActivity,
        _location_id: Option<i64>,
    ) -> Result<UpsertOutcome, StoreError> {
        let mut inner = self.inner.lock().await;
        let key = (activity.provider.clone(), activity.external_id.clone());
        let mut stored = activity.clone();
        stored.is_active = true;
        let outcome = if inner.activities.insert(key, stored).is_some() {
            UpsertOutcome::Updated
        } else {
            UpsertOutcome::Created
        };
        Ok(outcome)
    }

    async fn mark_inactive_except(
        &self,
        provider: &str,
        seen: &[String],
    ) -> Result<u64, StoreError> {
        let mut inner = self.inner.lock().await;
        let mut flipped = 0;
        for ((p, external_id), activity) in inner.activities.iter_mut() {
            if p == provider && activity.is_active && !seen.contains(external_id) {
                activity.is_active = false;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}
