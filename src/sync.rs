//! Synchronization layer: commits one deduplicated run against the store.

use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::records::CanonicalActivity;
use crate::store::{ActivityStore, UpsertOutcome};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    pub created: u64,
    pub updated: u64,
    pub removed: u64,
    pub errors: u64,
}

/// Upserts every activity (its location first, so the reference is stable),
/// then tombstones whatever this run did not re-observe. A store failure is
/// counted against the record it hit and never aborts the rest; a record
/// contributes at most one error regardless of how it failed.
pub async fn commit_run(
    store: &dyn ActivityStore,
    provider: &str,
    activities: &[CanonicalActivity],
) -> RunStats {
    let mut stats = RunStats::default();
    let mut seen: Vec<String> = Vec::with_capacity(activities.len());

    for activity in activities {
        let mut errored = false;

        let location_id = match &activity.location_name {
            Some(name) => {
                let address = activity.location_address.as_deref().unwrap_or("");
                match store
                    .upsert_location(name, address, activity.facility_type)
                    .await
                {
                    Ok(id) => Some(id),
                    Err(e) => {
                        warn!("location upsert failed for '{name}': {e}");
                        errored = true;
                        None
                    }
                }
            }
            None => None,
        };

        match store.upsert_activity(activity, location_id).await {
            Ok(UpsertOutcome::Created) => {
                stats.created += 1;
                seen.push(activity.external_id.clone());
            }
            Ok(UpsertOutcome::Updated) => {
                stats.updated += 1;
                seen.push(activity.external_id.clone());
            }
            Err(e) => {
                warn!(
                    "activity upsert failed for {}/{}: {e}",
                    provider, activity.external_id
                );
                errored = true;
            }
        }

        if errored {
            stats.errors += 1;
        }
    }

    match store.mark_inactive_except(provider, &seen).await {
        Ok(flipped) => stats.removed = flipped,
        Err(e) => {
            warn!("staleness pass failed for {provider}: {e}");
            stats.errors += 1;
        }
    }

    info!(
        "sync committed for {provider}: {} created, {} updated, {} removed, {} errors",
        stats.created, stats.updated, stats.removed, stats.errors
    );
    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{RawCandidate, SourceStrategy};
    use crate::store::MemoryStore;
    use chrono::{NaiveDate, Utc};

    fn activity(provider: &str, code: &str, name: &str) -> CanonicalActivity {
        let mut candidate = RawCandidate::new(
            name.to_string(),
            format!("{name} #{code} $80.00 Open at Delbrook Centre"),
            SourceStrategy::StructuredRows,
        );
        candidate.course_code = Some(code.to_string());
        let today = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        CanonicalActivity::from_candidate(provider, &candidate, today, Utc::now())
    }

    #[tokio::test]
    async fn first_commit_creates_everything() {
        let store = MemoryStore::new();
        let set = vec![
            activity("northshore", "10001", "Swim Kids 1"),
            activity("northshore", "10002", "Swim Kids 2"),
        ];
        let stats = commit_run(&store, "northshore", &set).await;
        assert_eq!(
            stats,
            RunStats {
                created: 2,
                updated: 0,
                removed: 0,
                errors: 0
            }
        );
    }

    #[tokio::test]
    async fn recommitting_the_same_set_is_idempotent() {
        let store = MemoryStore::new();
        let set = vec![
            activity("northshore", "10001", "Swim Kids 1"),
            activity("northshore", "10002", "Swim Kids 2"),
        ];
        commit_run(&store, "northshore", &set).await;
        let second = commit_run(&store, "northshore", &set).await;
        assert_eq!(
            second,
            RunStats {
                created: 0,
                updated: 2,
                removed: 0,
                errors: 0
            }
        );
    }

    #[tokio::test]
    async fn unobserved_records_are_tombstoned_with_fields_intact() {
        let store = MemoryStore::new();
        let full = vec![
            activity("northshore", "10001", "Swim Kids 1"),
            activity("northshore", "20001", "Skate Camp"),
        ];
        commit_run(&store, "northshore", &full).await;

        let partial = vec![activity("northshore", "10001", "Swim Kids 1")];
        let stats = commit_run(&store, "northshore", &partial).await;
        assert_eq!(stats.removed, 1);

        let gone = store.get("northshore", "20001").await.unwrap();
        assert!(!gone.is_active);
        assert_eq!(gone.name, "Skate Camp");
        assert_eq!(gone.cost, 80.0);

        let kept = store.get("northshore", "10001").await.unwrap();
        assert!(kept.is_active);
    }

    #[tokio::test]
    async fn tombstoned_records_revive_on_reappearance() {
        let store = MemoryStore::new();
        let full = vec![activity("northshore", "20001", "Skate Camp")];
        commit_run(&store, "northshore", &full).await;
        commit_run(&store, "northshore", &[]).await;
        assert!(!store.get("northshore", "20001").await.unwrap().is_active);

        let stats = commit_run(&store, "northshore", &full).await;
        assert_eq!(stats.created, 0);
        assert_eq!(stats.updated, 1);
        assert!(store.get("northshore", "20001").await.unwrap().is_active);
    }
}
