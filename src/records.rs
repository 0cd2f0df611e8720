//! Record shapes for the extraction pipeline: the ephemeral per-page
//! candidate and the persisted canonical activity it normalizes into.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

use crate::normalize::{self, FacilityType, RegistrationStatus};

/// Which extraction algorithm produced a candidate. Order matters: earlier
/// variants are more specific and more trusted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceStrategy {
    StructuredRows,
    TableRows,
    TextBlocks,
    LinkFallback,
}

impl SourceStrategy {
    /// Lower is more trusted. Mirrors the dispatch order in `extract`.
    pub fn priority(self) -> u8 {
        match self {
            SourceStrategy::StructuredRows => 0,
            SourceStrategy::TableRows => 1,
            SourceStrategy::TextBlocks => 2,
            SourceStrategy::LinkFallback => 3,
        }
    }
}

/// An unvalidated record straight out of an extraction strategy: the raw
/// text fragment plus whatever fields the strategy could locate. Created per
/// page visit, consumed by the deduplicator, never persisted directly
/// (though it survives as the canonical record's raw blob).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawCandidate {
    pub name: String,
    pub raw_text: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub price_text: Option<String>,
    pub time_text: Option<String>,
    pub date_text: Option<String>,
    pub age_text: Option<String>,
    pub location_text: Option<String>,
    pub course_code: Option<String>,
    pub registration_url: Option<String>,
    pub source_strategy: SourceStrategy,
}

impl RawCandidate {
    pub fn new(name: String, raw_text: String, source_strategy: SourceStrategy) -> Self {
        RawCandidate {
            name,
            raw_text,
            category: None,
            subcategory: None,
            description: None,
            price_text: None,
            time_text: None,
            date_text: None,
            age_text: None,
            location_text: None,
            course_code: None,
            registration_url: None,
            source_strategy,
        }
    }

    /// Number of located optional fields. Used both as the dedup tie-break
    /// and as the confidence measure for the persistence gate.
    pub fn populated_fields(&self) -> usize {
        [
            self.description.is_some(),
            self.price_text.is_some(),
            self.time_text.is_some(),
            self.date_text.is_some(),
            self.age_text.is_some(),
            self.location_text.is_some(),
            self.course_code.is_some(),
            self.registration_url.is_some(),
        ]
        .iter()
        .filter(|located| **located)
        .count()
    }

    /// Stable identity for deduplication and the persisted external id: the
    /// site's own course code when present, otherwise an order-insensitive,
    /// whitespace-normalized composite of name + schedule + location.
    pub fn identity_key(&self) -> String {
        if let Some(code) = self.course_code.as_deref() {
            return code.trim().to_lowercase();
        }
        let mut tokens: Vec<String> = [
            Some(self.name.as_str()),
            self.date_text.as_deref(),
            self.time_text.as_deref(),
            self.location_text.as_deref(),
        ]
        .into_iter()
        .flatten()
        .flat_map(str::split_whitespace)
        .map(str::to_lowercase)
        .collect();
        tokens.sort();
        tokens.dedup();
        tokens.join(" ")
    }
}

/// The normalized, persisted unit. Field names serialize in camelCase so the
/// run artifact matches what catalog consumers read.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalActivity {
    pub provider: String,
    pub external_id: String,
    pub name: String,
    pub category: Option<String>,
    pub subcategory: Option<String>,
    pub description: Option<String>,
    pub schedule_text: Option<String>,
    pub days_of_week: Vec<String>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub time_start: Option<NaiveTime>,
    pub time_end: Option<NaiveTime>,
    pub age_min: Option<i32>,
    pub age_max: Option<i32>,
    pub age_grade_text: Option<String>,
    pub cost: f64,
    pub spots_available: Option<i32>,
    pub total_spots: Option<i32>,
    pub location_name: Option<String>,
    pub location_address: Option<String>,
    pub facility_type: Option<FacilityType>,
    pub registration_url: Option<String>,
    pub registration_status: RegistrationStatus,
    pub is_active: bool,
    pub last_seen_at: DateTime<Utc>,
    pub raw_data: serde_json::Value,
}

impl CanonicalActivity {
    /// Normalizes a candidate into the persisted shape. Each typed field is
    /// parsed from the candidate's dedicated fragment when the strategy
    /// located one, falling back to the full raw text.
    pub fn from_candidate(
        provider: &str,
        candidate: &RawCandidate,
        today: NaiveDate,
        now: DateTime<Utc>,
    ) -> Self {
        let date_source = candidate.date_text.as_deref().unwrap_or(&candidate.raw_text);
        let (date_start, date_end) = match normalize::parse_date_range(date_source, today) {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };

        let time_source = candidate.time_text.as_deref().unwrap_or(&candidate.raw_text);
        let (time_start, time_end) = match normalize::parse_time_range(time_source) {
            Some((start, end)) => (Some(start), Some(end)),
            None => (None, None),
        };

        let age_source = candidate.age_text.as_deref().unwrap_or(&candidate.raw_text);
        let age = normalize::parse_age_range(age_source);

        let price_source = candidate.price_text.as_deref().unwrap_or(&candidate.raw_text);
        let (spots_available, total_spots) = normalize::parse_spots(&candidate.raw_text);

        let location_name = candidate
            .location_text
            .clone()
            .or_else(|| normalize::extract_location(&candidate.raw_text));
        let facility_type = location_name.as_deref().and_then(normalize::classify_facility);

        let schedule_text = {
            let parts: Vec<&str> = [candidate.date_text.as_deref(), candidate.time_text.as_deref()]
                .into_iter()
                .flatten()
                .collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" "))
            }
        };

        CanonicalActivity {
            provider: provider.to_string(),
            external_id: candidate.identity_key(),
            name: candidate.name.clone(),
            category: candidate.category.clone(),
            subcategory: candidate.subcategory.clone(),
            description: candidate.description.clone(),
            schedule_text,
            days_of_week: normalize::parse_days_of_week(&candidate.raw_text),
            date_start,
            date_end,
            time_start,
            time_end,
            age_min: age.min,
            age_max: age.max,
            age_grade_text: age.grade_text,
            cost: normalize::parse_price(price_source),
            spots_available,
            total_spots,
            location_name,
            location_address: None,
            facility_type,
            registration_url: candidate.registration_url.clone(),
            registration_status: normalize::parse_registration_status(&candidate.raw_text),
            is_active: true,
            last_seen_at: now,
            raw_data: serde_json::to_value(candidate).unwrap_or(serde_json::Value::Null),
        }
    }
}
