//! Free-text field parsers for catalog fragments.
//!
//! Every function here is total: unparseable input degrades to `None` (or the
//! documented default), never an error. Callers decide what a missing field
//! means; nothing in this module aborts a candidate.

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, NaiveTime};
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Policy ceiling for open-ended "N+" ages in a youth catalog.
const YOUTH_AGE_CEILING: i32 = 18;

static DATE_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})\s*(?:-|–|to|through)\s*(jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+(\d{1,2})",
    )
    .unwrap()
});

static TIME_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2}):(\d{2})\s*(am|pm)\s*(?:-|–|to)\s*(\d{1,2}):(\d{2})\s*(am|pm)\b")
        .unwrap()
});

static DAY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(mon|monday|tue|tues|tuesday|wed|weds|wednesday|thu|thur|thurs|thursday|fri|friday|sat|saturday|sun|sunday)\b")
        .unwrap()
});

static AGE_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*(?:-|–|to)\s*(\d{1,2})\s*(?:yrs?|years?)\b").unwrap()
});

static AGES_SPAN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bages?\s*:?\s*(\d{1,2})\s*(?:-|–|to)\s*(\d{1,2})\b").unwrap()
});

static AGE_PLUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})\s*\+\s*(?:yrs?|years?)\b").unwrap()
});

static AGES_PLUS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\bages?\s*:?\s*(\d{1,2})\s*\+").unwrap());

static GRADE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\bgrades?\s*[0-9k](?:\s*(?:-|–|to)\s*\d{1,2})?\b").unwrap()
});

static PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*([0-9][0-9,]*(?:\.[0-9]{1,2})?)").unwrap());

static LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?:[A-Z][A-Za-z'’.-]+\s+){1,3}(?i:pool|arena|gymnasium|gym|park|centre|center|studio|library)\b")
        .unwrap()
});

static FACILITY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(pool|arena|gymnasium|gym|park|centre|center|studio|library)\b").unwrap()
});

static COURSE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:#|\b(?:barcode|course|code)\s*:?\s*#?)\s*(\d{4,7})\b").unwrap()
});

static URL_COURSE_CODE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)[?&](?:courseid|course_id|activityid|activity_id|barcode)=([A-Za-z0-9_-]+)")
        .unwrap()
});

static SPOTS_LEFT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s+(?:spots?|spaces?|openings?)\s+(?:left|remaining|available)\b")
        .unwrap()
});

static SPOTS_OF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{1,3})\s+of\s+(\d{1,3})\s+(?:spots?|spaces?)\b").unwrap()
});

/// Registration state as classified from free text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegistrationStatus {
    Open,
    Waitlist,
    Closed,
    #[default]
    Unknown,
}

impl RegistrationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RegistrationStatus::Open => "open",
            RegistrationStatus::Waitlist => "waitlist",
            RegistrationStatus::Closed => "closed",
            RegistrationStatus::Unknown => "unknown",
        }
    }
}

/// Facility classification for a location record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FacilityType {
    Pool,
    Arena,
    Gym,
    Park,
    Centre,
    Studio,
    Library,
}

impl FacilityType {
    pub fn as_str(self) -> &'static str {
        match self {
            FacilityType::Pool => "pool",
            FacilityType::Arena => "arena",
            FacilityType::Gym => "gym",
            FacilityType::Park => "park",
            FacilityType::Centre => "centre",
            FacilityType::Studio => "studio",
            FacilityType::Library => "library",
        }
    }
}

/// Parsed age bounds. `grade_text` carries a school-grade phrase verbatim
/// when it cannot be mapped to numeric ages.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgeRange {
    pub min: Option<i32>,
    pub max: Option<i32>,
    pub grade_text: Option<String>,
}

/// Collapses all whitespace runs to single spaces and trims.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn month_number(token: &str) -> Option<u32> {
    let month = match token.to_lowercase().as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(month)
}

/// Parses a `"Mon D - Mon D"` range. The year is taken from `today`; a range
/// whose end lands before its start rolls the end into the next year.
pub fn parse_date_range(text: &str, today: NaiveDate) -> Option<(NaiveDate, NaiveDate)> {
    let caps = DATE_RANGE_RE.captures(text)?;
    let start_month = month_number(&caps[1])?;
    let start_day: u32 = caps[2].parse().ok()?;
    let end_month = month_number(&caps[3])?;
    let end_day: u32 = caps[4].parse().ok()?;

    let year = today.year();
    let start = NaiveDate::from_ymd_opt(year, start_month, start_day)?;
    let mut end = NaiveDate::from_ymd_opt(year, end_month, end_day)?;
    if end < start {
        end = NaiveDate::from_ymd_opt(year + 1, end_month, end_day)?;
    }
    Some((start, end))
}

fn to_24h(hour: u32, minute: u32, meridiem: &str) -> Option<NaiveTime> {
    let pm = meridiem.eq_ignore_ascii_case("pm");
    let hour = match (hour, pm) {
        (12, false) => 0,
        (12, true) => 12,
        (h, true) if h < 12 => h + 12,
        (h, false) => h,
        _ => return None,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Parses a `"H:MM am - H:MM pm"` range.
pub fn parse_time_range(text: &str) -> Option<(NaiveTime, NaiveTime)> {
    let caps = TIME_RANGE_RE.captures(text)?;
    let start = to_24h(caps[1].parse().ok()?, caps[2].parse().ok()?, &caps[3])?;
    let end = to_24h(caps[4].parse().ok()?, caps[5].parse().ok()?, &caps[6])?;
    Some((start, end))
}

/// Scans for weekday names and abbreviations, returning canonical 3-letter
/// tokens in Mon..Sun order, deduplicated.
pub fn parse_days_of_week(text: &str) -> Vec<String> {
    const CANONICAL: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
    let mut found = [false; 7];
    for caps in DAY_RE.captures_iter(text) {
        let token = caps[1].to_lowercase();
        let idx = match &token[..3] {
            "mon" => 0,
            "tue" => 1,
            "wed" => 2,
            "thu" => 3,
            "fri" => 4,
            "sat" => 5,
            "sun" => 6,
            _ => continue,
        };
        found[idx] = true;
    }
    found
        .iter()
        .zip(CANONICAL)
        .filter(|(hit, _)| **hit)
        .map(|(_, day)| day.to_string())
        .collect()
}

/// Parses `"N-M yrs"`, `"N+ yrs"` (open end capped at the youth ceiling), or
/// preserves a grade phrase verbatim when no numeric age is present.
pub fn parse_age_range(text: &str) -> AgeRange {
    if let Some(caps) = AGE_SPAN_RE
        .captures(text)
        .or_else(|| AGES_SPAN_RE.captures(text))
    {
        let mut min: Option<i32> = caps[1].parse().ok();
        let mut max: Option<i32> = caps[2].parse().ok();
        if let (Some(lo), Some(hi)) = (min, max) {
            if lo > hi {
                (min, max) = (Some(hi), Some(lo));
            }
        }
        return AgeRange {
            min,
            max,
            grade_text: None,
        };
    }
    if let Some(caps) = AGE_PLUS_RE
        .captures(text)
        .or_else(|| AGES_PLUS_RE.captures(text))
    {
        let min: Option<i32> = caps[1].parse().ok();
        let max = min.map(|m| m.max(YOUTH_AGE_CEILING));
        return AgeRange {
            min,
            max,
            grade_text: None,
        };
    }
    if let Some(matched) = GRADE_RE.find(text) {
        return AgeRange {
            min: None,
            max: None,
            grade_text: Some(matched.as_str().to_string()),
        };
    }
    AgeRange::default()
}

/// Parses the first currency amount. Absence means a free activity: 0.
pub fn parse_price(text: &str) -> f64 {
    PRICE_RE
        .captures(text)
        .and_then(|caps| caps[1].replace(',', "").parse::<f64>().ok())
        .filter(|amount| *amount >= 0.0)
        .unwrap_or(0.0)
}

/// Keyword classification. An explicit closed keyword wins over an incidental
/// "open" elsewhere in the same fragment, so closed is checked first, then
/// waitlist, then open.
pub fn parse_registration_status(text: &str) -> RegistrationStatus {
    let lower = text.to_lowercase();
    if ["closed", "cancelled", "sold out", "full"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return RegistrationStatus::Closed;
    }
    if lower.contains("waitlist") || lower.contains("wait list") {
        return RegistrationStatus::Waitlist;
    }
    if ["open", "register", "available", "sign up"]
        .iter()
        .any(|kw| lower.contains(kw))
    {
        return RegistrationStatus::Open;
    }
    RegistrationStatus::Unknown
}

/// Pulls a location phrase out of surrounding free text: up to three
/// capitalized words ending in a facility keyword.
pub fn extract_location(text: &str) -> Option<String> {
    let matched = LOCATION_RE.find(text)?;
    Some(normalize_whitespace(matched.as_str()))
}

pub fn classify_facility(text: &str) -> Option<FacilityType> {
    let caps = FACILITY_RE.captures(text)?;
    let facility = match caps[1].to_lowercase().as_str() {
        "pool" => FacilityType::Pool,
        "arena" => FacilityType::Arena,
        "gym" | "gymnasium" => FacilityType::Gym,
        "park" => FacilityType::Park,
        "centre" | "center" => FacilityType::Centre,
        "studio" => FacilityType::Studio,
        "library" => FacilityType::Library,
        _ => return None,
    };
    Some(facility)
}

/// Finds a course/booking code in free text (`#12345`, `Course: 12345`, ...).
pub fn parse_course_code(text: &str) -> Option<String> {
    COURSE_CODE_RE
        .captures(text)
        .map(|caps| caps[1].to_string())
}

/// Finds a course identifier in a registration URL's query string.
pub fn course_code_from_url(url: &str) -> Option<String> {
    URL_COURSE_CODE_RE
        .captures(url)
        .map(|caps| caps[1].to_string())
}

/// Parses availability fragments: `"N spots left"`, `"N of M spots"`, or a
/// bare `"Full"` meaning zero remaining.
pub fn parse_spots(text: &str) -> (Option<i32>, Option<i32>) {
    if let Some(caps) = SPOTS_OF_RE.captures(text) {
        return (caps[1].parse().ok(), caps[2].parse().ok());
    }
    if let Some(caps) = SPOTS_LEFT_RE.captures(text) {
        return (caps[1].parse().ok(), None);
    }
    if text.to_lowercase().contains("full") {
        return (Some(0), None);
    }
    (None, None)
}
