//! Extraction strategies over a rendered document.
//!
//! The target markup is inconsistent across categories, so four algorithms
//! run in fixed priority order and the first non-empty result wins: grouped
//! title/item rows, generic table rows, signal-bearing text blocks, and as a
//! last resort every registration-shaped link on the page.

use std::sync::LazyLock;

use log::debug;
use regex::Regex;
use reqwest::Url;
use scraper::{ElementRef, Html, Selector};

use crate::normalize::{self, normalize_whitespace};
use crate::records::{RawCandidate, SourceStrategy};

static GROUP_TITLE_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("h2, h3, h4, legend, [class*=group-title], [class*=section-title]").unwrap()
});

static GROUP_ITEM_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("li, [class*=item], [class*=row], [class*=activity], [class*=course], [class*=event]")
        .unwrap()
});

static TABLE_ROW_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("tr, [role=row]").unwrap());

static TEXT_BLOCK_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("p, li, div, section, article").unwrap());

static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

static NAME_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("a, strong, b, h5, [class*=name], [class*=title]").unwrap()
});

static DESC_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("[class*=desc], p").unwrap());

static FRAG_PRICE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\s*[0-9][0-9,]*(?:\.[0-9]{1,2})?").unwrap());

static FRAG_TIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\d{1,2}:\d{2}\s*(?:am|pm)\s*(?:-|–|to)\s*\d{1,2}:\d{2}\s*(?:am|pm)").unwrap()
});

static FRAG_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2}\s*(?:-|–|to|through)\s*(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2}",
    )
    .unwrap()
});

static FRAG_AGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(?:\bages?\s*:?\s*\d{1,2}\s*(?:(?:-|–|to)\s*\d{1,2}|\+)?|\b\d{1,2}\s*(?:(?:-|–|to)\s*\d{1,2}|\+)\s*(?:yrs?|years?))",
    )
    .unwrap()
});

static STATUS_KEYWORD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(open|waitlist|closed|cancelled|sold out|full|register)\b").unwrap()
});

static REG_HREF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)courseid=|course_id=|activityid=|activity_id=|barcode=|enroll|register|/book")
        .unwrap()
});

/// Text-block candidates outside this band are either single words or whole
/// pages, not activities.
const TEXT_BLOCK_MIN_LEN: usize = 30;
const TEXT_BLOCK_MAX_LEN: usize = 1200;

const NAME_MAX_LEN: usize = 120;

/// Runs the strategies in priority order against a rendered document and
/// returns the first non-empty result, tagged with the strategy that
/// produced it. `None` means every strategy came up empty.
pub fn extract_candidates(
    doc: &Html,
    category: &str,
    base_url: &str,
) -> Option<(SourceStrategy, Vec<RawCandidate>)> {
    let strategies: [(SourceStrategy, fn(&Html, &str, &str) -> Vec<RawCandidate>); 4] = [
        (SourceStrategy::StructuredRows, structured_rows),
        (SourceStrategy::TableRows, table_rows),
        (SourceStrategy::TextBlocks, text_blocks),
        (SourceStrategy::LinkFallback, link_fallback),
    ];
    for (strategy, run) in strategies {
        let candidates = run(doc, category, base_url);
        if !candidates.is_empty() {
            return Some((strategy, candidates));
        }
        debug!("{strategy:?} found nothing at {base_url}");
    }
    None
}

/// A strong activity signal: a currency amount, a course-code pattern, or a
/// registration-state keyword.
fn has_activity_signal(text: &str) -> bool {
    FRAG_PRICE_RE.is_match(text)
        || normalize::parse_course_code(text).is_some()
        || STATUS_KEYWORD_RE.is_match(text)
}

pub fn is_registration_href(href: &str) -> bool {
    REG_HREF_RE.is_match(href)
}

fn element_text(el: ElementRef) -> String {
    normalize_whitespace(&el.text().collect::<String>())
}

fn is_group_heading(el: &ElementRef) -> bool {
    let tag = el.value().name();
    if matches!(tag, "h2" | "h3" | "h4" | "legend") {
        return true;
    }
    el.value()
        .attr("class")
        .is_some_and(|class| class.contains("title"))
}

fn is_group_item(el: &ElementRef) -> bool {
    if el.value().name() == "li" {
        return true;
    }
    el.value().attr("class").is_some_and(|class| {
        ["item", "row", "activity", "course", "event"]
            .iter()
            .any(|token| class.contains(token))
    })
}

/// Builds a candidate out of one activity-shaped element, locating whatever
/// fragments are present in its text and links.
fn candidate_from_element(
    el: ElementRef,
    category: &str,
    subcategory: Option<&str>,
    strategy: SourceStrategy,
    base_url: &str,
) -> Option<RawCandidate> {
    let text = element_text(el);
    if text.is_empty() {
        return None;
    }

    let name = el
        .select(&NAME_SEL)
        .map(element_text)
        .find(|t| !t.is_empty())
        .unwrap_or_else(|| text.chars().take(NAME_MAX_LEN).collect::<String>());

    let registration_url = el
        .select(&LINK_SEL)
        .filter_map(|a| a.value().attr("href"))
        .find(|href| is_registration_href(href))
        .and_then(|href| absolutize(base_url, href));

    let description = el
        .select(&DESC_SEL)
        .map(element_text)
        .find(|fragment| !fragment.is_empty() && *fragment != name);

    let mut candidate = RawCandidate::new(name, text.clone(), strategy);
    candidate.category = Some(category.to_string());
    candidate.subcategory = subcategory.map(str::to_string);
    candidate.description = description;
    candidate.price_text = FRAG_PRICE_RE.find(&text).map(|m| m.as_str().to_string());
    candidate.time_text = FRAG_TIME_RE.find(&text).map(|m| m.as_str().to_string());
    candidate.date_text = FRAG_DATE_RE.find(&text).map(|m| m.as_str().to_string());
    candidate.age_text = FRAG_AGE_RE.find(&text).map(|m| m.as_str().to_string());
    candidate.location_text = normalize::extract_location(&text);
    candidate.course_code = normalize::parse_course_code(&text)
        .or_else(|| registration_url.as_deref().and_then(normalize::course_code_from_url));
    candidate.registration_url = registration_url;
    Some(candidate)
}

fn absolutize(base_url: &str, href: &str) -> Option<String> {
    let base = Url::parse(base_url).ok()?;
    base.join(href).ok().map(|url| url.to_string())
}

/// Strategy 1: a repeating group-title element followed by one or more group
/// items; each item is associated with the nearest preceding title.
fn structured_rows(doc: &Html, category: &str, base_url: &str) -> Vec<RawCandidate> {
    let mut candidates = Vec::new();
    for title_el in doc.select(&GROUP_TITLE_SEL) {
        let title = element_text(title_el);
        if title.is_empty() {
            continue;
        }
        for sibling in title_el.next_siblings().filter_map(ElementRef::wrap) {
            if is_group_heading(&sibling) {
                break;
            }
            let items: Vec<ElementRef> = if is_group_item(&sibling) {
                vec![sibling]
            } else {
                sibling.select(&GROUP_ITEM_SEL).collect()
            };
            for item in items {
                let text = element_text(item);
                if !has_activity_signal(&text) {
                    continue;
                }
                if let Some(candidate) = candidate_from_element(
                    item,
                    category,
                    Some(&title),
                    SourceStrategy::StructuredRows,
                    base_url,
                ) {
                    candidates.push(candidate);
                }
            }
        }
    }
    candidates
}

/// Strategy 2: generic tabular rows carrying at least one strong signal.
fn table_rows(doc: &Html, category: &str, base_url: &str) -> Vec<RawCandidate> {
    doc.select(&TABLE_ROW_SEL)
        .filter(|row| has_activity_signal(&element_text(*row)))
        .filter_map(|row| {
            candidate_from_element(row, category, None, SourceStrategy::TableRows, base_url)
        })
        .collect()
}

/// Strategy 3: signal-bearing block-level content when no row structure
/// exists, guarded by a length band against whole-page and single-word
/// matches.
fn text_blocks(doc: &Html, category: &str, base_url: &str) -> Vec<RawCandidate> {
    doc.select(&TEXT_BLOCK_SEL)
        .filter(|block| {
            let text = element_text(*block);
            (TEXT_BLOCK_MIN_LEN..=TEXT_BLOCK_MAX_LEN).contains(&text.len())
                && has_activity_signal(&text)
        })
        .filter_map(|block| {
            candidate_from_element(block, category, None, SourceStrategy::TextBlocks, base_url)
        })
        .collect()
}

/// Strategy 4: every link whose destination matches the registration-link
/// pattern becomes one candidate named after the link text. The least
/// detailed output, but non-zero on entirely unrecognized layouts.
fn link_fallback(doc: &Html, category: &str, base_url: &str) -> Vec<RawCandidate> {
    doc.select(&LINK_SEL)
        .filter_map(|a| {
            let href = a.value().attr("href")?;
            if !is_registration_href(href) {
                return None;
            }
            let name = element_text(a);
            if name.is_empty() {
                return None;
            }
            let mut candidate =
                RawCandidate::new(name.clone(), name, SourceStrategy::LinkFallback);
            candidate.category = Some(category.to_string());
            candidate.registration_url = absolutize(base_url, href);
            candidate.course_code = candidate
                .registration_url
                .as_deref()
                .and_then(normalize::course_code_from_url);
            Some(candidate)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = "https://rec.example.com/browse";

    #[test]
    fn structured_rows_associate_items_with_nearest_title() {
        let html = Html::parse_document(
            r#"
            <h3>Swim Lessons</h3>
            <ul>
              <li class="program-item">Swim Kids 1 #10001 $80.00 Open</li>
              <li class="program-item">Swim Kids 2 #10002 $80.00 Waitlist</li>
            </ul>
            <h3>Aquafit</h3>
            <ul>
              <li class="program-item">Shallow Aquafit #10003 $5.50 Open</li>
            </ul>
            "#,
        );
        let (strategy, candidates) = extract_candidates(&html, "Swimming", BASE).unwrap();
        assert_eq!(strategy, SourceStrategy::StructuredRows);
        assert_eq!(candidates.len(), 3);
        assert_eq!(candidates[0].subcategory.as_deref(), Some("Swim Lessons"));
        assert_eq!(candidates[2].subcategory.as_deref(), Some("Aquafit"));
        assert_eq!(candidates[0].course_code.as_deref(), Some("10001"));
    }

    #[test]
    fn table_rows_require_a_signal() {
        let html = Html::parse_document(
            r#"
            <table>
              <tr><td>About our facility</td></tr>
              <tr><td>Karate Intro #30001</td><td>$120.00</td><td>Open</td></tr>
            </table>
            "#,
        );
        let (strategy, candidates) = extract_candidates(&html, "Martial Arts", BASE).unwrap();
        assert_eq!(strategy, SourceStrategy::TableRows);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].price_text.as_deref(), Some("$120.00"));
    }

    #[test]
    fn text_blocks_respect_the_length_band() {
        let html = Html::parse_document(
            r#"
            <p>$5</p>
            <p>Toddler ballet Tuesdays 4:00 pm - 4:45 pm, $112.00 for the season. Register online.</p>
            "#,
        );
        let (strategy, candidates) = extract_candidates(&html, "Dance", BASE).unwrap();
        assert_eq!(strategy, SourceStrategy::TextBlocks);
        assert_eq!(candidates.len(), 1);
        assert!(candidates[0].raw_text.starts_with("Toddler ballet"));
    }

    #[test]
    fn link_fallback_is_the_last_resort() {
        let html = Html::parse_document(
            r#"
            <nav><a href="/about">About us</a></nav>
            <a href="/enroll?courseId=55501">Youth Climbing Club</a>
            "#,
        );
        let (strategy, candidates) = extract_candidates(&html, "Climbing", BASE).unwrap();
        assert_eq!(strategy, SourceStrategy::LinkFallback);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].name, "Youth Climbing Club");
        assert_eq!(candidates[0].course_code.as_deref(), Some("55501"));
        assert_eq!(
            candidates[0].registration_url.as_deref(),
            Some("https://rec.example.com/enroll?courseId=55501")
        );
    }

    #[test]
    fn empty_page_yields_none() {
        let html = Html::parse_document("<p>Closed holidays.</p>");
        // "closed" is a signal but the block sits under the band floor.
        assert!(extract_candidates(&html, "Swimming", BASE).is_none());
    }
}
