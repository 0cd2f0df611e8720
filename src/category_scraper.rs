//! Per-category navigation controller.
//!
//! One category visit walks: hub → category click → content settle → expand
//! collapsed groups → extract → recurse into sub-page breakdowns → done.
//! Every failure in here is category-local: the orchestrator decides whether
//! to retry or skip, and sibling categories always start clean from the hub.

use std::collections::HashSet;
use std::future::Future;
use std::sync::LazyLock;
use std::time::Duration;

use log::{debug, warn};
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use tokio::time::timeout;

use crate::driver::{BrowserDriver, DriverResult, Locator};
use crate::error::{ScrapeError, ScrapeResult};
use crate::extract;
use crate::normalize::normalize_whitespace;
use crate::records::RawCandidate;

static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a[href]").unwrap());

const EXPANDER_CSS: &str = "a, button, [role=button], summary";

static CLICKABLE_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse(EXPANDER_CSS).unwrap());

static EXPAND_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(?:(?:show|view|see|load)\s+(?:more|all)\b|expand\b)").unwrap()
});

static DATE_LINK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:(?:jan|feb|mar|apr|may|jun|jul|aug|sep|oct|nov|dec)[a-z]*\.?\s+\d{1,2}|week\s+\d+|\d{1,2}/\d{1,2})",
    )
    .unwrap()
});

const EXPANDER_TEXT_MAX_LEN: usize = 40;

pub struct CategoryScraper {
    pub hub_url: String,
    pub category: String,
    pub nav_timeout: Duration,
    pub max_depth: u32,
    pub max_expand_rounds: u32,
    pub max_sublinks: usize,
}

impl CategoryScraper {
    /// Drives one full category visit and returns everything extracted from
    /// it, across recursion levels. An empty category is an error so the
    /// orchestrator can retry it like any other failure.
    pub async fn scrape(
        &self,
        driver: &mut dyn BrowserDriver,
    ) -> ScrapeResult<Vec<RawCandidate>> {
        // Start every category from a known state.
        self.bounded(driver.navigate(&self.hub_url)).await?;
        driver.wait_for_stable(self.nav_timeout).await?;

        let entered = self
            .bounded(driver.click(&Locator::link_text(&self.category)))
            .await?;
        if !entered {
            // The entry exists but is inert under this driver; there is
            // nothing to extract behind it.
            return Err(ScrapeError::ExtractionEmpty {
                url: self.hub_url.clone(),
            });
        }
        driver.wait_for_stable(self.nav_timeout).await?;

        let mut visited: HashSet<String> = HashSet::new();
        let mut candidates = Vec::new();
        self.scrape_page(driver, &mut visited, 0, &mut candidates)
            .await?;

        if candidates.is_empty() {
            return Err(ScrapeError::ExtractionEmpty {
                url: driver.current_url().to_string(),
            });
        }
        Ok(candidates)
    }

    async fn scrape_page(
        &self,
        driver: &mut dyn BrowserDriver,
        visited: &mut HashSet<String>,
        depth: u32,
        out: &mut Vec<RawCandidate>,
    ) -> ScrapeResult<()> {
        let page_url = driver.current_url().to_string();
        visited.insert(page_url.clone());

        self.expand_all(driver).await?;

        let document = self.bounded(driver.document()).await?;
        let (extracted, sublinks) = {
            let doc = Html::parse_document(&document);
            let extracted = extract::extract_candidates(&doc, &self.category, &page_url);
            let sublinks = if depth < self.max_depth {
                find_sublinks(&doc, &page_url, self.max_sublinks)
            } else {
                Vec::new()
            };
            (extracted, sublinks)
        };

        match extracted {
            Some((strategy, candidates)) => {
                debug!(
                    "category '{}': {} candidates via {strategy:?} at {page_url}",
                    self.category,
                    candidates.len()
                );
                out.extend(candidates);
            }
            // One empty leaf is fine; the category as a whole has to come up
            // empty before it counts as a failure.
            None => debug!("category '{}': nothing extracted at {page_url}", self.category),
        }

        for sublink in sublinks {
            if !visited.insert(sublink.clone()) {
                continue;
            }
            self.bounded(driver.navigate(&sublink)).await?;
            driver.wait_for_stable(self.nav_timeout).await?;
            Box::pin(self.scrape_page(driver, visited, depth + 1, out)).await?;
        }
        Ok(())
    }

    /// Triggers show-more affordances until a round surfaces no new ones,
    /// bounded by the round cap against sites that re-render the same
    /// affordance forever.
    async fn expand_all(&self, driver: &mut dyn BrowserDriver) -> ScrapeResult<()> {
        let mut seen: HashSet<String> = HashSet::new();
        for _ in 0..self.max_expand_rounds {
            let document = self.bounded(driver.document()).await?;
            let affordances = {
                let doc = Html::parse_document(&document);
                find_expanders(&doc)
            };
            let fresh: Vec<String> = affordances
                .into_iter()
                .filter(|text| seen.insert(text.clone()))
                .collect();
            if fresh.is_empty() {
                break;
            }

            let mut any_changed = false;
            for text in fresh {
                let locator = Locator {
                    css: EXPANDER_CSS.to_string(),
                    text_contains: Some(text.clone()),
                };
                match self.bounded(driver.click(&locator)).await {
                    Ok(changed) => any_changed |= changed,
                    // Expanders churn as the page re-renders; a vanished one
                    // is not worth failing the category over.
                    Err(e) => debug!("expander '{text}' did not click: {e}"),
                }
            }
            if !any_changed {
                break;
            }
        }
        Ok(())
    }

    async fn bounded<T, F>(&self, fut: F) -> ScrapeResult<T>
    where
        F: Future<Output = DriverResult<T>>,
    {
        match timeout(self.nav_timeout, fut).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ScrapeError::NavigationTimeout(self.nav_timeout)),
        }
    }
}

/// Distinct show-more affordance texts present in the document.
fn find_expanders(doc: &Html) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut texts = Vec::new();
    for el in doc.select(&CLICKABLE_SEL) {
        let text = normalize_whitespace(&el.text().collect::<String>());
        if text.is_empty() || text.len() > EXPANDER_TEXT_MAX_LEN {
            continue;
        }
        if EXPAND_TEXT_RE.is_match(&text) && seen.insert(text.to_lowercase()) {
            texts.push(text);
        }
    }
    texts
}

fn strip_fragment(url: &mut Url) {
    url.set_fragment(None);
}

/// Sub-page breakdown links worth recursing into: same host, not a
/// registration link, and either date-shaped link text or a path extending
/// the current page's path.
fn find_sublinks(doc: &Html, base_url: &str, cap: usize) -> Vec<String> {
    let Ok(mut base) = Url::parse(base_url) else {
        warn!("unparseable page url {base_url}; skipping recursion");
        return Vec::new();
    };
    strip_fragment(&mut base);

    let mut seen = HashSet::new();
    let mut sublinks = Vec::new();
    for link in doc.select(&LINK_SEL) {
        if sublinks.len() >= cap {
            break;
        }
        let Some(href) = link.value().attr("href") else {
            continue;
        };
        if extract::is_registration_href(href) {
            continue;
        }
        let Ok(mut target) = base.join(href) else {
            continue;
        };
        strip_fragment(&mut target);
        if target.host_str() != base.host_str() || target == base {
            continue;
        }

        let text = normalize_whitespace(&link.text().collect::<String>());
        let date_shaped = DATE_LINK_RE.is_match(&text);
        let extends_path =
            base.path() != "/" && target.path() != base.path() && target.path().starts_with(base.path());
        if !(date_shaped || extends_path) {
            continue;
        }

        let target = target.to_string();
        if seen.insert(target.clone()) {
            sublinks.push(target);
        }
    }
    sublinks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ScriptedDriver;
    use crate::records::SourceStrategy;

    const HUB: &str = "http://rec.test/hub";

    fn scraper(category: &str) -> CategoryScraper {
        CategoryScraper {
            hub_url: HUB.to_string(),
            category: category.to_string(),
            nav_timeout: Duration::from_secs(5),
            max_depth: 2,
            max_expand_rounds: 5,
            max_sublinks: 24,
        }
    }

    fn hub_page() -> &'static str {
        r#"<nav><a href="/swimming">Swimming</a></nav>"#
    }

    #[tokio::test]
    async fn expansion_reveals_hidden_rows() {
        let collapsed = r#"
            <h3>Swim Lessons</h3>
            <ul><li class="program-item">Swim Kids 1 #10001 $80.00 Open</li></ul>
            <button>Show more</button>
        "#;
        let expanded = r#"
            <h3>Swim Lessons</h3>
            <ul>
              <li class="program-item">Swim Kids 1 #10001 $80.00 Open</li>
              <li class="program-item">Swim Kids 2 #10002 $80.00 Waitlist</li>
            </ul>
            <button>Show more</button>
        "#;
        let mut driver = ScriptedDriver::new()
            .with_page(HUB, hub_page())
            .with_page("http://rec.test/swimming", collapsed)
            .with_click_mutation("http://rec.test/swimming", "Show more", expanded);

        let candidates = scraper("Swimming").scrape(&mut driver).await.unwrap();
        assert_eq!(candidates.len(), 2);
        assert!(candidates.iter().all(|c| c.source_strategy == SourceStrategy::StructuredRows));
    }

    #[tokio::test]
    async fn recursion_follows_date_breakdowns_once() {
        let category_page = r#"
            <h3>Day Camps</h3>
            <ul><li class="program-item">Adventure Camp #30001 $210.00 Open</li></ul>
            <a href="/camps/jul-7">Jul 7 - Jul 11</a>
        "#;
        let sub_page = r#"
            <h3>Day Camps</h3>
            <ul><li class="program-item">Adventure Camp PM #30002 $110.00 Open</li></ul>
        "#;
        let hub = r#"<nav><a href="/camps">Camps</a></nav>"#;
        let mut driver = ScriptedDriver::new()
            .with_page(HUB, hub)
            .with_page("http://rec.test/camps", category_page)
            .with_page("http://rec.test/camps/jul-7", sub_page);

        let candidates = scraper("Camps").scrape(&mut driver).await.unwrap();
        let codes: Vec<_> = candidates
            .iter()
            .filter_map(|c| c.course_code.as_deref())
            .collect();
        assert_eq!(codes, vec!["30001", "30002"]);
    }

    #[tokio::test]
    async fn missing_category_entry_is_an_error() {
        let mut driver = ScriptedDriver::new().with_page(HUB, hub_page());
        let result = scraper("Pottery").scrape(&mut driver).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn empty_category_is_an_error() {
        let hub = r#"<nav><a href="/swimming">Swimming</a></nav>"#;
        let mut driver = ScriptedDriver::new()
            .with_page(HUB, hub)
            .with_page("http://rec.test/swimming", "<p>Nothing here yet.</p>");
        let result = scraper("Swimming").scrape(&mut driver).await;
        assert!(matches!(result, Err(ScrapeError::ExtractionEmpty { .. })));
    }
}
