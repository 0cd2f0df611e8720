//! The browser-driver boundary.
//!
//! The navigation controller only needs four capabilities from whatever is
//! rendering the site: load a url, hand back the live document, click an
//! element, and wait for content to settle. `HttpDriver` satisfies them with
//! plain rate-limited HTTP fetches (a click resolves the target's href and
//! navigates); a JS-executing provider slots in behind the same trait.
//! `ScriptedDriver` is the in-memory counterpart for tests and offline runs.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, ClientBuilder, StatusCode, Url};
use scraper::{Html, Selector};

use crate::ratelimit::NavRateLimiter;

#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status {status} for {url}")]
    HttpStatus { status: StatusCode, url: String },
    #[error("invalid url: {0}")]
    Url(String),
    #[error("bad locator css: {0}")]
    BadLocator(String),
    #[error("no element matched locator {0}")]
    LocatorNotFound(String),
    #[error("navigation failed: {0}")]
    Navigation(String),
}

pub type DriverResult<T> = Result<T, DriverError>;

/// Click target: a CSS scope plus an optional case-insensitive text filter.
#[derive(Debug, Clone)]
pub struct Locator {
    pub css: String,
    pub text_contains: Option<String>,
}

impl Locator {
    pub fn css(css: &str) -> Self {
        Locator {
            css: css.to_string(),
            text_contains: None,
        }
    }

    pub fn link_text(text: &str) -> Self {
        Locator {
            css: "a[href]".to_string(),
            text_contains: Some(text.to_string()),
        }
    }

    /// The key a scripted site uses to recognize this locator.
    fn script_key(&self) -> &str {
        self.text_contains.as_deref().unwrap_or(&self.css)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.text_contains {
            Some(text) => write!(f, "{} ~ \"{}\"", self.css, text),
            None => write!(f, "{}", self.css),
        }
    }
}

#[async_trait]
pub trait BrowserDriver: Send {
    async fn navigate(&mut self, url: &str) -> DriverResult<()>;

    /// The live document, serialized for selector queries.
    async fn document(&mut self) -> DriverResult<String>;

    /// Returns true when the click changed the document (a navigation or an
    /// in-page mutation), false when the matched element was inert.
    async fn click(&mut self, locator: &Locator) -> DriverResult<bool>;

    async fn wait_for_stable(&mut self, timeout: Duration) -> DriverResult<()>;

    fn current_url(&self) -> &str;
}

/// Resolves a locator against a document to the href it would navigate to.
/// `Ok(None)` means the element exists but carries no navigable target.
fn resolve_click_href(document: &str, locator: &Locator) -> DriverResult<Option<String>> {
    let selector = Selector::parse(&locator.css)
        .map_err(|e| DriverError::BadLocator(format!("{}: {e}", locator.css)))?;
    let doc = Html::parse_document(document);
    let wanted = locator.text_contains.as_deref().map(str::to_lowercase);
    let mut matched_any = false;
    for el in doc.select(&selector) {
        if let Some(wanted) = &wanted {
            let text = el.text().collect::<String>().to_lowercase();
            if !text.contains(wanted) {
                continue;
            }
        }
        matched_any = true;
        if let Some(href) = el.value().attr("href").or_else(|| el.value().attr("data-url")) {
            return Ok(Some(href.to_string()));
        }
    }
    if matched_any {
        Ok(None)
    } else {
        Err(DriverError::LocatorNotFound(locator.to_string()))
    }
}

fn join_url(base: &str, href: &str) -> DriverResult<String> {
    let base = Url::parse(base).map_err(|e| DriverError::Url(format!("{base}: {e}")))?;
    let joined = base
        .join(href)
        .map_err(|e| DriverError::Url(format!("{href}: {e}")))?;
    Ok(joined.to_string())
}

/// Rate-limited HTTP driver over a plain client.
pub struct HttpDriver {
    client: Client,
    rate_limiter: NavRateLimiter,
    current_url: String,
    document: String,
}

impl HttpDriver {
    pub fn new() -> DriverResult<Self> {
        let client = ClientBuilder::new()
            .danger_accept_invalid_certs(true)
            .build()?;
        Ok(HttpDriver {
            client,
            rate_limiter: NavRateLimiter::new(),
            current_url: String::new(),
            document: String::new(),
        })
    }
}

#[async_trait]
impl BrowserDriver for HttpDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        // Wait (non-blocking) until our self-imposed pacing allows the next
        // page load.
        self.rate_limiter.wait_until_ready().await;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(DriverError::HttpStatus {
                status,
                url: url.to_string(),
            });
        }
        // Redirects may have moved us; record where we actually landed.
        self.current_url = response.url().to_string();
        self.document = response.text().await?;
        Ok(())
    }

    async fn document(&mut self) -> DriverResult<String> {
        Ok(self.document.clone())
    }

    async fn click(&mut self, locator: &Locator) -> DriverResult<bool> {
        let href = resolve_click_href(&self.document, locator)?;
        match href {
            Some(href) => {
                let target = join_url(&self.current_url, &href)?;
                self.navigate(&target).await?;
                Ok(true)
            }
            // Script-driven affordances cannot change anything under plain
            // HTTP; report the no-op instead of failing the traversal.
            None => Ok(false),
        }
    }

    async fn wait_for_stable(&mut self, _timeout: Duration) -> DriverResult<()> {
        // A fetched document is already at rest.
        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.current_url
    }
}

/// Canned site for tests and offline replay: a url → page map, one-shot
/// click mutations keyed by (url, locator), and scripted navigation
/// failures.
#[derive(Default)]
pub struct ScriptedDriver {
    pages: HashMap<String, String>,
    click_mutations: HashMap<(String, String), String>,
    failures: HashMap<String, u32>,
    current_url: String,
    document: String,
    /// Every url handed to `navigate`, for assertions.
    pub navigations: Vec<String>,
}

impl ScriptedDriver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    /// A click matching `locator_key` (the locator's text filter, or its css
    /// when it has none) on `url` swaps in `html` without navigating. Fires
    /// once.
    pub fn with_click_mutation(mut self, url: &str, locator_key: &str, html: &str) -> Self {
        self.click_mutations
            .insert((url.to_string(), locator_key.to_string()), html.to_string());
        self
    }

    /// The next `count` navigations to `url` fail.
    pub fn fail_next_navigations(mut self, url: &str, count: u32) -> Self {
        self.failures.insert(url.to_string(), count);
        self
    }
}

#[async_trait]
impl BrowserDriver for ScriptedDriver {
    async fn navigate(&mut self, url: &str) -> DriverResult<()> {
        self.navigations.push(url.to_string());
        if let Some(remaining) = self.failures.get_mut(url) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(DriverError::Navigation(format!("scripted failure for {url}")));
            }
        }
        match self.pages.get(url) {
            Some(html) => {
                self.current_url = url.to_string();
                self.document = html.clone();
                Ok(())
            }
            None => Err(DriverError::Navigation(format!("no page scripted for {url}"))),
        }
    }

    async fn document(&mut self) -> DriverResult<String> {
        Ok(self.document.clone())
    }

    async fn click(&mut self, locator: &Locator) -> DriverResult<bool> {
        let key = (self.current_url.clone(), locator.script_key().to_string());
        if let Some(replacement) = self.click_mutations.remove(&key) {
            self.document = replacement;
            return Ok(true);
        }
        let href = resolve_click_href(&self.document, locator)?;
        match href {
            Some(href) => {
                let target = join_url(&self.current_url, &href)?;
                self.navigate(&target).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn wait_for_stable(&mut self, _timeout: Duration) -> DriverResult<()> {
        Ok(())
    }

    fn current_url(&self) -> &str {
        &self.current_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_click_follows_links() {
        let mut driver = ScriptedDriver::new()
            .with_page("http://site.test/", r#"<a href="/next">Go deeper</a>"#)
            .with_page("http://site.test/next", "<p>arrived</p>");
        driver.navigate("http://site.test/").await.unwrap();
        let changed = driver.click(&Locator::link_text("Go deeper")).await.unwrap();
        assert!(changed);
        assert_eq!(driver.current_url(), "http://site.test/next");
    }

    #[tokio::test]
    async fn scripted_mutation_fires_once() {
        let mut driver = ScriptedDriver::new()
            .with_page("http://site.test/", r#"<button>Show more</button>"#)
            .with_click_mutation("http://site.test/", "Show more", "<p>expanded</p>");
        driver.navigate("http://site.test/").await.unwrap();
        let locator = Locator {
            css: "button".to_string(),
            text_contains: Some("Show more".to_string()),
        };
        assert!(driver.click(&locator).await.unwrap());
        assert!(driver.document().await.unwrap().contains("expanded"));
    }

    #[tokio::test]
    async fn scripted_failures_are_consumed() {
        let mut driver = ScriptedDriver::new()
            .with_page("http://site.test/flaky", "<p>up now</p>")
            .fail_next_navigations("http://site.test/flaky", 1);
        assert!(driver.navigate("http://site.test/flaky").await.is_err());
        assert!(driver.navigate("http://site.test/flaky").await.is_ok());
    }

    #[tokio::test]
    async fn inert_elements_report_no_change() {
        let mut driver = ScriptedDriver::new()
            .with_page("http://site.test/", r#"<button>Show more</button>"#);
        driver.navigate("http://site.test/").await.unwrap();
        let locator = Locator {
            css: "button".to_string(),
            text_contains: Some("Show more".to_string()),
        };
        assert_eq!(driver.click(&locator).await.unwrap(), false);
    }
}
