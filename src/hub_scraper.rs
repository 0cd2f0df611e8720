//! Hub enumeration: the top-level listing page names its categories only in
//! link text (the markup carries no semantic category attribute), so entries
//! are discovered by text matching.

use std::collections::HashSet;
use std::sync::LazyLock;

use scraper::{Html, Selector};

use crate::normalize::normalize_whitespace;

/// One clickable category entry discovered on the hub. `href` is kept for
/// logging; navigation goes through a text-matched click so script-driven
/// entries work too.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryEntry {
    pub name: String,
    pub href: Option<String>,
}

static LINK_SEL: LazyLock<Selector> = LazyLock::new(|| Selector::parse("a").unwrap());

/// Category links on recreation hubs are short names, not sentences.
const ENTRY_TEXT_MAX_LEN: usize = 60;

const DEFAULT_CATEGORY_KEYWORDS: [&str; 12] = [
    "swim",
    "skat",
    "camp",
    "fitness",
    "dance",
    "gymnastics",
    "martial arts",
    "sport",
    "art",
    "yoga",
    "climb",
    "racquet",
];

/// Enumerates category entries on the hub document. With a configured
/// worklist the match is exact (case-insensitive); otherwise any link whose
/// text contains a known recreation keyword qualifies.
pub fn discover_categories(doc: &Html, worklist: Option<&[String]>) -> Vec<CategoryEntry> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut entries = Vec::new();

    for link in doc.select(&LINK_SEL) {
        let text = normalize_whitespace(&link.text().collect::<String>());
        if text.is_empty() || text.len() > ENTRY_TEXT_MAX_LEN {
            continue;
        }
        let matches = match worklist {
            Some(names) => names.iter().any(|name| name.eq_ignore_ascii_case(&text)),
            None => {
                let lower = text.to_lowercase();
                DEFAULT_CATEGORY_KEYWORDS
                    .iter()
                    .any(|keyword| lower.contains(keyword))
            }
        };
        if matches && seen.insert(text.to_lowercase()) {
            entries.push(CategoryEntry {
                name: text,
                href: link.value().attr("href").map(str::to_string),
            });
        }
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    const HUB: &str = r#"
        <nav>
          <a href="/browse/swimming">Swimming</a>
          <a href="/browse/skating">Skating</a>
          <a href="/browse/swimming">Swimming</a>
          <a href="/privacy">Privacy policy</a>
        </nav>
    "#;

    #[test]
    fn keyword_matching_skips_chrome_links() {
        let doc = Html::parse_document(HUB);
        let entries = discover_categories(&doc, None);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Swimming", "Skating"]);
    }

    #[test]
    fn worklist_matching_is_exact() {
        let doc = Html::parse_document(HUB);
        let worklist = vec!["skating".to_string()];
        let entries = discover_categories(&doc, Some(&worklist));
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].name, "Skating");
        assert_eq!(entries[0].href.as_deref(), Some("/browse/skating"));
    }

    #[test]
    fn duplicate_link_text_collapses() {
        let doc = Html::parse_document(HUB);
        let entries = discover_categories(&doc, None);
        assert_eq!(
            entries
                .iter()
                .filter(|e| e.name == "Swimming")
                .count(),
            1
        );
    }
}
