//! Run-level deduplication: the traversal visits many leaves and the same
//! activity frequently surfaces on more than one of them.

use std::collections::HashMap;

use crate::records::RawCandidate;

/// Collapses a run's candidates to one per stable identity, preserving
/// first-seen order. When two candidates share a key, the one from the
/// higher-priority strategy wins; on equal strategies the one with more
/// located fields wins.
pub fn dedupe_candidates(candidates: Vec<RawCandidate>) -> Vec<RawCandidate> {
    let mut by_key: HashMap<String, RawCandidate> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for candidate in candidates {
        let key = candidate.identity_key();
        match by_key.get_mut(&key) {
            None => {
                order.push(key.clone());
                by_key.insert(key, candidate);
            }
            Some(kept) => {
                if prefer_challenger(kept, &candidate) {
                    *kept = candidate;
                }
            }
        }
    }

    order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .collect()
}

fn prefer_challenger(kept: &RawCandidate, challenger: &RawCandidate) -> bool {
    let kept_priority = kept.source_strategy.priority();
    let challenger_priority = challenger.source_strategy.priority();
    if challenger_priority != kept_priority {
        return challenger_priority < kept_priority;
    }
    challenger.populated_fields() > kept.populated_fields()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SourceStrategy;

    fn coded(code: &str, strategy: SourceStrategy) -> RawCandidate {
        let mut candidate =
            RawCandidate::new(format!("activity {code}"), format!("raw {code}"), strategy);
        candidate.course_code = Some(code.to_string());
        candidate
    }

    #[test]
    fn same_code_collapses_to_one() {
        let out = dedupe_candidates(vec![
            coded("10001", SourceStrategy::StructuredRows),
            coded("10001", SourceStrategy::StructuredRows),
            coded("10002", SourceStrategy::StructuredRows),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn higher_priority_strategy_wins() {
        let trusted = coded("10001", SourceStrategy::StructuredRows);
        let mut noisy = coded("10001", SourceStrategy::LinkFallback);
        // The noisy one is richer, but strategy trust comes first.
        noisy.price_text = Some("$80.00".into());
        noisy.location_text = Some("Delbrook Centre".into());

        let out = dedupe_candidates(vec![noisy, trusted]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].source_strategy, SourceStrategy::StructuredRows);
    }

    #[test]
    fn richer_candidate_wins_within_a_strategy() {
        let sparse = coded("10001", SourceStrategy::TableRows);
        let mut rich = coded("10001", SourceStrategy::TableRows);
        rich.price_text = Some("$80.00".into());

        let out = dedupe_candidates(vec![sparse, rich]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].price_text.as_deref(), Some("$80.00"));
    }

    #[test]
    fn first_seen_order_is_preserved() {
        let out = dedupe_candidates(vec![
            coded("20002", SourceStrategy::TableRows),
            coded("10001", SourceStrategy::TableRows),
            coded("20002", SourceStrategy::TableRows),
        ]);
        let codes: Vec<_> = out.iter().filter_map(|c| c.course_code.as_deref()).collect();
        assert_eq!(codes, vec!["20002", "10001"]);
    }
}
