//! Deterministic relevance scoring.
//!
//! Weights encode a precision order: name > description > confirmed tag >
//! inferred tag > content. A match found only in content always ranks below
//! any other kind of match.

use serde::Serialize;

use crate::error::PatternError;
use crate::store::PatternStore;
use crate::types::Pattern;
use crate::types::is_domain_tag;

const FILTER_MATCH: u32 = 5;
const NAME_CONTAINS: u32 = 10;
const NAME_PREFIX: u32 = 5;
const DESCRIPTION: u32 = 5;
const CONFIRMED_TAG: u32 = 3;
const INFERRED_TAG: u32 = 2;
const CONTENT: u32 = 1;

/// Parameters of one search. `limit == 0` keeps every match.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchOptions {
    pub query: String,
    pub tag: Option<String>,
    pub domain: Option<String>,
    pub limit: usize,
}

impl SearchOptions {
    /// Lowercases and space-joins free-text terms into a query.
    pub fn from_terms<S: AsRef<str>>(terms: &[S]) -> Self {
        let query = terms
            .iter()
            .map(|t| t.as_ref().to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            query,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ScoredPattern {
    pub pattern: Pattern,
    pub score: u32,
}

pub fn score(pattern: &Pattern, query: &str, tag: Option<&str>, domain: Option<&str>) -> u32 {
    let mut total = 0;
    let mut filtered = false;

    if let Some(tag) = tag {
        let tag = tag.to_lowercase();
        let confirmed = pattern.tags.confirmed.iter().any(|t| t.to_lowercase() == tag);
        let inferred = pattern
            .tags
            .inferred
            .iter()
            .any(|t| t.is_confident() && t.tag.to_lowercase() == tag);
        if !confirmed && !inferred {
            return 0;
        }
        total += FILTER_MATCH;
        filtered = true;
    }

    if let Some(domain) = domain {
        let domain = domain.to_lowercase();
        let matched = is_domain_tag(&domain)
            && pattern.tags.confirmed.iter().any(|t| t.to_lowercase() == domain);
        if !matched {
            return 0;
        }
        total += FILTER_MATCH;
        filtered = true;
    }

    if query.is_empty() {
        return if filtered { total + 1 } else { 0 };
    }

    let query = query.to_lowercase();
    let name = pattern.name.to_lowercase();
    if name.contains(&query) {
        total += NAME_CONTAINS;
        if name.starts_with(&query) {
            total += NAME_PREFIX;
        }
    }
    if pattern.description.to_lowercase().contains(&query) {
        total += DESCRIPTION;
    }
    for t in &pattern.tags.confirmed {
        if t.to_lowercase().contains(&query) {
            total += CONFIRMED_TAG;
        }
    }
    // Free-text recall deliberately ignores inference confidence.
    for t in &pattern.tags.inferred {
        if t.tag.to_lowercase().contains(&query) {
            total += INFERRED_TAG;
        }
    }
    if pattern.content.to_lowercase().contains(&query) {
        total += CONTENT;
    }
    total
}

/// Scores `patterns`, drops zero scores, and orders by score descending.
/// Equal scores keep their input order.
pub fn rank(patterns: Vec<Pattern>, opts: &SearchOptions) -> Vec<ScoredPattern> {
    let mut scored: Vec<ScoredPattern> = patterns
        .into_iter()
        .filter_map(|pattern| {
            let score = score(
                &pattern,
                &opts.query,
                opts.tag.as_deref(),
                opts.domain.as_deref(),
            );
            (score > 0).then_some(ScoredPattern { pattern, score })
        })
        .collect();
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    if opts.limit > 0 {
        scored.truncate(opts.limit);
    }
    scored
}

pub fn search(store: &dyn PatternStore, opts: &SearchOptions) -> Result<Vec<ScoredPattern>, PatternError> {
    let patterns = store.list().map_err(PatternError::StoreUnavailable)?;
    let total = patterns.len();
    let results = rank(patterns, opts);
    tracing::debug!(
        query = %opts.query,
        total,
        matched = results.len(),
        "pattern search"
    );
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::InferredTag;
    use pretty_assertions::assert_eq;

    fn go_errors() -> Pattern {
        let mut p = Pattern::new("go-error-handling", "if err != nil { return err }");
        p.description = "handle errors idiomatically".into();
        p.tags.confirmed = vec!["go".into(), "error".into()];
        p
    }

    #[test]
    fn name_description_and_tag_weights() {
        assert_eq!(score(&go_errors(), "error", None, None), 18);
    }

    #[test]
    fn name_prefix_bonus() {
        assert_eq!(score(&go_errors(), "go", None, None), 10 + 5 + 3);
    }

    #[test]
    fn name_match_strictly_raises_score() {
        let mut without = go_errors();
        without.name = "idioms".into();
        let with = Pattern {
            name: "idioms-error".into(),
            ..without.clone()
        };
        let base = score(&without, "error", None, None);
        assert!(score(&with, "error", None, None) > base);
        assert_eq!(score(&with, "error", None, None), base + NAME_CONTAINS);
    }

    #[test]
    fn query_is_case_folded() {
        assert_eq!(score(&go_errors(), "ERROR", None, None), 18);
    }

    #[test]
    fn empty_query_with_tag_filter() {
        assert_eq!(score(&go_errors(), "", Some("go"), None), 6);
        assert_eq!(score(&go_errors(), "", Some("GO"), Some("go")), 11);
    }

    #[test]
    fn empty_query_without_filters_matches_nothing() {
        assert_eq!(score(&go_errors(), "", None, None), 0);
    }

    #[test]
    fn failing_filter_short_circuits() {
        let p = go_errors();
        assert_eq!(score(&p, "error", Some("python"), None), 0);
        assert_eq!(score(&p, "error", None, Some("rust")), 0);
        // "error" is a confirmed tag but not a recognised domain.
        assert_eq!(score(&p, "error", None, Some("error")), 0);
    }

    #[test]
    fn tag_filter_gates_inferred_on_confidence() {
        let mut p = Pattern::new("p", "x");
        p.tags.inferred = vec![InferredTag::new("docker", 0.69), InferredTag::new("k8s", 0.7)];
        assert_eq!(score(&p, "", Some("docker"), None), 0);
        assert_eq!(score(&p, "", Some("k8s"), None), 6);
    }

    #[test]
    fn domain_filter_ignores_inferred_tags() {
        let mut p = Pattern::new("p", "x");
        p.tags.inferred = vec![InferredTag::new("rust", 1.0)];
        assert_eq!(score(&p, "", None, Some("rust")), 0);
    }

    #[test]
    fn inferred_tags_score_regardless_of_confidence() {
        let mut p = Pattern::new("p", "x");
        p.tags.inferred = vec![InferredTag::new("docker", 0.1), InferredTag::new("dockerfile", 0.9)];
        assert_eq!(score(&p, "docker", None, None), 4);
    }

    #[test]
    fn content_counts_once() {
        let p = Pattern::new("p", "loop loop loop");
        assert_eq!(score(&p, "loop", None, None), 1);
    }

    #[test]
    fn content_only_ranks_last() {
        let mut inferred = Pattern::new("b", "");
        inferred.tags.inferred = vec![InferredTag::new("retry", 0.2)];
        let content = Pattern::new("a", "retry with backoff");
        let mut described = Pattern::new("c", "");
        described.description = "retry policy".into();

        let opts = SearchOptions {
            query: "retry".into(),
            ..Default::default()
        };
        let names: Vec<String> = rank(vec![content, inferred, described], &opts)
            .into_iter()
            .map(|s| s.pattern.name)
            .collect();
        assert_eq!(names, vec!["c", "b", "a"]);
    }

    #[test]
    fn ties_keep_store_order_and_limit_applies_after_sort() {
        let patterns: Vec<Pattern> = ["zeta", "alpha", "mid"]
            .iter()
            .map(|n| Pattern::new(*n, "shared body"))
            .collect();
        let mut best = Pattern::new("shared-first", "");
        best.description = "nothing".into();
        let mut all = patterns;
        all.push(best);

        let opts = SearchOptions {
            query: "shared".into(),
            limit: 3,
            ..Default::default()
        };
        let ranked = rank(all, &opts);
        let names: Vec<&str> = ranked.iter().map(|s| s.pattern.name.as_str()).collect();
        assert_eq!(names, vec!["shared-first", "zeta", "alpha"]);
        assert_eq!(ranked[0].score, 15);
    }

    #[test]
    fn from_terms_lowercases_and_joins() {
        let opts = SearchOptions::from_terms(&["Error", "HANDLING"]);
        assert_eq!(opts.query, "error handling");
        assert_eq!(opts.limit, 0);
    }
}
