//! Multi-signal scoring and ranking.
//!
//! Each collected row carries four signals in `[0, 1]`: domain authority,
//! publication recency, query relevance, and topic coverage. The weighted
//! total drives threshold filtering, URL dedupe, per-domain limiting, and
//! the final ordering. Recency takes an explicit `now` so bucket boundaries
//! are testable.

use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::config::{ScoreStage, ScoreWeights, SynthesizeStage};
use crate::models::{CollectedResult, SignalScores};
use crate::text::tokenize;

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Bucketed freshness score. Unknown or unparseable dates land between the
/// one-year bucket and the stale floor rather than at either extreme.
pub fn recency_score(published_at: Option<&str>, now: DateTime<Utc>) -> f64 {
    let Some(ts) = published_at.and_then(parse_date) else {
        return 0.45;
    };

    let days = (now - ts).num_seconds() as f64 / 86_400.0;
    if days <= 30.0 {
        1.0
    } else if days <= 90.0 {
        0.85
    } else if days <= 180.0 {
        0.72
    } else if days <= 365.0 {
        0.58
    } else {
        0.4
    }
}

/// Fraction of `keywords` present in the tokenized document, capped at 1.
/// Empty documents or empty keyword lists score zero.
pub fn relevance_score(doc_text: &str, keywords: &[String]) -> f64 {
    let tokens = tokenize(doc_text);
    if tokens.is_empty() || keywords.is_empty() {
        return 0.0;
    }

    let token_set: std::collections::HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let hits = keywords.iter().filter(|kw| token_set.contains(kw.as_str())).count();
    (hits as f64 / keywords.len() as f64).min(1.0)
}

/// Exact-domain authority wins over the source tier; unknown both ways
/// falls back to 0.6.
pub fn authority_score(
    domain: &str,
    tier: &str,
    domain_authority: &BTreeMap<String, f64>,
    authority_by_tier: &BTreeMap<String, f64>,
) -> f64 {
    if let Some(score) = domain_authority.get(domain) {
        return *score;
    }
    if let Some(score) = authority_by_tier.get(tier) {
        return *score;
    }
    0.6
}

pub fn total_score(scores: &SignalScores, weights: &ScoreWeights) -> f64 {
    scores.authority * weights.authority
        + scores.recency * weights.recency
        + scores.relevance * weights.relevance
}

/// Collapse duplicate URLs, keeping the first-seen position and the highest
/// total score. A later duplicate replaces the survivor only when strictly
/// better, so ties resolve to the earlier request.
pub fn dedupe_results(results: Vec<CollectedResult>) -> Vec<CollectedResult> {
    let mut index_by_url: HashMap<String, usize> = HashMap::new();
    let mut output: Vec<CollectedResult> = Vec::new();

    for item in results {
        match index_by_url.get(&item.url) {
            Some(&idx) => {
                if item.total_score > output[idx].total_score {
                    output[idx] = item;
                }
            }
            None => {
                index_by_url.insert(item.url.clone(), output.len());
                output.push(item);
            }
        }
    }
    output
}

/// Keep at most `max_per_domain` results per domain, preserving order.
pub fn limit_by_domain(results: Vec<CollectedResult>, max_per_domain: usize) -> Vec<CollectedResult> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    results
        .into_iter()
        .filter(|item| {
            let count = counts.entry(item.domain.clone()).or_insert(0);
            if *count >= max_per_domain {
                false
            } else {
                *count += 1;
                true
            }
        })
        .collect()
}

/// Full ranking pass: dedupe, threshold filters, stable sort by total score
/// descending (collection order breaks ties), domain cap, then `top_n`.
pub fn rank(
    collected: Vec<CollectedResult>,
    score: &ScoreStage,
    synthesize: &SynthesizeStage,
    top_n: usize,
) -> Vec<CollectedResult> {
    let mut ranked: Vec<CollectedResult> = dedupe_results(collected)
        .into_iter()
        .filter(|item| item.total_score >= score.minimum_score)
        .filter(|item| item.score.relevance >= score.minimum_relevance)
        .filter(|item| item.score.topic_coverage >= score.minimum_topic_coverage)
        .collect();

    ranked.sort_by(|a, b| {
        b.total_score
            .partial_cmp(&a.total_score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut limited = limit_by_domain(ranked, synthesize.max_per_domain);
    limited.truncate(top_n);
    limited
}
