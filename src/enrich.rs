//! Evidence enrichment: fetch top-ranked pages and extract the sentences
//! that best support the research topic.
//!
//! Fetching is bounded on every axis (redirects, timeout, body size) and a
//! page failure never fails the run: the result keeps an empty evidence
//! list and the error is recorded. Sentence selection is pure, so it is
//! tested without a network.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::config::EnrichStage;
use crate::models::{CollectedResult, Evidence, EvidenceChainItem};
use crate::text::{ellipsize, split_sentences, strip_html, tokenize};

const MAX_BODY_BYTES: usize = 200_000;
const MAX_REDIRECTS: usize = 2;

const HINT_PHRASES: &[&str] = &[
    "best practice",
    "recommended",
    "should",
    "must",
    "avoid",
    "pitfall",
    "建议",
    "必须",
    "避免",
    "最佳实践",
];

/// Fraction of `keywords` appearing in the sentence. Zero when no keywords.
pub fn compute_coverage(sentence: &str, keywords: &[String]) -> f64 {
    if keywords.is_empty() {
        return 0.0;
    }
    let tokens: std::collections::HashSet<String> = tokenize(sentence).into_iter().collect();
    let hits = keywords.iter().filter(|kw| tokens.contains(kw.as_str())).count();
    hits as f64 / keywords.len() as f64
}

/// Coverage plus a flat bonus when the sentence carries a recommendation
/// phrase, capped at 1.
pub fn score_sentence(sentence: &str, keywords: &[String]) -> f64 {
    let coverage = compute_coverage(sentence, keywords);
    let lowered = sentence.to_lowercase();
    let bonus = if HINT_PHRASES.iter().any(|phrase| lowered.contains(phrase)) {
        0.1
    } else {
        0.0
    };
    (coverage + bonus).min(1.0)
}

/// Select up to `max_evidence` sentences meeting the coverage floor, best
/// score first, each trimmed to `max_length` characters.
pub fn pick_evidence(
    text: &str,
    keywords: &[String],
    max_evidence: usize,
    min_coverage: f64,
    max_length: usize,
) -> Vec<Evidence> {
    let mut scored: Vec<(String, f64, f64)> = split_sentences(text)
        .into_iter()
        .map(|sentence| {
            let coverage = compute_coverage(&sentence, keywords);
            let score = score_sentence(&sentence, keywords);
            (sentence, coverage, score)
        })
        .filter(|(_, coverage, _)| *coverage >= min_coverage)
        .collect();

    scored.sort_by(|a, b| b.2.partial_cmp(&a.2).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(max_evidence);

    scored
        .into_iter()
        .map(|(sentence, coverage, score)| Evidence {
            text: ellipsize(&sentence, max_length),
            coverage,
            score,
        })
        .collect()
}

/// Fetch a page body as text. Follows at most two redirects, rejects
/// non-text content types, and truncates the body at 200 kB.
pub async fn fetch_page(url: &str, timeout_ms: u64) -> Result<String> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
        .user_agent(concat!("practice-harness/", env!("CARGO_PKG_VERSION")))
        .build()?;

    let response = client
        .get(url)
        .header("Accept", "text/html,text/plain,*/*")
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {}", status.as_u16());
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_lowercase();
    if !content_type.contains("text") && !content_type.contains("html") && !content_type.contains("json")
    {
        bail!(
            "Unsupported content-type: {}",
            if content_type.is_empty() { "unknown" } else { content_type.as_str() }
        );
    }

    let bytes = response.bytes().await?;
    let capped = &bytes[..bytes.len().min(MAX_BODY_BYTES)];
    Ok(String::from_utf8_lossy(capped).into_owned())
}

/// A page that could not be enriched.
#[derive(Debug, Clone)]
pub struct EnrichError {
    pub url: String,
    pub message: String,
}

/// Results after enrichment plus what went wrong along the way.
#[derive(Debug)]
pub struct EnrichOutcome {
    pub results: Vec<CollectedResult>,
    pub errors: Vec<EnrichError>,
    pub fetched_count: usize,
}

/// Enrich the first `max_fetch` ranked results in place. Disabled or empty
/// input passes through untouched with a zero fetch count.
pub async fn enrich_ranked(
    mut results: Vec<CollectedResult>,
    keywords: &[String],
    stage: &EnrichStage,
) -> EnrichOutcome {
    if !stage.enabled || results.is_empty() {
        return EnrichOutcome {
            results,
            errors: Vec::new(),
            fetched_count: 0,
        };
    }

    let mut errors = Vec::new();
    let fetched_count = stage.max_fetch.min(results.len());

    for item in results.iter_mut().take(stage.max_fetch) {
        match fetch_page(&item.url, stage.timeout_ms).await {
            Ok(raw) => {
                let text = strip_html(&raw);
                item.evidence = pick_evidence(
                    &text,
                    keywords,
                    stage.max_evidence_per_result,
                    stage.min_coverage,
                    stage.max_sentence_length,
                );
            }
            Err(error) => {
                errors.push(EnrichError {
                    url: item.url.clone(),
                    message: error.to_string(),
                });
                item.evidence = Vec::new();
            }
        }
    }

    EnrichOutcome {
        results,
        errors,
        fetched_count,
    }
}

/// Flatten evidence across the top results into a citation chain.
pub fn build_evidence_chain(
    results: &[CollectedResult],
    max_items: usize,
    max_evidence_per_item: usize,
) -> Vec<EvidenceChainItem> {
    let mut chain = Vec::new();
    for item in results.iter().take(max_items) {
        for snippet in item.evidence.iter().take(max_evidence_per_item) {
            chain.push(EvidenceChainItem {
                title: item.title.clone(),
                url: item.url.clone(),
                excerpt: snippet.text.clone(),
                score: snippet.score,
            });
        }
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalScores;

    fn keywords(words: &[&str]) -> Vec<String> {
        words.iter().map(|w| w.to_string()).collect()
    }

    #[test]
    fn coverage_counts_keyword_hits() {
        let kws = keywords(&["retry", "timeout", "backoff"]);
        let coverage = compute_coverage("Configure the retry budget and timeout carefully.", &kws);
        assert!((coverage - 2.0 / 3.0).abs() < 1e-9);
        assert_eq!(compute_coverage("anything", &[]), 0.0);
    }

    #[test]
    fn hint_phrases_add_a_capped_bonus() {
        let kws = keywords(&["retry"]);
        let plain = score_sentence("The retry logic runs twice per request cycle here.", &kws);
        let hinted = score_sentence("You should configure retry limits for every caller.", &kws);
        assert!((hinted - plain - 0.1).abs() < 1e-9);

        let maxed = score_sentence("You must always retry.", &keywords(&["must", "always", "retry"]));
        assert_eq!(maxed, 1.0);
    }

    #[test]
    fn evidence_respects_coverage_floor_and_cap() {
        let kws = keywords(&["cache", "invalidation"]);
        let text = "Cache expiry is hard and deserves careful review in design. \
                    This sentence says nothing related to the subject matter at hand. \
                    You should prefer explicit cache invalidation hooks over guessing expiry.";

        let evidence = pick_evidence(text, &kws, 2, 0.2, 240);
        assert_eq!(evidence.len(), 2);
        // Hinted sentence outranks the plain one.
        assert!(evidence[0].text.starts_with("You should prefer"));
        assert!(evidence[0].score > evidence[1].score);
    }

    #[test]
    fn long_sentences_are_ellipsized() {
        let kws = keywords(&["cache"]);
        let long = format!("The cache layer {} handles everything downstream.", "x".repeat(300));
        let evidence = pick_evidence(&long, &kws, 1, 0.2, 60);
        assert_eq!(evidence.len(), 1);
        assert_eq!(evidence[0].text.chars().count(), 60);
        assert!(evidence[0].text.ends_with('…'));
    }

    fn ranked(url: &str, evidence: Vec<Evidence>) -> CollectedResult {
        CollectedResult {
            title: format!("Page {}", url),
            url: url.to_string(),
            snippet: String::new(),
            domain: "example.com".to_string(),
            query: "q".to_string(),
            source_id: "src".to_string(),
            source_tier: "medium".to_string(),
            source_label: "Source".to_string(),
            provider: "hn".to_string(),
            published_at: None,
            engagement: serde_json::json!({}),
            score: SignalScores {
                authority: 0.7,
                recency: 0.7,
                relevance: 0.7,
                topic_coverage: 0.7,
            },
            total_score: 0.7,
            fetched_from_cache: false,
            evidence,
        }
    }

    #[test]
    fn evidence_chain_takes_top_items_only() {
        let snippet = |text: &str| Evidence {
            text: text.to_string(),
            coverage: 0.5,
            score: 0.6,
        };

        let results: Vec<CollectedResult> = (0..7)
            .map(|i| {
                ranked(
                    &format!("https://site/{}", i),
                    vec![snippet("first"), snippet("second")],
                )
            })
            .collect();

        let chain = build_evidence_chain(&results, 5, 1);
        assert_eq!(chain.len(), 5);
        assert!(chain.iter().all(|item| item.excerpt == "first"));
    }

    #[tokio::test]
    async fn disabled_enrichment_passes_through() {
        let mut stage = crate::config::Config::default().stages.enrich;
        stage.enabled = false;

        let outcome = enrich_ranked(vec![ranked("https://a", Vec::new())], &[], &stage).await;
        assert_eq!(outcome.fetched_count, 0);
        assert!(outcome.errors.is_empty());
        assert_eq!(outcome.results.len(), 1);
    }

    #[tokio::test]
    async fn fetch_failure_keeps_the_result_and_records_the_error() {
        let stage = crate::config::Config::default().stages.enrich;

        // Loopback port 1 refuses the connection outright.
        let stale = vec![Evidence {
            text: "left over from a previous pass".to_string(),
            coverage: 0.5,
            score: 0.5,
        }];
        let outcome = enrich_ranked(
            vec![ranked("http://127.0.0.1:1/", stale)],
            &keywords(&["cache"]),
            &stage,
        )
        .await;

        assert_eq!(outcome.fetched_count, 1);
        assert_eq!(outcome.results.len(), 1);
        assert!(outcome.results[0].evidence.is_empty());
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].url, "http://127.0.0.1:1/");
        assert!(!outcome.errors[0].message.is_empty());
    }
}
