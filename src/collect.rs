//! Collection: fan queries out across configured sources, with retry,
//! response caching, and per-row scoring.
//!
//! Requests run sequentially so cache hits, retry counts, and tie-breaking
//! stay deterministic. A failed request records an error and the loop moves
//! on; only the caller decides whether an empty collection matters.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use crate::cache::{create_cache_key, CacheStore};
use crate::config::Config;
use crate::models::{CollectedResult, ProviderRow, RunError, SearchContext, SearchRequest, SignalScores};
use crate::official_index::OfficialDocsQuery;
use crate::providers::{self, Provider, ProviderCall};
use crate::rank;

/// Pair each query with each eligible source, provider-priority order
/// first, then source id. The total is capped at `max_requests`.
pub fn build_search_requests(queries: &[String], config: &Config) -> Vec<SearchRequest> {
    let collect_stage = &config.stages.collect;

    let rank_of: HashMap<Provider, usize> = collect_stage
        .providers
        .iter()
        .enumerate()
        .map(|(index, provider)| (*provider, index))
        .collect();

    let mut ordered: Vec<&crate::config::SourceDefinition> = config.sources.iter().collect();
    ordered.sort_by(|left, right| {
        let left_rank = rank_of.get(&left.provider).copied().unwrap_or(usize::MAX);
        let right_rank = rank_of.get(&right.provider).copied().unwrap_or(usize::MAX);
        left_rank.cmp(&right_rank).then_with(|| left.id.cmp(&right.id))
    });

    let restrict = !collect_stage.providers.is_empty();
    let mut requests = Vec::new();

    for source in ordered {
        if restrict && !rank_of.contains_key(&source.provider) {
            continue;
        }

        for query in queries {
            let effective = format!("{} {} {}", source.query_prefix, query, source.query_suffix);
            let effective = effective.split_whitespace().collect::<Vec<_>>().join(" ");

            requests.push(SearchRequest {
                source_id: source.id.clone(),
                source_tier: source.tier.clone(),
                source_label: source.label.clone(),
                provider: source.provider,
                domains: source.domains.clone(),
                subreddits: source.subreddits.clone(),
                provider_options: source.provider_options.clone(),
                query: effective,
            });

            if requests.len() >= collect_stage.max_requests {
                return requests;
            }
        }
    }

    requests
}

/// Run `task` up to `retries + 1` times with exponential backoff between
/// attempts. Returns the value and how many retries were spent on it.
pub async fn run_with_retry<T, F, Fut>(
    mut task: F,
    retries: u32,
    retry_delay_ms: u64,
    backoff_factor: f64,
) -> Result<(T, u32)>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt: u32 = 0;
    loop {
        match task().await {
            Ok(value) => return Ok((value, attempt)),
            Err(error) => {
                if attempt >= retries {
                    return Err(error);
                }
                let delay = (retry_delay_ms as f64 * backoff_factor.powi(attempt as i32)).round();
                if delay > 0.0 {
                    tokio::time::sleep(Duration::from_millis(delay as u64)).await;
                }
                attempt += 1;
            }
        }
    }
}

fn domain_allowed(domain: &str, allowed: &[String]) -> bool {
    if allowed.is_empty() {
        return true;
    }
    allowed
        .iter()
        .any(|entry| domain == entry || domain.ends_with(&format!(".{}", entry)))
}

/// Everything the collect loop needs beyond the requests themselves.
pub struct CollectParams<'a> {
    pub config: &'a Config,
    pub context: &'a SearchContext,
    pub topic_keywords: &'a [String],
    pub coverage_keywords: &'a [String],
    pub cache_dir: PathBuf,
    pub cache_enabled: bool,
    pub cache_read_enabled: bool,
    pub official_index_path: Option<PathBuf>,
    pub now: DateTime<Utc>,
}

#[derive(Debug, Default)]
pub struct CollectOutcome {
    pub collected: Vec<CollectedResult>,
    pub errors: Vec<RunError>,
    pub cache_hit_count: usize,
    pub cache_miss_count: usize,
    pub retry_used_count: u32,
}

fn cache_key_for(request: &SearchRequest, params: &CollectParams<'_>) -> String {
    let collect_stage = &params.config.stages.collect;
    let mut options = serde_json::to_value(&request.provider_options)
        .unwrap_or(serde_json::Value::Null);

    // The official-docs response depends on the run context and index
    // location, so those must participate in the key.
    if request.provider == Provider::OfficialDocs {
        if let serde_json::Value::Object(map) = &mut options {
            map.insert("topic".into(), params.context.topic.clone().into());
            map.insert("stack".into(), params.context.stack.clone().into());
            map.insert("objective".into(), params.context.objective.clone().into());
            map.insert(
                "indexPath".into(),
                params
                    .official_index_path
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .into(),
            );
            map.insert(
                "stackBoostWeight".into(),
                collect_stage.official_docs.stack_boost_weight.into(),
            );
        }
    }

    create_cache_key(&serde_json::json!({
        "cacheVersion": collect_stage.cache_version,
        "provider": request.provider.as_str(),
        "query": request.query,
        "subreddits": request.subreddits,
        "options": options,
        "maxResults": collect_stage.per_provider_results,
    }))
}

fn provider_call_for(request: &SearchRequest, params: &CollectParams<'_>) -> ProviderCall {
    let collect_stage = &params.config.stages.collect;
    let official = &collect_stage.official_docs;

    ProviderCall {
        timeout_ms: collect_stage.timeout_ms,
        max_results: collect_stage.per_provider_results,
        subreddits: request.subreddits.clone(),
        options: request.provider_options.clone(),
        official: OfficialDocsQuery {
            topic: params.context.topic.clone(),
            stack: params.context.stack.clone(),
            objective: params.context.objective.clone(),
            max_results: collect_stage.per_provider_results,
            min_score: official.min_score,
            stack_boost_weight: official.stack_boost_weight,
            merge_default_index: official.merge_default_index,
            index_path: params.official_index_path.clone(),
            inline_index: official.index.clone(),
            stack_profiles: official.stack_profiles.clone(),
        },
    }
}

fn score_row(
    row: &ProviderRow,
    request: &SearchRequest,
    params: &CollectParams<'_>,
    fetched_from_cache: bool,
) -> CollectedResult {
    let config = params.config;
    let score_stage = &config.stages.score;

    let authority = rank::authority_score(
        &row.domain,
        &request.source_tier,
        &config.domain_authority,
        &score_stage.authority_by_tier,
    );
    let recency = rank::recency_score(row.published_at.as_deref(), params.now);
    let doc_text = format!("{} {}", row.title, row.snippet);
    let relevance = rank::relevance_score(&doc_text, params.topic_keywords);
    let topic_coverage = rank::relevance_score(&doc_text, params.coverage_keywords);

    let score = SignalScores {
        authority,
        recency,
        relevance,
        topic_coverage,
    };

    CollectedResult {
        title: row.title.clone(),
        url: row.url.clone(),
        snippet: row.snippet.clone(),
        domain: row.domain.clone(),
        query: request.query.clone(),
        source_id: request.source_id.clone(),
        source_tier: request.source_tier.clone(),
        source_label: request.source_label.clone(),
        provider: row.provider.clone(),
        published_at: row.published_at.clone(),
        engagement: row.engagement.clone(),
        total_score: rank::total_score(&score, &score_stage.weights),
        score,
        fetched_from_cache,
        evidence: Vec::new(),
    }
}

/// Execute the request plan sequentially, consulting the cache first and
/// scoring every surviving row.
pub async fn collect(requests: &[SearchRequest], params: &CollectParams<'_>) -> CollectOutcome {
    let collect_stage = &params.config.stages.collect;
    let store = CacheStore::new(params.cache_dir.clone());
    let mut outcome = CollectOutcome::default();

    for request in requests {
        let key = cache_key_for(request, params);

        let mut rows: Option<Vec<ProviderRow>> = None;
        let mut fetched_from_cache = false;

        if params.cache_read_enabled {
            if let Some(cached) = store.read(&key, collect_stage.cache_ttl_ms) {
                rows = Some(cached);
                fetched_from_cache = true;
                outcome.cache_hit_count += 1;
            }
        }

        let rows = match rows {
            Some(rows) => rows,
            None => {
                outcome.cache_miss_count += 1;
                let call = provider_call_for(request, params);
                let fetched = run_with_retry(
                    || providers::search(request.provider, &request.query, &call),
                    collect_stage.retries,
                    collect_stage.retry_delay_ms,
                    collect_stage.retry_backoff_factor,
                )
                .await;

                match fetched {
                    Ok((rows, retries_used)) => {
                        outcome.retry_used_count += retries_used;
                        if params.cache_enabled {
                            // A failed write is not worth failing the run.
                            let _ = store.write(&key, &rows);
                        }
                        rows
                    }
                    Err(error) => {
                        outcome.errors.push(RunError {
                            source_id: request.source_id.clone(),
                            provider: request.provider.as_str().to_string(),
                            query: request.query.clone(),
                            message: error.to_string(),
                        });
                        continue;
                    }
                }
            }
        };

        for row in &rows {
            if !domain_allowed(&row.domain, &request.domains) {
                continue;
            }
            outcome
                .collected
                .push(score_row(row, request, params, fetched_from_cache));
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn requests_follow_provider_priority_then_source_id() {
        let config = Config::default();
        let queries = vec!["error handling best practices".to_string()];

        let requests = build_search_requests(&queries, &config);
        assert!(!requests.is_empty());

        let priorities: Vec<usize> = requests
            .iter()
            .map(|r| {
                config
                    .stages
                    .collect
                    .providers
                    .iter()
                    .position(|p| *p == r.provider)
                    .unwrap()
            })
            .collect();
        let mut sorted = priorities.clone();
        sorted.sort_unstable();
        assert_eq!(priorities, sorted);
        assert_eq!(requests[0].provider, Provider::OfficialDocs);
    }

    #[test]
    fn request_count_is_capped() {
        let mut config = Config::default();
        config.stages.collect.max_requests = 3;
        let queries: Vec<String> = (0..10).map(|i| format!("query {}", i)).collect();

        let requests = build_search_requests(&queries, &config);
        assert_eq!(requests.len(), 3);
    }

    #[test]
    fn provider_allow_list_filters_sources() {
        let mut config = Config::default();
        config.stages.collect.providers = vec![Provider::GitHub];

        let requests = build_search_requests(&["q".to_string()], &config);
        assert!(!requests.is_empty());
        assert!(requests.iter().all(|r| r.provider == Provider::GitHub));
    }

    #[test]
    fn query_prefix_and_suffix_are_collapsed() {
        let mut config = Config::default();
        config.sources.truncate(1);
        config.sources[0].query_prefix = "  site:nodejs.org ".to_string();
        config.sources[0].query_suffix = " docs  ".to_string();

        let requests = build_search_requests(&["error handling".to_string()], &config);
        assert_eq!(requests[0].query, "site:nodejs.org error handling docs");
    }

    #[test]
    fn domain_suffix_matching() {
        let allowed = vec!["nodejs.org".to_string()];
        assert!(domain_allowed("nodejs.org", &allowed));
        assert!(domain_allowed("api.nodejs.org", &allowed));
        assert!(!domain_allowed("notnodejs.org", &allowed));
        assert!(domain_allowed("anything.com", &[]));
    }

    #[tokio::test]
    async fn retry_returns_value_and_spent_attempts() {
        let calls = AtomicU32::new(0);
        let (value, retries_used) = run_with_retry(
            || {
                let attempt = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if attempt < 2 {
                        anyhow::bail!("transient")
                    }
                    Ok(attempt)
                }
            },
            3,
            0,
            2.0,
        )
        .await
        .unwrap();

        assert_eq!(value, 2);
        assert_eq!(retries_used, 2);
    }

    #[tokio::test]
    async fn retry_gives_up_after_budget() {
        let calls = AtomicU32::new(0);
        let result: Result<((), u32)> = run_with_retry(
            || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { anyhow::bail!("permanent") }
            },
            2,
            0,
            2.0,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
