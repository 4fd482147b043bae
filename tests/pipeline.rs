//! End-to-end pipeline tests. Happy paths run against the offline
//! documentation provider; failure paths use loopback targets or
//! sub-request timeouts so nothing depends on a reachable host.

use std::path::PathBuf;
use std::sync::Arc;

use tempfile::TempDir;

use practice_harness::hooks::{ExcludeDomainHook, HookRegistry, HookStage};
use practice_harness::pipeline::{run_practice_search, RunOptions};

fn offline_input(cache_dir: &std::path::Path) -> String {
    serde_json::json!({
        "topic": "Node.js error handling",
        "stack": "node",
        "config": {
            "stages": {
                "collect": {
                    "providers": ["official-docs"],
                    "cacheDir": cache_dir.display().to_string(),
                },
                "enrich": { "enabled": false },
            }
        }
    })
    .to_string()
}

fn options_for(tmp: &TempDir) -> RunOptions {
    RunOptions {
        // Point at a file that does not exist so no developer config leaks in.
        config_path: Some(tmp.path().join("practice.config.json")),
        ..Default::default()
    }
}

#[tokio::test]
async fn offline_run_ranks_the_errors_reference_first() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");

    let report = run_practice_search(&offline_input(&cache_dir), options_for(&tmp))
        .await
        .unwrap();

    assert_eq!(report.report_type, "practice_report");
    assert_eq!(report.topic, "Node.js error handling");
    assert!(!report.queries.is_empty());
    assert!(!report.results.is_empty());

    assert_eq!(report.results[0].url, "https://nodejs.org/api/errors.html");
    assert_eq!(report.results[0].source_tier, "official");
    assert!(report.results[0].total_score >= 0.35);

    // Every survivor cleared the ranking thresholds.
    for item in &report.results {
        assert!(item.score.relevance >= 0.25);
        assert!(item.total_score >= 0.35);
    }

    assert!(report.summary.highlights[0].contains("Node.js - Errors"));
    assert!(report
        .summary
        .recommendations
        .iter()
        .any(|r| r.contains("official documentation")));
    assert!(report.prompts.codex.contains("Topic: Node.js error handling"));
    assert_eq!(report.prompts.codex, report.prompts.claude);

    assert_eq!(report.execution.query_count, report.queries.len());
    assert_eq!(report.execution.cache_hit_count, 0);
    assert!(report.execution.cache_miss_count > 0);
    assert!(!report.config.loaded_from_disk);
}

#[tokio::test]
async fn second_run_is_served_from_cache() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    let input = offline_input(&cache_dir);

    let first = run_practice_search(&input, options_for(&tmp)).await.unwrap();
    let second = run_practice_search(&input, options_for(&tmp)).await.unwrap();

    assert!(second.execution.cache_hit_count > 0);
    assert_eq!(second.execution.cache_hit_count, first.execution.cache_miss_count);
    assert_eq!(second.execution.cache_miss_count, 0);
    assert!(second.results.iter().all(|item| item.fetched_from_cache));

    // Identical inputs produce identical rankings either way.
    let first_urls: Vec<&str> = first.results.iter().map(|r| r.url.as_str()).collect();
    let second_urls: Vec<&str> = second.results.iter().map(|r| r.url.as_str()).collect();
    assert_eq!(first_urls, second_urls);
}

#[tokio::test]
async fn refresh_cache_skips_reads_but_rewrites_entries() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    let input = offline_input(&cache_dir);

    run_practice_search(&input, options_for(&tmp)).await.unwrap();

    let mut options = options_for(&tmp);
    options.refresh_cache = true;
    let refreshed = run_practice_search(&input, options).await.unwrap();

    assert_eq!(refreshed.execution.cache_hit_count, 0);
    assert!(refreshed.execution.cache_miss_count > 0);
    assert!(refreshed.execution.cache_refresh);
    assert!(refreshed.config.cache_enabled);
}

#[tokio::test]
async fn no_cache_leaves_the_cache_directory_untouched() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");

    let mut options = options_for(&tmp);
    options.no_cache = true;
    let report = run_practice_search(&offline_input(&cache_dir), options)
        .await
        .unwrap();

    assert!(report.execution.cache_bypass);
    assert!(!report.config.cache_enabled);
    assert!(!cache_dir.exists());
}

#[tokio::test]
async fn missing_topic_fails_before_any_provider_activity() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    let input = serde_json::json!({
        "stack": "node",
        "config": {
            "stages": {
                "collect": {
                    "providers": ["official-docs"],
                    "cacheDir": cache_dir.display().to_string(),
                }
            }
        }
    })
    .to_string();

    let error = run_practice_search(&input, options_for(&tmp)).await.unwrap_err();
    assert!(error.to_string().contains("requires input.topic"));
    assert!(!cache_dir.exists());
}

#[tokio::test]
async fn malformed_input_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let error = run_practice_search("{not json", options_for(&tmp)).await.unwrap_err();
    assert!(error.to_string().contains("Invalid practice input"));
}

#[tokio::test]
async fn request_fan_out_is_capped() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    let input = serde_json::json!({
        "topic": "Node.js error handling",
        "stack": "node",
        "config": {
            "stages": {
                "collect": {
                    "providers": ["official-docs"],
                    "cacheDir": cache_dir.display().to_string(),
                    "maxRequests": 3,
                },
                "enrich": { "enabled": false },
            }
        }
    })
    .to_string();

    let report = run_practice_search(&input, options_for(&tmp)).await.unwrap();
    assert_eq!(report.execution.request_count, 3);
}

#[tokio::test]
async fn max_results_overrides_the_synthesize_top_n() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    let input = serde_json::json!({
        "topic": "Node.js error handling",
        "stack": "node",
        "maxResults": 1,
        "config": {
            "stages": {
                "collect": {
                    "providers": ["official-docs"],
                    "cacheDir": cache_dir.display().to_string(),
                },
                "enrich": { "enabled": false },
            }
        }
    })
    .to_string();

    let report = run_practice_search(&input, options_for(&tmp)).await.unwrap();
    assert_eq!(report.results.len(), 1);
}

/// Offline input whose inline index carries a reddit.com entry, with the
/// documentation source's domain allow-list cleared so the entry survives
/// collection.
fn reddit_index_input(cache_dir: &std::path::Path) -> String {
    serde_json::json!({
        "topic": "Node.js error handling",
        "stack": "node",
        "config": {
            "sources": [{ "id": "official-doc-links", "domains": [] }],
            "stages": {
                "collect": {
                    "providers": ["official-docs"],
                    "cacheDir": cache_dir.display().to_string(),
                    "officialDocs": {
                        "index": [{
                            "title": "Node.js error handling thread",
                            "url": "https://www.reddit.com/r/node/comments/abc123/error_handling/",
                            "tags": ["node", "error", "handling"],
                            "priority": 1.5,
                        }]
                    }
                },
                "enrich": { "enabled": false },
            }
        }
    })
    .to_string()
}

#[tokio::test]
async fn rank_hook_filters_reddit_domains_out_of_the_report() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");

    // Without the hook the reddit entry ranks alongside the official docs.
    let baseline = run_practice_search(&reddit_index_input(&cache_dir), options_for(&tmp))
        .await
        .unwrap();
    assert!(baseline
        .results
        .iter()
        .any(|item| item.domain.ends_with("reddit.com")));

    let mut registry = HookRegistry::new();
    registry.register(
        HookStage::AfterRank,
        Arc::new(ExcludeDomainHook::new("reddit.com")),
    );
    let mut options = options_for(&tmp);
    options.hooks = registry;
    options.no_cache = true;

    let report = run_practice_search(&reddit_index_input(&cache_dir), options)
        .await
        .unwrap();

    assert!(!report.results.is_empty());
    assert!(report
        .results
        .iter()
        .all(|item| !item.domain.ends_with("reddit.com")));
    assert_eq!(report.execution.ranked_count, report.results.len());
    assert!(report
        .hooks
        .executed
        .iter()
        .any(|h| h.stage == "afterRank" && h.name == "exclude-domain-reddit.com"));
    assert_eq!(report.execution.hooks_failed, 0);
}

#[tokio::test]
async fn provider_failures_are_recorded_without_aborting_the_run() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    // A 1ms budget cannot outlive connection setup, so every HTTP request
    // exhausts its (zero) retries.
    let input = serde_json::json!({
        "topic": "Node.js error handling",
        "stack": "node",
        "config": {
            "stages": {
                "collect": {
                    "providers": ["hn"],
                    "cacheDir": cache_dir.display().to_string(),
                    "timeoutMs": 1,
                    "retries": 0,
                    "cacheEnabled": false,
                },
                "enrich": { "enabled": false },
            }
        }
    })
    .to_string();

    let report = run_practice_search(&input, options_for(&tmp)).await.unwrap();

    assert!(report.results.is_empty());
    assert!(!report.errors.is_empty());
    for error in &report.errors {
        assert_eq!(error.provider, "hn");
        assert_eq!(error.source_id, "hn-discussions");
        assert!(!error.message.is_empty());
    }
    assert_eq!(report.execution.error_count, report.errors.len());
    assert_eq!(report.execution.collected_count, 0);
}

#[tokio::test]
async fn evidence_fetch_failure_keeps_the_result_with_empty_evidence() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");
    // Port 1 refuses the connection immediately, so enrichment fails without
    // touching the network beyond loopback.
    let input = serde_json::json!({
        "topic": "Node.js error handling",
        "stack": "node",
        "config": {
            "sources": [{ "id": "official-doc-links", "domains": [] }],
            "stages": {
                "collect": {
                    "providers": ["official-docs"],
                    "cacheDir": cache_dir.display().to_string(),
                    "officialDocs": {
                        "mergeDefaultIndex": false,
                        "index": [{
                            "title": "Node.js error handling guide",
                            "url": "http://127.0.0.1:1/",
                            "tags": ["node", "error", "handling"],
                            "priority": 1.5,
                        }]
                    }
                },
            }
        }
    })
    .to_string();

    let report = run_practice_search(&input, options_for(&tmp)).await.unwrap();

    assert_eq!(report.results.len(), 1);
    assert!(report.results[0].evidence.is_empty());
    assert!(report.execution.fetched_for_evidence > 0);
    assert!(report
        .errors
        .iter()
        .any(|e| e.source_id == "enrich"
            && e.provider == "fetch"
            && e.query == "http://127.0.0.1:1/"));
}

#[tokio::test]
async fn on_disk_config_is_picked_up() {
    let tmp = TempDir::new().unwrap();
    let config_path: PathBuf = tmp.path().join("practice.config.json");
    let cache_dir = tmp.path().join("cache");

    practice_harness::config::init_config(Some(&config_path), false).unwrap();

    let options = RunOptions {
        config_path: Some(config_path),
        ..Default::default()
    };
    let report = run_practice_search(&offline_input(&cache_dir), options)
        .await
        .unwrap();

    assert!(report.config.loaded_from_disk);
    assert_eq!(report.config.source_count, 5);
}

#[tokio::test]
async fn report_serializes_with_the_expected_envelope() {
    let tmp = TempDir::new().unwrap();
    let cache_dir = tmp.path().join("cache");

    let report = run_practice_search(&offline_input(&cache_dir), options_for(&tmp))
        .await
        .unwrap();
    let value = serde_json::to_value(&report).unwrap();

    assert_eq!(value["type"], "practice_report");
    assert!(value["execution"]["generatedAt"].is_string());
    assert!(value["results"][0]["totalScore"].is_number());
    assert!(value["summary"]["evidenceChain"].is_array());
    assert!(value["config"]["cacheDir"].is_string());
}
