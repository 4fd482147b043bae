//! Typed configuration: defaults, JSON loading, and overlay merging.
//!
//! The effective configuration is built in three layers: compiled-in
//! defaults, an optional on-disk JSON file, and an optional inline overlay
//! from the invocation input. Overlays are typed ([`ConfigOverlay`]) and
//! merged explicitly: object fields merge key by key, list fields replace
//! wholesale. An unreadable or malformed on-disk file is treated as absent;
//! a malformed inline overlay is a fatal error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::providers::Provider;

/// Effective configuration consumed by the pipeline. Immutable during a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    pub version: u32,
    pub stages: StagesConfig,
    pub sources: Vec<SourceDefinition>,
    pub domain_authority: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StagesConfig {
    pub intent: IntentStage,
    pub query: QueryStage,
    pub collect: CollectStage,
    pub score: ScoreStage,
    pub enrich: EnrichStage,
    pub synthesize: SynthesizeStage,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IntentStage {
    pub required_topic: bool,
    pub fallback_objective: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryStage {
    pub max_queries: usize,
    pub templates: Vec<String>,
    pub extra_keywords: Vec<String>,
    pub enable_expansion: bool,
    pub max_expansion_keywords: usize,
    pub expansion_templates: Vec<String>,
    pub stack_profiles: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectStage {
    pub max_requests: usize,
    pub per_provider_results: usize,
    pub timeout_ms: u64,
    pub retries: u32,
    pub retry_delay_ms: u64,
    pub retry_backoff_factor: f64,
    pub cache_enabled: bool,
    pub cache_ttl_ms: u64,
    pub cache_version: u32,
    pub cache_dir: Option<String>,
    pub providers: Vec<Provider>,
    pub official_docs: OfficialDocsConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OfficialDocsConfig {
    pub merge_default_index: bool,
    pub index_path: Option<String>,
    pub index: Vec<serde_json::Value>,
    pub stack_boost_weight: f64,
    pub min_score: f64,
    pub stack_profiles: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreStage {
    pub weights: ScoreWeights,
    pub minimum_score: f64,
    pub minimum_relevance: f64,
    pub minimum_topic_coverage: f64,
    pub authority_by_tier: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreWeights {
    pub authority: f64,
    pub recency: f64,
    pub relevance: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrichStage {
    pub enabled: bool,
    pub max_fetch: usize,
    pub timeout_ms: u64,
    pub max_evidence_per_result: usize,
    pub min_coverage: f64,
    pub max_sentence_length: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesizeStage {
    pub top_n: usize,
    pub max_per_domain: usize,
    pub include_prompt_draft: bool,
}

/// One configured content source. Disabled sources are dropped during
/// normalization, so every `SourceDefinition` the pipeline sees is live.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceDefinition {
    pub id: String,
    pub label: String,
    pub enabled: bool,
    pub tier: String,
    pub provider: Provider,
    pub domains: Vec<String>,
    pub subreddits: Vec<String>,
    pub query_prefix: String,
    pub query_suffix: String,
    pub provider_options: ProviderOptions,
}

/// Provider-specific thresholds. Which field applies depends on the
/// provider: Q&A score, aggregator points, forum upvotes, code-host stars,
/// or the official-docs match score.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderOptions {
    pub min_score: Option<f64>,
    pub min_points: Option<f64>,
    pub min_upvotes: Option<f64>,
    pub min_stars: Option<u64>,
}

// ═══════════════════════════════════════════════════════════════════════
// Overlays
// ═══════════════════════════════════════════════════════════════════════

/// Partial configuration parsed from disk or the invocation input.
/// Every field is optional; [`Config::apply`] merges it over a base.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ConfigOverlay {
    pub version: Option<u32>,
    pub stages: Option<StagesOverlay>,
    pub sources: Option<Vec<SourceOverlay>>,
    pub domain_authority: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StagesOverlay {
    pub intent: Option<IntentOverlay>,
    pub query: Option<QueryOverlay>,
    pub collect: Option<CollectOverlay>,
    pub score: Option<ScoreOverlay>,
    pub enrich: Option<EnrichOverlay>,
    pub synthesize: Option<SynthesizeOverlay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct IntentOverlay {
    pub required_topic: Option<bool>,
    pub fallback_objective: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct QueryOverlay {
    pub max_queries: Option<usize>,
    pub templates: Option<Vec<String>>,
    pub extra_keywords: Option<Vec<String>>,
    pub enable_expansion: Option<bool>,
    pub max_expansion_keywords: Option<usize>,
    pub expansion_templates: Option<Vec<String>>,
    pub stack_profiles: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CollectOverlay {
    pub max_requests: Option<usize>,
    pub per_provider_results: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub retries: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub retry_backoff_factor: Option<f64>,
    pub cache_enabled: Option<bool>,
    pub cache_ttl_ms: Option<u64>,
    pub cache_version: Option<u32>,
    pub cache_dir: Option<String>,
    pub providers: Option<Vec<Provider>>,
    pub official_docs: Option<OfficialDocsOverlay>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OfficialDocsOverlay {
    pub merge_default_index: Option<bool>,
    pub index_path: Option<String>,
    pub index: Option<Vec<serde_json::Value>>,
    pub stack_boost_weight: Option<f64>,
    pub min_score: Option<f64>,
    pub stack_profiles: Option<BTreeMap<String, Vec<String>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ScoreOverlay {
    pub weights: Option<WeightsOverlay>,
    pub minimum_score: Option<f64>,
    pub minimum_relevance: Option<f64>,
    pub minimum_topic_coverage: Option<f64>,
    pub authority_by_tier: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct WeightsOverlay {
    pub authority: Option<f64>,
    pub recency: Option<f64>,
    pub relevance: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EnrichOverlay {
    pub enabled: Option<bool>,
    pub max_fetch: Option<usize>,
    pub timeout_ms: Option<u64>,
    pub max_evidence_per_result: Option<usize>,
    pub min_coverage: Option<f64>,
    pub max_sentence_length: Option<usize>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SynthesizeOverlay {
    pub top_n: Option<usize>,
    pub max_per_domain: Option<usize>,
    pub include_prompt_draft: Option<bool>,
}

/// Partial source entry. A known `id` inherits the bundled default source's
/// fields before overlay fields are applied.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SourceOverlay {
    pub id: String,
    pub label: Option<String>,
    pub enabled: Option<bool>,
    pub tier: Option<String>,
    pub provider: Option<Provider>,
    pub domains: Option<Vec<String>>,
    pub subreddits: Option<Vec<String>>,
    pub query_prefix: Option<String>,
    pub query_suffix: Option<String>,
    pub provider_options: Option<ProviderOptions>,
}

fn merge_opt<T>(base: &mut T, overlay: Option<T>) {
    if let Some(value) = overlay {
        *base = value;
    }
}

fn merge_map<V: Clone>(base: &mut BTreeMap<String, V>, overlay: Option<BTreeMap<String, V>>) {
    if let Some(map) = overlay {
        for (key, value) in map {
            base.insert(key, value);
        }
    }
}

impl Config {
    /// Merge an overlay into this configuration. Scalar and list fields
    /// replace when set; map fields merge key by key; `sources` entries
    /// are re-normalized against the bundled defaults.
    pub fn apply(&mut self, overlay: ConfigOverlay) {
        merge_opt(&mut self.version, overlay.version);
        merge_map(&mut self.domain_authority, overlay.domain_authority);

        if let Some(stages) = overlay.stages {
            self.stages.apply(stages);
        }
        if let Some(sources) = overlay.sources {
            self.sources = normalize_sources(sources, default_sources());
        }
    }
}

impl StagesConfig {
    fn apply(&mut self, overlay: StagesOverlay) {
        if let Some(o) = overlay.intent {
            merge_opt(&mut self.intent.required_topic, o.required_topic);
            merge_opt(&mut self.intent.fallback_objective, o.fallback_objective);
        }
        if let Some(o) = overlay.query {
            merge_opt(&mut self.query.max_queries, o.max_queries);
            merge_opt(&mut self.query.templates, o.templates);
            merge_opt(&mut self.query.extra_keywords, o.extra_keywords);
            merge_opt(&mut self.query.enable_expansion, o.enable_expansion);
            merge_opt(&mut self.query.max_expansion_keywords, o.max_expansion_keywords);
            merge_opt(&mut self.query.expansion_templates, o.expansion_templates);
            merge_map(&mut self.query.stack_profiles, o.stack_profiles);
        }
        if let Some(o) = overlay.collect {
            merge_opt(&mut self.collect.max_requests, o.max_requests);
            merge_opt(&mut self.collect.per_provider_results, o.per_provider_results);
            merge_opt(&mut self.collect.timeout_ms, o.timeout_ms);
            merge_opt(&mut self.collect.retries, o.retries);
            merge_opt(&mut self.collect.retry_delay_ms, o.retry_delay_ms);
            merge_opt(&mut self.collect.retry_backoff_factor, o.retry_backoff_factor);
            merge_opt(&mut self.collect.cache_enabled, o.cache_enabled);
            merge_opt(&mut self.collect.cache_ttl_ms, o.cache_ttl_ms);
            merge_opt(&mut self.collect.cache_version, o.cache_version);
            if o.cache_dir.is_some() {
                self.collect.cache_dir = o.cache_dir;
            }
            merge_opt(&mut self.collect.providers, o.providers);
            if let Some(docs) = o.official_docs {
                let target = &mut self.collect.official_docs;
                merge_opt(&mut target.merge_default_index, docs.merge_default_index);
                if docs.index_path.is_some() {
                    target.index_path = docs.index_path;
                }
                merge_opt(&mut target.index, docs.index);
                merge_opt(&mut target.stack_boost_weight, docs.stack_boost_weight);
                merge_opt(&mut target.min_score, docs.min_score);
                if docs.stack_profiles.is_some() {
                    target.stack_profiles = docs.stack_profiles;
                }
            }
        }
        if let Some(o) = overlay.score {
            if let Some(w) = o.weights {
                merge_opt(&mut self.score.weights.authority, w.authority);
                merge_opt(&mut self.score.weights.recency, w.recency);
                merge_opt(&mut self.score.weights.relevance, w.relevance);
            }
            merge_opt(&mut self.score.minimum_score, o.minimum_score);
            merge_opt(&mut self.score.minimum_relevance, o.minimum_relevance);
            merge_opt(&mut self.score.minimum_topic_coverage, o.minimum_topic_coverage);
            merge_map(&mut self.score.authority_by_tier, o.authority_by_tier);
        }
        if let Some(o) = overlay.enrich {
            merge_opt(&mut self.enrich.enabled, o.enabled);
            merge_opt(&mut self.enrich.max_fetch, o.max_fetch);
            merge_opt(&mut self.enrich.timeout_ms, o.timeout_ms);
            merge_opt(&mut self.enrich.max_evidence_per_result, o.max_evidence_per_result);
            merge_opt(&mut self.enrich.min_coverage, o.min_coverage);
            merge_opt(&mut self.enrich.max_sentence_length, o.max_sentence_length);
        }
        if let Some(o) = overlay.synthesize {
            merge_opt(&mut self.synthesize.top_n, o.top_n);
            merge_opt(&mut self.synthesize.max_per_domain, o.max_per_domain);
            merge_opt(&mut self.synthesize.include_prompt_draft, o.include_prompt_draft);
        }
    }
}

/// Resolve configured sources into live [`SourceDefinition`]s: inherit
/// bundled defaults by id, trim and lowercase domain/subreddit lists, and
/// drop disabled entries.
pub fn normalize_sources(
    overlays: Vec<SourceOverlay>,
    defaults: Vec<SourceDefinition>,
) -> Vec<SourceDefinition> {
    let default_map: BTreeMap<String, SourceDefinition> =
        defaults.into_iter().map(|s| (s.id.clone(), s)).collect();

    overlays
        .into_iter()
        .filter(|o| !o.id.trim().is_empty())
        .map(|o| {
            let base = default_map.get(&o.id).cloned().unwrap_or(SourceDefinition {
                id: o.id.clone(),
                label: o.id.clone(),
                enabled: true,
                tier: "medium".to_string(),
                provider: Provider::HackerNews,
                domains: Vec::new(),
                subreddits: Vec::new(),
                query_prefix: String::new(),
                query_suffix: String::new(),
                provider_options: ProviderOptions::default(),
            });

            let mut source = base;
            source.id = o.id;
            merge_opt(&mut source.label, o.label);
            merge_opt(&mut source.enabled, o.enabled);
            merge_opt(&mut source.tier, o.tier);
            merge_opt(&mut source.provider, o.provider);
            merge_opt(&mut source.domains, o.domains);
            merge_opt(&mut source.subreddits, o.subreddits);
            merge_opt(&mut source.query_prefix, o.query_prefix);
            merge_opt(&mut source.query_suffix, o.query_suffix);
            merge_opt(&mut source.provider_options, o.provider_options);

            source.domains = normalize_name_list(source.domains);
            source.subreddits = normalize_name_list(source.subreddits);
            source.query_prefix = source.query_prefix.trim().to_string();
            source.query_suffix = source.query_suffix.trim().to_string();
            source
        })
        .filter(|s| s.enabled)
        .collect()
}

fn normalize_name_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|v| v.trim().to_lowercase())
        .filter(|v| !v.is_empty())
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Defaults
// ═══════════════════════════════════════════════════════════════════════

fn default_stack_profiles() -> BTreeMap<String, Vec<String>> {
    let entries: &[(&str, &[&str])] = &[
        ("react|next", &["hooks", "state management", "performance", "rendering"]),
        ("vue|nuxt", &["composition api", "reactivity", "state management", "performance"]),
        ("node|express|nest", &["error handling", "observability", "api design", "testing"]),
        ("typescript|ts", &["type safety", "api design", "strict mode", "tooling"]),
        ("python|django|fastapi", &["dependency injection", "testing", "api design", "async"]),
        ("java|spring", &["transaction", "layered architecture", "testing", "exception handling"]),
        ("go|golang", &["concurrency", "context", "error handling", "testing"]),
        ("kubernetes|k8s|docker", &["deployment", "observability", "security", "scaling"]),
    ];
    entries
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

fn default_domain_authority() -> BTreeMap<String, f64> {
    let entries: &[(&str, f64)] = &[
        ("developer.mozilla.org", 0.98),
        ("nodejs.org", 0.97),
        ("typescriptlang.org", 0.97),
        ("react.dev", 0.96),
        ("vuejs.org", 0.96),
        ("kubernetes.io", 0.95),
        ("aws.amazon.com", 0.95),
        ("cloud.google.com", 0.95),
        ("stackoverflow.com", 0.86),
        ("news.ycombinator.com", 0.78),
        ("github.com", 0.76),
        ("reddit.com", 0.72),
    ];
    entries.iter().map(|(k, v)| (k.to_string(), *v)).collect()
}

/// The five bundled sources, one per provider.
pub fn default_sources() -> Vec<SourceDefinition> {
    vec![
        SourceDefinition {
            id: "stackoverflow-best".to_string(),
            label: "Stack Overflow".to_string(),
            enabled: true,
            tier: "high".to_string(),
            provider: Provider::StackOverflow,
            domains: vec!["stackoverflow.com".to_string()],
            subreddits: Vec::new(),
            query_prefix: String::new(),
            query_suffix: String::new(),
            provider_options: ProviderOptions {
                min_score: Some(8.0),
                ..Default::default()
            },
        },
        SourceDefinition {
            id: "github-repos".to_string(),
            label: "GitHub Repositories".to_string(),
            enabled: true,
            tier: "high".to_string(),
            provider: Provider::GitHub,
            domains: vec!["github.com".to_string()],
            subreddits: Vec::new(),
            query_prefix: String::new(),
            query_suffix: "in:description in:readme".to_string(),
            provider_options: ProviderOptions {
                min_stars: Some(300),
                ..Default::default()
            },
        },
        SourceDefinition {
            id: "hn-discussions".to_string(),
            label: "Hacker News Discussions".to_string(),
            enabled: true,
            tier: "high".to_string(),
            provider: Provider::HackerNews,
            domains: Vec::new(),
            subreddits: Vec::new(),
            query_prefix: String::new(),
            query_suffix: String::new(),
            provider_options: ProviderOptions {
                min_points: Some(10.0),
                ..Default::default()
            },
        },
        SourceDefinition {
            id: "reddit-dev".to_string(),
            label: "Reddit Dev Community".to_string(),
            enabled: true,
            tier: "medium".to_string(),
            provider: Provider::Reddit,
            domains: vec!["reddit.com".to_string()],
            subreddits: vec![
                "programming".to_string(),
                "webdev".to_string(),
                "javascript".to_string(),
                "typescript".to_string(),
                "node".to_string(),
            ],
            query_prefix: String::new(),
            query_suffix: String::new(),
            provider_options: ProviderOptions {
                min_upvotes: Some(20.0),
                ..Default::default()
            },
        },
        SourceDefinition {
            id: "official-doc-links".to_string(),
            label: "Official Documentation Links".to_string(),
            enabled: true,
            tier: "official".to_string(),
            provider: Provider::OfficialDocs,
            domains: vec![
                "developer.mozilla.org".to_string(),
                "nodejs.org".to_string(),
                "typescriptlang.org".to_string(),
                "react.dev".to_string(),
                "vuejs.org".to_string(),
                "kubernetes.io".to_string(),
                "aws.amazon.com".to_string(),
                "cloud.google.com".to_string(),
            ],
            subreddits: Vec::new(),
            query_prefix: String::new(),
            query_suffix: String::new(),
            provider_options: ProviderOptions {
                min_score: Some(0.2),
                ..Default::default()
            },
        },
    ]
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: 1,
            stages: StagesConfig {
                intent: IntentStage {
                    required_topic: true,
                    fallback_objective:
                        "Implement a high-quality, maintainable, well-tested solution".to_string(),
                },
                query: QueryStage {
                    max_queries: 7,
                    templates: vec![
                        "{{topic}} {{stack}} best practices".to_string(),
                        "{{topic}} {{stack}} architecture".to_string(),
                        "{{topic}} {{stack}} error handling".to_string(),
                        "{{topic}} {{stack}} testing strategy".to_string(),
                    ],
                    extra_keywords: Vec::new(),
                    enable_expansion: true,
                    max_expansion_keywords: 3,
                    expansion_templates: vec![
                        "{{topic}} {{stack}} {{keyword}} best practices".to_string(),
                        "{{topic}} {{stack}} {{keyword}} common pitfalls".to_string(),
                    ],
                    stack_profiles: default_stack_profiles(),
                },
                collect: CollectStage {
                    max_requests: 12,
                    per_provider_results: 4,
                    timeout_ms: 5000,
                    retries: 2,
                    retry_delay_ms: 320,
                    retry_backoff_factor: 2.0,
                    cache_enabled: true,
                    cache_ttl_ms: 24 * 60 * 60 * 1000,
                    cache_version: 3,
                    cache_dir: None,
                    providers: vec![
                        Provider::OfficialDocs,
                        Provider::StackOverflow,
                        Provider::HackerNews,
                        Provider::Reddit,
                        Provider::GitHub,
                    ],
                    official_docs: OfficialDocsConfig {
                        merge_default_index: true,
                        index_path: None,
                        index: Vec::new(),
                        stack_boost_weight: 0.2,
                        min_score: 0.2,
                        stack_profiles: None,
                    },
                },
                score: ScoreStage {
                    weights: ScoreWeights {
                        authority: 0.45,
                        recency: 0.2,
                        relevance: 0.35,
                    },
                    minimum_score: 0.35,
                    minimum_relevance: 0.25,
                    minimum_topic_coverage: 0.3,
                    authority_by_tier: [
                        ("official".to_string(), 0.95),
                        ("high".to_string(), 0.8),
                        ("medium".to_string(), 0.65),
                    ]
                    .into_iter()
                    .collect(),
                },
                enrich: EnrichStage {
                    enabled: true,
                    max_fetch: 3,
                    timeout_ms: 5000,
                    max_evidence_per_result: 2,
                    min_coverage: 0.2,
                    max_sentence_length: 240,
                },
                synthesize: SynthesizeStage {
                    top_n: 8,
                    max_per_domain: 2,
                    include_prompt_draft: true,
                },
            },
            sources: default_sources(),
            domain_authority: default_domain_authority(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// Loading
// ═══════════════════════════════════════════════════════════════════════

pub fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

/// Default config path: `~/.practice-harness/practice.config.json`, falling
/// back to the working directory when no home is set.
pub fn default_config_path() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".practice-harness")
        .join("practice.config.json")
}

/// The effective configuration plus where it came from.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub config_path: PathBuf,
    pub loaded_from_disk: bool,
    pub config: Config,
}

fn read_overlay(path: &Path) -> Option<ConfigOverlay> {
    let text = std::fs::read_to_string(path).ok()?;
    serde_json::from_str(&text).ok()
}

/// Build the effective configuration: defaults, then the on-disk file (if
/// readable), then the inline overlay from the invocation input.
///
/// A malformed inline overlay is a fatal configuration error.
pub fn load_config(
    config_path: Option<&Path>,
    inline: Option<&serde_json::Value>,
) -> Result<LoadedConfig> {
    let effective_path = config_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    let disk_overlay = read_overlay(&effective_path);
    let loaded_from_disk = disk_overlay.is_some();

    let inline_overlay: Option<ConfigOverlay> = match inline {
        Some(value) => Some(
            serde_json::from_value(value.clone())
                .context("Invalid inline config in practice input")?,
        ),
        None => None,
    };

    let mut config = Config::default();
    if let Some(overlay) = disk_overlay {
        config.apply(overlay);
    }
    if let Some(overlay) = inline_overlay {
        config.apply(overlay);
    }

    Ok(LoadedConfig {
        config_path: effective_path,
        loaded_from_disk,
        config,
    })
}

/// Parse the invocation input from a JSON string. Malformed JSON is fatal.
pub fn parse_input(raw: &str) -> Result<crate::models::PracticeInput> {
    serde_json::from_str(raw).context("Invalid practice input JSON payload")
}

/// Write the default configuration to `target_path`. Refuses to overwrite
/// an existing file unless `force` is set.
pub fn init_config(target_path: Option<&Path>, force: bool) -> Result<PathBuf> {
    let target = target_path
        .map(|p| p.to_path_buf())
        .unwrap_or_else(default_config_path);

    if target.exists() && !force {
        anyhow::bail!(
            "Config already exists: {}. Pass force to overwrite.",
            target.display()
        );
    }

    if let Some(parent) = target.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create config directory: {}", parent.display()))?;
    }

    let body = serde_json::to_string_pretty(&Config::default())?;
    std::fs::write(&target, format!("{}\n", body))
        .with_context(|| format!("Failed to write config: {}", target.display()))?;

    Ok(target)
}

/// Resolve a configured path against the config file's directory: absolute
/// paths pass through, relative paths anchor at the config file.
pub fn resolve_relative(configured: &str, config_path: &Path) -> PathBuf {
    let candidate = PathBuf::from(configured);
    if candidate.is_absolute() {
        return candidate;
    }
    match config_path.parent() {
        Some(parent) => parent.join(candidate),
        None => candidate,
    }
}
