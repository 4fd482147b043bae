//! Core data types that flow through the research pipeline.
//!
//! These types mirror the external JSON contract: everything that can end up
//! in a report or be read from an invocation input serializes in camelCase.

use serde::{Deserialize, Serialize};

/// Invocation input: the topic to research plus optional stack, objective,
/// result cap, and an inline configuration overlay.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeInput {
    pub topic: Option<String>,
    pub stack: Option<String>,
    pub objective: Option<String>,
    pub max_results: Option<usize>,
    pub config: Option<serde_json::Value>,
}

/// Resolved research intent, fixed after the intent stage (though the
/// `afterIntent` hook may replace it wholesale).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchContext {
    pub topic: String,
    pub stack: String,
    pub objective: String,
}

/// One (source × query) pairing produced by the request builder.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub source_id: String,
    pub source_tier: String,
    pub source_label: String,
    pub provider: crate::providers::Provider,
    pub domains: Vec<String>,
    pub subreddits: Vec<String>,
    pub provider_options: crate::config::ProviderOptions,
    pub query: String,
}

/// Uniform row shape every provider adapter normalizes into.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderRow {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub provider: String,
    pub published_at: Option<String>,
    pub engagement: serde_json::Value,
    #[serde(default)]
    pub domain: String,
}

/// Per-signal scores, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalScores {
    pub authority: f64,
    pub recency: f64,
    pub relevance: f64,
    pub topic_coverage: f64,
}

/// A scored candidate. Exactly one survives per distinct URL after ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectedResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub domain: String,
    pub query: String,
    pub source_id: String,
    pub source_tier: String,
    pub source_label: String,
    pub provider: String,
    pub published_at: Option<String>,
    pub engagement: serde_json::Value,
    pub score: SignalScores,
    pub total_score: f64,
    pub fetched_from_cache: bool,
    pub evidence: Vec<Evidence>,
}

/// A sentence extracted from a fetched page supporting a ranked result.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub text: String,
    pub coverage: f64,
    pub score: f64,
}

/// Evidence flattened across the top ranked results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceChainItem {
    pub title: String,
    pub url: String,
    pub excerpt: String,
    pub score: f64,
}

/// A non-fatal failure recorded during the run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunError {
    pub source_id: String,
    pub provider: String,
    pub query: String,
    pub message: String,
}

/// A hook invocation that completed and applied a (possibly unchanged) payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookExecution {
    pub stage: String,
    pub name: String,
}

/// A hook invocation that raised; the prior payload was kept.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookFailure {
    pub stage: String,
    pub message: String,
}

/// Hook execution/failure log carried on the report.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HookLog {
    pub executed: Vec<HookExecution>,
    pub failed: Vec<HookFailure>,
}

/// Highlights, recommendations, and evidence chain for the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub highlights: Vec<String>,
    pub recommendations: Vec<String>,
    pub evidence_chain: Vec<EvidenceChainItem>,
}

/// Generation-ready prompt drafts keyed by agent target.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptDrafts {
    pub codex: String,
    pub claude: String,
}

/// How the effective configuration was assembled, echoed into the report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigSummary {
    pub path: String,
    pub loaded_from_disk: bool,
    pub source_count: usize,
    pub stage_keys: Vec<String>,
    pub cache_enabled: bool,
    pub cache_read_enabled: bool,
    pub refresh_cache: bool,
    pub cache_ttl_ms: u64,
    pub cache_version: u32,
    pub cache_dir: String,
    pub official_docs_index_path: Option<String>,
}

/// Execution counters for one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionCounters {
    pub query_count: usize,
    pub request_count: usize,
    pub collected_count: usize,
    pub ranked_count: usize,
    pub fetched_for_evidence: usize,
    pub cache_hit_count: usize,
    pub cache_miss_count: usize,
    pub cache_bypass: bool,
    pub cache_refresh: bool,
    pub retry_used_count: u32,
    pub error_count: usize,
    pub generated_at: String,
    pub hooks_executed: usize,
    pub hooks_failed: usize,
}

/// The terminal aggregate: everything one run produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeReport {
    #[serde(rename = "type")]
    pub report_type: String,
    pub topic: String,
    pub stack: String,
    pub objective: String,
    pub config: ConfigSummary,
    pub execution: ExecutionCounters,
    pub queries: Vec<String>,
    pub results: Vec<CollectedResult>,
    pub summary: ReportSummary,
    pub prompts: PromptDrafts,
    pub hooks: HookLog,
    pub errors: Vec<RunError>,
}
