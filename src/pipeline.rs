//! The run orchestrator: intent, query planning, collection, ranking,
//! enrichment, and report assembly, with hooks applied between stages.

use anyhow::{bail, Result};
use chrono::Utc;
use std::path::PathBuf;

use crate::cache::resolve_cache_dir;
use crate::collect::{self, CollectParams};
use crate::config::{self, resolve_relative, Config};
use crate::enrich;
use crate::hooks::{HookMetadata, HookPayload, HookRegistry, HookStage};
use crate::models::{
    ConfigSummary, ExecutionCounters, HookLog, PracticeInput, PracticeReport, RunError,
    SearchContext,
};
use crate::plan;
use crate::rank;
use crate::report;
use crate::text::{filter_meaningful_tokens, tokenize, unique_values};

/// Per-invocation switches. `no_cache` disables the cache entirely;
/// `refresh_cache` skips reads but still writes fresh responses.
#[derive(Debug, Default)]
pub struct RunOptions {
    pub config_path: Option<PathBuf>,
    pub no_cache: bool,
    pub refresh_cache: bool,
    pub hooks: HookRegistry,
}

fn resolve_context(input: &PracticeInput, config: &Config) -> Result<SearchContext> {
    let topic = input.topic.as_deref().unwrap_or("").trim().to_string();
    if topic.is_empty() && config.stages.intent.required_topic {
        bail!("practice search requires input.topic");
    }

    let objective = input.objective.as_deref().unwrap_or("").trim().to_string();
    Ok(SearchContext {
        topic,
        stack: input.stack.as_deref().unwrap_or("").trim().to_string(),
        objective: if objective.is_empty() {
            config.stages.intent.fallback_objective.clone()
        } else {
            objective
        },
    })
}

fn hook_meta(stage: HookStage, context: &SearchContext) -> HookMetadata {
    HookMetadata {
        stage,
        topic: context.topic.clone(),
        stack: context.stack.clone(),
        objective: context.objective.clone(),
    }
}

/// Run the full research pipeline for one JSON input payload.
///
/// The topic requirement is validated before any provider is contacted, so
/// an invalid invocation never spends network or cache activity.
pub async fn run_practice_search(raw_input: &str, options: RunOptions) -> Result<PracticeReport> {
    let input = config::parse_input(raw_input)?;
    let loaded = config::load_config(options.config_path.as_deref(), input.config.as_ref())?;
    let config = &loaded.config;

    let mut context = resolve_context(&input, config)?;
    let mut hook_log = HookLog::default();

    // ── intent ─────────────────────────────────────────────────────────
    let payload = HookPayload {
        context: Some(context.clone()),
        ..Default::default()
    };
    let payload = options
        .hooks
        .apply(
            HookStage::AfterIntent,
            payload,
            &hook_meta(HookStage::AfterIntent, &context),
            &mut hook_log,
        )
        .await;
    if let Some(next) = payload.context {
        context = next;
    }

    // ── query planning ─────────────────────────────────────────────────
    let mut queries = plan::build_queries(&context, &config.stages.query);
    let payload = HookPayload {
        context: Some(context.clone()),
        queries: Some(queries.clone()),
        ..Default::default()
    };
    let payload = options
        .hooks
        .apply(
            HookStage::AfterQuery,
            payload,
            &hook_meta(HookStage::AfterQuery, &context),
            &mut hook_log,
        )
        .await;
    if let Some(next) = payload.queries {
        queries = next;
    }

    // ── collection ─────────────────────────────────────────────────────
    let requests = collect::build_search_requests(&queries, config);
    let collect_stage = &config.stages.collect;

    let cache_enabled = collect_stage.cache_enabled && !options.no_cache;
    let cache_read_enabled = cache_enabled && !options.refresh_cache;
    let cache_dir = resolve_cache_dir(collect_stage.cache_dir.as_deref(), &loaded.config_path);
    let official_index_path = collect_stage
        .official_docs
        .index_path
        .as_deref()
        .map(|p| resolve_relative(p, &loaded.config_path));

    let topic_keywords = unique_values(tokenize(&format!("{} {}", context.topic, context.stack)));
    let topic_core_keywords = unique_values(filter_meaningful_tokens(tokenize(&context.topic)));
    let coverage_keywords = if topic_core_keywords.is_empty() {
        topic_keywords.clone()
    } else {
        topic_core_keywords
    };

    let params = CollectParams {
        config,
        context: &context,
        topic_keywords: &topic_keywords,
        coverage_keywords: &coverage_keywords,
        cache_dir: cache_dir.clone(),
        cache_enabled,
        cache_read_enabled,
        official_index_path: official_index_path.clone(),
        now: Utc::now(),
    };
    let outcome = collect::collect(&requests, &params).await;

    let mut collected = outcome.collected;
    let mut errors = outcome.errors;

    let payload = HookPayload {
        context: Some(context.clone()),
        queries: Some(queries.clone()),
        collected: Some(collected.clone()),
        errors: Some(errors.clone()),
        ..Default::default()
    };
    let payload = options
        .hooks
        .apply(
            HookStage::AfterCollect,
            payload,
            &hook_meta(HookStage::AfterCollect, &context),
            &mut hook_log,
        )
        .await;
    if let Some(next) = payload.collected {
        collected = next;
    }
    if let Some(next) = payload.errors {
        errors = next;
    }

    // ── ranking ────────────────────────────────────────────────────────
    let top_n = input.max_results.unwrap_or(config.stages.synthesize.top_n);
    let mut ranked = rank::rank(
        collected.clone(),
        &config.stages.score,
        &config.stages.synthesize,
        top_n,
    );

    let payload = HookPayload {
        context: Some(context.clone()),
        collected: Some(collected.clone()),
        ranked: Some(ranked.clone()),
        ..Default::default()
    };
    let payload = options
        .hooks
        .apply(
            HookStage::AfterRank,
            payload,
            &hook_meta(HookStage::AfterRank, &context),
            &mut hook_log,
        )
        .await;
    if let Some(next) = payload.ranked {
        ranked = next;
    }

    // ── enrichment ─────────────────────────────────────────────────────
    let enriched = enrich::enrich_ranked(ranked, &coverage_keywords, &config.stages.enrich).await;
    let ranked = enriched.results;
    errors.extend(enriched.errors.into_iter().map(|e| RunError {
        source_id: "enrich".to_string(),
        provider: "fetch".to_string(),
        query: e.url,
        message: e.message,
    }));

    let evidence_chain = enrich::build_evidence_chain(&ranked, 5, 1);

    // ── assembly ───────────────────────────────────────────────────────
    let summary = report::build_summary(&ranked, evidence_chain.clone());
    let prompts = report::build_prompts(
        config.stages.synthesize.include_prompt_draft,
        &context,
        &ranked,
        &evidence_chain,
    );

    let mut result = PracticeReport {
        report_type: "practice_report".to_string(),
        topic: context.topic.clone(),
        stack: context.stack.clone(),
        objective: context.objective.clone(),
        config: ConfigSummary {
            path: loaded.config_path.display().to_string(),
            loaded_from_disk: loaded.loaded_from_disk,
            source_count: config.sources.len(),
            stage_keys: vec![
                "intent".to_string(),
                "query".to_string(),
                "collect".to_string(),
                "score".to_string(),
                "enrich".to_string(),
                "synthesize".to_string(),
            ],
            cache_enabled,
            cache_read_enabled,
            refresh_cache: options.refresh_cache,
            cache_ttl_ms: collect_stage.cache_ttl_ms,
            cache_version: collect_stage.cache_version,
            cache_dir: cache_dir.display().to_string(),
            official_docs_index_path: official_index_path.map(|p| p.display().to_string()),
        },
        execution: ExecutionCounters {
            query_count: queries.len(),
            request_count: requests.len(),
            collected_count: collected.len(),
            ranked_count: ranked.len(),
            fetched_for_evidence: enriched.fetched_count,
            cache_hit_count: outcome.cache_hit_count,
            cache_miss_count: outcome.cache_miss_count,
            cache_bypass: options.no_cache,
            cache_refresh: options.refresh_cache,
            retry_used_count: outcome.retry_used_count,
            error_count: errors.len(),
            generated_at: Utc::now().to_rfc3339(),
            hooks_executed: hook_log.executed.len(),
            hooks_failed: hook_log.failed.len(),
        },
        queries,
        results: ranked,
        summary,
        prompts,
        hooks: HookLog::default(),
        errors,
    };

    let payload = HookPayload {
        context: Some(context.clone()),
        result: Some(Box::new(result.clone())),
        ..Default::default()
    };
    let payload = options
        .hooks
        .apply(
            HookStage::BeforeReturn,
            payload,
            &hook_meta(HookStage::BeforeReturn, &context),
            &mut hook_log,
        )
        .await;
    // A hook that drops the result field keeps the assembled report.
    if let Some(boxed) = payload.result {
        result = *boxed;
    }

    // The hook log always reflects the full run, even if a hook replaced
    // the report wholesale.
    result.hooks = hook_log;
    Ok(result)
}
