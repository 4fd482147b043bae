//! Report assembly: highlights, recommendations, and agent prompt drafts
//! derived from the ranked results.

use crate::models::{CollectedResult, EvidenceChainItem, PromptDrafts, ReportSummary, SearchContext};

/// Numbered one-liners for the top five results.
pub fn generate_highlights(results: &[CollectedResult]) -> Vec<String> {
    results
        .iter()
        .take(5)
        .enumerate()
        .map(|(index, item)| {
            format!(
                "{}. {} ({}, score {:.2})",
                index + 1,
                item.title,
                item.domain,
                item.total_score
            )
        })
        .collect()
}

/// Guidance shaped by which source tiers survived ranking. The regression
/// reminder is unconditional.
pub fn generate_recommendations(results: &[CollectedResult]) -> Vec<String> {
    let has_official = results.iter().any(|item| item.source_tier == "official");
    let has_community = results.iter().any(|item| item.source_tier != "official");

    let mut recommendations = Vec::new();
    if has_official {
        recommendations.push(
            "Adopt the constraints, API boundaries, and upgrade guidance from official documentation first"
                .to_string(),
        );
    }
    if has_community {
        recommendations.push(
            "Cross-check highly voted community experience against official guidance before applying it"
                .to_string(),
        );
    }
    recommendations.push(
        "Write failure scenarios and a regression checklist before implementing, not just the happy path"
            .to_string(),
    );
    recommendations
}

/// A ready-to-paste prompt for a coding agent: context, the top links, the
/// strongest evidence excerpts, and fixed output requirements.
pub fn generate_prompt_draft(
    context: &SearchContext,
    results: &[CollectedResult],
    evidence_chain: &[EvidenceChainItem],
) -> String {
    let mut lines: Vec<String> = vec![
        "You are a senior engineer. Implement the requirement using the vetted sources below."
            .to_string(),
        format!("Topic: {}", context.topic),
        format!(
            "Stack: {}",
            if context.stack.is_empty() { "unspecified" } else { &context.stack }
        ),
        format!("Objective: {}", context.objective),
        String::new(),
        "References (ordered by quality):".to_string(),
    ];

    for item in results.iter().take(5) {
        lines.push(format!("- {} ({})", item.title, item.url));
    }

    lines.push(String::new());
    lines.push("Evidence excerpts:".to_string());
    if evidence_chain.is_empty() {
        lines.push("No page evidence was extracted; draft an initial plan from the links above.".to_string());
    } else {
        for (index, item) in evidence_chain.iter().take(3).enumerate() {
            lines.push(format!("{}. {} ({})", index + 1, item.excerpt, item.url));
        }
    }

    lines.push(String::new());
    lines.push("Output requirements:".to_string());
    lines.push("1) A minimal viable implementation plan, including boundaries".to_string());
    lines.push("2) A Do / Don't list".to_string());
    lines.push("3) A test and regression checklist".to_string());
    lines.push("4) Known version compatibility risks".to_string());

    lines.join("\n")
}

pub fn build_summary(
    results: &[CollectedResult],
    evidence_chain: Vec<EvidenceChainItem>,
) -> ReportSummary {
    ReportSummary {
        highlights: generate_highlights(results),
        recommendations: generate_recommendations(results),
        evidence_chain,
    }
}

/// Prompt drafts for both agent targets, or empty strings when disabled.
pub fn build_prompts(
    include_prompt_draft: bool,
    context: &SearchContext,
    results: &[CollectedResult],
    evidence_chain: &[EvidenceChainItem],
) -> PromptDrafts {
    if !include_prompt_draft {
        return PromptDrafts::default();
    }
    let draft = generate_prompt_draft(context, results, evidence_chain);
    PromptDrafts {
        codex: draft.clone(),
        claude: draft,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SignalScores;

    fn result(title: &str, tier: &str, total: f64) -> CollectedResult {
        CollectedResult {
            title: title.to_string(),
            url: format!("https://example.com/{}", title),
            snippet: String::new(),
            domain: "example.com".to_string(),
            query: "q".to_string(),
            source_id: "src".to_string(),
            source_tier: tier.to_string(),
            source_label: "Source".to_string(),
            provider: "hn".to_string(),
            published_at: None,
            engagement: serde_json::json!({}),
            score: SignalScores {
                authority: 0.8,
                recency: 0.8,
                relevance: 0.8,
                topic_coverage: 0.8,
            },
            total_score: total,
            fetched_from_cache: false,
            evidence: Vec::new(),
        }
    }

    fn context() -> SearchContext {
        SearchContext {
            topic: "error handling".to_string(),
            stack: String::new(),
            objective: "production readiness".to_string(),
        }
    }

    #[test]
    fn highlights_are_numbered_and_capped_at_five() {
        let results: Vec<CollectedResult> = (0..7)
            .map(|i| result(&format!("Result {}", i), "medium", 0.9 - i as f64 * 0.05))
            .collect();

        let highlights = generate_highlights(&results);
        assert_eq!(highlights.len(), 5);
        assert_eq!(highlights[0], "1. Result 0 (example.com, score 0.90)");
    }

    #[test]
    fn recommendations_reflect_surviving_tiers() {
        let official_only = generate_recommendations(&[result("a", "official", 0.8)]);
        assert_eq!(official_only.len(), 2);
        assert!(official_only[0].contains("official documentation"));

        let mixed = generate_recommendations(&[
            result("a", "official", 0.8),
            result("b", "high", 0.7),
        ]);
        assert_eq!(mixed.len(), 3);

        let none = generate_recommendations(&[]);
        assert_eq!(none.len(), 1);
        assert!(none[0].contains("regression checklist"));
    }

    #[test]
    fn prompt_draft_marks_missing_stack_and_evidence() {
        let draft = generate_prompt_draft(&context(), &[result("a", "official", 0.8)], &[]);
        assert!(draft.contains("Stack: unspecified"));
        assert!(draft.contains("No page evidence was extracted"));
        assert!(draft.contains("- a (https://example.com/a)"));
    }

    #[test]
    fn prompt_draft_lists_evidence_excerpts() {
        let chain = vec![EvidenceChainItem {
            title: "a".to_string(),
            url: "https://example.com/a".to_string(),
            excerpt: "Always propagate errors with context.".to_string(),
            score: 0.8,
        }];
        let draft = generate_prompt_draft(&context(), &[result("a", "official", 0.8)], &chain);
        assert!(draft.contains("1. Always propagate errors with context. (https://example.com/a)"));
    }

    #[test]
    fn disabled_prompt_drafts_are_empty() {
        let prompts = build_prompts(false, &context(), &[], &[]);
        assert!(prompts.codex.is_empty() && prompts.claude.is_empty());
    }
}
