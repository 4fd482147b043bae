//! Query planning: turn a resolved research context into the ordered,
//! deduplicated query list the collector fans out.

use crate::config::QueryStage;
use crate::models::SearchContext;
use crate::text::{filter_meaningful_tokens, render_template, tokenize, unique_values, TemplateVars};

/// Expansion keywords for a context: stack-profile aliases matched against
/// the stack+topic haystack, then meaningful topic tokens, deduplicated and
/// capped. Disabled expansion or a zero cap yields none.
fn expansion_keywords(context: &SearchContext, stage: &QueryStage) -> Vec<String> {
    if !stage.enable_expansion || stage.max_expansion_keywords == 0 {
        return Vec::new();
    }

    let haystack = format!("{} {}", context.stack, context.topic).to_lowercase();
    let mut keywords = Vec::new();

    for (matcher, values) in &stage.stack_profiles {
        let matched = matcher
            .split('|')
            .map(|alias| alias.trim().to_lowercase())
            .filter(|alias| !alias.is_empty())
            .any(|alias| haystack.contains(&alias));
        if matched {
            keywords.extend(values.iter().map(|v| v.trim().to_string()));
        }
    }

    keywords.extend(filter_meaningful_tokens(tokenize(&context.topic)));

    let mut unique = unique_values(keywords);
    unique.truncate(stage.max_expansion_keywords);
    unique
}

/// Build the query plan for one run.
///
/// Templates render first, then a combined extra-keywords query, then the
/// expansion cross product. The final list is order-preserving deduped and
/// truncated to `max_queries`.
pub fn build_queries(context: &SearchContext, stage: &QueryStage) -> Vec<String> {
    let base_vars = TemplateVars {
        topic: &context.topic,
        stack: &context.stack,
        objective: &context.objective,
        keyword: "",
    };

    let mut queries: Vec<String> = stage
        .templates
        .iter()
        .map(|template| render_template(template, &base_vars))
        .collect();

    let extra: Vec<&str> = stage
        .extra_keywords
        .iter()
        .map(|kw| kw.trim())
        .filter(|kw| !kw.is_empty())
        .collect();
    if !extra.is_empty() {
        let combined = format!("{} {} {}", context.topic, context.stack, extra.join(" "));
        queries.push(combined.split_whitespace().collect::<Vec<_>>().join(" "));
    }

    for keyword in expansion_keywords(context, stage) {
        for template in &stage.expansion_templates {
            let query = render_template(
                template,
                &TemplateVars {
                    topic: &context.topic,
                    stack: &context.stack,
                    objective: &context.objective,
                    keyword: &keyword,
                },
            );
            if !query.is_empty() {
                queries.push(query);
            }
        }
    }

    let mut planned = unique_values(queries);
    planned.truncate(stage.max_queries);
    planned
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use std::collections::BTreeMap;

    fn context(topic: &str, stack: &str) -> SearchContext {
        SearchContext {
            topic: topic.to_string(),
            stack: stack.to_string(),
            objective: "production readiness".to_string(),
        }
    }

    #[test]
    fn templates_render_in_order_and_dedupe() {
        let mut stage = Config::default().stages.query;
        stage.templates = vec![
            "{{topic}} best practices".to_string(),
            "{{topic}} best practices".to_string(),
            "{{topic}} {{stack}} pitfalls".to_string(),
        ];
        stage.enable_expansion = false;

        let queries = build_queries(&context("error handling", "Node.js"), &stage);
        assert_eq!(
            queries,
            vec![
                "error handling best practices",
                "error handling Node.js pitfalls",
            ]
        );
    }

    #[test]
    fn extra_keywords_append_a_combined_query() {
        let mut stage = Config::default().stages.query;
        stage.templates = vec!["{{topic}}".to_string()];
        stage.extra_keywords = vec!["  retry  ".to_string(), "".to_string(), "timeout".to_string()];
        stage.enable_expansion = false;

        let queries = build_queries(&context("error handling", "Node.js"), &stage);
        assert_eq!(queries[1], "error handling Node.js retry timeout");
    }

    #[test]
    fn expansion_matches_stack_profile_aliases() {
        let mut stage = Config::default().stages.query;
        stage.templates = vec![];
        stage.expansion_templates = vec!["{{topic}} {{keyword}}".to_string()];
        stage.max_expansion_keywords = 2;
        stage.stack_profiles =
            BTreeMap::from([("node|express".to_string(), vec!["async".to_string(), "stream".to_string()])]);

        let queries = build_queries(&context("logging", "Express app"), &stage);
        assert_eq!(queries, vec!["logging async", "logging stream"]);
    }

    #[test]
    fn overlapping_profiles_accrue_in_sorted_matcher_order() {
        let mut stage = Config::default().stages.query;
        stage.templates = vec![];
        stage.expansion_templates = vec!["{{keyword}}".to_string()];
        stage.max_expansion_keywords = 2;
        // Both profiles match; the cap keeps the sorted-first matcher's
        // keywords regardless of config declaration order.
        stage.stack_profiles = BTreeMap::from([
            ("node".to_string(), vec!["zzz".to_string(), "stream".to_string()]),
            ("express".to_string(), vec!["middleware".to_string(), "router".to_string()]),
        ]);

        let queries = build_queries(&context("logging", "Express on node"), &stage);
        assert_eq!(queries, vec!["middleware", "router"]);
    }

    #[test]
    fn expansion_falls_back_to_topic_tokens() {
        let mut stage = Config::default().stages.query;
        stage.templates = vec![];
        stage.expansion_templates = vec!["deep dive {{keyword}}".to_string()];
        stage.max_expansion_keywords = 1;
        stage.stack_profiles = BTreeMap::new();

        let queries = build_queries(&context("database migrations", ""), &stage);
        assert_eq!(queries, vec!["deep dive database"]);
    }

    #[test]
    fn disabled_expansion_yields_no_expansion_queries() {
        let mut stage = Config::default().stages.query;
        stage.templates = vec!["{{topic}}".to_string()];
        stage.enable_expansion = false;

        let queries = build_queries(&context("caching", "redis"), &stage);
        assert_eq!(queries, vec!["caching"]);
    }

    #[test]
    fn plan_is_capped_at_max_queries() {
        let mut stage = Config::default().stages.query;
        stage.templates = (0..20).map(|i| format!("{{{{topic}}}} v{}", i)).collect();
        stage.max_queries = 4;
        stage.enable_expansion = false;

        let queries = build_queries(&context("caching", ""), &stage);
        assert_eq!(queries.len(), 4);
    }
}
