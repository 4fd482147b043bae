//! Offline official-documentation index.
//!
//! The official-docs provider never touches the network: it matches queries
//! against a merged index of built-in entries, an optional external JSON
//! index file, and inline entries from configuration. Matching is token
//! overlap against each entry's tags/title/snippet, with a configurable
//! boost for tokens inferred from the stack.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::SystemTime;

use crate::models::ProviderRow;
use crate::text::tokenize;

/// A normalized index entry.
#[derive(Debug, Clone)]
pub struct OfficialEntry {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub tags: Vec<String>,
    pub published_at: Option<String>,
    pub priority: f64,
}

/// Parameters for one official-docs lookup.
#[derive(Debug, Clone, Default)]
pub struct OfficialDocsQuery {
    pub topic: String,
    pub stack: String,
    pub objective: String,
    pub max_results: usize,
    pub min_score: f64,
    pub stack_boost_weight: f64,
    pub merge_default_index: bool,
    pub index_path: Option<PathBuf>,
    pub inline_index: Vec<serde_json::Value>,
    pub stack_profiles: Option<BTreeMap<String, Vec<String>>>,
}

/// Built-in index entries: (title, url, tags, snippet).
const BUILTIN_INDEX: &[(&str, &str, &[&str], &str)] = &[
    (
        "Node.js - Errors",
        "https://nodejs.org/api/errors.html",
        &["node", "node.js", "error", "exception", "handling"],
        "Node.js official API reference for errors and exception handling.",
    ),
    (
        "Node.js - Diagnostics Channel",
        "https://nodejs.org/api/diagnostics_channel.html",
        &["node", "observability", "tracing", "diagnostics"],
        "Node.js diagnostics_channel for observability and instrumentation.",
    ),
    (
        "TypeScript Handbook",
        "https://www.typescriptlang.org/docs/",
        &["typescript", "ts", "types", "api", "design"],
        "TypeScript official handbook and language guides.",
    ),
    (
        "TypeScript TSConfig Reference",
        "https://www.typescriptlang.org/tsconfig",
        &["typescript", "strict", "compiler", "tsconfig"],
        "TypeScript compiler options and strictness best practices.",
    ),
    (
        "MDN JavaScript Guide",
        "https://developer.mozilla.org/en-US/docs/Web/JavaScript/Guide",
        &["javascript", "js", "best", "practice", "guide"],
        "MDN JavaScript guide with language and runtime best practices.",
    ),
    (
        "React Docs - Learn",
        "https://react.dev/learn",
        &["react", "component", "hooks", "state", "forms"],
        "React official learning materials and recommended patterns.",
    ),
    (
        "Next.js Docs - App Router",
        "https://nextjs.org/docs/app",
        &["next", "react", "routing", "server", "app-router"],
        "Next.js app router architecture and production best practices.",
    ),
    (
        "Vue Docs - Guide",
        "https://vuejs.org/guide/introduction.html",
        &["vue", "composition", "api", "component", "forms"],
        "Vue official guide and composition API best practices.",
    ),
    (
        "Nuxt Docs",
        "https://nuxt.com/docs",
        &["nuxt", "vue", "routing", "ssr", "performance"],
        "Nuxt documentation for architecture and deployment best practices.",
    ),
    (
        "NestJS Documentation",
        "https://docs.nestjs.com/",
        &["nest", "node", "architecture", "testing", "api"],
        "NestJS official documentation for modular backend architecture.",
    ),
    (
        "Python Docs",
        "https://docs.python.org/3/",
        &["python", "standard-library", "typing", "async"],
        "Python official documentation and standard library references.",
    ),
    (
        "FastAPI Documentation",
        "https://fastapi.tiangolo.com/",
        &["fastapi", "python", "api", "validation", "async"],
        "FastAPI official documentation for API design and validation.",
    ),
    (
        "Django Documentation",
        "https://docs.djangoproject.com/",
        &["django", "python", "orm", "security", "testing"],
        "Django official docs with patterns for security and maintainability.",
    ),
    (
        "Go Documentation",
        "https://go.dev/doc/",
        &["go", "golang", "concurrency", "context", "testing"],
        "Go official docs and effective Go best practices.",
    ),
    (
        "Rust Book",
        "https://doc.rust-lang.org/book/",
        &["rust", "ownership", "error", "design", "testing"],
        "The Rust Programming Language book and idiomatic patterns.",
    ),
    (
        "Spring Framework Reference",
        "https://docs.spring.io/spring-framework/reference/",
        &["spring", "java", "dependency injection", "transaction", "testing"],
        "Spring framework reference for enterprise Java best practices.",
    ),
    (
        "PostgreSQL Documentation",
        "https://www.postgresql.org/docs/",
        &["postgres", "sql", "index", "performance", "transaction"],
        "PostgreSQL official docs for query and schema best practices.",
    ),
    (
        "Redis Documentation",
        "https://redis.io/docs/latest/",
        &["redis", "cache", "data", "performance", "persistence"],
        "Redis official docs for caching patterns and reliability.",
    ),
    (
        "Docker Documentation",
        "https://docs.docker.com/",
        &["docker", "container", "security", "build", "deployment"],
        "Docker documentation for image build and runtime best practices.",
    ),
    (
        "Kubernetes Documentation",
        "https://kubernetes.io/docs/home/",
        &["kubernetes", "k8s", "cluster", "deployment", "reliability"],
        "Kubernetes official documentation and production guides.",
    ),
    (
        "AWS Well-Architected Framework",
        "https://docs.aws.amazon.com/wellarchitected/latest/framework/welcome.html",
        &["aws", "cloud", "architecture", "reliability", "security"],
        "AWS official architecture framework for reliability and operations.",
    ),
    (
        "Google Cloud Architecture Framework",
        "https://cloud.google.com/architecture/framework",
        &["gcp", "google", "cloud", "architecture", "operations"],
        "Google Cloud architecture best practices and recommendations.",
    ),
    (
        "Azure Architecture Center",
        "https://learn.microsoft.com/en-us/azure/architecture/",
        &["azure", "cloud", "architecture", "operations", "security"],
        "Azure architecture guidance for scalable and reliable systems.",
    ),
];

/// Tag profiles used to infer stack tokens for the boost term. Distinct
/// from the query planner's expansion profiles.
fn default_stack_tags() -> BTreeMap<String, Vec<String>> {
    let entries: &[(&str, &[&str])] = &[
        ("react|next", &["react", "hooks", "state", "component", "next"]),
        ("vue|nuxt", &["vue", "nuxt", "composition", "reactivity"]),
        ("node|express|nest", &["node", "api", "backend", "error", "observability"]),
        ("typescript|ts", &["typescript", "types", "strict", "compiler"]),
        ("python|django|fastapi", &["python", "django", "fastapi", "async", "validation"]),
        ("java|spring", &["java", "spring", "transaction", "dependency"]),
        ("go|golang", &["go", "golang", "concurrency", "context"]),
        ("kubernetes|k8s|docker", &["kubernetes", "k8s", "docker", "container", "deployment"]),
        ("aws|gcp|azure|cloud", &["cloud", "aws", "gcp", "azure", "architecture"]),
    ];
    entries
        .iter()
        .map(|(k, vs)| (k.to_string(), vs.iter().map(|v| v.to_string()).collect()))
        .collect()
}

fn builtin_entries() -> Vec<OfficialEntry> {
    BUILTIN_INDEX
        .iter()
        .map(|(title, url, tags, snippet)| OfficialEntry {
            title: title.to_string(),
            url: url.to_string(),
            snippet: snippet.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            published_at: None,
            priority: 0.0,
        })
        .collect()
}

/// Normalize a loosely-typed index entry. Entries without a title or URL
/// are dropped.
pub fn normalize_entry(raw: &serde_json::Value) -> Option<OfficialEntry> {
    let obj = raw.as_object()?;
    let title = obj.get("title")?.as_str()?.trim().to_string();
    let url = obj.get("url")?.as_str()?.trim().to_string();
    if title.is_empty() || url.is_empty() {
        return None;
    }

    let tags = obj
        .get("tags")
        .and_then(|t| t.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|i| i.as_str())
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default();

    Some(OfficialEntry {
        title,
        url,
        snippet: obj
            .get("snippet")
            .and_then(|s| s.as_str())
            .unwrap_or("")
            .trim()
            .to_string(),
        tags,
        published_at: obj
            .get("publishedAt")
            .and_then(|p| p.as_str())
            .map(String::from),
        priority: obj.get("priority").and_then(|p| p.as_f64()).unwrap_or(0.0),
    })
}

fn parse_index_payload(payload: &serde_json::Value) -> Vec<serde_json::Value> {
    if let Some(items) = payload.as_array() {
        return items.clone();
    }
    payload
        .get("entries")
        .and_then(|e| e.as_array())
        .cloned()
        .unwrap_or_default()
}

type FileCache = HashMap<PathBuf, (SystemTime, Vec<OfficialEntry>)>;

fn file_cache() -> &'static Mutex<FileCache> {
    static CACHE: OnceLock<Mutex<FileCache>> = OnceLock::new();
    CACHE.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Load an external index file, reusing parsed entries while the file's
/// mtime is unchanged.
pub fn load_index_file(path: &Path) -> Result<Vec<OfficialEntry>> {
    let meta = std::fs::metadata(path)
        .with_context(|| format!("Failed to stat official index: {}", path.display()))?;
    let mtime = meta.modified().unwrap_or(SystemTime::UNIX_EPOCH);

    if let Ok(cache) = file_cache().lock() {
        if let Some((cached_mtime, entries)) = cache.get(path) {
            if *cached_mtime == mtime {
                return Ok(entries.clone());
            }
        }
    }

    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read official index: {}", path.display()))?;
    let payload: serde_json::Value = serde_json::from_str(&text)
        .with_context(|| format!("Invalid JSON in official index: {}", path.display()))?;
    let entries: Vec<OfficialEntry> = parse_index_payload(&payload)
        .iter()
        .filter_map(normalize_entry)
        .collect();

    if let Ok(mut cache) = file_cache().lock() {
        cache.insert(path.to_path_buf(), (mtime, entries.clone()));
    }
    Ok(entries)
}

/// Dedupe by URL, keeping the entry with the higher priority (later entries
/// win ties, so inline config overrides the built-in index).
pub fn dedupe_entries(entries: Vec<OfficialEntry>) -> Vec<OfficialEntry> {
    let mut order: Vec<String> = Vec::new();
    let mut table: HashMap<String, OfficialEntry> = HashMap::new();

    for entry in entries {
        let replace = match table.get(&entry.url) {
            Some(existing) => entry.priority >= existing.priority,
            None => {
                order.push(entry.url.clone());
                true
            }
        };
        if replace {
            table.insert(entry.url.clone(), entry);
        }
    }

    order.into_iter().filter_map(|url| table.remove(&url)).collect()
}

/// Infer boost tokens by matching the stack string against pipe-separated
/// alias profiles.
pub fn infer_stack_tokens(
    stack: &str,
    profiles: Option<&BTreeMap<String, Vec<String>>>,
) -> Vec<String> {
    let stack_text = stack.trim().to_lowercase();
    if stack_text.is_empty() {
        return Vec::new();
    }

    let defaults = default_stack_tags();
    let resolved = profiles.unwrap_or(&defaults);

    let mut seen = HashSet::new();
    let mut tokens = Vec::new();
    for (matcher, values) in resolved {
        let matched = matcher
            .split('|')
            .map(|a| a.trim().to_lowercase())
            .filter(|a| !a.is_empty())
            .any(|a| stack_text.contains(&a));
        if !matched {
            continue;
        }
        for value in values {
            let token = value.trim().to_lowercase();
            if !token.is_empty() && seen.insert(token.clone()) {
                tokens.push(token);
            }
        }
    }
    tokens
}

/// Token-overlap match score: query-token overlap against the entry's tag
/// set, blended with stack-token overlap, plus any entry priority.
pub fn score_entry(
    entry: &OfficialEntry,
    query_tokens: &[String],
    stack_tokens: &[String],
    stack_boost_weight: f64,
) -> f64 {
    let mut tag_set: HashSet<String> = entry.tags.iter().map(|t| t.to_lowercase()).collect();
    tag_set.extend(tokenize(&entry.title));
    tag_set.extend(tokenize(&entry.snippet));

    let query_score = overlap(query_tokens, &tag_set);
    let stack_score = overlap(stack_tokens, &tag_set);
    let priority_boost = entry.priority.max(0.0);

    query_score * (1.0 - stack_boost_weight) + stack_score * stack_boost_weight + priority_boost
}

fn overlap(tokens: &[String], tag_set: &HashSet<String>) -> f64 {
    if tokens.is_empty() {
        return 0.0;
    }
    let hits = tokens.iter().filter(|t| tag_set.contains(*t)).count();
    hits as f64 / tokens.len() as f64
}

/// Assemble the merged index for one lookup.
pub fn build_index(opts: &OfficialDocsQuery) -> Vec<OfficialEntry> {
    let mut entries = Vec::new();
    if opts.merge_default_index {
        entries.extend(builtin_entries());
    }
    if let Some(path) = &opts.index_path {
        // A missing or malformed index file degrades to the rest of the index.
        if let Ok(file_entries) = load_index_file(path) {
            entries.extend(file_entries);
        }
    }
    entries.extend(opts.inline_index.iter().filter_map(normalize_entry));
    dedupe_entries(entries)
}

/// Run one official-docs lookup and map matches into provider rows.
pub fn search(query: &str, opts: &OfficialDocsQuery) -> Vec<ProviderRow> {
    let combined = format!("{} {} {}", query, opts.topic, opts.objective);
    let query_tokens: Vec<String> = tokenize(&combined)
        .into_iter()
        .filter(|t| !t.starts_with("site"))
        .collect();
    let stack_tokens = infer_stack_tokens(&opts.stack, opts.stack_profiles.as_ref());

    let mut scored: Vec<(OfficialEntry, f64)> = build_index(opts)
        .into_iter()
        .map(|entry| {
            let score = score_entry(&entry, &query_tokens, &stack_tokens, opts.stack_boost_weight);
            (entry, score)
        })
        .filter(|(_, score)| *score >= opts.min_score)
        .collect();

    scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(opts.max_results);

    scored
        .into_iter()
        .map(|(entry, score)| ProviderRow {
            title: entry.title,
            url: entry.url,
            snippet: format!("{} Tags: {}", entry.snippet, entry.tags.join(", ")),
            provider: "official-docs".to_string(),
            published_at: entry.published_at,
            engagement: serde_json::json!({ "score": score }),
            domain: String::new(),
        })
        .collect()
}
