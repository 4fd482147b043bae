//! Provider adapters: the five fetch strategies behind the collector.
//!
//! Each adapter maps a query to the uniform [`ProviderRow`] shape. Four are
//! HTTP-backed (Q&A site, link aggregator, community forum, code host); the
//! fifth matches an offline documentation index. Response parsing is split
//! from fetching so the mapping and engagement filters stay testable
//! without a network.

use anyhow::{bail, Result};
use chrono::DateTime;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::ProviderOptions;
use crate::models::ProviderRow;
use crate::official_index::{self, OfficialDocsQuery};
use crate::text::strip_tags;

const USER_AGENT: &str = concat!("practice-harness/", env!("CARGO_PKG_VERSION"));

/// The closed set of fetch strategies. Dispatch is an exhaustive match, so
/// adding a variant forces every call site to handle it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Provider {
    #[serde(rename = "official-docs")]
    OfficialDocs,
    #[serde(rename = "stackoverflow")]
    StackOverflow,
    #[serde(rename = "hn")]
    HackerNews,
    #[serde(rename = "reddit")]
    Reddit,
    #[serde(rename = "github")]
    GitHub,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::OfficialDocs => "official-docs",
            Provider::StackOverflow => "stackoverflow",
            Provider::HackerNews => "hn",
            Provider::Reddit => "reddit",
            Provider::GitHub => "github",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Host of a URL with one leading `www.` stripped; unparseable URLs map to
/// the sentinel `"unknown"`.
pub fn extract_domain(raw_url: &str) -> String {
    match Url::parse(raw_url) {
        Ok(url) => url
            .host_str()
            .map(|h| h.strip_prefix("www.").unwrap_or(h).to_lowercase())
            .unwrap_or_else(|| "unknown".to_string()),
        Err(_) => "unknown".to_string(),
    }
}

/// Everything one provider call needs besides the query itself.
#[derive(Debug, Clone, Default)]
pub struct ProviderCall {
    pub timeout_ms: u64,
    pub max_results: usize,
    pub subreddits: Vec<String>,
    pub options: ProviderOptions,
    pub official: OfficialDocsQuery,
}

/// Execute one provider request and attach the derived domain to each row.
pub async fn search(provider: Provider, query: &str, call: &ProviderCall) -> Result<Vec<ProviderRow>> {
    let mut rows = match provider {
        Provider::OfficialDocs => {
            let mut opts = call.official.clone();
            opts.max_results = call.max_results;
            if let Some(min_score) = call.options.min_score {
                opts.min_score = min_score;
            }
            official_index::search(query, &opts)
        }
        Provider::StackOverflow => search_stackoverflow(query, call).await?,
        Provider::HackerNews => search_hackernews(query, call).await?,
        Provider::Reddit => search_reddit(query, call).await?,
        Provider::GitHub => search_github(query, call).await?,
    };

    for row in &mut rows {
        row.domain = extract_domain(&row.url);
    }
    Ok(rows)
}

async fn fetch_json(url: Url, timeout_ms: u64, accept: &str) -> Result<serde_json::Value> {
    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(timeout_ms))
        .user_agent(USER_AGENT)
        .build()?;

    let response = client.get(url.clone()).header("Accept", accept).send().await?;
    let status = response.status();
    if !status.is_success() {
        bail!("HTTP {} when requesting {}", status.as_u16(), url);
    }
    response
        .json::<serde_json::Value>()
        .await
        .map_err(|_| anyhow::anyhow!("Invalid JSON response from {}", url))
}

fn epoch_to_rfc3339(secs: i64) -> Option<String> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.to_rfc3339())
}

// ═══════════════════════════════════════════════════════════════════════
// Q&A site (Stack Exchange API)
// ═══════════════════════════════════════════════════════════════════════

async fn search_stackoverflow(query: &str, call: &ProviderCall) -> Result<Vec<ProviderRow>> {
    let page_size = call.max_results.to_string();
    let url = Url::parse_with_params(
        "https://api.stackexchange.com/2.3/search/advanced",
        &[
            ("order", "desc"),
            ("sort", "votes"),
            ("site", "stackoverflow"),
            ("pagesize", page_size.as_str()),
            ("q", query),
        ],
    )?;
    let payload = fetch_json(url, call.timeout_ms, "application/json,*/*").await?;
    Ok(parse_stackoverflow(&payload, call.options.min_score.unwrap_or(5.0)))
}

fn parse_stackoverflow(payload: &serde_json::Value, min_score: f64) -> Vec<ProviderRow> {
    payload
        .get("items")
        .and_then(|i| i.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0) >= min_score
                })
                .filter_map(|item| {
                    let link = item.get("link")?.as_str()?;
                    Some(ProviderRow {
                        title: strip_tags(item.get("title").and_then(|t| t.as_str()).unwrap_or("")),
                        url: link.to_string(),
                        snippet: "StackOverflow question".to_string(),
                        provider: Provider::StackOverflow.as_str().to_string(),
                        published_at: item
                            .get("creation_date")
                            .and_then(|c| c.as_i64())
                            .and_then(epoch_to_rfc3339),
                        engagement: serde_json::json!({
                            "score": item.get("score").and_then(|s| s.as_f64()).unwrap_or(0.0),
                            "answers": item.get("answer_count").and_then(|a| a.as_f64()).unwrap_or(0.0),
                        }),
                        domain: String::new(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════
// Link aggregator (HN Algolia API)
// ═══════════════════════════════════════════════════════════════════════

async fn search_hackernews(query: &str, call: &ProviderCall) -> Result<Vec<ProviderRow>> {
    let hits_per_page = call.max_results.to_string();
    let url = Url::parse_with_params(
        "https://hn.algolia.com/api/v1/search",
        &[
            ("tags", "story"),
            ("hitsPerPage", hits_per_page.as_str()),
            ("query", query),
        ],
    )?;
    let payload = fetch_json(url, call.timeout_ms, "application/json,*/*").await?;
    Ok(parse_hackernews(&payload, call.options.min_points.unwrap_or(5.0)))
}

fn parse_hackernews(payload: &serde_json::Value, min_points: f64) -> Vec<ProviderRow> {
    payload
        .get("hits")
        .and_then(|h| h.as_array())
        .map(|hits| {
            hits.iter()
                .filter(|hit| {
                    hit.get("points").and_then(|p| p.as_f64()).unwrap_or(0.0) >= min_points
                })
                .filter_map(|hit| {
                    let url = hit
                        .get("url")
                        .and_then(|u| u.as_str())
                        .or_else(|| hit.get("story_url").and_then(|u| u.as_str()))?;
                    let title = hit
                        .get("title")
                        .and_then(|t| t.as_str())
                        .or_else(|| hit.get("story_title").and_then(|t| t.as_str()))
                        .unwrap_or("HN Story");
                    Some(ProviderRow {
                        title: strip_tags(title),
                        url: url.to_string(),
                        snippet: "Hacker News discussion".to_string(),
                        provider: Provider::HackerNews.as_str().to_string(),
                        published_at: hit
                            .get("created_at")
                            .and_then(|c| c.as_str())
                            .map(String::from),
                        engagement: serde_json::json!({
                            "points": hit.get("points").and_then(|p| p.as_f64()).unwrap_or(0.0),
                            "comments": hit.get("num_comments").and_then(|c| c.as_f64()).unwrap_or(0.0),
                        }),
                        domain: String::new(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════
// Community forum (Reddit search API)
// ═══════════════════════════════════════════════════════════════════════

async fn search_reddit(query: &str, call: &ProviderCall) -> Result<Vec<ProviderRow>> {
    let merged_query = reddit_query(query, &call.subreddits);
    let limit = call.max_results.to_string();
    let url = Url::parse_with_params(
        "https://www.reddit.com/search.json",
        &[
            ("sort", "top"),
            ("t", "year"),
            ("limit", limit.as_str()),
            ("q", merged_query.as_str()),
        ],
    )?;
    let payload = fetch_json(url, call.timeout_ms, "application/json,*/*").await?;
    Ok(parse_reddit(&payload, call.options.min_upvotes.unwrap_or(10.0)))
}

/// Fold allow-listed subreddits into the query:
/// `(subreddit:a OR subreddit:b) <query>`.
fn reddit_query(query: &str, subreddits: &[String]) -> String {
    if subreddits.is_empty() {
        return query.to_string();
    }
    let scope = subreddits
        .iter()
        .map(|name| format!("subreddit:{}", name))
        .collect::<Vec<_>>()
        .join(" OR ");
    format!("({}) {}", scope, query).trim().to_string()
}

fn parse_reddit(payload: &serde_json::Value, min_upvotes: f64) -> Vec<ProviderRow> {
    let posts = payload
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(|c| c.as_array())
        .map(|children| {
            children
                .iter()
                .filter_map(|child| child.get("data"))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    posts
        .into_iter()
        .filter(|post| {
            post.get("title").and_then(|t| t.as_str()).is_some()
                && post.get("ups").and_then(|u| u.as_f64()).unwrap_or(0.0) >= min_upvotes
        })
        .map(|post| {
            let subreddit = post.get("subreddit").and_then(|s| s.as_str());
            let url = match post.get("permalink").and_then(|p| p.as_str()) {
                Some(permalink) => format!("https://www.reddit.com{}", permalink),
                None => format!("https://www.reddit.com/r/{}", subreddit.unwrap_or("all")),
            };
            let snippet = match post.get("selftext").and_then(|s| s.as_str()) {
                Some(text) if !text.is_empty() => {
                    strip_tags(text).chars().take(220).collect::<String>()
                }
                _ => format!("r/{}", subreddit.unwrap_or("unknown")),
            };
            ProviderRow {
                title: strip_tags(post.get("title").and_then(|t| t.as_str()).unwrap_or("")),
                url,
                snippet,
                provider: Provider::Reddit.as_str().to_string(),
                published_at: post
                    .get("created_utc")
                    .and_then(|c| c.as_f64())
                    .and_then(|secs| epoch_to_rfc3339(secs as i64)),
                engagement: serde_json::json!({
                    "upvotes": post.get("ups").and_then(|u| u.as_f64()).unwrap_or(0.0),
                    "comments": post.get("num_comments").and_then(|c| c.as_f64()).unwrap_or(0.0),
                }),
                domain: String::new(),
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════
// Code host (GitHub repository search)
// ═══════════════════════════════════════════════════════════════════════

async fn search_github(query: &str, call: &ProviderCall) -> Result<Vec<ProviderRow>> {
    let min_stars = call.options.min_stars.unwrap_or(300);
    let normalized_query = github_query(query, min_stars);
    let per_page = call.max_results.to_string();
    let url = Url::parse_with_params(
        "https://api.github.com/search/repositories",
        &[
            ("per_page", per_page.as_str()),
            ("sort", "stars"),
            ("order", "desc"),
            ("q", normalized_query.as_str()),
        ],
    )?;
    let payload = fetch_json(url, call.timeout_ms, "application/vnd.github+json").await?;
    Ok(parse_github(&payload, min_stars))
}

/// Append a star-count qualifier unless the query already carries one.
fn github_query(query: &str, min_stars: u64) -> String {
    let has_star_filter = query
        .split("stars:")
        .nth(1)
        .map(|rest| rest.trim_start().starts_with('>'))
        .unwrap_or(false);
    if has_star_filter {
        query.to_string()
    } else {
        format!("{} stars:>{}", query, min_stars)
    }
}

fn parse_github(payload: &serde_json::Value, min_stars: u64) -> Vec<ProviderRow> {
    payload
        .get("items")
        .and_then(|i| i.as_array())
        .map(|items| {
            items
                .iter()
                .filter(|item| {
                    item.get("stargazers_count").and_then(|s| s.as_u64()).unwrap_or(0) >= min_stars
                })
                .filter_map(|item| {
                    let html_url = item.get("html_url")?.as_str()?;
                    let title = item
                        .get("full_name")
                        .and_then(|n| n.as_str())
                        .or_else(|| item.get("name").and_then(|n| n.as_str()))
                        .unwrap_or("GitHub Repository");
                    Some(ProviderRow {
                        title: strip_tags(title),
                        url: html_url.to_string(),
                        snippet: strip_tags(
                            item.get("description").and_then(|d| d.as_str()).unwrap_or(""),
                        ),
                        provider: Provider::GitHub.as_str().to_string(),
                        published_at: item
                            .get("updated_at")
                            .and_then(|u| u.as_str())
                            .map(String::from),
                        engagement: serde_json::json!({
                            "stars": item.get("stargazers_count").and_then(|s| s.as_u64()).unwrap_or(0),
                            "forks": item.get("forks_count").and_then(|f| f.as_u64()).unwrap_or(0),
                        }),
                        domain: String::new(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
