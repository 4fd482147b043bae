//! # Practice Harness
//!
//! A best-practice research engine for coding agents.
//!
//! Practice Harness turns a research intent (topic, stack, objective) into a
//! ranked, evidence-backed report: it plans search queries, fans them out
//! across documentation and community providers with retry and response
//! caching, scores every candidate on authority, recency, relevance, and
//! topic coverage, fetches the strongest pages for supporting sentences,
//! and assembles a report with prompt drafts ready to paste into an agent.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────┐   ┌─────────┐   ┌──────────────┐   ┌────────┐
//! │ Intent │──▶│  Plan   │──▶│   Collect     │──▶│  Rank  │
//! │        │   │ queries │   │ providers +   │   │ score  │
//! └────────┘   └─────────┘   │ retry + cache │   └───┬────┘
//!                            └──────────────┘       │
//!                      ┌────────────────────────────┤
//!                      ▼                            ▼
//!                 ┌─────────┐                 ┌──────────┐
//!                 │ Enrich  │────────────────▶│  Report  │
//!                 │ fetch   │                 │ + prompts│
//!                 └─────────┘                 └──────────┘
//! ```
//!
//! Hooks registered on a [`hooks::HookRegistry`] run between stages and may
//! inspect or rewrite the in-flight payload.
//!
//! ## Quick Start
//!
//! ```no_run
//! use practice_harness::pipeline::{run_practice_search, RunOptions};
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let report = run_practice_search(
//!     r#"{"topic": "error handling", "stack": "Node.js"}"#,
//!     RunOptions::default(),
//! )
//! .await?;
//! println!("{}", serde_json::to_string_pretty(&report)?);
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | Typed configuration, defaults, and overlay merging |
//! | [`models`] | Core data types and the report shape |
//! | [`text`] | Tokenization, templates, and HTML/sentence utilities |
//! | [`plan`] | Query planning and keyword expansion |
//! | [`providers`] | Provider adapters and response mapping |
//! | [`official_index`] | Offline official-documentation index |
//! | [`cache`] | Content-addressed response cache |
//! | [`collect`] | Request fan-out with retry and scoring |
//! | [`rank`] | Multi-signal scoring and ranking |
//! | [`enrich`] | Page fetching and evidence extraction |
//! | [`hooks`] | Compiled extension hooks |
//! | [`report`] | Highlights, recommendations, prompt drafts |
//! | [`pipeline`] | The run orchestrator |

pub mod cache;
pub mod collect;
pub mod config;
pub mod enrich;
pub mod hooks;
pub mod models;
pub mod official_index;
pub mod pipeline;
pub mod plan;
pub mod providers;
pub mod rank;
pub mod report;
pub mod text;

pub use models::PracticeReport;
pub use pipeline::{run_practice_search, RunOptions};
pub use providers::Provider;
