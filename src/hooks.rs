//! Compiled extension hooks.
//!
//! Hooks are Rust values registered on a [`HookRegistry`] before a run, one
//! list per pipeline stage. Each hook receives the stage payload and may
//! return a replacement; returning `None` keeps the payload as-is. A hook
//! error never aborts the run: it is logged and the prior payload survives.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

use crate::models::{
    CollectedResult, HookExecution, HookFailure, HookLog, PracticeReport, RunError, SearchContext,
};

/// The five interception points of a run, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookStage {
    AfterIntent,
    AfterQuery,
    AfterCollect,
    AfterRank,
    BeforeReturn,
}

impl HookStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            HookStage::AfterIntent => "afterIntent",
            HookStage::AfterQuery => "afterQuery",
            HookStage::AfterCollect => "afterCollect",
            HookStage::AfterRank => "afterRank",
            HookStage::BeforeReturn => "beforeReturn",
        }
    }
}

/// Stage payload. Which fields are populated depends on the stage; a hook
/// replaces the run's state only for the fields its stage recognizes.
#[derive(Debug, Clone, Default)]
pub struct HookPayload {
    pub context: Option<SearchContext>,
    pub queries: Option<Vec<String>>,
    pub collected: Option<Vec<CollectedResult>>,
    pub errors: Option<Vec<RunError>>,
    pub ranked: Option<Vec<CollectedResult>>,
    pub result: Option<Box<PracticeReport>>,
}

/// Run context handed to every hook alongside the payload.
#[derive(Debug, Clone)]
pub struct HookMetadata {
    pub stage: HookStage,
    pub topic: String,
    pub stack: String,
    pub objective: String,
}

#[async_trait]
pub trait Hook: Send + Sync {
    /// Stable identifier recorded in the execution log.
    fn name(&self) -> &str;

    /// Inspect or transform the stage payload. `Ok(None)` keeps the
    /// payload unchanged; an `Err` is logged and also keeps it unchanged.
    async fn run(&self, payload: &HookPayload, meta: &HookMetadata) -> Result<Option<HookPayload>>;
}

/// Hooks grouped by stage, applied in registration order.
#[derive(Clone, Default)]
pub struct HookRegistry {
    hooks: HashMap<HookStage, Vec<Arc<dyn Hook>>>,
}

impl std::fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut map = f.debug_map();
        for (stage, hooks) in &self.hooks {
            map.key(&stage.as_str())
                .value(&hooks.iter().map(|h| h.name().to_string()).collect::<Vec<_>>());
        }
        map.finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, stage: HookStage, hook: Arc<dyn Hook>) {
        self.hooks.entry(stage).or_default().push(hook);
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.values().all(Vec::is_empty)
    }

    /// Chain every hook registered for `stage` over the payload, recording
    /// successes and failures in `log`.
    pub async fn apply(
        &self,
        stage: HookStage,
        mut payload: HookPayload,
        meta: &HookMetadata,
        log: &mut HookLog,
    ) -> HookPayload {
        let Some(hooks) = self.hooks.get(&stage) else {
            return payload;
        };

        for hook in hooks {
            match hook.run(&payload, meta).await {
                Ok(next) => {
                    log.executed.push(HookExecution {
                        stage: stage.as_str().to_string(),
                        name: hook.name().to_string(),
                    });
                    if let Some(next) = next {
                        payload = next;
                    }
                }
                Err(error) => {
                    log.failed.push(HookFailure {
                        stage: stage.as_str().to_string(),
                        message: error.to_string(),
                    });
                }
            }
        }
        payload
    }
}

/// Ready-made hook that removes ranked results whose domain ends with a
/// given suffix, e.g. `reddit.com`. Register it at [`HookStage::AfterRank`].
pub struct ExcludeDomainHook {
    suffix: String,
    name: String,
}

impl ExcludeDomainHook {
    pub fn new(suffix: &str) -> Self {
        Self {
            name: format!("exclude-domain-{}", suffix),
            suffix: suffix.to_string(),
        }
    }
}

#[async_trait]
impl Hook for ExcludeDomainHook {
    fn name(&self) -> &str {
        &self.name
    }

    async fn run(&self, payload: &HookPayload, _meta: &HookMetadata) -> Result<Option<HookPayload>> {
        let Some(ranked) = &payload.ranked else {
            return Ok(None);
        };

        let filtered: Vec<CollectedResult> = ranked
            .iter()
            .filter(|item| !item.domain.ends_with(&self.suffix))
            .cloned()
            .collect();

        let mut next = payload.clone();
        next.ranked = Some(filtered);
        Ok(Some(next))
    }
}
