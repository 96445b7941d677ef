//! Turns `(language, source)` into an [`ExecutionPlan`] plus the
//! [`CleanupSet`] of everything written while doing so.
//!
//! Planning never launches the program itself. Its only side effects are
//! writing the source into the [`ScratchArea`] and, for compiled languages,
//! running the compiler to completion. Whatever was written is reported back
//! in the outcome's cleanup set whether or not planning succeeded.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use coderun_protocol::Language;
use tracing::debug;

use crate::cleanup::CleanupSet;
use crate::config::ToolchainConfig;
use crate::scratch::ScratchArea;

mod compile;
mod entry_point;
mod errors;
mod interpreted;
mod java;
mod native;

pub use entry_point::find_main_class;
pub use errors::PlanError;
pub use interpreted::InterpretedAdapter;
pub use java::JavaAdapter;
pub use native::NativeAdapter;

/// A command ready to be launched directly, without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionPlan {
    argv: Vec<String>,
}

impl ExecutionPlan {
    /// Returns `None` for an empty argument vector.
    #[cfg(test)]
    pub(crate) fn new(argv: Vec<String>) -> Option<Self> {
        if argv.is_empty() { None } else { Some(Self { argv }) }
    }

    pub fn from_parts<I>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut argv = vec![program.into()];
        argv.extend(args);
        Self { argv }
    }

    pub fn program(&self) -> &str {
        &self.argv[0]
    }

    pub fn args(&self) -> &[String] {
        &self.argv[1..]
    }

    pub fn argv(&self) -> &[String] {
        &self.argv
    }
}

/// Result of planning: the plan (or why there is none) and the artifacts the
/// caller now owns.
#[derive(Debug)]
pub struct PlanOutcome {
    pub plan: Result<ExecutionPlan, PlanError>,
    pub cleanup: CleanupSet,
}

impl PlanOutcome {
    pub fn ready(plan: ExecutionPlan, cleanup: CleanupSet) -> Self {
        Self {
            plan: Ok(plan),
            cleanup,
        }
    }

    pub fn failed(error: PlanError, cleanup: CleanupSet) -> Self {
        Self {
            plan: Err(error),
            cleanup,
        }
    }

    pub fn into_parts(self) -> (Result<ExecutionPlan, PlanError>, CleanupSet) {
        (self.plan, self.cleanup)
    }
}

/// Language-specific planning strategy.
#[async_trait]
pub trait ToolchainAdapter: Send + Sync {
    fn language(&self) -> Language;

    async fn plan(&self, source: &str, scratch: &ScratchArea) -> PlanOutcome;
}

/// Dispatches planning to the adapter registered for a language tag.
#[derive(Clone)]
pub struct CommandPlanner {
    scratch: ScratchArea,
    adapters: HashMap<Language, Arc<dyn ToolchainAdapter>>,
}

impl std::fmt::Debug for CommandPlanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut languages: Vec<String> = self.adapters.keys().map(ToString::to_string).collect();
        languages.sort();
        f.debug_struct("CommandPlanner")
            .field("scratch", &self.scratch)
            .field("languages", &languages)
            .finish()
    }
}

impl CommandPlanner {
    /// A planner with no adapters; every tag is unsupported until one is
    /// registered.
    pub fn empty(scratch: ScratchArea) -> Self {
        Self {
            scratch,
            adapters: HashMap::new(),
        }
    }

    /// A planner for the four built-in languages.
    pub fn with_toolchains(scratch: ScratchArea, toolchains: &ToolchainConfig) -> Self {
        let mut planner = Self::empty(scratch);
        planner.register(Arc::new(InterpretedAdapter::python(toolchains)));
        planner.register(Arc::new(NativeAdapter::c(toolchains)));
        planner.register(Arc::new(NativeAdapter::cpp(toolchains)));
        planner.register(Arc::new(JavaAdapter::new(toolchains)));
        planner
    }

    pub fn register(&mut self, adapter: Arc<dyn ToolchainAdapter>) {
        self.adapters.insert(adapter.language(), adapter);
    }

    pub fn scratch(&self) -> &ScratchArea {
        &self.scratch
    }

    pub async fn plan(&self, language_tag: &str, source: &str) -> PlanOutcome {
        let adapter = Language::from_tag(language_tag).and_then(|lang| self.adapters.get(&lang));
        let Some(adapter) = adapter else {
            debug!(language = language_tag, "no toolchain adapter for language");
            return PlanOutcome::failed(
                PlanError::UnsupportedLanguage {
                    tag: language_tag.to_string(),
                },
                CleanupSet::new(),
            );
        };
        adapter.plan(source, &self.scratch).await
    }
}
