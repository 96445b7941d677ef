use async_trait::async_trait;
use coderun_protocol::Language;
use tracing::debug;

use super::ExecutionPlan;
use super::PlanOutcome;
use super::ToolchainAdapter;
use super::compile::write_source;
use crate::cleanup::CleanupSet;
use crate::config::ToolchainConfig;
use crate::scratch::ScratchArea;

/// Languages run straight from source by an interpreter.
#[derive(Debug, Clone)]
pub struct InterpretedAdapter {
    language: Language,
    interpreter: String,
    flags: Vec<String>,
}

impl InterpretedAdapter {
    /// `python3 -u <file>`; `-u` keeps stdout unbuffered so prompts show up
    /// before the program blocks on input.
    pub fn python(toolchains: &ToolchainConfig) -> Self {
        Self {
            language: Language::Python,
            interpreter: toolchains.python.clone(),
            flags: vec!["-u".to_string()],
        }
    }
}

#[async_trait]
impl ToolchainAdapter for InterpretedAdapter {
    fn language(&self) -> Language {
        self.language
    }

    async fn plan(&self, source: &str, scratch: &ScratchArea) -> PlanOutcome {
        let path = scratch.allocate().with_extension(self.language.extension());
        let mut cleanup = CleanupSet::new();
        cleanup.push(path.clone());

        if let Err(err) = write_source(&path, source).await {
            return PlanOutcome::failed(err, cleanup);
        }
        debug!(language = %self.language, path = %path.display(), "wrote interpreted source");

        let args = self
            .flags
            .iter()
            .cloned()
            .chain(std::iter::once(path.to_string_lossy().into_owned()));
        PlanOutcome::ready(
            ExecutionPlan::from_parts(self.interpreter.clone(), args),
            cleanup,
        )
    }
}
