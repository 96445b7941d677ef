use std::ffi::OsStr;

use async_trait::async_trait;
use coderun_protocol::Language;
use tracing::debug;

use super::ExecutionPlan;
use super::PlanOutcome;
use super::ToolchainAdapter;
use super::compile::run_compiler;
use super::compile::write_source;
use crate::cleanup::CleanupSet;
use crate::config::ToolchainConfig;
use crate::scratch::ScratchArea;

/// Languages compiled ahead of time into a single executable.
#[derive(Debug, Clone)]
pub struct NativeAdapter {
    language: Language,
    compiler: String,
}

impl NativeAdapter {
    pub fn c(toolchains: &ToolchainConfig) -> Self {
        Self {
            language: Language::C,
            compiler: toolchains.c_compiler.clone(),
        }
    }

    pub fn cpp(toolchains: &ToolchainConfig) -> Self {
        Self {
            language: Language::Cpp,
            compiler: toolchains.cpp_compiler.clone(),
        }
    }
}

#[async_trait]
impl ToolchainAdapter for NativeAdapter {
    fn language(&self) -> Language {
        self.language
    }

    async fn plan(&self, source: &str, scratch: &ScratchArea) -> PlanOutcome {
        let stem = scratch.allocate();
        let source_path = stem.with_extension(self.language.extension());
        let binary_path = stem.base().to_path_buf();

        // The binary may never exist; removal tolerates that.
        let mut cleanup = CleanupSet::new();
        cleanup.push(source_path.clone());
        cleanup.push(binary_path.clone());

        if let Err(err) = write_source(&source_path, source).await {
            return PlanOutcome::failed(err, cleanup);
        }

        let args = [
            source_path.as_os_str(),
            OsStr::new("-o"),
            binary_path.as_os_str(),
        ];
        if let Err(err) = run_compiler(&self.compiler, args).await {
            debug!(language = %self.language, "compilation failed");
            return PlanOutcome::failed(err, cleanup);
        }

        PlanOutcome::ready(
            ExecutionPlan::from_parts(binary_path.to_string_lossy().into_owned(), Vec::new()),
            cleanup,
        )
    }
}
