use std::ffi::OsString;

use async_trait::async_trait;
use coderun_protocol::Language;
use tracing::debug;

use super::ExecutionPlan;
use super::PlanError;
use super::PlanOutcome;
use super::ToolchainAdapter;
use super::compile::run_compiler;
use super::compile::write_source;
use super::entry_point::find_main_class;
use crate::cleanup::CleanupSet;
use crate::config::ToolchainConfig;
use crate::scratch::ScratchArea;

/// Java needs the file named after its public class, so each run gets its own
/// directory holding `<Name>.java` and the compiled classes.
#[derive(Debug, Clone)]
pub struct JavaAdapter {
    compiler: String,
    runtime: String,
    heap_flags: Vec<String>,
}

impl JavaAdapter {
    pub fn new(toolchains: &ToolchainConfig) -> Self {
        Self {
            compiler: toolchains.java_compiler.clone(),
            runtime: toolchains.java_runtime.clone(),
            heap_flags: toolchains.java_heap_flags.clone(),
        }
    }

    /// `javac` forwards `-J` flags to the JVM it runs on.
    fn compiler_args(&self, source_path: &std::path::Path) -> Vec<OsString> {
        let mut args: Vec<OsString> = self
            .heap_flags
            .iter()
            .map(|flag| OsString::from(format!("-J{flag}")))
            .collect();
        args.push(source_path.as_os_str().to_os_string());
        args
    }
}

#[async_trait]
impl ToolchainAdapter for JavaAdapter {
    fn language(&self) -> Language {
        Language::Java
    }

    async fn plan(&self, source: &str, scratch: &ScratchArea) -> PlanOutcome {
        let Some(class_name) = find_main_class(source) else {
            return PlanOutcome::failed(PlanError::MissingEntryPoint, CleanupSet::new());
        };

        let class_dir = scratch.allocate().base().to_path_buf();
        let mut cleanup = CleanupSet::new();
        cleanup.push(class_dir.clone());

        if let Err(err) = tokio::fs::create_dir_all(&class_dir).await {
            return PlanOutcome::failed(PlanError::write_source(&class_dir, err), cleanup);
        }
        let source_path = class_dir.join(format!("{class_name}.{}", Language::Java.extension()));
        if let Err(err) = write_source(&source_path, source).await {
            return PlanOutcome::failed(err, cleanup);
        }
        debug!(class = %class_name, dir = %class_dir.display(), "wrote java source");

        if let Err(err) = run_compiler(&self.compiler, self.compiler_args(&source_path)).await {
            return PlanOutcome::failed(err, cleanup);
        }

        let args = self.heap_flags.iter().cloned().chain([
            "-cp".to_string(),
            class_dir.to_string_lossy().into_owned(),
            class_name,
        ]);
        PlanOutcome::ready(
            ExecutionPlan::from_parts(self.runtime.clone(), args),
            cleanup,
        )
    }
}
