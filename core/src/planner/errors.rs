use std::path::PathBuf;

use thiserror::Error;

/// Why a `(language, source)` pair could not be turned into a command.
///
/// The `Display` form is exactly what the client sees in its output pane.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("Error: Could not prepare command.")]
    UnsupportedLanguage { tag: String },
    #[error("Error: No class with main() method found.")]
    MissingEntryPoint,
    #[error("Error: Could not prepare command: failed to write {}: {source}", path.display())]
    WriteSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Error: Could not prepare command: failed to run {program}: {source}")]
    CompilerUnavailable {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("Compilation Failed:\n{diagnostics}")]
    CompileFailed { diagnostics: String },
}

impl PlanError {
    pub(crate) fn write_source(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::WriteSource {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn compiler_unavailable(program: &str, source: std::io::Error) -> Self {
        Self::CompilerUnavailable {
            program: program.to_string(),
            source,
        }
    }

    /// Text delivered to the client as a single `output` event.
    pub fn diagnostic(&self) -> String {
        self.to_string()
    }
}
