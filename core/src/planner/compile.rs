use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;

use tokio::process::Command;
use tracing::debug;

use super::PlanError;

pub(super) async fn write_source(path: &Path, source: &str) -> Result<(), PlanError> {
    tokio::fs::write(path, source)
        .await
        .map_err(|err| PlanError::write_source(path, err))
}

/// Runs a compiler to completion. A nonzero exit becomes
/// [`PlanError::CompileFailed`] carrying the compiler's own diagnostics.
pub(super) async fn run_compiler<I, S>(program: &str, args: I) -> Result<(), PlanError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|err| PlanError::compiler_unavailable(program, err))?;

    debug!(program, status = %output.status, "compiler finished");
    if output.status.success() {
        return Ok(());
    }

    Err(PlanError::CompileFailed {
        diagnostics: select_diagnostics(&output.stdout, &output.stderr),
    })
}

/// Compilers write diagnostics to stderr; a few only use stdout.
fn select_diagnostics(stdout: &[u8], stderr: &[u8]) -> String {
    let chosen = if stderr.is_empty() { stdout } else { stderr };
    String::from_utf8_lossy(chosen).into_owned()
}
