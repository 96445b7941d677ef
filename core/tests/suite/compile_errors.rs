use coderun_core::RunOutcome;
use coderun_core::SessionState;
use coderun_protocol::OutboundEvent;
use core_test_support::EVENT_TIMEOUT;
use core_test_support::TestEngine;
use core_test_support::assert_quiet;
use core_test_support::next_event;
use core_test_support::skip_unless_toolchain;
use std::time::Duration;

async fn assert_compile_failure(language: &str, source: &str) -> anyhow::Result<()> {
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    assert_eq!(session.run(language, source).await, RunOutcome::Rejected);
    let OutboundEvent::Output(text) = next_event(&mut rx, EVENT_TIMEOUT).await? else {
        anyhow::bail!("expected a diagnostic");
    };
    let diagnostics = text
        .strip_prefix("Compilation Failed:\n")
        .ok_or_else(|| anyhow::anyhow!("missing banner: {text:?}"))?;
    assert!(!diagnostics.trim().is_empty());

    // No Finished for a run that never started, and nothing to feed input to.
    assert_eq!(session.state(), SessionState::Idle);
    session.input("42\n");
    assert_quiet(&mut rx, Duration::from_millis(300)).await?;

    // Source and any partial build output are already gone.
    assert_eq!(harness.scratch_entries()?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn c_syntax_error_reports_diagnostics() -> anyhow::Result<()> {
    skip_unless_toolchain!("gcc");
    assert_compile_failure("c", "int main(void) { return 0 }\n").await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cpp_syntax_error_reports_diagnostics() -> anyhow::Result<()> {
    skip_unless_toolchain!("g++");
    assert_compile_failure("cpp", "int main() { undeclared_name(); }\n").await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn java_syntax_error_reports_diagnostics() -> anyhow::Result<()> {
    skip_unless_toolchain!("javac");
    assert_compile_failure(
        "java",
        "public class Broken {\n  public static void main(String[] args) {\n    int x = ;\n  }\n}\n",
    )
    .await
}
