use coderun_core::RunOutcome;
use coderun_protocol::OutboundEvent;
use core_test_support::EVENT_TIMEOUT;
use core_test_support::TestEngine;
use core_test_support::assert_quiet;
use core_test_support::collect_until_finished;
use core_test_support::skip_unless_toolchain;
use std::time::Duration;

async fn assert_prints_hello(language: &str, source: &str) -> anyhow::Result<()> {
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    assert_eq!(session.run(language, source).await, RunOutcome::Started);
    let text = collect_until_finished(&mut rx, EVENT_TIMEOUT).await?;
    assert!(text.contains("Hello, World!"), "{language}: {text:?}");

    // Exactly one Finished per run.
    assert_quiet(&mut rx, Duration::from_millis(200)).await?;

    session.disconnect().await;
    assert_eq!(harness.scratch_entries()?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn python_hello_world() -> anyhow::Result<()> {
    skip_unless_toolchain!("python3");
    assert_prints_hello("python", "print('Hello, World!')\n").await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn c_hello_world() -> anyhow::Result<()> {
    skip_unless_toolchain!("gcc");
    assert_prints_hello(
        "c",
        "#include <stdio.h>\nint main(void) { printf(\"Hello, World!\\n\"); return 0; }\n",
    )
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn cpp_hello_world() -> anyhow::Result<()> {
    skip_unless_toolchain!("g++");
    assert_prints_hello(
        "cpp",
        "#include <iostream>\nint main() { std::cout << \"Hello, World!\" << std::endl; }\n",
    )
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn java_hello_world() -> anyhow::Result<()> {
    skip_unless_toolchain!("javac", "java");
    assert_prints_hello(
        "java",
        "public class Hello {\n  public static void main(String[] args) {\n    System.out.println(\"Hello, World!\");\n  }\n}\n",
    )
    .await
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn unknown_language_cannot_be_prepared() -> anyhow::Result<()> {
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    assert_eq!(session.run("ruby", "puts 1").await, RunOutcome::Rejected);
    assert_eq!(
        rx.recv().await,
        Some(OutboundEvent::Output(
            "Error: Could not prepare command.".to_string()
        ))
    );
    assert_quiet(&mut rx, Duration::from_millis(100)).await?;
    assert_eq!(harness.scratch_entries()?, 0);
    Ok(())
}
