use coderun_core::RunOutcome;
use coderun_core::SessionState;
use coderun_protocol::ClientCommand;
use core_test_support::EVENT_TIMEOUT;
use core_test_support::TestEngine;
use core_test_support::assert_quiet;
use core_test_support::collect_until_finished;
use core_test_support::skip_unless_toolchain;
use core_test_support::wait_for_output;
use std::time::Duration;

const ECHO_ONCE: &str = "line = input()\nprint('echo:' + line)\n";
const SPIN: &str = "import time\nprint('spinning', flush=True)\nwhile True:\n    time.sleep(0.1)\n";

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn interactive_input_is_echoed() -> anyhow::Result<()> {
    skip_unless_toolchain!("python3");
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    session.run("python", ECHO_ONCE).await;
    session
        .handle(ClientCommand::Input {
            data: "ping\n".to_string(),
        })
        .await;
    let text = collect_until_finished(&mut rx, EVENT_TIMEOUT).await?;
    assert!(text.contains("echo:ping"), "{text:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn new_run_reaps_previous_child_first() -> anyhow::Result<()> {
    skip_unless_toolchain!("python3");
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    session.run("python", SPIN).await;
    wait_for_output(&mut rx, "spinning", EVENT_TIMEOUT).await?;
    let first_paths = session.cleanup_paths().to_vec();
    assert!(!first_paths.is_empty());

    assert_eq!(
        session.run("python", "print('second run')\n").await,
        RunOutcome::Started
    );
    let tail = collect_until_finished(&mut rx, EVENT_TIMEOUT).await?;
    assert!(!tail.contains("second run"), "{tail:?}");
    assert!(first_paths.iter().all(|path| !path.exists()));

    let text = collect_until_finished(&mut rx, EVENT_TIMEOUT).await?;
    assert!(text.contains("second run"), "{text:?}");
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn stop_ends_a_running_program() -> anyhow::Result<()> {
    skip_unless_toolchain!("python3");
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    session.run("python", SPIN).await;
    wait_for_output(&mut rx, "spinning", EVENT_TIMEOUT).await?;
    assert_eq!(session.state(), SessionState::Running);

    session.handle(ClientCommand::Stop).await;
    collect_until_finished(&mut rx, EVENT_TIMEOUT).await?;
    assert_eq!(session.state(), SessionState::Idle);

    // Input after the run is over goes nowhere.
    session.input("late\n");
    assert_quiet(&mut rx, Duration::from_millis(200)).await?;
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn disconnect_during_run_removes_artifacts() -> anyhow::Result<()> {
    skip_unless_toolchain!("python3");
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    session.run("python", SPIN).await;
    wait_for_output(&mut rx, "spinning", EVENT_TIMEOUT).await?;
    assert!(harness.scratch_entries()? > 0);

    session.disconnect().await;
    assert_eq!(harness.scratch_entries()?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn output_is_unbuffered_for_python() -> anyhow::Result<()> {
    skip_unless_toolchain!("python3");
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    // Without -u this prompt would sit in a block buffer until exit.
    session
        .run("python", "import sys\nsys.stdout.write('name? ')\nname = input()\nprint('hi ' + name)\n")
        .await;
    wait_for_output(&mut rx, "name? ", EVENT_TIMEOUT).await?;
    session.input("ada\n");
    let text = collect_until_finished(&mut rx, EVENT_TIMEOUT).await?;
    assert!(text.contains("hi ada"), "{text:?}");
    Ok(())
}
