use coderun_core::RunOutcome;
use coderun_core::planner::find_main_class;
use coderun_protocol::OutboundEvent;
use core_test_support::EVENT_TIMEOUT;
use core_test_support::TestEngine;
use core_test_support::collect_until_finished;
use core_test_support::skip_unless_toolchain;
use pretty_assertions::assert_eq;

#[test]
fn discovery_rules() {
    assert_eq!(
        find_main_class("public class Foo { public static void main(String[] a) {} }").as_deref(),
        Some("Foo")
    );
    assert_eq!(
        find_main_class("class Bar { public static void main(String[] a) {} }").as_deref(),
        Some("Bar")
    );
    assert_eq!(find_main_class("enum Colour { RED }"), None);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn missing_main_class_writes_nothing() -> anyhow::Result<()> {
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    assert_eq!(
        session.run("java", "interface Shape { double area(); }").await,
        RunOutcome::Rejected
    );
    assert_eq!(
        rx.recv().await,
        Some(OutboundEvent::Output(
            "Error: No class with main() method found.".to_string()
        ))
    );
    assert!(session.cleanup_paths().is_empty());
    assert_eq!(harness.scratch_entries()?, 0);
    Ok(())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn package_private_main_class_runs() -> anyhow::Result<()> {
    skip_unless_toolchain!("javac", "java");
    let harness = TestEngine::new()?;
    let (mut session, mut rx) = harness.engine.open_session();

    let source = "class Greeter {\n\
                  static String name() { return \"greeter\"; }\n\
                  public static void main(String[] args) { System.out.println(\"hi from \" + name()); }\n\
                  }\n";
    assert_eq!(session.run("java", source).await, RunOutcome::Started);
    let paths = session.cleanup_paths().to_vec();
    assert_eq!(paths.len(), 1);
    assert!(paths[0].join("Greeter.java").is_file());

    let text = collect_until_finished(&mut rx, EVENT_TIMEOUT).await?;
    assert!(text.contains("hi from greeter"), "{text:?}");

    session.disconnect().await;
    assert!(!paths[0].exists());
    Ok(())
}
