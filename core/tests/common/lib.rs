use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use anyhow::bail;
use coderun_core::Engine;
use coderun_core::EngineConfig;
use coderun_core::config::ScratchConfig;
use coderun_core::config::SessionConfig;
use coderun_protocol::OutboundEvent;
use tempfile::TempDir;
use tokio::sync::mpsc;

pub const EVENT_TIMEOUT: Duration = Duration::from_secs(30);

/// An engine whose scratch area is a private temporary directory.
pub struct TestEngine {
    pub engine: Engine,
    pub scratch: TempDir,
}

impl TestEngine {
    pub fn new() -> anyhow::Result<Self> {
        let scratch = tempfile::tempdir().context("create scratch dir")?;
        let config = EngineConfig {
            scratch: ScratchConfig {
                root: Some(scratch.path().to_path_buf()),
            },
            session: SessionConfig {
                terminate_grace_ms: 1_000,
                ..SessionConfig::default()
            },
            ..EngineConfig::default()
        };
        Ok(Self {
            engine: Engine::new(&config),
            scratch,
        })
    }

    /// Number of entries left in the scratch directory.
    pub fn scratch_entries(&self) -> anyhow::Result<usize> {
        count_entries(self.scratch.path())
    }
}

pub fn count_entries(dir: &Path) -> anyhow::Result<usize> {
    Ok(std::fs::read_dir(dir)
        .with_context(|| format!("read {}", dir.display()))?
        .count())
}

pub fn toolchain_available(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Returns early from a test returning `anyhow::Result<()>` when any of the
/// given programs is not on `PATH`.
#[macro_export]
macro_rules! skip_unless_toolchain {
    ($($program:expr),+ $(,)?) => {{
        $(
            if !$crate::toolchain_available($program) {
                eprintln!("skipping test: `{}` not found on PATH", $program);
                return Ok(());
            }
        )+
    }};
}

pub async fn next_event(
    rx: &mut mpsc::Receiver<OutboundEvent>,
    timeout: Duration,
) -> anyhow::Result<OutboundEvent> {
    match tokio::time::timeout(timeout, rx.recv()).await {
        Ok(Some(event)) => Ok(event),
        Ok(None) => bail!("outbound channel closed"),
        Err(_) => bail!("no event within {timeout:?}"),
    }
}

/// Concatenates output until `Finished` arrives.
pub async fn collect_until_finished(
    rx: &mut mpsc::Receiver<OutboundEvent>,
    timeout: Duration,
) -> anyhow::Result<String> {
    let mut text = String::new();
    loop {
        match next_event(rx, timeout)
            .await
            .with_context(|| format!("waiting for finished after {text:?}"))?
        {
            OutboundEvent::Output(chunk) => text.push_str(&chunk),
            OutboundEvent::Finished => return Ok(text),
        }
    }
}

/// Concatenates output until it contains `needle`. Fails on `Finished`.
pub async fn wait_for_output(
    rx: &mut mpsc::Receiver<OutboundEvent>,
    needle: &str,
    timeout: Duration,
) -> anyhow::Result<String> {
    let mut text = String::new();
    while !text.contains(needle) {
        match next_event(rx, timeout)
            .await
            .with_context(|| format!("waiting for {needle:?} after {text:?}"))?
        {
            OutboundEvent::Output(chunk) => text.push_str(&chunk),
            OutboundEvent::Finished => bail!("run finished before {needle:?} appeared: {text:?}"),
        }
    }
    Ok(text)
}

/// Fails if any event arrives within `window`.
pub async fn assert_quiet(
    rx: &mut mpsc::Receiver<OutboundEvent>,
    window: Duration,
) -> anyhow::Result<()> {
    if let Ok(Some(event)) = tokio::time::timeout(window, rx.recv()).await {
        bail!("unexpected event {event:?}");
    }
    Ok(())
}
