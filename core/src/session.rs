//! Per-connection controller: serializes `run`, `input` and `stop` against
//! at most one live child and owns the artifacts of the current run.

use std::path::PathBuf;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use coderun_protocol::ClientCommand;
use coderun_protocol::OutboundEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::cleanup::CleanupSet;
use crate::config::EngineConfig;
use crate::config::SessionConfig;
use crate::planner::CommandPlanner;
use crate::pump::spawn_stream_pump;
use crate::scratch::ScratchArea;
use crate::supervisor::ChildHandle;
use crate::supervisor::PtyInput;
use crate::supervisor::launch;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Running,
}

/// What a `run` request turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// A child is running; its output and a final `Finished` will follow.
    Started,
    /// Planning failed; a single diagnostic was sent and nothing else follows.
    Rejected,
    /// Planning succeeded but the process could not be started. An error
    /// line and `Finished` were sent.
    LaunchFailed,
}

/// Shared factory for sessions. One per process.
#[derive(Debug)]
pub struct Engine {
    planner: CommandPlanner,
    config: SessionConfig,
    next_session_id: AtomicU64,
}

impl Engine {
    pub fn new(config: &EngineConfig) -> Self {
        let scratch = ScratchArea::new(config.scratch.resolved_root());
        Self::with_planner(
            CommandPlanner::with_toolchains(scratch, &config.toolchains),
            config.session.clone(),
        )
    }

    pub fn with_planner(planner: CommandPlanner, config: SessionConfig) -> Self {
        Self {
            planner,
            config,
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Opens a session together with the receiving end of its outbound
    /// events.
    pub fn open_session(&self) -> (Session, mpsc::Receiver<OutboundEvent>) {
        let id = SessionId(self.next_session_id.fetch_add(1, Ordering::Relaxed));
        let (events, receiver) = mpsc::channel(self.config.outbound_buffer.max(1));
        debug!(session_id = %id, "session opened");
        let session = Session {
            id,
            planner: self.planner.clone(),
            config: self.config.clone(),
            workdir: self.planner.scratch().root().to_path_buf(),
            events,
            current: None,
            cleanup: CleanupSet::new(),
        };
        (session, receiver)
    }
}

struct ActiveRun {
    child: ChildHandle,
    input: PtyInput,
    pump: JoinHandle<()>,
}

impl ActiveRun {
    fn is_live(&self) -> bool {
        !self.pump.is_finished()
    }
}

pub struct Session {
    id: SessionId,
    planner: CommandPlanner,
    config: SessionConfig,
    workdir: PathBuf,
    events: mpsc::Sender<OutboundEvent>,
    current: Option<ActiveRun>,
    cleanup: CleanupSet,
}

impl Session {
    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        match &self.current {
            Some(run) if run.is_live() => SessionState::Running,
            _ => SessionState::Idle,
        }
    }

    /// Paths owned by the current run, if any.
    pub fn cleanup_paths(&self) -> &[PathBuf] {
        self.cleanup.paths()
    }

    pub async fn handle(&mut self, command: ClientCommand) {
        debug!(session_id = %self.id, action = command.action(), "command received");
        match command {
            ClientCommand::Run { language, code } => {
                self.run(&language, &code).await;
            }
            ClientCommand::Input { data } => self.input(&data),
            ClientCommand::Stop => self.stop().await,
        }
    }

    /// Replaces whatever is running with `source` in `language`.
    pub async fn run(&mut self, language: &str, source: &str) -> RunOutcome {
        self.retire_current_run().await;

        let (plan, cleanup) = self.planner.plan(language, source).await.into_parts();
        self.cleanup = cleanup;
        let plan = match plan {
            Ok(plan) => plan,
            Err(err) => {
                info!(session_id = %self.id, language, error = %err, "planning failed");
                self.emit(OutboundEvent::Output(err.diagnostic())).await;
                self.remove_artifacts();
                return RunOutcome::Rejected;
            }
        };

        match launch(&plan, &self.workdir) {
            Ok(launched) => {
                let pump = spawn_stream_pump(
                    launched.output,
                    launched.child.exit_future(),
                    self.events.clone(),
                    self.config.read_chunk_bytes,
                );
                info!(
                    session_id = %self.id,
                    language,
                    pid = launched.child.pid(),
                    "run started"
                );
                self.current = Some(ActiveRun {
                    child: launched.child,
                    input: launched.input,
                    pump,
                });
                RunOutcome::Started
            }
            Err(err) => {
                warn!(session_id = %self.id, language, error = %err, "launch failed");
                self.emit(OutboundEvent::Output(format!(
                    "Error: Could not start process: {err}"
                )))
                .await;
                self.emit(OutboundEvent::Finished).await;
                self.remove_artifacts();
                RunOutcome::LaunchFailed
            }
        }
    }

    /// Forwards `text` to the running child; ignored when nothing is running.
    pub fn input(&self, text: &str) {
        match &self.current {
            Some(run) if run.is_live() && !run.child.has_exited() => run.input.write(text),
            _ => debug!(session_id = %self.id, "input ignored; no running process"),
        }
    }

    /// Terminates the current child, if any.
    pub async fn stop(&mut self) {
        if self.current.is_none() {
            debug!(session_id = %self.id, "stop ignored; no running process");
            return;
        }
        self.retire_current_run().await;
    }

    /// Tears the session down: the child is terminated and every artifact
    /// removed.
    pub async fn disconnect(mut self) {
        self.retire_current_run().await;
        self.remove_artifacts();
        debug!(session_id = %self.id, "session closed");
    }

    /// Terminates the current child, waits for its pump to deliver the last
    /// output and `Finished`, then drops the pty and removes the run's
    /// artifacts.
    async fn retire_current_run(&mut self) {
        if let Some(mut run) = self.current.take() {
            let grace = self.config.terminate_grace();
            let exit_code = run.child.terminate(grace).await;
            debug!(session_id = %self.id, pid = run.child.pid(), ?exit_code, "child reaped");

            // A descendant that escaped the process group can keep the pty open.
            match tokio::time::timeout(grace, &mut run.pump).await {
                Ok(Ok(())) => {}
                Ok(Err(err)) => warn!(session_id = %self.id, error = %err, "stream pump failed"),
                Err(_) => {
                    warn!(session_id = %self.id, "stream pump did not drain; abandoning it");
                    run.pump.abort();
                }
            }
        }
        self.remove_artifacts();
    }

    fn remove_artifacts(&mut self) {
        let cleanup = std::mem::take(&mut self.cleanup);
        if !cleanup.is_empty() {
            debug!(session_id = %self.id, paths = cleanup.paths().len(), "removing run artifacts");
            cleanup.remove_all();
        }
    }

    async fn emit(&mut self, event: OutboundEvent) {
        if self.events.send(event).await.is_err() {
            debug!(session_id = %self.id, "outbound channel closed; dropping event");
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        // The child handle kills on drop; only the files are left.
        self.remove_artifacts();
    }
}
