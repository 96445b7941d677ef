//! Launches planned commands on a fresh pseudo-terminal and owns their
//! termination.

use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use futures::FutureExt;
use futures::future::Shared;
use portable_pty::ChildKiller;
use portable_pty::CommandBuilder;
use portable_pty::PtySize;
use portable_pty::native_pty_system;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::planner::ExecutionPlan;

const PTY_SIZE: PtySize = PtySize {
    rows: 24,
    cols: 80,
    pixel_width: 0,
    pixel_height: 0,
};

#[derive(Debug, Error)]
pub enum SupervisorError {
    #[error("failed to allocate pseudo-terminal: {0}")]
    OpenPty(#[source] anyhow::Error),
    #[error("failed to attach to pseudo-terminal: {0}")]
    Attach(#[source] anyhow::Error),
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: anyhow::Error,
    },
}

/// Resolves once the child has been reaped, with its exit code when known.
pub type ExitFuture = Shared<oneshot::Receiver<Option<u32>>>;

/// Everything produced by a successful launch. The session keeps `child` and
/// `input`; `output` goes to the stream pump.
pub struct LaunchedProcess {
    pub child: ChildHandle,
    pub input: PtyInput,
    pub output: Box<dyn Read + Send>,
}

/// Spawns `plan` with the pty's secondary side as stdin, stdout and stderr.
///
/// The parent's copy of the secondary side is dropped before returning so
/// the master reports EOF once the child and its descendants are gone.
pub fn launch(plan: &ExecutionPlan, cwd: &Path) -> Result<LaunchedProcess, SupervisorError> {
    let pty_system = native_pty_system();
    let pair = pty_system
        .openpty(PTY_SIZE)
        .map_err(SupervisorError::OpenPty)?;

    // Attach before spawning so a failure here never leaves an orphan.
    let output = pair
        .master
        .try_clone_reader()
        .map_err(SupervisorError::Attach)?;
    let writer = pair.master.take_writer().map_err(SupervisorError::Attach)?;

    let mut command = CommandBuilder::new(plan.program());
    command.args(plan.args());
    command.cwd(cwd);

    let mut child = pair
        .slave
        .spawn_command(command)
        .map_err(|source| SupervisorError::Spawn {
            program: plan.program().to_string(),
            source,
        })?;
    drop(pair.slave);

    let pid = child.process_id();
    let killer = child.clone_killer();
    info!(pid, program = plan.program(), "launched child on pty");

    let (exit_tx, exit_rx) = oneshot::channel::<Option<u32>>();
    let reaped = Arc::new(AtomicBool::new(false));
    let waiter_reaped = Arc::clone(&reaped);
    tokio::task::spawn_blocking(move || {
        let result = child.wait();
        // Once waited on, the pid may be reused; stop signalling it.
        waiter_reaped.store(true, Ordering::Release);
        let code = match result {
            Ok(status) => Some(status.exit_code()),
            Err(err) => {
                warn!(pid, error = %err, "failed to wait for child");
                None
            }
        };
        debug!(pid, ?code, "child reaped");
        let _ = exit_tx.send(code);
    });

    Ok(LaunchedProcess {
        child: ChildHandle {
            pid,
            killer,
            exit: exit_rx.shared(),
            reaped,
        },
        input: PtyInput::spawn(writer),
        output,
    })
}

#[derive(Debug, Clone, Copy)]
enum StopSignal {
    Terminate,
    Kill,
}

/// Exclusive handle to one launched child.
pub struct ChildHandle {
    pid: Option<u32>,
    killer: Box<dyn ChildKiller + Send + Sync>,
    exit: ExitFuture,
    reaped: Arc<AtomicBool>,
}

impl ChildHandle {
    pub fn pid(&self) -> Option<u32> {
        self.pid
    }

    pub fn exit_future(&self) -> ExitFuture {
        self.exit.clone()
    }

    pub fn has_exited(&self) -> bool {
        self.is_reaped() || self.exit.clone().now_or_never().is_some()
    }

    fn is_reaped(&self) -> bool {
        self.reaped.load(Ordering::Acquire)
    }

    /// Asks the child to stop and waits until it has been reaped.
    ///
    /// SIGTERM goes first; if the child is still alive after `grace` it is
    /// killed outright and waited for again.
    pub async fn terminate(&mut self, grace: Duration) -> Option<u32> {
        if let Some(result) = self.exit.clone().now_or_never() {
            return result.ok().flatten();
        }

        debug!(pid = self.pid, "requesting child termination");
        self.signal(StopSignal::Terminate);
        match tokio::time::timeout(grace, self.exit.clone()).await {
            Ok(result) => result.ok().flatten(),
            Err(_) => {
                warn!(
                    pid = self.pid,
                    grace_ms = grace.as_millis() as u64,
                    "child still running after grace period; killing"
                );
                self.signal(StopSignal::Kill);
                self.exit.clone().await.ok().flatten()
            }
        }
    }

    #[cfg(unix)]
    fn signal(&mut self, signal: StopSignal) {
        if self.is_reaped() {
            debug!(pid = self.pid, ?signal, "child already reaped; not signalling");
            return;
        }
        let Some(pid) = self.pid else {
            self.fallback_kill();
            return;
        };
        let raw = match signal {
            StopSignal::Terminate => libc::SIGTERM,
            StopSignal::Kill => libc::SIGKILL,
        };
        let pid = pid as libc::pid_t;
        // The pty child leads its own session, so its pid names its process
        // group; signalling the group reaches anything it forked.
        let delivered = unsafe { libc::kill(-pid, raw) } == 0 || unsafe { libc::kill(pid, raw) } == 0;
        if !delivered {
            debug!(pid, ?signal, "signal not delivered; child likely already gone");
        }
    }

    #[cfg(not(unix))]
    fn signal(&mut self, _signal: StopSignal) {
        if !self.is_reaped() {
            self.fallback_kill();
        }
    }

    fn fallback_kill(&mut self) {
        if let Err(err) = self.killer.kill() {
            debug!(pid = self.pid, error = %err, "failed to kill child");
        }
    }
}

impl Drop for ChildHandle {
    fn drop(&mut self) {
        if !self.has_exited() {
            self.signal(StopSignal::Kill);
        }
    }
}

/// Write side of the pty master.
///
/// Writes are queued without bound to a blocking task, which waits on the
/// kernel's pty buffer when the child is not reading. Nothing is dropped
/// while the writer is alive. The reader and writer each hold their own handle
/// on the master, so it stays open until both are gone.
pub struct PtyInput {
    sender: mpsc::UnboundedSender<Vec<u8>>,
}

impl PtyInput {
    fn spawn(mut writer: Box<dyn Write + Send>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel::<Vec<u8>>();
        tokio::task::spawn_blocking(move || {
            while let Some(bytes) = receiver.blocking_recv() {
                if let Err(err) = writer.write_all(&bytes).and_then(|()| writer.flush()) {
                    debug!(error = %err, "pty write failed; dropping further input");
                    break;
                }
            }
        });
        Self { sender }
    }

    /// Queues `text` for the child's stdin, byte for byte.
    pub fn write(&self, text: &str) {
        if text.is_empty() {
            return;
        }
        if self.sender.send(text.as_bytes().to_vec()).is_err() {
            debug!("pty writer closed; dropping input");
        }
    }
}
