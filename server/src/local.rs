//! Drives a single session from the local terminal.

use std::io::BufRead;
use std::path::Path;
use std::process::ExitCode;

use anyhow::Context;
use coderun_core::Engine;
use coderun_core::RunOutcome;
use coderun_protocol::Language;
use coderun_protocol::OutboundEvent;
use tokio::io::AsyncWrite;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;
use tracing::debug;

/// Runs `file` to completion, relaying this process's stdin to the program
/// and its terminal output to stdout. Ctrl+C stops the program.
pub async fn run_file(
    engine: &Engine,
    file: &Path,
    language: Option<Language>,
) -> anyhow::Result<ExitCode> {
    let language = match language {
        Some(language) => language,
        None => Language::from_path(file).with_context(|| {
            format!(
                "cannot tell the language of {} from its extension; pass --language",
                file.display()
            )
        })?,
    };
    let source = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let (mut session, mut events) = engine.open_session();
    let mut stdout = tokio::io::stdout();
    let outcome = session.run(&language.to_string(), &source).await;
    if outcome == RunOutcome::Rejected {
        if let Ok(OutboundEvent::Output(text)) = events.try_recv() {
            write_output(&mut stdout, &text).await?;
            write_output(&mut stdout, "\n").await?;
        }
        session.disconnect().await;
        return Ok(ExitCode::FAILURE);
    }

    let mut stdin_lines = spawn_stdin_reader();
    let mut stdin_open = true;
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(OutboundEvent::Output(text)) => write_output(&mut stdout, &text).await?,
                Some(OutboundEvent::Finished) | None => break,
            },
            line = stdin_lines.recv(), if stdin_open => match line {
                Some(line) => session.input(&line),
                None => stdin_open = false,
            },
            _ = tokio::signal::ctrl_c() => {
                debug!("interrupted; stopping run");
                session.stop().await;
            }
        }
    }

    session.disconnect().await;
    Ok(if outcome == RunOutcome::Started {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

async fn write_output<W>(out: &mut W, text: &str) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
{
    out.write_all(text.as_bytes()).await?;
    out.flush().await?;
    Ok(())
}

/// Reads stdin on a detached thread; a blocked read must not hold up
/// runtime shutdown once the run is over.
fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut handle = stdin.lock();
        loop {
            let mut line = String::new();
            match handle.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}
