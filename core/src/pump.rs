use std::io::ErrorKind;
use std::io::Read;
use std::time::Duration;

use coderun_protocol::OutboundEvent;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::debug;
use tracing::warn;

use crate::supervisor::ExitFuture;

/// Forwards pty output to `events` until the master reports EOF or an
/// error, then waits for the child to be reaped and sends one
/// [`OutboundEvent::Finished`].
///
/// Reads block, so they run on the blocking pool; the returned task only
/// sequences the read loop, the reap and the final event.
pub(crate) fn spawn_stream_pump(
    output: Box<dyn Read + Send>,
    exit: ExitFuture,
    events: mpsc::Sender<OutboundEvent>,
    chunk_bytes: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let reader_events = events.clone();
        let reader = tokio::task::spawn_blocking(move || {
            forward_output(output, chunk_bytes, &reader_events);
        });
        if let Err(err) = reader.await {
            warn!(error = %err, "pty reader task failed");
        }

        let exit_code = exit.await.ok().flatten();
        debug!(?exit_code, "run finished");
        // Best effort: the client may already be gone.
        let _ = events.send(OutboundEvent::Finished).await;
    })
}

fn forward_output(
    mut output: Box<dyn Read + Send>,
    chunk_bytes: usize,
    events: &mpsc::Sender<OutboundEvent>,
) {
    let mut buf = vec![0u8; chunk_bytes.max(1)];
    let mut decoder = Utf8Decoder::default();
    loop {
        match output.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => {
                let text = decoder.decode(&buf[..n]);
                if !text.is_empty() {
                    let _ = events.blocking_send(OutboundEvent::Output(text));
                }
            }
            Err(ref err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(ref err) if err.kind() == ErrorKind::WouldBlock => {
                std::thread::sleep(Duration::from_millis(5));
                continue;
            }
            // Linux reports EIO once every holder of the secondary side is gone.
            Err(err) => {
                debug!(error = %err, "pty read ended");
                break;
            }
        }
    }

    let tail = decoder.finish();
    if !tail.is_empty() {
        let _ = events.blocking_send(OutboundEvent::Output(tail));
    }
}

/// Lossy UTF-8 decoding that does not split multi-byte characters across
/// read boundaries.
#[derive(Debug, Default)]
struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let ready = self.pending.len() - incomplete_suffix_len(&self.pending);
        let text = String::from_utf8_lossy(&self.pending[..ready]).into_owned();
        self.pending.drain(..ready);
        text
    }

    fn finish(&mut self) -> String {
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        text
    }
}

/// Length of a trailing, still-incomplete UTF-8 sequence (0 to 3 bytes).
fn incomplete_suffix_len(bytes: &[u8]) -> usize {
    let window_start = bytes.len().saturating_sub(3);
    for idx in (window_start..bytes.len()).rev() {
        let byte = bytes[idx];
        if byte & 0b1100_0000 == 0b1000_0000 {
            continue;
        }
        let needed = match byte {
            0xC2..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF4 => 4,
            _ => return 0,
        };
        let available = bytes.len() - idx;
        return if available < needed { available } else { 0 };
    }
    0
}
