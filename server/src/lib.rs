//! WebSocket front end: one engine session per connection.

use std::sync::Arc;

use axum::Router;
use axum::extract::State;
use axum::extract::ws::Message;
use axum::extract::ws::WebSocket;
use axum::extract::ws::WebSocketUpgrade;
use axum::response::IntoResponse;
use axum::routing::get;
use coderun_core::Engine;
use coderun_protocol::ClientCommand;
use coderun_protocol::OutboundEvent;
use futures::SinkExt;
use futures::StreamExt;
use futures::stream::SplitSink;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::debug;
use tracing::info;
use tracing::warn;

pub mod local;

pub const EXECUTE_PATH: &str = "/ws/execute/";
pub const HEALTH_PATH: &str = "/health";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .route(EXECUTE_PATH, get(execute))
        .route(HEALTH_PATH, get(health))
        .with_state(engine)
}

/// Serves until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, engine: Arc<Engine>, shutdown: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = ()> + Send + 'static,
{
    info!(addr = %listener.local_addr()?, "listening");
    axum::serve(listener, router(engine))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Resolves on Ctrl+C or, on unix, SIGTERM.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(error = %err, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("received Ctrl+C, shutting down"),
        _ = terminate => info!("received SIGTERM, shutting down"),
    }
}

async fn health() -> &'static str {
    "ok"
}

async fn execute(State(engine): State<Arc<Engine>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, engine))
}

async fn handle_socket(socket: WebSocket, engine: Arc<Engine>) {
    let (sink, mut stream) = socket.split();
    let (mut session, events) = engine.open_session();
    let session_id = session.id();
    info!(session_id = %session_id, "client connected");

    let writer = tokio::spawn(forward_events(events, sink));

    while let Some(frame) = stream.next().await {
        let message = match frame {
            Ok(message) => message,
            Err(err) => {
                debug!(session_id = %session_id, error = %err, "websocket receive failed");
                break;
            }
        };
        match message {
            Message::Text(text) => match decode_command(text.as_str()) {
                Some(command) => session.handle(command).await,
                None => warn!(session_id = %session_id, "ignoring malformed frame"),
            },
            Message::Close(_) => break,
            Message::Binary(_) => debug!(session_id = %session_id, "ignoring binary frame"),
            Message::Ping(_) | Message::Pong(_) => {}
        }
    }

    session.disconnect().await;
    // Every sender is gone now, so the writer drains what is left and exits.
    if let Err(err) = writer.await {
        warn!(session_id = %session_id, error = %err, "event writer failed");
    }
    info!(session_id = %session_id, "client disconnected");
}

async fn forward_events(
    mut events: mpsc::Receiver<OutboundEvent>,
    mut sink: SplitSink<WebSocket, Message>,
) {
    let mut connected = true;
    while let Some(event) = events.recv().await {
        if !connected {
            continue;
        }
        if let Err(err) = sink.send(Message::Text(event.to_json().into())).await {
            // Keep draining so producers never block on a dead client.
            debug!(error = %err, "websocket send failed");
            connected = false;
        }
    }
    let _ = sink.close().await;
}

fn decode_command(text: &str) -> Option<ClientCommand> {
    match ClientCommand::from_json(text) {
        Ok(command) => Some(command),
        Err(err) => {
            debug!(error = %err, frame = text, "failed to decode client frame");
            None
        }
    }
}
