//! WebSocket upgrade handler

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::app::AppState;
use crate::game::{Command, SessionId};
use crate::util::rate_limit::PlayerRateLimiter;
use crate::ws::protocol::ClientMsg;

/// WebSocket upgrade handler
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, state: AppState) {
    let session_id = SessionId::new_v4();
    info!(session_id = %session_id, "New WebSocket connection");

    let (ws_sink, ws_stream) = socket.split();
    let (outbound_tx, outbound_rx) = mpsc::channel::<Arc<str>>(state.config.outbound_queue);

    let commands = state.arena.command_tx.clone();
    if commands
        .send(Command::Connect {
            session_id,
            outbound: outbound_tx,
        })
        .await
        .is_err()
    {
        error!(session_id = %session_id, "Game loop is not running, closing connection");
        return;
    }

    let mut writer_handle = tokio::spawn(write_loop(
        session_id,
        ws_sink,
        outbound_rx,
        state.config.send_timeout,
    ));

    let rate_limiter = PlayerRateLimiter::new(state.config.input_rate_limit);

    // Whichever side finishes first ends the session
    tokio::select! {
        _ = read_loop(session_id, ws_stream, &commands, &rate_limiter) => {}
        _ = &mut writer_handle => {
            debug!(session_id = %session_id, "Writer finished first");
        }
    }

    // Signal disconnect to the game loop
    let _ = commands.send(Command::Disconnect { session_id }).await;

    writer_handle.abort();

    info!(session_id = %session_id, "WebSocket connection closed");
}

/// Reader loop: WebSocket -> game loop commands
async fn read_loop(
    session_id: SessionId,
    mut ws_stream: SplitStream<WebSocket>,
    commands: &mpsc::Sender<Command>,
    rate_limiter: &PlayerRateLimiter,
) {
    while let Some(result) = ws_stream.next().await {
        match result {
            Ok(Message::Text(text)) => {
                if !rate_limiter.check_input() {
                    warn!(session_id = %session_id, "Rate limited client message");
                    continue;
                }

                let command = match serde_json::from_str::<ClientMsg>(&text) {
                    Ok(client_msg) => to_command(session_id, client_msg),
                    Err(e) => {
                        warn!(session_id = %session_id, error = %e, "Failed to parse client message");
                        continue;
                    }
                };

                if commands.send(command).await.is_err() {
                    debug!(session_id = %session_id, "Command channel closed");
                    break;
                }
            }
            Ok(Message::Binary(_)) => {
                warn!(session_id = %session_id, "Received binary message, ignoring");
            }
            Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
            Ok(Message::Close(_)) => {
                info!(session_id = %session_id, "Client initiated close");
                break;
            }
            Err(e) => {
                debug!(session_id = %session_id, error = %e, "WebSocket error");
                break;
            }
        }
    }
}

/// Writer loop: outbound queue -> WebSocket, each send under a deadline
async fn write_loop(
    session_id: SessionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut outbound_rx: mpsc::Receiver<Arc<str>>,
    send_timeout: Duration,
) {
    while let Some(payload) = outbound_rx.recv().await {
        let send = ws_sink.send(Message::Text(payload.to_string()));
        match tokio::time::timeout(send_timeout, send).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                break;
            }
            Err(_) => {
                warn!(
                    session_id = %session_id,
                    timeout_ms = send_timeout.as_millis() as u64,
                    "Send deadline exceeded, dropping session"
                );
                break;
            }
        }
    }

    let _ = tokio::time::timeout(send_timeout, ws_sink.close()).await;
}

fn to_command(session_id: SessionId, msg: ClientMsg) -> Command {
    match msg {
        ClientMsg::Join { name } => Command::Join { session_id, name },
        ClientMsg::Input {
            mouse_pos: [target_x, target_y],
        } => Command::Input {
            session_id,
            target_x,
            target_y,
        },
    }
}
