use axum::extract::ws::{Message, WebSocket};
use futures::{sink::SinkExt, stream::StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use crate::metrics::ServerMetrics;
use crate::relay::Relay;

use super::protocol::{ClientEvent, ServerEvent};

/// Drive one client session over its WebSocket.
///
/// Events from this session are awaited to completion (store append
/// included) before the next frame is read, which is what gives the store
/// its per-session insertion ordering. Deliveries TO this session flow
/// through the registry channel and a dedicated sender task.
pub async fn handle_session(
    socket: WebSocket,
    relay: Arc<Relay>,
    metrics: Arc<ServerMetrics>,
    send_channel_capacity: usize,
) {
    let session_id = uuid::Uuid::new_v4().to_string();
    info!(session = %session_id, "WebSocket session connected");
    metrics.connection_opened();

    let (mut ws_sender, mut ws_receiver) = socket.split();

    // Outbound channel registered with the Connection Registry
    let (tx, mut rx) = mpsc::channel::<ServerEvent>(send_channel_capacity);
    relay.connect(&session_id, tx).await;

    // Task to write queued events to the WebSocket
    let sender_task = async move {
        while let Some(event) = rx.recv().await {
            let json = match serde_json::to_string(&event) {
                Ok(j) => j,
                Err(e) => {
                    error!("Failed to serialize event: {}", e);
                    continue;
                }
            };
            if ws_sender.send(Message::Text(json.into())).await.is_err() {
                break;
            }
        }
    };

    // Task to handle incoming events
    let relay_in = relay.clone();
    let metrics_in = metrics.clone();
    let session_in = session_id.clone();
    let input_task = async move {
        while let Some(msg) = ws_receiver.next().await {
            match msg {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientEvent>(&text) {
                    Ok(ClientEvent::SendMessage {
                        user,
                        text,
                        timestamp,
                    }) => {
                        relay_in
                            .handle_send(&session_in, user, text, timestamp)
                            .await;
                    }
                    Ok(ClientEvent::Typing { username }) => {
                        relay_in.handle_typing(&session_in, &username).await;
                    }
                    Ok(ClientEvent::StopTyping { username }) => {
                        relay_in.handle_stop_typing(&session_in, &username).await;
                    }
                    Err(e) => {
                        // Malformed frames are dropped; nothing is surfaced
                        // back over the channel.
                        debug!(session = %session_in, "Ignoring unparseable client event: {}", e);
                    }
                },
                Ok(Message::Close(_)) => {
                    debug!(session = %session_in, "Client closed connection");
                    break;
                }
                Err(e) => {
                    error!(session = %session_in, "WebSocket error: {}", e);
                    metrics_in.websocket_error();
                    break;
                }
                _ => {}
            }
        }
    };

    tokio::select! {
        _ = sender_task => debug!(session = %session_id, "Sender task ended"),
        _ = input_task => debug!(session = %session_id, "Input task ended"),
    }

    // Registry cleanup is the whole disconnect story: no session state
    // survives beyond the registration.
    relay.disconnect(&session_id).await;
    metrics.connection_closed();
    info!(session = %session_id, "WebSocket session closed");
}
