use axum::{
    extract::{Query, State, WebSocketUpgrade},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::warn;

use crate::AppState;
use crate::identity::IdentityClaim;
use crate::ws;

/// Upgrade to the persistent channel. The connect-time identity claim rides
/// the query string; when the configured verifier rejects it the upgrade is
/// refused outright.
pub async fn websocket_handler(
    State(state): State<AppState>,
    Query(claim): Query<IdentityClaim>,
    ws: WebSocketUpgrade,
) -> Response {
    if !state.verifier.verify(&claim) {
        warn!(
            user = %claim.user.as_deref().unwrap_or("anonymous"),
            "Rejected WebSocket handshake: identity claim failed verification"
        );
        return StatusCode::UNAUTHORIZED.into_response();
    }

    let relay = state.relay.clone();
    let metrics = state.metrics.clone();
    let capacity = state.server_config.send_channel_capacity;

    ws.on_upgrade(move |socket| ws::handle_session(socket, relay, metrics, capacity))
}
