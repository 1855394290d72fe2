//! Relay core
//!
//! One instance shared by all sessions. Validates and persists incoming
//! messages, then fans them out through the Connection Registry; typing
//! events are fan-out only. All handling for one event completes before the
//! session's next event is read, so the store observes a session's sends in
//! the order they arrived.

use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::metrics::ServerMetrics;
use crate::models::{ChatMessage, NewMessage};
use crate::registry::ConnectionRegistry;
use crate::repository::MessageRepository;
use crate::ws::ServerEvent;

use chrono::{DateTime, Utc};

pub struct Relay {
    repository: MessageRepository,
    registry: ConnectionRegistry,
    metrics: Arc<ServerMetrics>,
}

impl Relay {
    pub fn new(repository: MessageRepository, metrics: Arc<ServerMetrics>) -> Self {
        Self {
            repository,
            registry: ConnectionRegistry::new(),
            metrics,
        }
    }

    /// Register a session. No further per-session state is allocated.
    pub async fn connect(&self, session_id: &str, tx: mpsc::Sender<ServerEvent>) {
        self.registry.add(session_id, tx).await;
    }

    pub async fn disconnect(&self, session_id: &str) {
        self.registry.remove(session_id).await;
    }

    pub async fn session_count(&self) -> usize {
        self.registry.len().await
    }

    /// One-shot history read-through. Pure read, insertion order.
    pub async fn history(&self) -> anyhow::Result<Vec<ChatMessage>> {
        self.repository.list_all().await
    }

    /// Handle a `sendMessage` event.
    ///
    /// Empty-after-trim text is dropped silently — no store write, no
    /// broadcast, no error to the sender. Otherwise the append is awaited
    /// first, then the message goes to every other session. A failed append
    /// is logged and the live broadcast still goes out: online users may see
    /// a message that history will never return, which is the accepted
    /// trade-off rather than a bug.
    pub async fn handle_send(
        &self,
        session_id: &str,
        user: String,
        text: String,
        timestamp: Option<DateTime<Utc>>,
    ) {
        self.metrics.message_received();

        if text.trim().is_empty() {
            debug!(session = %session_id, "Dropping empty chat message");
            self.metrics.empty_message_dropped();
            return;
        }

        let message = match self
            .repository
            .append(NewMessage {
                user: user.clone(),
                text: text.clone(),
                timestamp,
            })
            .await
        {
            Ok(stored) => stored,
            Err(e) => {
                warn!(session = %session_id, "Failed to persist chat message: {e:#}");
                self.metrics.persistence_error();
                ChatMessage {
                    id: None,
                    user,
                    text,
                    timestamp: timestamp.unwrap_or_else(Utc::now),
                }
            }
        };

        self.broadcast(session_id, ServerEvent::from_message(&message))
            .await;
    }

    /// Typing events are fan-out only — nothing touches the store.
    pub async fn handle_typing(&self, session_id: &str, username: &str) {
        self.broadcast(
            session_id,
            ServerEvent::UserTyping {
                username: username.to_string(),
            },
        )
        .await;
    }

    pub async fn handle_stop_typing(&self, session_id: &str, username: &str) {
        self.broadcast(
            session_id,
            ServerEvent::UserStoppedTyping {
                username: username.to_string(),
            },
        )
        .await;
    }

    async fn broadcast(&self, sender_id: &str, event: ServerEvent) {
        let (delivered, dropped) = self
            .registry
            .broadcast_except_sender(sender_id, &event)
            .await;
        self.metrics.messages_relayed(delivered);
        if dropped > 0 {
            debug!(sender = %sender_id, dropped, "Dropped broadcast deliveries");
            self.metrics.messages_dropped(dropped);
        }
    }
}
