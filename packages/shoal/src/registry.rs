//! Connection Registry
//!
//! Tracks currently connected sessions and owns the broadcast-except-sender
//! delivery rule. Sessions are keyed by a per-connection UUID; the value is
//! the session's outbound event channel.

use std::collections::HashMap;
use tokio::sync::{RwLock, mpsc};

use crate::ws::ServerEvent;

#[derive(Default)]
pub struct ConnectionRegistry {
    sessions: RwLock<HashMap<String, mpsc::Sender<ServerEvent>>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, session_id: &str, tx: mpsc::Sender<ServerEvent>) {
        self.sessions
            .write()
            .await
            .insert(session_id.to_string(), tx);
    }

    pub async fn remove(&self, session_id: &str) {
        self.sessions.write().await.remove(session_id);
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Deliver an event to every registered session except the sender.
    ///
    /// Fire-and-forget: a full or closed channel loses the event for that
    /// session only and never errors the broadcast. Returns
    /// (deliveries handed off, deliveries dropped).
    pub async fn broadcast_except_sender(
        &self,
        sender_id: &str,
        event: &ServerEvent,
    ) -> (u64, u64) {
        let sessions = self.sessions.read().await;
        let mut delivered = 0;
        let mut dropped = 0;
        for (id, tx) in sessions.iter() {
            if id == sender_id {
                continue;
            }
            if tx.try_send(event.clone()).is_ok() {
                delivered += 1;
            } else {
                dropped += 1;
            }
        }
        (delivered, dropped)
    }
}
