use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A chat message as the store holds it.
///
/// `id` is the store rowid — internal bookkeeping only, never part of the
/// wire format (history responses and `receiveMessage` events both carry
/// `{user, text, timestamp}`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(skip)]
    pub id: Option<i64>,
    pub user: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// An incoming message the store has not seen yet. The timestamp is whatever
/// the client attached; the store assigns one at insertion when absent.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub user: String,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
}
