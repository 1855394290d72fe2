use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::Row;

use crate::models::{ChatMessage, NewMessage};

use super::MessageRepository;

impl MessageRepository {
    /// Append a message to the log. When the caller supplied no timestamp the
    /// store assigns one at insertion. Returns the stored row.
    pub async fn append(&self, msg: NewMessage) -> Result<ChatMessage> {
        let timestamp = msg.timestamp.unwrap_or_else(Utc::now);

        let result = sqlx::query(
            r#"
            INSERT INTO chat_messages (user, text, timestamp)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(&msg.user)
        .bind(&msg.text)
        .bind(timestamp)
        .execute(&self.pool)
        .await
        .context("Failed to insert chat message")?;

        Ok(ChatMessage {
            id: Some(result.last_insert_rowid()),
            user: msg.user,
            text: msg.text,
            timestamp,
        })
    }

    /// The full message log in insertion order (oldest first). Pure read.
    pub async fn list_all(&self) -> Result<Vec<ChatMessage>> {
        let rows = sqlx::query(
            r#"
            SELECT id, user, text, timestamp
            FROM chat_messages
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to read chat history")?;

        Ok(rows
            .into_iter()
            .map(|r| ChatMessage {
                id: r.get("id"),
                user: r.get("user"),
                text: r.get("text"),
                timestamp: r.get::<DateTime<Utc>, _>("timestamp"),
            })
            .collect())
    }
}
