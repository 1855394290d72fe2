//! Server metrics for observability
//!
//! Runtime counters for monitoring relay health.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// Server-wide metrics
#[derive(Debug, Default)]
pub struct ServerMetrics {
    // Connection metrics
    /// Currently active WebSocket sessions
    pub active_connections: AtomicU64,
    /// Total sessions since server start
    pub total_connections: AtomicU64,

    // Message metrics
    /// sendMessage events received from clients
    pub messages_received: AtomicU64,
    /// Broadcast deliveries handed to session channels
    pub messages_relayed: AtomicU64,
    /// Deliveries dropped because a session channel was full or closed
    pub messages_dropped: AtomicU64,
    /// Messages discarded for empty-after-trim text
    pub empty_messages_dropped: AtomicU64,

    // Error metrics
    /// Store append failures
    pub persistence_errors: AtomicU64,
    /// WebSocket transport errors
    pub websocket_errors: AtomicU64,

    /// Server start time (for uptime calculation)
    start_time: Option<Instant>,
}

impl ServerMetrics {
    pub fn new() -> Self {
        Self {
            start_time: Some(Instant::now()),
            ..Default::default()
        }
    }

    // Connection tracking
    pub fn connection_opened(&self) {
        self.active_connections.fetch_add(1, Ordering::Relaxed);
        self.total_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    // Message tracking
    pub fn message_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    pub fn messages_relayed(&self, count: u64) {
        self.messages_relayed.fetch_add(count, Ordering::Relaxed);
    }

    pub fn messages_dropped(&self, count: u64) {
        self.messages_dropped.fetch_add(count, Ordering::Relaxed);
    }

    pub fn empty_message_dropped(&self) {
        self.empty_messages_dropped.fetch_add(1, Ordering::Relaxed);
    }

    // Error tracking
    pub fn persistence_error(&self) {
        self.persistence_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn websocket_error(&self) {
        self.websocket_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.map(|t| t.elapsed().as_secs()).unwrap_or(0)
    }

    /// Create a snapshot of all metrics
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            uptime_secs: self.uptime_secs(),
            connections: ConnectionMetrics {
                active: self.active_connections.load(Ordering::Relaxed),
                total: self.total_connections.load(Ordering::Relaxed),
            },
            messages: MessageMetrics {
                received: self.messages_received.load(Ordering::Relaxed),
                relayed: self.messages_relayed.load(Ordering::Relaxed),
                dropped: self.messages_dropped.load(Ordering::Relaxed),
                empty_dropped: self.empty_messages_dropped.load(Ordering::Relaxed),
            },
            errors: ErrorMetrics {
                persistence: self.persistence_errors.load(Ordering::Relaxed),
                websocket: self.websocket_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Serializable snapshot of metrics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: ConnectionMetrics,
    pub messages: MessageMetrics,
    pub errors: ErrorMetrics,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionMetrics {
    pub active: u64,
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageMetrics {
    pub received: u64,
    pub relayed: u64,
    pub dropped: u64,
    pub empty_dropped: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorMetrics {
    pub persistence: u64,
    pub websocket: u64,
}

/// Health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    pub connections: u64,
    pub uptime_secs: u64,
}
