use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use tracing::error;

use crate::AppState;

/// One-shot history query: the full message log, ascending. This is the only
/// path with a structured HTTP error — a store failure maps to 500 with a
/// generic body, never a detailed one.
pub async fn list_messages(State(state): State<AppState>) -> Response {
    match state.relay.history().await {
        Ok(messages) => Json(messages).into_response(),
        Err(e) => {
            error!("Failed to load message history: {e:#}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "internal server error" })),
            )
                .into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerConfig;
    use crate::db::Database;
    use crate::identity::AcceptAsserted;
    use crate::metrics::ServerMetrics;
    use crate::models::NewMessage;
    use crate::relay::Relay;
    use crate::repository::MessageRepository;
    use axum::{Router, body::Body, http::Request, routing::get};
    use sqlx::sqlite::SqlitePoolOptions;
    use std::sync::Arc;
    use tower::ServiceExt;

    async fn test_state() -> (AppState, MessageRepository) {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .expect("in-memory pool");
        crate::db::run_migrations(&pool).await.expect("migrations");

        let repository = MessageRepository::new(pool.clone());
        let metrics = Arc::new(ServerMetrics::new());
        let state = AppState {
            relay: Arc::new(Relay::new(repository.clone(), metrics.clone())),
            metrics,
            server_config: Arc::new(ServerConfig {
                allowed_origin: "http://localhost:5173".to_string(),
                send_channel_capacity: 100,
            }),
            verifier: Arc::new(AcceptAsserted),
            db: Arc::new(Database { pool }),
        };
        (state, repository)
    }

    #[tokio::test]
    async fn messages_endpoint_returns_ascending_wire_format() {
        let (state, repository) = test_state().await;
        repository
            .append(NewMessage {
                user: "Alice".to_string(),
                text: "first".to_string(),
                timestamp: None,
            })
            .await
            .unwrap();
        repository
            .append(NewMessage {
                user: "Bob".to_string(),
                text: "second".to_string(),
                timestamp: None,
            })
            .await
            .unwrap();

        let app = Router::new()
            .route("/messages", get(list_messages))
            .with_state(state);

        let response = app
            .oneshot(Request::get("/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let arr = body.as_array().unwrap();
        assert_eq!(arr.len(), 2);
        assert_eq!(arr[0]["user"], "Alice");
        assert_eq!(arr[0]["text"], "first");
        assert_eq!(arr[1]["text"], "second");
        // Wire shape is exactly {user, text, timestamp}
        assert_eq!(arr[0].as_object().unwrap().len(), 3);
        assert!(arr[0]["timestamp"].is_string());
    }

    #[tokio::test]
    async fn messages_endpoint_is_empty_array_on_fresh_store() {
        let (state, _repository) = test_state().await;

        let app = Router::new()
            .route("/messages", get(list_messages))
            .with_state(state);

        let response = app
            .oneshot(Request::get("/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!([]));
    }

    #[tokio::test]
    async fn messages_endpoint_maps_store_failure_to_500() {
        let (state, _repository) = test_state().await;
        // Break the store out from under the relay
        state.db.pool.close().await;

        let app = Router::new()
            .route("/messages", get(list_messages))
            .with_state(state);

        let response = app
            .oneshot(Request::get("/messages").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body, serde_json::json!({ "error": "internal server error" }));
    }
}
