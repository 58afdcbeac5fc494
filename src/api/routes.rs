//! REST endpoints: message creation and health.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::envelope::CreationRequest;
use crate::error::PublishError;
use crate::publisher::Publisher;

/// Shared state for the API routes.
#[derive(Clone)]
pub struct ApiState {
    pub publisher: Arc<Publisher>,
}

/// Build the Axum router with message and health routes.
pub fn api_routes(publisher: Arc<Publisher>) -> Router {
    Router::new()
        .route("/messages", post(create_message))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(ApiState { publisher })
}

// ── Health ──────────────────────────────────────────────────────────────

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}

// ── Messages ────────────────────────────────────────────────────────────

/// POST /messages
///
/// Body `{"type": "...", "payload": {...}}`. Returns `201 {"id"}`.
async fn create_message(
    State(state): State<ApiState>,
    body: Result<Json<CreationRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            warn!(error = %rejection, "Rejected message request");
            return error_response(StatusCode::BAD_REQUEST, "Invalid message format");
        }
    };

    match state.publisher.publish(request).await {
        Ok(created) => (StatusCode::CREATED, Json(created)).into_response(),
        Err(PublishError::InvalidRequest(reason)) => {
            warn!(reason = %reason, "Rejected message request");
            error_response(StatusCode::BAD_REQUEST, "Invalid message format")
        }
        Err(e) => {
            error!(error = %e, "Failed to publish message");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "Failed to send message")
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    (status, Json(serde_json::json!({ "error": message }))).into_response()
}

#[cfg(test)]
mod tests {
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use super::*;
    use crate::envelope;
    use crate::log::{MESSAGE_TYPE_HEADER, MemoryBroker, RequiredAcks};

    fn app(broker: &MemoryBroker) -> Router {
        let publisher = Publisher::new(Box::new(broker.writer("notifications", RequiredAcks::One)));
        api_routes(Arc::new(publisher))
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn post_json(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/messages")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let broker = MemoryBroker::new(1);
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let (status, body) = send(app(&broker), request).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
        assert_eq!(broker.len("notifications").await, 0);
    }

    #[tokio::test]
    async fn create_message_returns_id_and_publishes() {
        let broker = MemoryBroker::new(1);
        let body = r#"{"type":"notification","payload":{"chatId":123456,"text":"hi"}}"#;

        let (status, body) = send(app(&broker), post_json(body)).await;

        assert_eq!(status, StatusCode::CREATED);
        let id = body["id"].as_str().unwrap();
        let records = broker.snapshot("notifications").await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].key_str(), id);
        assert_eq!(records[0].header(MESSAGE_TYPE_HEADER), Some(&b"notification"[..]));
        assert_eq!(envelope::decode(&records[0].value).unwrap().id(), id);
    }

    #[tokio::test]
    async fn malformed_json_is_bad_request() {
        let broker = MemoryBroker::new(1);

        let (status, body) = send(app(&broker), post_json("{not json")).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Invalid message format"}));
        assert_eq!(broker.len("notifications").await, 0);
    }

    #[tokio::test]
    async fn missing_type_or_payload_is_bad_request() {
        for body in [r#"{"payload":{"a":1}}"#, r#"{"type":"notification"}"#, "{}"] {
            let broker = MemoryBroker::new(1);
            let (status, response) = send(app(&broker), post_json(body)).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "body {body}");
            assert_eq!(response["error"], "Invalid message format");
            assert_eq!(broker.len("notifications").await, 0);
        }
    }

    #[tokio::test]
    async fn write_failure_is_internal_error() {
        let broker = MemoryBroker::new(1);
        let router = app(&broker);
        broker.close();

        let body = r#"{"type":"notification","payload":{"chatId":1,"text":"x"}}"#;
        let (status, body) = send(router, post_json(body)).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({"error": "Failed to send message"}));
    }
}
