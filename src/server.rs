use crate::logging::{RequestLogger, SharedLogger};
use crate::provider::ChatProvider;
use crate::relay;
use crate::translate::chat_types::{ChatRequest, ErrorResponse};
use crate::translate::openai_types::ProviderMessage;
use crate::translate::request::to_provider_messages;

use axum::body::Body;
use axum::extract::State;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use bytes::Bytes;
use serde_json::error::Category;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";
pub const REQUEST_ID_HEADER: &str = "x-request-id";

#[derive(Clone)]
pub struct AppState {
    pub provider: Arc<dyn ChatProvider>,
    pub logger: SharedLogger,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_health))
        .route("/api/v1/chat/", post(handle_chat))
        .route("/api/v1/chat", post(handle_chat))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn handle_chat(State(state): State<Arc<AppState>>, body: Bytes) -> Response {
    let request_id = uuid::Uuid::new_v4().simple().to_string();
    let log = state.logger.for_request(request_id.as_str());

    let req: ChatRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            log.warn("server", format!("Rejected request body: {}", e));
            return with_request_id(reject(&e), &request_id);
        }
    };

    log.info(
        "server",
        format!(
            "Request: streaming={} messages={} system_prompt={}",
            req.stream,
            req.messages.len(),
            req.system_prompt.as_deref().is_some_and(|p| !p.is_empty())
        ),
    );

    let messages = to_provider_messages(&req.messages, req.system_prompt.as_deref());

    let response = if req.stream {
        handle_streaming(&state, messages, log)
    } else {
        handle_non_streaming(&state, &messages, &log).await
    };
    with_request_id(response, &request_id)
}

async fn handle_non_streaming(
    state: &AppState,
    messages: &[ProviderMessage],
    log: &RequestLogger,
) -> Response {
    let resp = relay::complete(state.provider.as_ref(), messages, log).await;
    Json(resp).into_response()
}

fn handle_streaming(state: &AppState, messages: Vec<ProviderMessage>, log: RequestLogger) -> Response {
    let chunks = relay::relay_stream(state.provider.clone(), messages, log);

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(relay::ndjson_body(chunks)))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}

/// 400 for bodies that are not JSON, 422 for JSON of the wrong shape.
fn reject(e: &serde_json::Error) -> Response {
    let status = match e.classify() {
        Category::Data => StatusCode::UNPROCESSABLE_ENTITY,
        Category::Io | Category::Syntax | Category::Eof => StatusCode::BAD_REQUEST,
    };
    let err = ErrorResponse::new(format!("Invalid request body: {}", e), status.as_u16());
    (status, Json(err)).into_response()
}

fn with_request_id(mut response: Response, request_id: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

async fn handle_health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "message": "Service is running",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
