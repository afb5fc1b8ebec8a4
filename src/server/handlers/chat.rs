//! 聊天接口处理器
//!
//! 流式接口总是返回 200 和 SSE 响应体；失败以 `error` 事件的形式出现
//! 在流中。非流式接口同样返回 200，用 `error` 字段表示失败。

use axum::{
    body::{Body, Bytes},
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{stream, Stream, StreamExt};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

use crate::server::AppState;
use crate::streaming::outbound::ERROR_PREFIX;
use crate::streaming::OutboundEvent;

/// 空消息的提示
pub const EMPTY_MESSAGE_ERROR: &str = "消息不能为空";

#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ChatQuery {
    #[serde(default)]
    pub message: Option<String>,
}

/// 取出非空白消息
fn non_blank(message: Option<String>) -> Option<String> {
    message.filter(|m| !m.trim().is_empty())
}

pub async fn test() -> &'static str {
    "Hello World!"
}

/// POST /api/chat/stream
pub async fn stream_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Response {
    open_stream(&state, request.message)
}

/// GET /api/chat/getStream?message=...
pub async fn stream_get_chat(
    State(state): State<AppState>,
    Query(query): Query<ChatQuery>,
) -> Response {
    open_stream(&state, query.message)
}

fn open_stream(state: &AppState, message: Option<String>) -> Response {
    match non_blank(message) {
        Some(message) => build_sse_response(state.open_chat_stream(&message)),
        None => {
            warn!("拒绝空消息的流式请求");
            build_sse_response(stream::iter([OutboundEvent::rejected(EMPTY_MESSAGE_ERROR)]))
        }
    }
}

/// GET /api/chat/chat?message=...
pub async fn chat(State(state): State<AppState>, Query(query): Query<ChatQuery>) -> Response {
    let Some(message) = non_blank(query.message) else {
        return Json(json!({ "error": EMPTY_MESSAGE_ERROR })).into_response();
    };

    info!(model = %state.client.model(), "开始非流式调用");
    match state.client.chat(&message).await {
        Ok(content) => Json(json!({ "message": content })).into_response(),
        Err(e) => {
            warn!(error_type = e.error_type(), error = %e, "非流式调用失败");
            Json(json!({ "error": format!("{}{}", ERROR_PREFIX, e) })).into_response()
        }
    }
}

/// 把事件流包装成 SSE 响应
pub fn build_sse_response<S>(events: S) -> Response
where
    S: Stream<Item = OutboundEvent> + Send + 'static,
{
    let body_stream =
        events.map(|event| -> Result<Bytes, std::io::Error> { Ok(Bytes::from(event.to_sse())) });

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, "text/event-stream")
        .header(header::CACHE_CONTROL, "no-cache")
        .header(header::CONNECTION, "keep-alive")
        .header("X-Accel-Buffering", "no")
        .body(Body::from_stream(body_stream))
        .unwrap_or_else(|_| {
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({"error": "Failed to build streaming response"})),
            )
                .into_response()
        })
}
