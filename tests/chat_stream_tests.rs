//! 端到端测试
//!
//! 启动一个假的上游聊天补全服务和真实的 chatstream 路由，通过 HTTP
//! 驱动完整链路：建连、chunk 重组、内容提取、终止事件和错误映射。

use std::net::SocketAddr;
use std::time::Duration;

use axum::{
    body::{Body, Bytes},
    extract::Path,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chatstream_lib::config::Config;
use chatstream_lib::streaming::{fragment_text, DecodedEvent};
use chatstream_lib::{build_router, AppState};
use serde_json::{json, Value};
use tokio::net::TcpListener;

const API_KEY: &str = "sk-integration";

fn content_event(text: &str) -> String {
    format!(
        "data: {}\n\n",
        json!({"id": "chatcmpl-1", "choices": [{"index": 0, "delta": {"content": text}}]})
    )
}

/// 把字节切成固定大小的小块，模拟任意网络分片
fn split_bytes(wire: &str, size: usize) -> Vec<Bytes> {
    wire.as_bytes()
        .chunks(size)
        .map(Bytes::copy_from_slice)
        .collect()
}

fn sse_response(body: Body) -> Response {
    Response::builder()
        .header("content-type", "text/event-stream")
        .body(body)
        .unwrap()
}

/// 假上游：路径第一段决定行为
async fn fake_completions(
    Path(scenario): Path<String>,
    headers: HeaderMap,
    Json(request): Json<Value>,
) -> Response {
    let expected = format!("Bearer {}", API_KEY);
    if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
        return (StatusCode::UNAUTHORIZED, "invalid api key").into_response();
    }
    assert_eq!(request["messages"][0]["role"], "user");

    if request["stream"] == json!(false) {
        return match scenario.as_str() {
            "empty" => Json(json!({"choices": []})).into_response(),
            _ => {
                let prompt = request["messages"][0]["content"].as_str().unwrap_or_default();
                Json(json!({
                    "choices": [{
                        "index": 0,
                        "message": {"role": "assistant", "content": format!("echo: {}", prompt)}
                    }]
                }))
                .into_response()
            }
        };
    }

    match scenario.as_str() {
        "ok" => {
            let wire = format!(
                "{}{}: keep-alive\n\ndata: not-json\n\n{}data: [DONE]\n\n",
                content_event("He"),
                content_event("llo"),
                content_event("，世界")
            );
            let stream = async_stream::stream! {
                for chunk in split_bytes(&wire, 7) {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    yield Ok::<_, std::io::Error>(chunk);
                }
            };
            sse_response(Body::from_stream(stream))
        }
        "no-sentinel" => sse_response(Body::from(format!(
            "{}data: {{\"choices\":[{{\"delta\":{{\"content\":\"lost",
            content_event("kept")
        ))),
        "drop" => {
            let stream = async_stream::stream! {
                yield Ok::<_, std::io::Error>(Bytes::from(content_event("partial")));
                tokio::time::sleep(Duration::from_millis(20)).await;
                yield Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "upstream gone"));
            };
            sse_response(Body::from_stream(stream))
        }
        "hang" => {
            let stream = async_stream::stream! {
                yield Ok::<_, std::io::Error>(Bytes::from(content_event("slow")));
                futures::future::pending::<()>().await;
            };
            sse_response(Body::from_stream(stream))
        }
        "overloaded" => (StatusCode::SERVICE_UNAVAILABLE, "model overloaded").into_response(),
        "broken-error" => {
            // 错误响应体读到一半连接中断
            let stream = async_stream::stream! {
                yield Ok::<_, std::io::Error>(Bytes::from_static(b"partial"));
                yield Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "gone"));
            };
            Response::builder()
                .status(StatusCode::BAD_GATEWAY)
                .body(Body::from_stream(stream))
                .unwrap()
        }
        _ => (StatusCode::NOT_FOUND, "unknown scenario").into_response(),
    }
}

async fn spawn(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// 启动假上游和 chatstream，返回 chatstream 的根地址
async fn start(scenario: &str, api_key: &str, timeout_ms: u64) -> String {
    let upstream = spawn(
        Router::new().route("/:scenario/chat/completions", post(fake_completions)),
    )
    .await;

    let mut config = Config::default();
    config.upstream.api_key = api_key.to_string();
    config.upstream.base_url = format!("http://{}/{}/", upstream, scenario);
    config.upstream.model = "test-model".to_string();
    config.stream.timeout_ms = timeout_ms;

    let state = AppState::new(&config).unwrap();
    let addr = spawn(build_router(state)).await;
    format!("http://{}/api/chat", addr)
}

/// 解析 SSE 响应体
fn parse_sse(body: &str) -> Vec<DecodedEvent> {
    body.split("\n\n")
        .filter(|raw| !raw.is_empty())
        .map(DecodedEvent::parse)
        .collect()
}

fn contents(events: &[DecodedEvent]) -> Vec<String> {
    events
        .iter()
        .filter(|e| e.event_type.is_none())
        .filter_map(|e| e.data.as_deref().and_then(fragment_text))
        .collect()
}

struct StreamReply {
    status: reqwest::StatusCode,
    headers: reqwest::header::HeaderMap,
    events: Vec<DecodedEvent>,
}

async fn post_stream(base: &str, message: &str) -> StreamReply {
    let resp = reqwest::Client::new()
        .post(format!("{}/stream", base))
        .json(&json!({ "message": message }))
        .send()
        .await
        .unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let body = resp.text().await.unwrap();
    StreamReply {
        status,
        headers,
        events: parse_sse(&body),
    }
}

#[tokio::test]
async fn test_endpoint_says_hello() {
    let base = start("ok", API_KEY, 5_000).await;
    let body = reqwest::get(format!("{}/test", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "Hello World!");
}

#[tokio::test]
async fn test_stream_reassembles_fragmented_upstream() {
    let base = start("ok", API_KEY, 5_000).await;
    let reply = post_stream(&base, "你好").await;
    let events = reply.events;

    assert_eq!(reply.status, reqwest::StatusCode::OK);
    assert_eq!(reply.headers["content-type"], "text/event-stream");
    assert_eq!(reply.headers["cache-control"], "no-cache");

    assert_eq!(contents(&events), vec!["He", "llo", "，世界"]);
    let last = events.last().unwrap();
    assert_eq!(last.event_type.as_deref(), Some("done"));
    assert_eq!(last.data.as_deref(), Some("[DONE]"));
    assert_eq!(events.len(), 4);
}

#[tokio::test]
async fn test_get_stream_route() {
    let base = start("ok", API_KEY, 5_000).await;
    let body = reqwest::Client::new()
        .get(format!("{}/getStream", base))
        .query(&[("message", "hi")])
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = parse_sse(&body);

    assert_eq!(contents(&events), vec!["He", "llo", "，世界"]);
    assert!(events.last().unwrap().is_terminal());
}

#[tokio::test]
async fn test_close_without_sentinel_ends_with_done() {
    let base = start("no-sentinel", API_KEY, 5_000).await;
    let events = post_stream(&base, "hi").await.events;

    assert_eq!(contents(&events), vec!["kept"]);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event_type.as_deref(), Some("done"));
}

#[tokio::test]
async fn test_upstream_rejection_becomes_error_event() {
    let base = start("ok", "sk-wrong", 5_000).await;
    let reply = post_stream(&base, "hi").await;
    let events = reply.events;

    assert_eq!(reply.status, reqwest::StatusCode::OK);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type.as_deref(), Some("error"));
    assert_eq!(
        events[0].data.as_deref(),
        Some("发生错误: 上游服务错误 (401): invalid api key")
    );
}

#[tokio::test]
async fn test_upstream_server_error_becomes_error_event() {
    let base = start("overloaded", API_KEY, 5_000).await;
    let events = post_stream(&base, "hi").await.events;

    assert_eq!(events.len(), 1);
    let data = events[0].data.as_deref().unwrap();
    assert!(data.starts_with("发生错误: "));
    assert!(data.contains("503"));
}

#[tokio::test]
async fn test_unreadable_error_body_keeps_status() {
    let base = start("broken-error", API_KEY, 5_000).await;
    let events = post_stream(&base, "hi").await.events;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type.as_deref(), Some("error"));
    // 解析时去掉了行尾空白
    assert_eq!(
        events[0].data.as_deref(),
        Some("发生错误: 上游服务错误 (502):")
    );
}

#[tokio::test]
async fn test_mid_stream_failure_keeps_delivered_content() {
    let base = start("drop", API_KEY, 5_000).await;
    let events = post_stream(&base, "hi").await.events;

    assert_eq!(contents(&events), vec!["partial"]);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event_type.as_deref(), Some("error"));
    assert!(events[1].data.as_deref().unwrap().starts_with("发生错误: "));
}

#[tokio::test]
async fn test_silent_upstream_times_out() {
    let base = start("hang", API_KEY, 300).await;
    let events = post_stream(&base, "hi").await.events;

    assert_eq!(contents(&events), vec!["slow"]);
    assert_eq!(events.len(), 2);
    assert_eq!(events[1].event_type.as_deref(), Some("error"));
    assert_eq!(events[1].data.as_deref(), Some("发生错误: 流式响应超时"));
}

#[tokio::test]
async fn test_blank_message_is_rejected_without_upstream_call() {
    // 上游地址无法连接，若真的发起调用会得到网络错误
    let mut config = Config::default();
    config.upstream.api_key = API_KEY.to_string();
    config.upstream.base_url = "http://127.0.0.1:1".to_string();
    let addr = spawn(build_router(AppState::new(&config).unwrap())).await;
    let base = format!("http://{}/api/chat", addr);

    let reply = post_stream(&base, "   ").await;
    let events = reply.events;
    assert_eq!(reply.status, reqwest::StatusCode::OK);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type.as_deref(), Some("error"));
    assert_eq!(events[0].data.as_deref(), Some("消息不能为空"));

    let body = reqwest::get(format!("{}/getStream", base))
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    assert_eq!(body, "event: error\ndata: 消息不能为空\n\n");

    let value: Value = reqwest::get(format!("{}/chat?message=", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(value, json!({"error": "消息不能为空"}));
}

#[tokio::test]
async fn test_non_streaming_chat() {
    let base = start("ok", API_KEY, 5_000).await;
    let value: Value = reqwest::Client::new()
        .get(format!("{}/chat", base))
        .query(&[("message", "ping")])
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(value, json!({"message": "echo: ping"}));
}

#[tokio::test]
async fn test_non_streaming_chat_without_content() {
    let base = start("empty", API_KEY, 5_000).await;
    let value: Value = reqwest::get(format!("{}/chat?message=ping", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(value, json!({"message": "未获取到有效响应"}));
}

#[tokio::test]
async fn test_non_streaming_chat_error() {
    let base = start("ok", "sk-wrong", 5_000).await;
    let value: Value = reqwest::get(format!("{}/chat?message=ping", base))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let error = value["error"].as_str().unwrap();
    assert!(error.starts_with("发生错误: "));
    assert!(error.contains("401"));
}

#[tokio::test]
async fn test_cors_allows_any_origin() {
    let base = start("ok", API_KEY, 5_000).await;
    let resp = reqwest::Client::new()
        .get(format!("{}/test", base))
        .header("origin", "http://example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()["access-control-allow-origin"]
            .to_str()
            .unwrap(),
        "*"
    );
}

#[tokio::test]
async fn test_oversized_request_body_is_rejected() {
    let base = start("ok", API_KEY, 5_000).await;
    let message = "x".repeat(chatstream_lib::server::MAX_REQUEST_BODY + 1);
    let resp = reqwest::Client::new()
        .post(format!("{}/stream", base))
        .header("origin", "http://example.com")
        .json(&json!({ "message": message }))
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(resp.headers()["access-control-allow-origin"], "*");
}
