//! HTTP 服务器
//!
//! 路由挂在 `/api/chat` 下，所有来源均可跨域访问。

pub mod handlers;

use crate::config::Config;
use crate::providers::{ChatCompletionsClient, ProviderError};
use crate::streaming::{ManagedStream, StreamContext, StreamManager};
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

/// 请求体大小上限
pub const MAX_REQUEST_BODY: usize = 1024 * 1024;

/// 应用状态
///
/// 只包含不可变的共享对象；每个请求的管道状态都在 [`ManagedStream`] 中。
#[derive(Clone)]
pub struct AppState {
    pub client: Arc<ChatCompletionsClient>,
    pub stream_manager: Arc<StreamManager>,
}

impl AppState {
    pub fn new(config: &Config) -> Result<Self, ProviderError> {
        let client =
            ChatCompletionsClient::new(config.upstream.clone(), config.stream.timeout_duration())?;

        Ok(Self {
            client: Arc::new(client),
            stream_manager: Arc::new(StreamManager::new(config.stream.clone())),
        })
    }

    /// 为一条用户消息建立流式管道
    pub fn open_chat_stream(&self, message: &str) -> ManagedStream {
        let context = StreamContext::new(self.client.model());
        tracing::info!(
            request_id = %context.request_id,
            model = %context.model,
            message_len = message.chars().count(),
            "开始流式调用"
        );
        let source = self.client.stream_chat(message);
        self.stream_manager.handle_stream(context, source)
    }
}

/// 构建路由
pub fn build_router(state: AppState) -> Router {
    let chat_routes = Router::new()
        .route("/test", get(handlers::test))
        .route("/stream", post(handlers::stream_chat))
        .route("/getStream", get(handlers::stream_get_chat))
        .route("/chat", get(handlers::chat));

    Router::new()
        .nest("/api/chat", chat_routes)
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY)),
        )
        .with_state(state)
}
