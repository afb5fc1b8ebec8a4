//! 聊天补全接口客户端（OpenAI 兼容 API）
//!
//! 流式调用返回惰性的 [`StreamResponse`]：请求在第一次被轮询时才真正
//! 发出，因此整体超时覆盖建连和等待响应头的时间。
use crate::config::UpstreamConfig;
use crate::models::openai::{ChatCompletionRequest, ChatCompletionResponse};
use crate::providers::error::{truncate_message, ProviderError};
use crate::streaming::{reqwest_stream_to_stream_response, StreamError, StreamResponse};
use futures::TryFutureExt;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// 上游没有返回可用文本时的回复
pub const NO_VALID_RESPONSE: &str = "未获取到有效响应";

/// 错误响应体写入错误事件时保留的最大长度
const MAX_ERROR_BODY: usize = 200;

pub struct ChatCompletionsClient {
    config: UpstreamConfig,
    client: Client,
    /// 非流式调用的时间预算；流式调用由管道自己计时
    request_timeout: Duration,
}

impl ChatCompletionsClient {
    pub fn new(config: UpstreamConfig, request_timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::ConfigurationError(format!("HTTP 客户端创建失败: {}", e)))?;

        Ok(Self {
            config,
            client,
            request_timeout,
        })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    /// 完整的接口地址
    pub fn endpoint(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    pub fn build_request(&self, message: &str, stream: bool) -> ChatCompletionRequest {
        ChatCompletionRequest::single_turn(&self.config.model, message, stream)
    }

    fn post(&self, request: &ChatCompletionRequest) -> RequestBuilder {
        self.client
            .post(self.endpoint())
            .header(AUTHORIZATION, format!("Bearer {}", self.config.api_key))
            .header(CONTENT_TYPE, "application/json")
            .json(request)
    }

    /// 发起流式调用
    ///
    /// 连接失败和非 2xx 状态码都作为字节流的唯一一个错误项出现，
    /// 不做重试。
    pub fn stream_chat(&self, message: &str) -> StreamResponse {
        let request = self.build_request(message, true);
        let builder = self.post(&request).header(ACCEPT, "text/event-stream");
        let url = self.endpoint();
        let model = request.model;

        let connect = async move {
            info!(url = %url, model = %model, "发起流式请求");

            let resp = builder.send().await.map_err(|e| {
                error!(url = %url, error = %e, "流式请求发送失败");
                StreamError::from(e)
            })?;

            let status = resp.status();
            if !status.is_success() {
                let body = error_body(resp).await;
                error!(status = status.as_u16(), body = %body, "上游返回错误状态");
                return Err(StreamError::provider_error(
                    status.as_u16(),
                    truncate_message(&body, MAX_ERROR_BODY),
                ));
            }

            info!(status = status.as_u16(), "流式响应开始");
            Ok::<StreamResponse, StreamError>(reqwest_stream_to_stream_response(resp))
        };

        Box::pin(connect.try_flatten_stream())
    }

    /// 非流式调用，返回第一个候选的完整文本
    pub async fn chat(&self, message: &str) -> Result<String, ProviderError> {
        let request = self.build_request(message, false);

        let call = async {
            let resp = self.post(&request).send().await?;
            let status = resp.status();
            if !status.is_success() {
                let body = error_body(resp).await;
                return Err(ProviderError::from_http_status(status.as_u16(), &body));
            }

            let body: ChatCompletionResponse = resp.json().await?;
            let content = match body.first_content() {
                Some(content) => content.to_string(),
                None => {
                    debug!(model = %request.model, "响应中没有文本内容");
                    NO_VALID_RESPONSE.to_string()
                }
            };
            Ok::<String, ProviderError>(content)
        };

        match tokio::time::timeout(self.request_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        }
    }
}

/// 读取错误响应体；读取失败时记录日志并返回空串
async fn error_body(resp: Response) -> String {
    let status = resp.status().as_u16();
    match resp.text().await {
        Ok(body) => body,
        Err(e) => {
            warn!(status, error = %e, "读取错误响应体失败");
            String::new()
        }
    }
}
