//! 上游调用错误类型
//!
//! 非流式调用的失败归类为 `ProviderError`，并提供中文错误信息。

use std::error::Error;
use std::fmt;

/// 上游响应体在错误信息中保留的最大长度
const MAX_BODY_IN_MESSAGE: usize = 200;

/// Provider 统一错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// 网络错误
    /// 包括连接失败、DNS 解析失败、连接被重置等
    NetworkError(String),

    /// 超出请求时间预算
    Timeout,

    /// 认证错误：API Key 无效或没有权限
    AuthenticationError(String),

    /// 配置错误：缺少 API Key、地址非法等
    ConfigurationError(String),

    /// 限流错误（需要等待）
    RateLimitError(String),

    /// 服务器错误
    /// 5xx 错误
    ServerError(String),

    /// 请求错误
    /// 4xx 错误（除认证和限流外）
    RequestError(String),

    /// 解析错误
    /// JSON 解析失败、响应格式不符合预期
    ParseError(String),

    /// 未知错误
    Unknown(String),
}

impl ProviderError {
    /// 获取用户友好的中文错误信息
    pub fn user_friendly_message(&self) -> String {
        match self {
            ProviderError::NetworkError(msg) => {
                format!("网络连接失败，请检查网络设置后重试。详情：{}", msg)
            }
            ProviderError::Timeout => "请求超时，请稍后重试".to_string(),
            ProviderError::AuthenticationError(msg) => {
                format!("认证失败，请检查 API Key。详情：{}", msg)
            }
            ProviderError::ConfigurationError(msg) => {
                format!("配置错误，请检查上游设置。详情：{}", msg)
            }
            ProviderError::RateLimitError(msg) => {
                format!("请求过于频繁，请稍后重试。详情：{}", msg)
            }
            ProviderError::ServerError(msg) => {
                format!("服务器暂时不可用，请稍后重试。详情：{}", msg)
            }
            ProviderError::RequestError(msg) => {
                format!("请求失败。详情：{}", msg)
            }
            ProviderError::ParseError(msg) => {
                format!("数据解析失败。详情：{}", msg)
            }
            ProviderError::Unknown(msg) => {
                format!("发生未知错误。详情：{}", msg)
            }
        }
    }

    /// 获取错误类型名称
    pub fn error_type(&self) -> &'static str {
        match self {
            ProviderError::NetworkError(_) => "NetworkError",
            ProviderError::Timeout => "Timeout",
            ProviderError::AuthenticationError(_) => "AuthenticationError",
            ProviderError::ConfigurationError(_) => "ConfigurationError",
            ProviderError::RateLimitError(_) => "RateLimitError",
            ProviderError::ServerError(_) => "ServerError",
            ProviderError::RequestError(_) => "RequestError",
            ProviderError::ParseError(_) => "ParseError",
            ProviderError::Unknown(_) => "Unknown",
        }
    }

    /// 从 HTTP 状态码创建错误
    pub fn from_http_status(status: u16, body: &str) -> Self {
        let detail = format!(
            "HTTP {} - {}",
            status,
            truncate_message(body, MAX_BODY_IN_MESSAGE)
        );
        match status {
            401 | 403 => ProviderError::AuthenticationError(detail),
            429 => ProviderError::RateLimitError(detail),
            400 | 404 | 405 | 422 => ProviderError::RequestError(detail),
            500..=599 => ProviderError::ServerError(detail),
            _ => ProviderError::Unknown(detail),
        }
    }

    /// 从 reqwest 错误创建
    pub fn from_reqwest_error(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout
        } else if err.is_connect() {
            ProviderError::NetworkError(format!("无法连接到服务器: {}", err))
        } else if err.is_decode() {
            ProviderError::ParseError("响应解码失败".to_string())
        } else if let Some(status) = err.status() {
            ProviderError::from_http_status(status.as_u16(), &err.to_string())
        } else {
            ProviderError::NetworkError(err.to_string())
        }
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_friendly_message())
    }
}

impl Error for ProviderError {}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        ProviderError::from_reqwest_error(&err)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        ProviderError::ParseError(err.to_string())
    }
}

/// 截断消息到指定字节长度，不会切开多字节字符
pub(crate) fn truncate_message(msg: &str, max_len: usize) -> String {
    if msg.len() <= max_len {
        return msg.to_string();
    }
    let mut end = max_len;
    while !msg.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &msg[..end])
}
