//! 流式传输错误类型
//!
//! 只有会终止整条流的失败才会落到这里：网络错误、上游非 2xx 响应、
//! 整体超时以及未终结片段超出缓冲上限。单个事件的 JSON 解析失败在
//! 管道内部被吸收，不会成为 `StreamError`。

use std::fmt;

use crate::streaming::outbound::OutboundEvent;

/// 流式传输错误类型
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamError {
    /// 网络错误
    ///
    /// 连接失败、TLS 握手失败或传输中途连接被重置。
    Network(String),

    /// 超时错误
    ///
    /// 整个请求超过配置的时间预算。
    Timeout,

    /// 上游返回非 2xx 状态码
    ProviderError {
        /// HTTP 状态码
        status: u16,
        /// 错误消息（截断后的响应体）
        message: String,
    },

    /// 未终结的事件片段超过缓冲区上限
    BufferOverflow,
}

impl fmt::Display for StreamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamError::Network(msg) => write!(f, "网络错误: {}", msg),
            StreamError::Timeout => write!(f, "流式响应超时"),
            StreamError::ProviderError { status, message } => {
                write!(f, "上游服务错误 ({}): {}", status, message)
            }
            StreamError::BufferOverflow => write!(f, "缓冲区溢出"),
        }
    }
}

impl std::error::Error for StreamError {}

// ============================================================================
// From trait 实现
// ============================================================================

impl From<reqwest::Error> for StreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            StreamError::Timeout
        } else if err.is_connect() {
            StreamError::Network(format!("连接失败: {}", err))
        } else if err.is_request() {
            StreamError::Network(format!("请求错误: {}", err))
        } else if let Some(status) = err.status() {
            StreamError::provider_error(status.as_u16(), err.to_string())
        } else {
            StreamError::Network(err.to_string())
        }
    }
}

// ============================================================================
// 辅助方法
// ============================================================================

impl StreamError {
    /// 创建网络错误
    pub fn network(msg: impl Into<String>) -> Self {
        StreamError::Network(msg.into())
    }

    /// 创建上游错误
    pub fn provider_error(status: u16, message: impl Into<String>) -> Self {
        StreamError::ProviderError {
            status,
            message: message.into(),
        }
    }

    /// 获取错误类型字符串（用于结构化日志）
    pub fn error_type_string(&self) -> &'static str {
        match self {
            StreamError::Network(_) => "network_error",
            StreamError::Timeout => "timeout",
            StreamError::ProviderError { .. } => "provider_error",
            StreamError::BufferOverflow => "buffer_overflow",
        }
    }

    /// 转换为面向客户端的终止错误事件
    pub fn to_outbound_event(&self) -> OutboundEvent {
        OutboundEvent::error(self)
    }
}
