//! 面向客户端的输出事件
//!
//! 每个请求的输出流由若干内容事件组成，并且总是以恰好一个 `done`
//! 或 `error` 事件结束。

use std::fmt;

/// 完成事件名
pub const DONE_EVENT: &str = "done";
/// 完成事件的负载，同时也是上游使用的结束哨兵
pub const DONE_MARKER: &str = "[DONE]";
/// 错误事件名
pub const ERROR_EVENT: &str = "error";
/// 错误事件负载前缀
pub const ERROR_PREFIX: &str = "发生错误: ";

/// 发往客户端的单个事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundEvent {
    /// 事件名；内容事件没有事件名
    pub event: Option<String>,
    /// 事件负载
    pub data: String,
}

impl OutboundEvent {
    /// 内容事件，负载为重新序列化的 `{"choices": [...]}` 信封
    pub fn content(fragment: impl Into<String>) -> Self {
        Self {
            event: None,
            data: fragment.into(),
        }
    }

    /// 完成事件
    pub fn done() -> Self {
        Self {
            event: Some(DONE_EVENT.to_string()),
            data: DONE_MARKER.to_string(),
        }
    }

    /// 管道失败时的终止错误事件
    pub fn error(message: impl fmt::Display) -> Self {
        Self {
            event: Some(ERROR_EVENT.to_string()),
            data: format!("{}{}", ERROR_PREFIX, message),
        }
    }

    /// 请求校验失败时的错误事件，负载不带前缀
    pub fn rejected(message: impl Into<String>) -> Self {
        Self {
            event: Some(ERROR_EVENT.to_string()),
            data: message.into(),
        }
    }

    pub fn is_done(&self) -> bool {
        self.event.as_deref() == Some(DONE_EVENT)
    }

    pub fn is_error(&self) -> bool {
        self.event.as_deref() == Some(ERROR_EVENT)
    }

    /// 是否为终止事件（`done` 或 `error`）
    pub fn is_terminal(&self) -> bool {
        self.is_done() || self.is_error()
    }

    /// 序列化为 SSE 线格式
    ///
    /// 多行负载拆成多条 `data:` 行，事件以空行结束。
    pub fn to_sse(&self) -> String {
        let mut out = String::with_capacity(self.data.len() + 16);
        if let Some(event) = &self.event {
            out.push_str("event: ");
            out.push_str(event);
            out.push('\n');
        }
        for line in self.data.split('\n') {
            out.push_str("data: ");
            out.push_str(line.strip_suffix('\r').unwrap_or(line));
            out.push('\n');
        }
        out.push('\n');
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_event_sse() {
        let event = OutboundEvent::content(r#"{"choices":[]}"#);
        assert!(!event.is_terminal());
        assert_eq!(event.to_sse(), "data: {\"choices\":[]}\n\n");
    }

    #[test]
    fn test_done_event_sse() {
        let event = OutboundEvent::done();
        assert!(event.is_done());
        assert!(event.is_terminal());
        assert_eq!(event.to_sse(), "event: done\ndata: [DONE]\n\n");
    }

    #[test]
    fn test_error_event_has_prefix() {
        let event = OutboundEvent::error("boom");
        assert!(event.is_error());
        assert_eq!(event.data, "发生错误: boom");
        assert_eq!(event.to_sse(), "event: error\ndata: 发生错误: boom\n\n");
    }

    #[test]
    fn test_rejected_event_has_no_prefix() {
        let event = OutboundEvent::rejected("消息不能为空");
        assert!(event.is_error());
        assert_eq!(event.data, "消息不能为空");
    }

    #[test]
    fn test_multiline_data_is_split() {
        let event = OutboundEvent::error("line one\r\nline two");
        assert_eq!(
            event.to_sse(),
            "event: error\ndata: 发生错误: line one\ndata: line two\n\n"
        );
    }
}
