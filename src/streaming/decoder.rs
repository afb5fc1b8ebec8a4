//! SSE 事件解码
//!
//! 把一个完整的原始事件拆成字段行，提取 `event` 与 `data` 字段，并识别
//! 上游的结束哨兵（`event: done` 或 `data: [DONE]`）。

use crate::streaming::outbound::{DONE_EVENT, DONE_MARKER};

const DATA_PREFIX: &str = "data:";
const EVENT_PREFIX: &str = "event:";

/// 解码后的事件
///
/// 同一事件中重复出现的字段以最后一次为准。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DecodedEvent {
    pub event_type: Option<String>,
    pub data: Option<String>,
}

/// 事件分类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind<'a> {
    /// 上游结束哨兵，不携带内容
    Terminal,
    /// 携带待解析的数据负载
    Data(&'a str),
    /// 没有数据（注释、心跳、空事件等）
    Empty,
}

impl DecodedEvent {
    /// 解析一个原始事件文本
    pub fn parse(raw: &str) -> Self {
        let mut decoded = DecodedEvent::default();

        for line in raw.split('\n') {
            let line = line.trim();
            if let Some(value) = line.strip_prefix(DATA_PREFIX) {
                decoded.data = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix(EVENT_PREFIX) {
                decoded.event_type = Some(value.trim().to_string());
            }
        }

        decoded
    }

    /// 是否为结束哨兵
    pub fn is_terminal(&self) -> bool {
        self.event_type.as_deref() == Some(DONE_EVENT) || self.data.as_deref() == Some(DONE_MARKER)
    }

    pub fn kind(&self) -> EventKind<'_> {
        if self.is_terminal() {
            return EventKind::Terminal;
        }
        match self.data.as_deref() {
            Some(data) if !data.is_empty() => EventKind::Data(data),
            _ => EventKind::Empty,
        }
    }
}
