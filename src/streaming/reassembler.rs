//! SSE 事件重组器
//!
//! 网络 chunk 与 SSE 事件边界没有任何对齐关系：一个 chunk 可能只包含
//! 半个事件，也可能包含多个事件外加下一个事件的开头。重组器把 chunk
//! 序列折叠为以 `\n\n` 结尾的完整事件序列，未终结的尾部片段留在状态
//! 中等待下一个 chunk。
//!
//! 缓冲区按字节处理，因此被 chunk 边界切开的多字节 UTF-8 字符在拼接
//! 后能被正确解码。
//!
//! # 示例
//!
//! ```ignore
//! let mut reassembler = EventReassembler::new();
//!
//! let events = reassembler.push(b"data: {\"a\":1}\n");
//! assert!(events.is_empty());
//!
//! let events = reassembler.push(b"\ndata: {\"b\"");
//! assert_eq!(events.len(), 1);
//! ```

/// SSE 事件分隔符
pub const EVENT_DELIMITER: &[u8] = b"\n\n";

/// 两个分隔符之间的原始事件文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent(String);

impl RawEvent {
    fn from_bytes(bytes: &[u8]) -> Self {
        RawEvent(String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[cfg(test)]
    pub(crate) fn into_string(self) -> String {
        self.0
    }
}

impl From<&str> for RawEvent {
    fn from(text: &str) -> Self {
        RawEvent(text.to_string())
    }
}

/// 重组状态
///
/// 每个 chunk 通过 [`ReassemblyState::advance`] 产生一个新状态：
/// `pending_tail` 是尚未遇到分隔符的剩余字节，`ready_events` 是本次
/// 推进中新完成的事件。已发出的事件加上 `pending_tail` 恒等于迄今
/// 收到的全部字节（去掉已消费的分隔符）。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReassemblyState {
    pending_tail: Vec<u8>,
    ready_events: Vec<RawEvent>,
}

impl ReassemblyState {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一个 chunk 并切分出其中所有完整事件
    pub fn advance(self, chunk: &[u8]) -> Self {
        let mut buffer = self.pending_tail;

        // 旧尾部内部不可能含有完整分隔符，但它的最后一个字节可能与
        // 新 chunk 的第一个字节组成分隔符
        let mut scan_from = buffer
            .len()
            .saturating_sub(EVENT_DELIMITER.len() - 1);
        buffer.extend_from_slice(chunk);

        let mut ready_events = Vec::new();
        let mut consumed = 0;
        while let Some(offset) = find_delimiter(&buffer[scan_from..]) {
            let end = scan_from + offset;
            ready_events.push(RawEvent::from_bytes(&buffer[consumed..end]));
            consumed = end + EVENT_DELIMITER.len();
            scan_from = consumed;
        }

        buffer.drain(..consumed);

        Self {
            pending_tail: buffer,
            ready_events,
        }
    }

    /// 最近一次推进完成的事件
    #[cfg(test)]
    pub(crate) fn ready_events(&self) -> &[RawEvent] {
        &self.ready_events
    }

    /// 取走最近一次推进完成的事件
    pub fn take_ready(&mut self) -> Vec<RawEvent> {
        std::mem::take(&mut self.ready_events)
    }

    /// 未终结尾部的字节数
    pub fn pending_len(&self) -> usize {
        self.pending_tail.len()
    }

    pub(crate) fn pending_tail(&self) -> &[u8] {
        &self.pending_tail
    }
}

fn find_delimiter(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(EVENT_DELIMITER.len())
        .position(|window| window == EVENT_DELIMITER)
}

/// 单个请求独占的事件重组器
#[derive(Debug, Default)]
pub struct EventReassembler {
    state: ReassemblyState,
}

impl EventReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// 处理一个 chunk，返回其中完成的全部事件（按出现顺序）
    pub fn push(&mut self, chunk: &[u8]) -> Vec<RawEvent> {
        if chunk.is_empty() {
            return Vec::new();
        }
        let state = std::mem::take(&mut self.state);
        self.state = state.advance(chunk);
        self.state.take_ready()
    }

    /// 当前未终结尾部的字节数
    pub fn pending_len(&self) -> usize {
        self.state.pending_len()
    }

    /// 流结束
    ///
    /// 没有分隔符结尾的尾部片段视为不完整事件直接丢弃，返回被丢弃的
    /// 文本以便调用方记录日志。
    pub fn finish(&mut self) -> Option<String> {
        let state = std::mem::take(&mut self.state);
        if state.pending_len() == 0 {
            None
        } else {
            Some(String::from_utf8_lossy(state.pending_tail()).into_owned())
        }
    }
}
