//! 流式管理器
//!
//! 把上游字节流组装成面向客户端的事件流：
//!
//! ```text
//! StreamResponse ─▶ TimeoutStream ─▶ EventReassembler ─▶ DecodedEvent
//!                                                          │
//!        OutboundEvent ◀─ done / error 终止 ◀─ extract_fragment
//! ```
//!
//! 整条管道是一个由消费方拉动的 `Stream`：只有在消费方请求下一个事件
//! 时才会读取上游字节。丢弃 `ManagedStream` 会一并丢弃上游响应并释放
//! 连接，不会留下后台任务。

use crate::streaming::decoder::{DecodedEvent, EventKind};
use crate::streaming::error::StreamError;
use crate::streaming::extractor::extract_fragment;
use crate::streaming::metrics::StreamMetrics;
use crate::streaming::outbound::OutboundEvent;
use crate::streaming::reassembler::EventReassembler;
use crate::streaming::source::StreamResponse;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::time::{sleep_until, Instant, Sleep};
use tracing::{debug, error, info, warn};

// ============================================================================
// 配置
// ============================================================================

/// 流式配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// 整个请求的时间预算（毫秒），覆盖建连、等待首字节和读取全部内容
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// 未终结事件片段允许占用的最大字节数
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
}

fn default_timeout_ms() -> u64 {
    300_000 // 5 分钟
}

fn default_max_buffer_size() -> usize {
    1024 * 1024 // 1MB
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_buffer_size: default_max_buffer_size(),
        }
    }
}

impl StreamConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }

    pub fn with_max_buffer_size(mut self, size: usize) -> Self {
        self.max_buffer_size = size;
        self
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

// ============================================================================
// 流式处理上下文
// ============================================================================

/// 单个请求的处理上下文
#[derive(Debug)]
pub struct StreamContext {
    /// 请求 ID，贯穿该请求的所有日志
    pub request_id: String,
    /// 模型名称
    pub model: String,
    pub metrics: StreamMetrics,
}

impl StreamContext {
    /// 创建新的上下文并生成请求 ID
    pub fn new(model: &str) -> Self {
        Self::with_request_id(uuid::Uuid::new_v4().to_string(), model)
    }

    pub fn with_request_id(request_id: impl Into<String>, model: &str) -> Self {
        Self {
            request_id: request_id.into(),
            model: model.to_string(),
            metrics: StreamMetrics::new(),
        }
    }
}

// ============================================================================
// 流式管理器
// ============================================================================

/// 流式管理器
///
/// 持有流式配置，为每个请求构造独立的 [`ManagedStream`]。管理器本身
/// 没有可变状态，可以在请求之间共享。
#[derive(Debug, Clone, Default)]
pub struct StreamManager {
    config: StreamConfig,
}

impl StreamManager {
    pub fn new(config: StreamConfig) -> Self {
        Self { config }
    }

    /// 处理流式请求
    ///
    /// 超时计时从此刻开始。
    pub fn handle_stream(&self, context: StreamContext, source: StreamResponse) -> ManagedStream {
        ManagedStream::new(context, source, self.config.clone())
    }
}

// ============================================================================
// 托管流
// ============================================================================

/// 托管流
///
/// 产出的事件序列总是以恰好一个 `done` 或 `error` 事件结束，之后
/// 返回 `None`。
pub struct ManagedStream {
    context: StreamContext,
    /// 上游源流；进入终止状态后立即置空以释放连接
    source: Option<TimeoutStream<StreamResponse>>,
    reassembler: EventReassembler,
    config: StreamConfig,
    /// 同一个 chunk 中解出的待发送事件
    pending: VecDeque<OutboundEvent>,
    finished: bool,
}

impl ManagedStream {
    pub fn new(context: StreamContext, source: StreamResponse, config: StreamConfig) -> Self {
        debug!(
            request_id = %context.request_id,
            model = %context.model,
            timeout_ms = config.timeout_ms,
            "创建流式管道"
        );

        Self {
            source: Some(with_timeout(source, &config)),
            context,
            reassembler: EventReassembler::new(),
            config,
            pending: VecDeque::new(),
            finished: false,
        }
    }

    #[cfg(test)]
    pub(crate) fn metrics(&self) -> &StreamMetrics {
        &self.context.metrics
    }

    /// 是否已进入终止状态（终止事件可能尚未被取走）
    #[cfg(test)]
    pub(crate) fn is_finished(&self) -> bool {
        self.finished
    }

    /// 上游源流是否仍被持有
    #[cfg(test)]
    pub(crate) fn holds_source(&self) -> bool {
        self.source.is_some()
    }

    fn process_chunk(&mut self, chunk: &[u8]) {
        self.context.metrics.record_chunk(chunk.len());
        if self.context.metrics.chunk_count == 1 {
            debug!(
                request_id = %self.context.request_id,
                ttfb_ms = ?self.context.metrics.ttfb_ms,
                "收到首个 chunk"
            );
        }

        for raw in self.reassembler.push(chunk) {
            self.context.metrics.record_event();
            let decoded = DecodedEvent::parse(raw.as_str());

            match decoded.kind() {
                EventKind::Terminal => {
                    debug!(request_id = %self.context.request_id, "收到结束哨兵");
                    self.complete();
                    return;
                }
                EventKind::Data(data) => match extract_fragment(data) {
                    Ok(Some(fragment)) => {
                        self.context.metrics.record_fragment();
                        self.pending.push_back(OutboundEvent::content(fragment));
                    }
                    Ok(None) => {}
                    Err(e) => {
                        self.context.metrics.record_parse_error();
                        warn!(
                            request_id = %self.context.request_id,
                            error = %e,
                            data = %data,
                            "跳过无法解析的事件"
                        );
                    }
                },
                EventKind::Empty => {}
            }
        }

        let pending_len = self.reassembler.pending_len();
        if pending_len > self.config.max_buffer_size {
            error!(
                request_id = %self.context.request_id,
                pending_bytes = pending_len,
                buffer_limit = self.config.max_buffer_size,
                "缓冲区溢出"
            );
            self.fail(StreamError::BufferOverflow);
        }
    }

    /// 正常结束：追加 `done` 事件
    fn complete(&mut self) {
        if self.finished {
            return;
        }
        if let Some(tail) = self.reassembler.finish() {
            debug!(
                request_id = %self.context.request_id,
                discarded_bytes = tail.len(),
                "丢弃未终结的尾部片段"
            );
        }
        self.pending.push_back(OutboundEvent::done());
        self.terminate();

        info!(
            request_id = %self.context.request_id,
            model = %self.context.model,
            fragments = self.context.metrics.fragment_count,
            "流式传输完成"
        );
    }

    /// 失败结束：追加唯一的 `error` 事件
    fn fail(&mut self, err: StreamError) {
        if self.finished {
            return;
        }
        self.reassembler.finish();
        self.pending.push_back(err.to_outbound_event());
        self.terminate();

        error!(
            request_id = %self.context.request_id,
            model = %self.context.model,
            error_type = err.error_type_string(),
            error = %err,
            "流式传输错误"
        );
    }

    fn terminate(&mut self) {
        self.finished = true;
        self.source = None;
        self.context.metrics.finish();
        self.context.metrics.log_metrics(&self.context.request_id);
    }
}

impl Stream for ManagedStream {
    type Item = OutboundEvent;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if let Some(event) = this.pending.pop_front() {
                return Poll::Ready(Some(event));
            }

            if this.finished {
                return Poll::Ready(None);
            }

            let Some(source) = this.source.as_mut() else {
                this.complete();
                continue;
            };

            match Pin::new(source).poll_next(cx) {
                Poll::Ready(Some(Ok(bytes))) => this.process_chunk(&bytes),
                Poll::Ready(Some(Err(err))) => this.fail(err),
                Poll::Ready(None) => this.complete(),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

// ============================================================================
// 超时包装
// ============================================================================

/// 为流添加整体超时
///
/// 计时从调用此函数时开始。
pub fn with_timeout<S, T>(stream: S, config: &StreamConfig) -> TimeoutStream<S>
where
    S: Stream<Item = Result<T, StreamError>> + Unpin,
{
    TimeoutStream::new(stream, config.timeout_duration())
}

/// 带整体超时的流包装器
///
/// 截止时间由定时器驱动，即使内部流一直不产出数据也会按时醒来，
/// 产出一次 `StreamError::Timeout` 后结束。
pub struct TimeoutStream<S> {
    inner: S,
    deadline_at: Instant,
    /// 首次轮询时创建，需要处于 tokio 运行时中
    deadline: Option<Pin<Box<Sleep>>>,
    finished: bool,
}

impl<S> TimeoutStream<S> {
    pub fn new(inner: S, timeout: Duration) -> Self {
        Self {
            inner,
            deadline_at: Instant::now() + timeout,
            deadline: None,
            finished: false,
        }
    }
}

impl<S, T> Stream for TimeoutStream<S>
where
    S: Stream<Item = Result<T, StreamError>> + Unpin,
{
    type Item = Result<T, StreamError>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.finished {
            return Poll::Ready(None);
        }

        let deadline_at = this.deadline_at;
        let deadline = this
            .deadline
            .get_or_insert_with(|| Box::pin(sleep_until(deadline_at)));
        if deadline.as_mut().poll(cx).is_ready() {
            this.finished = true;
            return Poll::Ready(Some(Err(StreamError::Timeout)));
        }

        match Pin::new(&mut this.inner).poll_next(cx) {
            Poll::Ready(None) => {
                this.finished = true;
                Poll::Ready(None)
            }
            other => other,
        }
    }
}

// ============================================================================
// 测试模块
// ============================================================================
