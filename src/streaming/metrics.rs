//! 流式传输指标
//!
//! 每个请求一份，流结束时写入日志。

use chrono::{DateTime, Utc};
use tracing::info;

/// 流式传输指标
#[derive(Debug, Clone)]
pub struct StreamMetrics {
    /// 首字节时间（毫秒），从管道创建到收到第一个 chunk
    pub ttfb_ms: Option<u64>,

    /// 收到的 chunk 数量
    pub chunk_count: u32,

    /// 收到的总字节数
    pub total_bytes: usize,

    /// 重组出的完整事件数量
    pub event_count: u32,

    /// 发往客户端的内容片段数量
    pub fragment_count: u32,

    /// 负载无法解析而被跳过的事件数量
    pub parse_error_count: u32,

    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
    pub first_chunk_time: Option<DateTime<Utc>>,
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self {
            ttfb_ms: None,
            chunk_count: 0,
            total_bytes: 0,
            event_count: 0,
            fragment_count: 0,
            parse_error_count: 0,
            start_time: Utc::now(),
            end_time: None,
            first_chunk_time: None,
        }
    }
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记录收到一个 chunk，首个 chunk 同时记录 TTFB
    pub fn record_chunk(&mut self, bytes: usize) {
        self.chunk_count += 1;
        self.total_bytes += bytes;

        if self.first_chunk_time.is_none() {
            let now = Utc::now();
            self.first_chunk_time = Some(now);
            self.ttfb_ms = Some((now - self.start_time).num_milliseconds().max(0) as u64);
        }
    }

    pub fn record_event(&mut self) {
        self.event_count += 1;
    }

    pub fn record_fragment(&mut self) {
        self.fragment_count += 1;
    }

    pub fn record_parse_error(&mut self) {
        self.parse_error_count += 1;
    }

    /// 标记结束时间
    pub fn finish(&mut self) {
        if self.end_time.is_none() {
            self.end_time = Some(Utc::now());
        }
    }

    /// 总耗时（毫秒）；未结束时计算到当前时刻
    pub fn duration_ms(&self) -> u64 {
        let end = self.end_time.unwrap_or_else(Utc::now);
        (end - self.start_time).num_milliseconds().max(0) as u64
    }

    /// 平均 chunk 大小（字节）
    pub fn avg_chunk_size(&self) -> Option<f64> {
        if self.chunk_count == 0 {
            return None;
        }
        Some(self.total_bytes as f64 / self.chunk_count as f64)
    }

    /// 写入一条汇总日志
    pub fn log_metrics(&self, request_id: &str) {
        info!(
            request_id = %request_id,
            ttfb_ms = ?self.ttfb_ms,
            duration_ms = self.duration_ms(),
            chunks = self.chunk_count,
            bytes = self.total_bytes,
            avg_chunk_size = ?self.avg_chunk_size(),
            events = self.event_count,
            fragments = self.fragment_count,
            parse_errors = self.parse_error_count,
            "流式指标"
        );
    }
}
