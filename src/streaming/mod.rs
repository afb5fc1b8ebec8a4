//! 流式传输核心模块
//!
//! 把上游聊天补全接口的 SSE 字节流重组为面向客户端的事件流。网络
//! chunk 可以在任意位置切开事件，管道保证输出与切分方式无关。
//!
//! # 主要组件
//!
//! - `source`: 上游字节流类型
//! - `reassembler`: 按 `\n\n` 重组完整事件
//! - `decoder`: 解析事件字段并识别结束哨兵
//! - `extractor`: 提取内容增量
//! - `outbound`: 面向客户端的事件与 SSE 序列化
//! - `error`: 流式错误类型定义
//! - `metrics`: 流式指标类型定义
//! - `manager`: 流式管理器，串联以上组件并处理超时与终止

pub mod decoder;
pub mod error;
pub mod extractor;
pub mod manager;
pub mod metrics;
pub mod outbound;
pub mod reassembler;
pub mod source;

// 重新导出核心类型
pub use decoder::{DecodedEvent, EventKind};
pub use error::StreamError;
pub use extractor::{extract_fragment, fragment_text};
pub use manager::{
    with_timeout, ManagedStream, StreamConfig, StreamContext, StreamManager, TimeoutStream,
};
pub use metrics::StreamMetrics;
pub use outbound::OutboundEvent;
pub use reassembler::{EventReassembler, RawEvent, ReassemblyState};
pub use source::{reqwest_stream_to_stream_response, stream_from_chunks, StreamResponse};
