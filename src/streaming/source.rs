//! 上游字节流
//!
//! 管道只依赖一个统一的字节流类型，不关心字节来自真实的 HTTP 响应
//! 还是测试中构造的内存流。

use crate::streaming::StreamError;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::pin::Pin;

/// 流式响应类型别名
///
/// 每个 Item 是一个 chunk 的字节或一个终止性错误。
pub type StreamResponse = Pin<Box<dyn Stream<Item = Result<Bytes, StreamError>> + Send>>;

/// 将 reqwest 的 bytes_stream 转换为 StreamResponse
pub fn reqwest_stream_to_stream_response(response: reqwest::Response) -> StreamResponse {
    let stream = response.bytes_stream().map(|result| result.map_err(StreamError::from));

    Box::pin(stream)
}

/// 由一组固定 chunk 构造 StreamResponse
///
/// 用于测试和本地调试。
pub fn stream_from_chunks<I, B>(chunks: I) -> StreamResponse
where
    I: IntoIterator<Item = Result<B, StreamError>>,
    I::IntoIter: Send + 'static,
    B: Into<Bytes>,
{
    Box::pin(futures::stream::iter(
        chunks.into_iter().map(|item| item.map(Into::into)),
    ))
}
