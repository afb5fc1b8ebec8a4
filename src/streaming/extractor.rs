//! 内容增量提取
//!
//! 从上游 `data` 负载中取出 `choices[0].delta.content`，并把完整的
//! `choices` 数组重新包装成 `{"choices": [...]}` 交给客户端渲染。

use serde_json::{json, Value};

/// 从一个 `data` 负载中提取内容片段
///
/// * `Ok(Some(fragment))` - 负载携带非空的内容增量
/// * `Ok(None)` - 合法 JSON 但没有可用内容（只含元数据、`choices` 为空等）
/// * `Err(_)` - 负载不是合法 JSON，由调用方记录后跳过
pub fn extract_fragment(data: &str) -> Result<Option<String>, serde_json::Error> {
    let mut payload: Value = serde_json::from_str(data)?;

    let has_content = payload
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .is_some_and(|content| !content.is_empty());

    if !has_content {
        return Ok(None);
    }

    let choices = payload
        .get_mut("choices")
        .map(Value::take)
        .unwrap_or(Value::Null);

    Ok(Some(json!({ "choices": choices }).to_string()))
}

/// 从内容片段中取回文本增量
///
/// 主要用于日志和测试。
pub fn fragment_text(fragment: &str) -> Option<String> {
    let value: Value = serde_json::from_str(fragment).ok()?;
    value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .map(str::to_string)
}
