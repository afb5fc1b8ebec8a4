//! 日志初始化
//!
//! `RUST_LOG` 优先；未设置或无法解析时使用配置中的级别。

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// 构造日志过滤器
pub fn build_filter(config: &LoggingConfig) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// 初始化全局 tracing subscriber
///
/// 重复初始化（例如测试中多次调用）会被忽略。
pub fn init_tracing(config: &LoggingConfig) {
    let builder = tracing_subscriber::fmt()
        .with_env_filter(build_filter(config))
        .with_target(false);

    let result = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    if let Err(e) = result {
        tracing::debug!(error = %e, "tracing subscriber 已初始化，跳过");
    }
}
