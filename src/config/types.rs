//! 配置类型定义
//!
//! 所有字段都带有 serde 默认值，配置文件可以只写需要覆盖的部分。

use crate::streaming::StreamConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::yaml::ConfigError;

/// 主配置结构
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub stream: StreamConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// 验证配置
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Validation("端口号不能为 0".to_string()));
        }
        if self.upstream.api_key.trim().is_empty() {
            return Err(ConfigError::Validation("上游 API Key 不能为空".to_string()));
        }
        if self.upstream.base_url.trim().is_empty() {
            return Err(ConfigError::Validation("上游地址不能为空".to_string()));
        }
        if self.upstream.model.trim().is_empty() {
            return Err(ConfigError::Validation("模型名称不能为空".to_string()));
        }
        if self.stream.timeout_ms == 0 {
            return Err(ConfigError::Validation("超时时间不能为 0".to_string()));
        }
        Ok(())
    }
}

/// 服务器配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// 监听地址，形如 `127.0.0.1:8080`
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// 上游聊天补全接口配置
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpstreamConfig {
    #[serde(default)]
    pub api_key: String,
    /// 接口根地址，请求发往 `{base_url}/chat/completions`
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
}

fn default_base_url() -> String {
    "https://open.bigmodel.cn/api/paas/v4".to_string()
}

fn default_model() -> String {
    "glm-4-flash".to_string()
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: default_base_url(),
            model: default_model(),
        }
    }
}

// API Key 不进入日志
impl fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let api_key = if self.api_key.is_empty() {
            "<empty>"
        } else {
            "***"
        };
        f.debug_struct("UpstreamConfig")
            .field("api_key", &api_key)
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish()
    }
}

/// 日志配置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// 未设置 `RUST_LOG` 时使用的过滤级别
    #[serde(default = "default_log_level")]
    pub level: String,
    /// 是否输出 JSON 格式日志
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
