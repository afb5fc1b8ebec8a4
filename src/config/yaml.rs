//! YAML 配置加载
//!
//! 读取顺序：配置文件（不存在时使用默认值）→ 环境变量覆盖 → 验证。

use super::path_utils::expand_tilde;
use super::types::Config;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

/// 指定配置文件路径的环境变量
pub const CONFIG_PATH_ENV: &str = "CHATSTREAM_CONFIG";
pub const API_KEY_ENV: &str = "CHATSTREAM_API_KEY";
pub const BASE_URL_ENV: &str = "CHATSTREAM_BASE_URL";
pub const MODEL_ENV: &str = "CHATSTREAM_MODEL";

/// 默认配置文件位置
pub const DEFAULT_CONFIG_PATH: &str = "~/.chatstream/config.yaml";

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("读取配置文件失败 {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("配置文件格式错误: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("配置验证失败: {0}")]
    Validation(String),
}

/// 解析 YAML 文本
pub fn parse_yaml(content: &str) -> Result<Config, ConfigError> {
    if content.trim().is_empty() {
        return Ok(Config::default());
    }
    Ok(serde_yaml::from_str(content)?)
}

/// 从文件加载配置
///
/// 文件不存在时返回 `Ok(None)`，由调用方决定回退到默认配置。这一步通常
/// 发生在日志初始化之前，因此这里不记录 info 级别日志。
pub fn load_config(path: &Path) -> Result<Option<Config>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_yaml(&content)?;
    debug!(path = %path.display(), "配置文件已加载");
    Ok(Some(config))
}

/// 用环境变量覆盖上游配置
///
/// `lookup` 通常是 `|key| std::env::var(key).ok()`，测试中可以替换。
/// 空字符串视为未设置。
pub fn apply_env_overrides<F>(config: &mut Config, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

    if let Some(api_key) = get(API_KEY_ENV) {
        config.upstream.api_key = api_key;
    }
    if let Some(base_url) = get(BASE_URL_ENV) {
        config.upstream.base_url = base_url;
    }
    if let Some(model) = get(MODEL_ENV) {
        config.upstream.model = model;
    }
}

/// 确定配置文件路径
pub fn resolve_config_path<F>(lookup: F) -> PathBuf
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(CONFIG_PATH_ENV).filter(|value| !value.trim().is_empty()) {
        Some(path) => expand_tilde(path),
        None => default_config_path(),
    }
}

pub fn default_config_path() -> PathBuf {
    expand_tilde(DEFAULT_CONFIG_PATH)
}
