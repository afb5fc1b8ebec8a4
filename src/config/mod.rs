//! 配置管理模块
//!
//! 提供 YAML 配置文件支持和环境变量覆盖

mod path_utils;
mod types;
mod yaml;

pub use path_utils::expand_tilde;
pub use types::{Config, LoggingConfig, ServerConfig, UpstreamConfig};
pub use yaml::{
    apply_env_overrides, default_config_path, load_config, parse_yaml, resolve_config_path,
    ConfigError, API_KEY_ENV, BASE_URL_ENV, CONFIG_PATH_ENV, MODEL_ENV,
};
