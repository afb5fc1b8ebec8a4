//! 路径工具模块
//!
//! 配置路径支持 tilde (~) 写法

use std::path::{Path, PathBuf};

/// 展开路径中的 tilde (~) 为用户主目录
///
/// 支持以下格式：
/// - `~` -> 用户主目录
/// - `~/path` -> 用户主目录/path
/// - `~user/path` -> 不支持，返回原路径
/// - 其他路径 -> 返回原路径
///
/// # Examples
/// ```ignore
/// use chatstream_lib::config::expand_tilde;
///
/// let expanded = expand_tilde("~/.chatstream/config.yaml");
/// ```
pub fn expand_tilde<P: AsRef<Path>>(path: P) -> PathBuf {
    let path = path.as_ref();
    let path_str = path.to_string_lossy();

    if !path_str.starts_with('~') {
        return path.to_path_buf();
    }

    // 无法获取主目录时原样返回
    let Some(home_dir) = dirs::home_dir() else {
        return path.to_path_buf();
    };

    if path_str == "~" {
        home_dir
    } else if let Some(rest) = path_str.strip_prefix("~/") {
        home_dir.join(rest)
    } else {
        path.to_path_buf()
    }
}
