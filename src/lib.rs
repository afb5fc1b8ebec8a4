//! chatstream
//!
//! 把 OpenAI 兼容聊天补全接口的流式输出转发给客户端的代理服务。
//! 核心是 [`streaming`] 模块中的事件重组管道。

pub mod config;
pub mod models;
pub mod providers;
pub mod server;
pub mod streaming;
pub mod telemetry;

pub use config::Config;
pub use server::{build_router, AppState};
