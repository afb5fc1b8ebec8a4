//! 上游 Provider 模块
pub mod chat_completions;
pub mod error;

pub use chat_completions::{ChatCompletionsClient, NO_VALID_RESPONSE};
pub use error::ProviderError;
