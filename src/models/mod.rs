//! 数据模型
pub mod openai;

pub use openai::*;
