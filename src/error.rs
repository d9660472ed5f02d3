//! 调研流程的失败分类

use thiserror::Error;

/// 调研流程中可识别的错误类型
///
/// 其余错误统一以 `anyhow::Error` 传播，调用方可以通过 `downcast_ref` 识别这里的类型。
#[derive(Debug, Error)]
pub enum ResearchError {
    /// 模型输出无法解码为要求的结构
    #[error("structured output for `{target}` could not be decoded: {reason}")]
    Decoding { target: &'static str, reason: String },

    /// 检索服务调用失败
    #[error("search provider `{provider}` failed: {reason}")]
    Provider {
        provider: &'static str,
        reason: String,
    },

    /// 调用方违反了步骤的前置条件
    #[error("precondition violated: {0}")]
    Precondition(String),

    /// 检查点不存在或状态不符
    #[error("checkpoint error: {0}")]
    Checkpoint(String),
}

impl ResearchError {
    pub fn decoding(target: &'static str, reason: impl ToString) -> Self {
        ResearchError::Decoding {
            target,
            reason: reason.to_string(),
        }
    }

    pub fn provider(provider: &'static str, reason: impl ToString) -> Self {
        ResearchError::Provider {
            provider,
            reason: reason.to_string(),
        }
    }
}
