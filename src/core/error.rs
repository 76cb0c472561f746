//! 错误类型
//!
//! 与 RecoveryEngine 配合：对话发送路径一律兜底，总结路径按是否可重试决定重试或直接展示。

use std::time::Duration;

use thiserror::Error;

use crate::memory::TurnId;

/// 会话编排过程中可能出现的错误（网络、超时、取消、API 拒绝、存储等）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Network offline")]
    Offline,

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    /// 外部主动取消，不会自动重试
    #[error("Request cancelled")]
    Cancelled,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown turn: {0}")]
    UnknownTurn(TurnId),

    #[error("Unknown summary index: {0}")]
    UnknownSummary(usize),
}

impl ChatError {
    /// 取消与离线不重试，其余远程失败可重试
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            ChatError::Cancelled
                | ChatError::Offline
                | ChatError::UnknownTurn(_)
                | ChatError::UnknownSummary(_)
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ChatError::Api { status, .. } => Some(*status),
            _ => None,
        }
    }
}
