//! 补全客户端抽象
//!
//! 所有后端（HTTP / Mock）实现 CompletionClient：complete（一次请求-响应）与 probe（连通性检测）。
//! 超时与取消由实现负责：超时返回 ChatError::Timeout，取消返回 ChatError::Cancelled。

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::ChatError;
use crate::memory::Turn;

#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// 以完整对话为上下文请求一次补全，返回助手回复原文
    async fn complete(
        &self,
        turns: &[Turn],
        temperature: f64,
        cancel: &CancellationToken,
    ) -> Result<String, ChatError>;

    /// 请求模型列表，返回原始状态码
    async fn probe(&self) -> Result<u16, ChatError>;

    fn model(&self) -> &str;
}
