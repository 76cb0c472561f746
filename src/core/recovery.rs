//! 错误恢复引擎
//!
//! 将 ChatError 映射为面向用户的提示与动作：对话发送路径不重试，给出系统提示 + 本地备用回复；
//! 总结路径在重试预算内延迟重试，超出或不可重试时直接展示分类后的错误。

use std::time::Duration;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::core::ChatError;

/// 远程调用失败时的本地备用回复
pub const FALLBACK_REPLIES: [&str; 3] = [
    "我注意到您可能遇到了困扰，建议先深呼吸放松一下。",
    "这个问题值得深入探讨，我们可以分步骤慢慢分析。",
    "请告诉我更多细节，这样我可以更好地理解您的情况。",
];

/// 有界重试策略：首次调用之外最多 max_retries 次，每次间隔 delay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, delay: Duration) -> Self {
        Self { max_retries, delay }
    }

    /// 单次调用的总尝试次数上限
    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(2, Duration::from_secs(2))
    }
}

/// 对话发送失败时的兜底：渲染的系统提示 + 写入记录的备用回复
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatFallback {
    pub notice: String,
    pub reply: &'static str,
}

/// 总结失败后的建议动作
#[derive(Debug, Clone, PartialEq)]
pub enum RecoveryAction {
    /// 展示提示后延迟重试
    Retry { delay: Duration, notice: String },
    /// 展示错误，不再重试
    Surface(String),
}

/// 对话发送路径的提示文案
pub fn chat_notice(err: &ChatError) -> &'static str {
    match err {
        ChatError::Api { status: 401, .. } => "身份验证失败，请检查API密钥",
        ChatError::Api { status: 429, .. } => "请求过于频繁，请稍后再试",
        ChatError::Timeout(_) => "响应超时，请简化问题后重试",
        ChatError::Offline => "网络未连接，请检查网络设置",
        ChatError::Cancelled => "请求已取消",
        _ => "暂时无法处理请求",
    }
}

/// 总结面板的提示文案（含 `<br>` 换行标记）
pub fn summary_notice(err: &ChatError) -> String {
    match err {
        ChatError::Api { status: 401, .. } => "身份验证失败，请检查API密钥".to_string(),
        ChatError::Api { status: 429, .. } => "请求过于频繁，请稍后再试".to_string(),
        ChatError::Timeout(_) => "请求超时，建议：<br>1. 检查网络连接<br>2. 稍后重试".to_string(),
        ChatError::Offline => "网络未连接，请检查网络设置".to_string(),
        ChatError::Cancelled => "请求已取消".to_string(),
        other => format!("服务异常：{other}"),
    }
}

/// 从备用回复中均匀随机选择一条
pub fn pick_fallback_reply<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    FALLBACK_REPLIES
        .choose(rng)
        .copied()
        .unwrap_or(FALLBACK_REPLIES[0])
}

/// 语义化错误恢复：发送路径兜底、总结路径有界重试
#[derive(Debug, Clone, Default)]
pub struct RecoveryEngine {
    retry: RetryPolicy,
}

impl RecoveryEngine {
    pub fn new(retry: RetryPolicy) -> Self {
        Self { retry }
    }

    pub fn handle_chat(&self, err: &ChatError) -> ChatFallback {
        ChatFallback {
            notice: format!("系统提示：{}", chat_notice(err)),
            reply: pick_fallback_reply(&mut rand::thread_rng()),
        }
    }

    /// attempt 为已完成的尝试次数（从 1 开始）
    pub fn handle_summary(&self, err: &ChatError, attempt: u32) -> RecoveryAction {
        let notice = summary_notice(err);
        if err.is_retryable() && attempt <= self.retry.max_retries {
            RecoveryAction::Retry {
                delay: self.retry.delay,
                notice: format!(
                    "{notice}，{}秒后重试（{attempt}/{}）",
                    self.retry.delay.as_secs_f64(),
                    self.retry.max_retries
                ),
            }
        } else {
            RecoveryAction::Surface(notice)
        }
    }
}
