//! 会话监管：生命周期、中断管理
//!
//! 持有会话级 CancellationToken（退出时取消一切）；每次生成总结时签发新的子 token，
//! 用户取消只作用于当前这一次生成，重试沿用同一个 token。

use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

#[derive(Debug)]
pub struct SessionSupervisor {
    /// 退出时触发
    shutdown_token: CancellationToken,
    /// 当前总结生成的取消令牌
    summary_token: Mutex<CancellationToken>,
}

impl SessionSupervisor {
    pub fn new() -> Self {
        let shutdown_token = CancellationToken::new();
        let summary_token = Mutex::new(shutdown_token.child_token());
        Self {
            shutdown_token,
            summary_token,
        }
    }

    /// 对话请求使用的 token（随会话退出而取消）
    pub fn chat_token(&self) -> CancellationToken {
        self.shutdown_token.child_token()
    }

    /// 为一次新的总结生成签发 token，替换上一次的
    pub fn renew_summary_token(&self) -> CancellationToken {
        let token = self.shutdown_token.child_token();
        *self.summary_token.lock().unwrap_or_else(|e| e.into_inner()) = token.clone();
        token
    }

    /// 取消当前总结生成（用户点「取消」）
    pub fn cancel_summary(&self) {
        self.summary_token
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .cancel();
    }

    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown_token.is_cancelled()
    }
}

impl Default for SessionSupervisor {
    fn default() -> Self {
        Self::new()
    }
}
