//! Mock 补全客户端（用于测试与无密钥运行）
//!
//! 按顺序返回预置的结果；预置耗尽后回显最后一条 User 消息。记录调用次数与每次请求的上下文，
//! 可选的延迟会与取消令牌竞争；set_reachable(false) 模拟端点不可达（complete 与 probe 均返回网络错误）。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::core::ChatError;
use crate::llm::CompletionClient;
use crate::memory::{Role, Turn};

#[derive(Debug, Default)]
pub struct MockCompletionClient {
    script: Mutex<VecDeque<Result<String, ChatError>>>,
    calls: AtomicUsize,
    probes: AtomicUsize,
    unreachable: AtomicBool,
    requests: Mutex<Vec<(Vec<Turn>, f64)>>,
    delay: Option<Duration>,
}

impl MockCompletionClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replies<I>(replies: I) -> Self
    where
        I: IntoIterator<Item = Result<String, ChatError>>,
    {
        Self {
            script: Mutex::new(replies.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_reachable(&self, reachable: bool) {
        self.unreachable.store(!reachable, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    fn unreachable_error(&self) -> Option<ChatError> {
        self.unreachable
            .load(Ordering::SeqCst)
            .then(|| ChatError::Network("mock endpoint unreachable".to_string()))
    }

    /// 每次调用收到的 (上下文, temperature)
    pub fn requests(&self) -> Vec<(Vec<Turn>, f64)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn next_reply(&self, turns: &[Turn]) -> Result<String, ChatError> {
        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        scripted.unwrap_or_else(|| {
            let last_user = turns
                .iter()
                .rev()
                .find(|t| t.role == Role::User)
                .map(|t| t.content.as_str())
                .unwrap_or("(no input)");
            Ok(format!("（模拟回复）我听到了：{last_user}"))
        })
    }
}

#[async_trait]
impl CompletionClient for MockCompletionClient {
    async fn complete(
        &self,
        turns: &[Turn],
        temperature: f64,
        cancel: &CancellationToken,
    ) -> Result<String, ChatError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((turns.to_vec(), temperature));

        if let Some(delay) = self.delay {
            tokio::select! {
                _ = cancel.cancelled() => return Err(ChatError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        } else if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        if let Some(err) = self.unreachable_error() {
            return Err(err);
        }
        self.next_reply(turns)
    }

    async fn probe(&self) -> Result<u16, ChatError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        match self.unreachable_error() {
            Some(err) => Err(err),
            None => Ok(200),
        }
    }

    fn model(&self) -> &str {
        "mock"
    }
}
