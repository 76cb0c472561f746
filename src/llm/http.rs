//! OpenAI 兼容 HTTP 补全客户端
//!
//! POST {base}/chat/completions，Bearer 鉴权，请求体 {model, messages, temperature}；
//! 每次调用受 timeout 上限约束，并与取消令牌竞争，先完成者生效。
//! 非 2xx 响应携带状态码与 {error: {message}} 中的错误信息。

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::core::ChatError;
use crate::llm::{CompletionClient, Connectivity, OnlineFlag};
use crate::memory::Turn;

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [Turn],
    temperature: f64,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    error: Option<ErrorDetail>,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: Option<String>,
}

/// HTTP 客户端：持有 reqwest Client、端点、模型名与密钥
pub struct HttpCompletionClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: String,
    timeout: Duration,
    online: OnlineFlag,
}

impl HttpCompletionClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            api_key: api_key.into(),
            timeout,
            online: OnlineFlag::new(),
        }
    }

    /// 共享外部的在线标记（总结生成前会查询它）
    pub fn with_online_flag(mut self, online: OnlineFlag) -> Self {
        self.online = online;
        self
    }

    pub fn online_flag(&self) -> OnlineFlag {
        self.online.clone()
    }

    fn transport_error(&self, e: reqwest::Error) -> ChatError {
        if e.is_timeout() {
            return ChatError::Timeout(self.timeout);
        }
        if e.is_connect() {
            self.online.set_online(false);
        }
        ChatError::Network(e.to_string())
    }

    async fn send(&self, turns: &[Turn], temperature: f64) -> Result<String, ChatError> {
        let url = format!("{}/chat/completions", self.base_url);
        tracing::debug!(url = %url, turns = turns.len(), temperature, "POST chat/completions");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.model,
                messages: turns,
                temperature,
            })
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;
        self.online.set_online(true);

        let status = response.status();
        if !status.is_success() {
            let message = response
                .json::<ErrorBody>()
                .await
                .ok()
                .and_then(|body| body.error)
                .and_then(|detail| detail.message)
                .unwrap_or_else(|| "未知错误".to_string());
            return Err(ChatError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| ChatError::InvalidResponse(e.to_string()))?;
        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| ChatError::InvalidResponse("missing choices[0].message.content".into()))
    }
}

#[async_trait]
impl CompletionClient for HttpCompletionClient {
    async fn complete(
        &self,
        turns: &[Turn],
        temperature: f64,
        cancel: &CancellationToken,
    ) -> Result<String, ChatError> {
        if cancel.is_cancelled() {
            return Err(ChatError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ChatError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.send(turns, temperature)) => {
                result.unwrap_or(Err(ChatError::Timeout(self.timeout)))
            }
        }
    }

    async fn probe(&self) -> Result<u16, ChatError> {
        let url = format!("{}/models", self.base_url);
        let response = tokio::time::timeout(
            self.timeout,
            self.client.get(&url).bearer_auth(&self.api_key).send(),
        )
        .await
        .map_err(|_| ChatError::Timeout(self.timeout))?
        .map_err(|e| self.transport_error(e))?;
        self.online.set_online(true);
        Ok(response.status().as_u16())
    }

    fn model(&self) -> &str {
        &self.model
    }
}
