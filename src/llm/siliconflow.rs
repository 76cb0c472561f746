//! SiliconFlow 端点预设（OpenAI 兼容格式）
//!
//! - Base URL: https://api.siliconflow.cn/v1
//! - 默认模型: deepseek-ai/DeepSeek-R1-Distill-Llama-8B

use std::time::Duration;

use crate::config::LlmSection;
use crate::llm::{HttpCompletionClient, OnlineFlag};

pub const SILICONFLOW_BASE_URL: &str = "https://api.siliconflow.cn/v1";
pub const SILICONFLOW_DEFAULT_MODEL: &str = "deepseek-ai/DeepSeek-R1-Distill-Llama-8B";

/// 按配置创建客户端
///
/// - 密钥优先取配置 `llm.api_key`，其次环境变量 `SILICONFLOW_API_KEY`
/// - 无密钥时返回 None，由调用方决定是否退回 Mock
pub fn create_siliconflow_client(
    llm: &LlmSection,
    online: OnlineFlag,
) -> Option<HttpCompletionClient> {
    let api_key = llm
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .or_else(|| std::env::var("SILICONFLOW_API_KEY").ok())?;

    let base_url = llm
        .base_url
        .clone()
        .unwrap_or_else(|| SILICONFLOW_BASE_URL.to_string());

    Some(
        HttpCompletionClient::new(
            base_url,
            llm.model.clone(),
            api_key,
            Duration::from_secs(llm.timeouts.request),
        )
        .with_online_flag(online),
    )
}
