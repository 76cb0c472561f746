//! LLM 层：补全客户端抽象与实现（OpenAI 兼容 HTTP / SiliconFlow 预设 / Mock）、连通状态

pub mod connectivity;
pub mod http;
pub mod mock;
pub mod siliconflow;
pub mod traits;

pub use connectivity::{Connectivity, OnlineFlag};
pub use http::HttpCompletionClient;
pub use mock::MockCompletionClient;
pub use siliconflow::{create_siliconflow_client, SILICONFLOW_BASE_URL, SILICONFLOW_DEFAULT_MODEL};
pub use traits::CompletionClient;
