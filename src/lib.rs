//! 心语 - 终端心理咨询助手
//!
//! 模块划分：
//! - **chat**: 对话会话、总结生成、渲染面抽象
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 错误与恢复、状态投影、会话监管、主控循环
//! - **llm**: 补全客户端抽象与实现（SiliconFlow / OpenAI 兼容 HTTP / Mock）、连通性
//! - **memory**: 对话记录、总结列表与键值持久化
//! - **observability**: 日志初始化
//! - **ui**: Ratatui TUI 界面

pub mod chat;
pub mod config;
pub mod core;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod ui;
