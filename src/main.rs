//! 心语 - 终端心理咨询助手
//!
//! 入口：初始化文件日志、创建会话编排器与 TUI，并运行主循环。
//! 可选的第一个参数为额外配置文件路径。

use std::path::PathBuf;

use anyhow::Context;
use xinyu::{core::create_app, observability, ui::run_app};

const LOG_FILE: &str = "logs/xinyu.log";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init_with_file(LOG_FILE)?;

    let config_path = std::env::args().nth(1).map(PathBuf::from);

    // 创建会话：返回命令发送端、状态接收端
    let (cmd_tx, state_rx) = create_app(config_path)
        .await
        .context("Failed to create app")?;

    run_app(state_rx, cmd_tx).await.context("App run failed")?;

    tracing::info!("Exited");
    Ok(())
}
