//! 会话编排器：主控循环
//!
//! 负责：加载配置、创建补全客户端 / 存储 / 会话 / 总结生成器，建立 cmd / state 通道，
//! 并在后台任务中消费用户命令。三个任务：
//! - 分发任务：接收 Command，直接处理取消、历史列表、连通性检测等轻量命令；
//! - 对话任务：独占 ChatSession，按顺序处理发送、编辑、加载、清除；
//! - 总结任务：独占 SummaryGenerator，按顺序处理生成请求。
//! 分发任务在转发发送 / 总结请求前先禁用对应控件，控件禁用期间的重复请求直接丢弃。
//! 总结令牌在排队时签发，取消由分发任务直接作用于 SessionSupervisor，
//! 因此无论请求仍在排队还是总结任务已挂起都能生效。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use tokio::sync::{mpsc, watch};
use tokio_util::sync::CancellationToken;

use crate::chat::{
    local_summary, to_line_breaks, ChatSession, ClearScope, Control, RenderSurface,
    SummaryGenerator, SummaryPanel, UiSurface,
};
use crate::config::{load_config, AppConfig};
use crate::core::{RecoveryEngine, RetryPolicy, SessionSupervisor, UiState};
use crate::llm::{
    create_siliconflow_client, CompletionClient, Connectivity, MockCompletionClient, OnlineFlag,
};
use crate::memory::{KvStore, SqliteStore, SummaryBook, TurnId};

/// 从 UI 发往编排器的用户命令
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// 发送一条用户消息
    Submit(String),
    /// 编辑一条已显示的对话
    EditTurn { id: TurnId, content: String },
    GenerateSummary,
    /// 取消正在进行的总结生成
    CancelSummary,
    /// 本地简易总结（不联网）
    LocalSummary,
    ShowHistory,
    CloseHistory,
    /// 用第 n 条总结的对话快照替换当前对话
    LoadSummary(usize),
    EditSummary { index: usize, content: String },
    /// 清除全部对话记录
    ClearHistory,
    /// 选择性删除对话 / 总结
    ClearAll(ClearScope),
    /// 连通性检测
    Probe,
    Quit,
}

/// 构建会话所需的外部协作者与参数
pub struct SessionParts {
    pub llm: Arc<dyn CompletionClient>,
    pub store: Arc<dyn KvStore>,
    pub connectivity: Arc<dyn Connectivity>,
    pub chat_temperature: f64,
    pub summary_temperature: f64,
    pub retry: RetryPolicy,
}

impl SessionParts {
    pub fn from_config(cfg: &AppConfig) -> anyhow::Result<Self> {
        let online = OnlineFlag::new();
        let llm = create_llm_from_config(cfg, online.clone());
        let db_path = cfg.app.database_path();
        let store = SqliteStore::open(&db_path)
            .with_context(|| format!("Failed to open store at {}", db_path.display()))?;
        tracing::info!("Using store {}", db_path.display());

        Ok(Self {
            llm,
            store: Arc::new(store),
            connectivity: Arc::new(online),
            chat_temperature: cfg.llm.chat_temperature,
            summary_temperature: cfg.llm.summary_temperature,
            retry: cfg.summary.retry_policy(),
        })
    }
}

/// 根据配置与环境变量选择补全后端（SiliconFlow / Mock）
pub(crate) fn create_llm_from_config(cfg: &AppConfig, online: OnlineFlag) -> Arc<dyn CompletionClient> {
    let provider = cfg.llm.provider.to_lowercase();
    if provider == "mock" {
        tracing::info!("Using Mock LLM");
        return Arc::new(MockCompletionClient::new());
    }

    match create_siliconflow_client(&cfg.llm, online) {
        Some(client) => {
            tracing::info!("Using SiliconFlow LLM ({})", cfg.llm.model);
            Arc::new(client)
        }
        None => {
            tracing::warn!("No API key set, using Mock LLM");
            Arc::new(MockCompletionClient::new())
        }
    }
}

/// 创建应用运行时：返回命令发送端与状态接收端
pub async fn create_app(
    config_path: Option<PathBuf>,
) -> anyhow::Result<(mpsc::UnboundedSender<Command>, watch::Receiver<UiState>)> {
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        AppConfig::default()
    });
    let parts = SessionParts::from_config(&cfg)?;
    Ok(spawn_session(parts))
}

/// 由给定协作者启动会话任务（需在 tokio 运行时内调用）
pub fn spawn_session(
    parts: SessionParts,
) -> (mpsc::UnboundedSender<Command>, watch::Receiver<UiState>) {
    let (surface, state_rx) = UiSurface::new();
    let surface = Arc::new(surface);
    let summaries = Arc::new(SummaryBook::load(parts.store.clone()));
    let supervisor = Arc::new(SessionSupervisor::new());

    let mut session = ChatSession::new(
        parts.llm.clone(),
        parts.store.clone(),
        summaries.clone(),
        surface.clone(),
        parts.chat_temperature,
    )
    .with_cancel_token(supervisor.chat_token());
    session.render_all();
    let transcript_rx = session.subscribe();

    let generator = SummaryGenerator::new(
        parts.llm.clone(),
        summaries.clone(),
        surface.clone(),
        parts.connectivity.clone(),
        supervisor.clone(),
        transcript_rx.clone(),
    )
    .with_recovery(RecoveryEngine::new(parts.retry))
    .with_temperature(parts.summary_temperature);

    // 三通道：UI -> 分发；分发 -> 对话任务；分发 -> 总结任务
    let (cmd_tx, mut cmd_rx) = mpsc::unbounded_channel::<Command>();
    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel::<Command>();
    let (summary_tx, mut summary_rx) = mpsc::unbounded_channel::<CancellationToken>();

    let chat_surface = surface.clone();
    tokio::spawn(async move {
        while let Some(cmd) = chat_rx.recv().await {
            match cmd {
                Command::Submit(text) => {
                    session.submit(&text).await;
                }
                Command::EditTurn { id, content } => {
                    if let Err(e) = session.edit_turn(id, &content) {
                        chat_surface.alert(format!("编辑失败：{e}"));
                    }
                }
                Command::LoadSummary(index) => match session.load_summary(index) {
                    Ok(()) => chat_surface.show_history(None),
                    Err(e) => chat_surface.alert(format!("加载失败：{e}")),
                },
                Command::ClearHistory => session.clear_history(),
                Command::ClearAll(scope) => session.clear_all(scope),
                other => tracing::debug!(?other, "Ignored by chat worker"),
            }
        }
    });

    tokio::spawn(async move {
        while let Some(cancel) = summary_rx.recv().await {
            let outcome = generator.generate_with(cancel).await;
            tracing::debug!(?outcome, "Summary request settled");
        }
    });

    let llm = parts.llm;
    tokio::spawn(async move {
        while let Some(cmd) = cmd_rx.recv().await {
            match cmd {
                Command::Submit(text) => {
                    if text.trim().is_empty() {
                        tracing::debug!("Empty submit dropped");
                    } else if !surface.is_enabled(Control::Send) {
                        tracing::debug!("Send control disabled, submit dropped");
                    } else {
                        surface.set_control(Control::Send, false);
                        let _ = chat_tx.send(Command::Submit(text));
                    }
                }
                Command::GenerateSummary => {
                    if surface.is_enabled(Control::Summary) {
                        surface.set_control(Control::Summary, false);
                        let _ = summary_tx.send(supervisor.renew_summary_token());
                    } else {
                        tracing::debug!("Summary already queued or running, request dropped");
                    }
                }
                Command::CancelSummary => supervisor.cancel_summary(),
                Command::LocalSummary => {
                    let digest = local_summary(&transcript_rx.borrow());
                    surface.show_summary(SummaryPanel::Content {
                        text: digest,
                        index: None,
                        editable: false,
                    });
                }
                Command::ShowHistory => surface.show_history(Some(summaries.list())),
                Command::CloseHistory => surface.show_history(None),
                Command::EditSummary { index, content } => {
                    let content = content.trim().to_string();
                    match summaries.edit(index, content.clone()) {
                        Ok(()) => {
                            surface.show_summary(SummaryPanel::Content {
                                text: to_line_breaks(&content),
                                index: Some(index),
                                editable: true,
                            });
                            if surface.snapshot().history.is_some() {
                                surface.show_history(Some(summaries.list()));
                            }
                        }
                        Err(e) => surface.alert(format!("编辑失败：{e}")),
                    }
                }
                Command::Probe => {
                    let llm = llm.clone();
                    let surface = surface.clone();
                    tokio::spawn(async move {
                        let text = match llm.probe().await {
                            Ok(status) => format!("API连通正常，状态码：{status}"),
                            Err(e) => format!("API连接失败：{e}"),
                        };
                        surface.alert(text);
                    });
                }
                Command::Quit => {
                    supervisor.shutdown();
                    break;
                }
                other => {
                    let _ = chat_tx.send(other);
                }
            }
        }
        tracing::info!("Command loop stopped");
    });

    (cmd_tx, state_rx)
}
