//! 对话总结生成
//!
//! 以固定的系统指令 + 完整对话请求一次补全，得到不超过 5 条、以「•」开头的简短要点。
//! 每次生成使用一个新的取消令牌（generate 自行签发，或由调度方在排队时签发后交给 generate_with）；
//! 失败按 RetryPolicy 有界重试（延迟可被取消），取消不重试。
//! 连通标记为离线时先探测一次端点，仍不可达才放弃本次生成。
//! 成功后以当时的对话快照生成 Summary 并整体写回列表。

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::chat::surface::{
    to_line_breaks, Control, RenderSurface, SummaryPanel, SUMMARY_BUSY_TEXT,
};
use crate::core::{summary_notice, ChatError, RecoveryAction, RecoveryEngine, SessionSupervisor};
use crate::llm::{CompletionClient, Connectivity};
use crate::memory::{Role, Summary, SummaryBook, Turn};

/// 总结的输出约束
pub const SUMMARY_INSTRUCTION: &str =
    "用中文总结对话，要求：1.列出3-5个关键点 2.每个点用•开头 3.总字数不超过150字 4.使用简洁的口语化表达";

/// 一次 generate 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SummaryOutcome {
    /// 新总结在列表中的下标
    Created(usize),
    Offline,
    Cancelled,
    Failed(ChatError),
}

pub struct SummaryGenerator {
    llm: Arc<dyn CompletionClient>,
    summaries: Arc<SummaryBook>,
    surface: Arc<dyn RenderSurface>,
    connectivity: Arc<dyn Connectivity>,
    supervisor: Arc<SessionSupervisor>,
    recovery: RecoveryEngine,
    transcript: watch::Receiver<Vec<Turn>>,
    temperature: f64,
}

impl SummaryGenerator {
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        summaries: Arc<SummaryBook>,
        surface: Arc<dyn RenderSurface>,
        connectivity: Arc<dyn Connectivity>,
        supervisor: Arc<SessionSupervisor>,
        transcript: watch::Receiver<Vec<Turn>>,
    ) -> Self {
        Self {
            llm,
            summaries,
            surface,
            connectivity,
            supervisor,
            recovery: RecoveryEngine::default(),
            transcript,
            temperature: 0.5,
        }
    }

    pub fn with_recovery(mut self, recovery: RecoveryEngine) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn generate(&self) -> SummaryOutcome {
        let cancel = self.supervisor.renew_summary_token();
        self.generate_with(cancel).await
    }

    /// 使用调度方预先签发的令牌生成；令牌在排队期间被取消则不发请求
    pub async fn generate_with(&self, cancel: CancellationToken) -> SummaryOutcome {
        if cancel.is_cancelled() {
            tracing::info!("Summary cancelled before start");
            self.surface
                .show_summary(SummaryPanel::Error(summary_notice(&ChatError::Cancelled)));
            self.surface.set_control(Control::Summary, true);
            return SummaryOutcome::Cancelled;
        }

        if !self.is_reachable().await {
            tracing::warn!("Offline, summary generation skipped");
            self.surface
                .show_summary(SummaryPanel::Error(summary_notice(&ChatError::Offline)));
            self.surface.set_control(Control::Summary, true);
            return SummaryOutcome::Offline;
        }

        self.surface.set_control(Control::Summary, false);
        self.surface
            .show_summary(SummaryPanel::Busy(SUMMARY_BUSY_TEXT.to_string()));

        let mut attempt = 0u32;
        let outcome = loop {
            attempt += 1;
            let mut messages = vec![Turn::system(SUMMARY_INSTRUCTION)];
            messages.extend(self.transcript.borrow().iter().cloned());

            let error = match self.llm.complete(&messages, self.temperature, &cancel).await {
                Ok(content) => break self.store_summary(content),
                Err(e) => e,
            };

            if error == ChatError::Cancelled {
                tracing::info!("Summary generation cancelled");
                self.surface
                    .show_summary(SummaryPanel::Error(summary_notice(&error)));
                break SummaryOutcome::Cancelled;
            }
            tracing::error!(attempt, error = %error, "Summary generation failed");

            match self.recovery.handle_summary(&error, attempt) {
                RecoveryAction::Retry { delay, notice } => {
                    self.surface.show_summary(SummaryPanel::Error(notice));
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.surface.show_summary(SummaryPanel::Error(
                                summary_notice(&ChatError::Cancelled),
                            ));
                            break SummaryOutcome::Cancelled;
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
                RecoveryAction::Surface(notice) => {
                    self.surface.show_summary(SummaryPanel::Error(notice));
                    break SummaryOutcome::Failed(error);
                }
            }
        };

        self.surface.set_control(Control::Summary, true);
        outcome
    }

    /// 取消当前这一次生成
    pub fn cancel(&self) {
        self.supervisor.cancel_summary();
    }

    /// 离线标记只在收到响应后恢复，因此离线时先探测一次
    async fn is_reachable(&self) -> bool {
        if self.connectivity.is_online() {
            return true;
        }
        match self.llm.probe().await {
            Ok(status) => {
                tracing::info!(status, "Endpoint reachable again");
                self.connectivity.set_online(true);
                true
            }
            Err(e) => {
                tracing::debug!(error = %e, "Endpoint still unreachable");
                false
            }
        }
    }

    fn store_summary(&self, content: String) -> SummaryOutcome {
        let snapshot = self.transcript.borrow().clone();
        let display = to_line_breaks(&content);
        let index = self.summaries.push(Summary::new(content, snapshot));
        self.surface.show_summary(SummaryPanel::Content {
            text: display,
            index: Some(index),
            editable: true,
        });
        tracing::info!(index, "Summary stored");
        SummaryOutcome::Created(index)
    }
}

/// 本地简易总结：列出用户问题与咨询建议，不请求网络、不写入总结列表
pub fn local_summary(turns: &[Turn]) -> String {
    let user: Vec<&str> = turns
        .iter()
        .filter(|t| t.role == Role::User)
        .map(|t| t.content.as_str())
        .collect();
    let assistant: Vec<&str> = turns
        .iter()
        .filter(|t| t.role == Role::Assistant)
        .map(|t| t.content.as_str())
        .collect();

    let mut out = format!("用户主要问题 ({}个):", user.len());
    for q in &user {
        out.push_str("<br>• ");
        out.push_str(q);
    }
    out.push_str(&format!("<br>咨询建议 ({}条):", assistant.len()));
    for a in &assistant {
        out.push_str("<br>• ");
        out.push_str(a);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_summary_counts_roles() {
        let turns = vec![
            Turn::system("preamble"),
            Turn::user("睡不着"),
            Turn::assistant("能说说原因吗？"),
            Turn::user("工作压力"),
        ];
        let digest = local_summary(&turns);
        assert!(digest.starts_with("用户主要问题 (2个):<br>• 睡不着<br>• 工作压力"));
        assert!(digest.ends_with("咨询建议 (1条):<br>• 能说说原因吗？"));
        assert!(!digest.contains("preamble"));
    }

    #[test]
    fn test_local_summary_empty() {
        assert_eq!(local_summary(&[]), "用户主要问题 (0个):<br>咨询建议 (0条):");
    }
}
