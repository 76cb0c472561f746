//! 对话编排：一次用户输入如何变成已持久化、已显示的助手回复
//!
//! submit：追加用户 Turn → 显示等待占位 → 请求一次补全 → 移除占位 →
//! 成功则追加助手回复；失败不重试，渲染系统提示（不进入记录）并追加一条本地备用回复。
//! 每次变更后写回存储并通过 watch 通道发布记录快照（总结生成器只读订阅）。

use std::sync::Arc;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::chat::surface::{to_line_breaks, Block, Control, RenderSurface, SummaryPanel};
use crate::core::{ChatError, RecoveryEngine};
use crate::llm::CompletionClient;
use crate::memory::{
    load_json, save_json, KvStore, SummaryBook, Transcript, Turn, TurnId, CHAT_HISTORY_KEY,
};

/// 一次 submit 的结果
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// 空输入，未做任何变更
    Ignored,
    Replied(TurnId),
    /// 远程失败，已写入备用回复
    Fallback { turn: TurnId, error: ChatError },
}

/// 选择性清除范围
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClearScope {
    pub turns: bool,
    pub summaries: bool,
}

impl ClearScope {
    pub const TURNS: Self = Self {
        turns: true,
        summaries: false,
    };
    pub const SUMMARIES: Self = Self {
        turns: false,
        summaries: true,
    };
    pub const ALL: Self = Self {
        turns: true,
        summaries: true,
    };
}

/// 会话编排器：独占对话记录，只通过自身方法变更（变更即持久化 + 发布）
pub struct ChatSession {
    llm: Arc<dyn CompletionClient>,
    store: Arc<dyn KvStore>,
    summaries: Arc<SummaryBook>,
    surface: Arc<dyn RenderSurface>,
    recovery: RecoveryEngine,
    transcript: Transcript,
    transcript_tx: watch::Sender<Vec<Turn>>,
    temperature: f64,
    cancel: CancellationToken,
}

impl ChatSession {
    /// 从存储恢复对话；为空时写入系统提示
    pub fn new(
        llm: Arc<dyn CompletionClient>,
        store: Arc<dyn KvStore>,
        summaries: Arc<SummaryBook>,
        surface: Arc<dyn RenderSurface>,
        temperature: f64,
    ) -> Self {
        let (transcript_tx, _) = watch::channel(Vec::new());
        let mut session = Self {
            llm,
            store,
            summaries,
            surface,
            recovery: RecoveryEngine::default(),
            transcript: Transcript::new(),
            transcript_tx,
            temperature,
            cancel: CancellationToken::new(),
        };
        session.hydrate();
        session
    }

    /// 请求使用的取消令牌（通常为会话监管的子 token，退出时取消）
    pub fn with_cancel_token(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn turns(&self) -> Vec<Turn> {
        self.transcript.turns()
    }

    /// 订阅记录快照
    pub fn subscribe(&self) -> watch::Receiver<Vec<Turn>> {
        self.transcript_tx.subscribe()
    }

    pub async fn submit(&mut self, text: &str) -> SubmitOutcome {
        let message = text.trim();
        if message.is_empty() {
            return SubmitOutcome::Ignored;
        }

        self.surface.set_control(Control::Send, false);

        let user_id = self.append(Turn::user(message));
        if let Some(block) = self.transcript.get(user_id).and_then(|t| Block::from_turn(user_id, t)) {
            self.surface.append(block);
        }
        let pending = self.surface.append(Block::pending());

        let context = self.transcript.turns();
        tracing::info!(turns = context.len(), model = self.llm.model(), "Submitting user turn");
        let result = self
            .llm
            .complete(&context, self.temperature, &self.cancel)
            .await;
        self.surface.remove(pending);

        let outcome = match result {
            Ok(reply) => {
                let id = self.append_rendered(Turn::assistant(to_line_breaks(&reply)));
                SubmitOutcome::Replied(id)
            }
            Err(error) => {
                tracing::error!(
                    error = %error,
                    turns = context.len(),
                    timestamp = %chrono::Utc::now().to_rfc3339(),
                    "Completion failed, using local fallback"
                );
                let fallback = self.recovery.handle_chat(&error);
                self.surface.append(Block::notice(fallback.notice));
                let id = self.append_rendered(Turn::assistant(fallback.reply));
                SubmitOutcome::Fallback { turn: id, error }
            }
        };

        self.surface.set_control(Control::Send, true);
        self.surface.clear_input();
        outcome
    }

    /// 原地编辑一条对话；内容为空时保留原文
    pub fn edit_turn(&mut self, id: TurnId, content: &str) -> Result<(), ChatError> {
        if self.transcript.get(id).is_none() {
            return Err(ChatError::UnknownTurn(id));
        }
        let content = content.trim();
        if content.is_empty() {
            return Ok(());
        }

        let block = self
            .transcript
            .replace_content(id, content)
            .and_then(|turn| Block::from_turn(id, turn));
        self.commit();

        if let (Some(block), Some(block_id)) = (block, self.surface.find_turn(id)) {
            self.surface.replace(block_id, block);
        }
        tracing::info!(turn = %id, "Turn edited");
        Ok(())
    }

    /// 从存储重新加载并完整重绘（对应页面刷新）
    pub fn reload(&mut self) {
        self.hydrate();
        self.render_all();
    }

    /// 清除全部对话记录（总结保留），界面回到欢迎状态
    pub fn clear_history(&mut self) {
        if let Err(e) = self.store.remove(CHAT_HISTORY_KEY) {
            tracing::warn!("Failed to remove chat history: {}", e);
        }
        self.transcript.clear();
        self.seed_preamble();
        self.publish();
        self.surface.reset(vec![Block::welcome()]);
        self.surface.show_summary(SummaryPanel::Placeholder);
        self.surface.alert("已清除所有对话记录".to_string());
        tracing::info!("Chat history cleared");
    }

    /// 用某条总结冻结的对话整体替换当前记录，写回后完整重绘
    pub fn load_summary(&mut self, index: usize) -> Result<(), ChatError> {
        let summary = self
            .summaries
            .get(index)
            .ok_or(ChatError::UnknownSummary(index))?;
        self.transcript.replace_all(summary.transcript_snapshot);
        self.commit();
        self.seed_preamble();
        self.publish();
        self.render_all();
        tracing::info!(index, turns = self.transcript.len(), "Transcript restored from summary");
        Ok(())
    }

    /// 选择性删除对话与/或总结，随后完整重新加载
    pub fn clear_all(&mut self, scope: ClearScope) {
        if scope.turns {
            if let Err(e) = self.store.remove(CHAT_HISTORY_KEY) {
                tracing::warn!("Failed to remove chat history: {}", e);
            }
            self.transcript.clear();
        }
        if scope.summaries {
            self.summaries.clear();
        }
        tracing::info!(turns = scope.turns, summaries = scope.summaries, "History deleted");
        self.reload();
    }

    /// 按当前记录重绘：欢迎语 + 非 system 对话，总结面板显示最近一条总结
    pub fn render_all(&self) {
        let mut blocks = vec![Block::welcome()];
        blocks.extend(
            self.transcript
                .entries()
                .filter_map(|(id, turn)| Block::from_turn(id, turn)),
        );
        self.surface.reset(blocks);

        let panel = match self.summaries.latest() {
            Some(latest) => SummaryPanel::Content {
                text: to_line_breaks(&latest.content),
                index: Some(self.summaries.len() - 1),
                editable: true,
            },
            None => SummaryPanel::Placeholder,
        };
        self.surface.show_summary(panel);
    }

    fn hydrate(&mut self) {
        let turns = load_json::<Vec<Turn>>(self.store.as_ref(), CHAT_HISTORY_KEY).unwrap_or_else(|e| {
            tracing::warn!("Failed to load chat history ({}), starting empty", e);
            Vec::new()
        });
        self.transcript.replace_all(turns);
        self.seed_preamble();
        self.publish();
    }

    fn seed_preamble(&mut self) {
        let latest = self.summaries.latest().map(|s| s.content);
        self.transcript.seed_preamble(latest.as_deref());
    }

    fn append(&mut self, turn: Turn) -> TurnId {
        let id = self.transcript.push(turn);
        self.commit();
        id
    }

    fn append_rendered(&mut self, turn: Turn) -> TurnId {
        let id = self.append(turn);
        if let Some(block) = self.transcript.get(id).and_then(|t| Block::from_turn(id, t)) {
            self.surface.append(block);
        }
        id
    }

    /// 持久化（尽力而为）并发布快照
    fn commit(&self) {
        if let Err(e) = save_json(self.store.as_ref(), CHAT_HISTORY_KEY, &self.transcript.turns()) {
            tracing::warn!("Failed to persist chat history: {}", e);
        }
        self.publish();
    }

    fn publish(&self) {
        self.transcript_tx.send_replace(self.transcript.turns());
    }
}
