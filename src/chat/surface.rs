//! 渲染面（Render Surface）
//!
//! 会话逻辑只通过 RenderSurface 与界面交互：追加块、原地替换块、移除占位块、整体重置、
//! 总结面板与控件开关。UiSurface 将这些操作投影到 watch 通道上的 UiState，供 TUI 渲染。

use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

use crate::core::state::{RenderedBlock, UiState};
use crate::memory::{Role, Summary, Turn, TurnId};

/// 欢迎语（不属于对话记录）
pub const WELCOME_TEXT: &str = "欢迎，我是您的心理咨询助手，请问有什么可以帮您？";
/// 总结面板占位文字
pub const SUMMARY_PLACEHOLDER: &str = "总结将在此处显示...";
/// 总结生成中的面板文字
pub const SUMMARY_BUSY_TEXT: &str = "正在分析对话内容...";

/// 换行转为渲染面的换行标记
pub fn to_line_breaks(text: &str) -> String {
    text.replace('\n', "<br>")
}

/// 渲染前将换行标记还原为换行
pub fn from_line_breaks(text: &str) -> String {
    text.replace("<br>", "\n")
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockId(pub u64);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlockKind {
    Welcome,
    User,
    Assistant,
    /// 系统级提示（错误等），与真实回复区分显示
    Notice,
    /// 等待回复的临时占位
    Pending,
}

/// 一个可渲染块；turn 为其展示的对话（如有）
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Block {
    pub kind: BlockKind,
    pub content: String,
    pub turn: Option<TurnId>,
}

impl Block {
    pub fn welcome() -> Self {
        Self {
            kind: BlockKind::Welcome,
            content: WELCOME_TEXT.to_string(),
            turn: None,
        }
    }

    pub fn pending() -> Self {
        Self {
            kind: BlockKind::Pending,
            content: "…".to_string(),
            turn: None,
        }
    }

    pub fn notice(content: impl Into<String>) -> Self {
        Self {
            kind: BlockKind::Notice,
            content: content.into(),
            turn: None,
        }
    }

    /// system 角色（系统提示）不渲染
    pub fn from_turn(id: TurnId, turn: &Turn) -> Option<Self> {
        let kind = match turn.role {
            Role::User => BlockKind::User,
            Role::Assistant => BlockKind::Assistant,
            Role::System => return None,
        };
        Some(Self {
            kind,
            content: turn.content.clone(),
            turn: Some(id),
        })
    }
}

/// 可被禁用的界面控件
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    Send,
    Summary,
}

/// 总结面板内容
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SummaryPanel {
    Placeholder,
    Busy(String),
    /// index 为对应的已存总结（本地摘要为 None）；editable 时可编辑
    Content {
        text: String,
        index: Option<usize>,
        editable: bool,
    },
    Error(String),
}

/// 渲染面接口
pub trait RenderSurface: Send + Sync {
    fn append(&self, block: Block) -> BlockId;

    fn replace(&self, id: BlockId, block: Block);

    fn remove(&self, id: BlockId);

    /// 整体重置（加载历史 / 清空后的完整重绘）
    fn reset(&self, blocks: Vec<Block>);

    fn find_turn(&self, turn: TurnId) -> Option<BlockId>;

    fn show_summary(&self, panel: SummaryPanel);

    /// 打开或关闭历史总结列表
    fn show_history(&self, history: Option<Vec<Summary>>);

    /// 一次性提示（连通性检测结果、清除完成等）
    fn alert(&self, text: String);

    fn set_control(&self, control: Control, enabled: bool);

    fn is_enabled(&self, control: Control) -> bool;

    fn clear_input(&self);
}

/// 基于 watch 通道的渲染面
pub struct UiSurface {
    tx: watch::Sender<UiState>,
    next_id: AtomicU64,
}

impl UiSurface {
    pub fn new() -> (Self, watch::Receiver<UiState>) {
        let (tx, rx) = watch::channel(UiState::default());
        (
            Self {
                tx,
                next_id: AtomicU64::new(0),
            },
            rx,
        )
    }

    pub fn subscribe(&self) -> watch::Receiver<UiState> {
        self.tx.subscribe()
    }

    pub fn snapshot(&self) -> UiState {
        self.tx.borrow().clone()
    }

    fn allocate(&self) -> BlockId {
        BlockId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }
}

impl RenderSurface for UiSurface {
    fn append(&self, block: Block) -> BlockId {
        let id = self.allocate();
        self.tx.send_modify(|state| state.blocks.push(RenderedBlock { id, block }));
        id
    }

    fn replace(&self, id: BlockId, block: Block) {
        self.tx.send_modify(|state| {
            if let Some(slot) = state.blocks.iter_mut().find(|b| b.id == id) {
                slot.block = block;
            }
        });
    }

    fn remove(&self, id: BlockId) {
        self.tx.send_modify(|state| state.blocks.retain(|b| b.id != id));
    }

    fn reset(&self, blocks: Vec<Block>) {
        let rendered: Vec<RenderedBlock> = blocks
            .into_iter()
            .map(|block| RenderedBlock {
                id: self.allocate(),
                block,
            })
            .collect();
        self.tx.send_modify(|state| state.blocks = rendered);
    }

    fn find_turn(&self, turn: TurnId) -> Option<BlockId> {
        self.tx
            .borrow()
            .blocks
            .iter()
            .find(|b| b.block.turn == Some(turn))
            .map(|b| b.id)
    }

    fn show_summary(&self, panel: SummaryPanel) {
        self.tx.send_modify(|state| state.summary = panel);
    }

    fn show_history(&self, history: Option<Vec<Summary>>) {
        self.tx.send_modify(|state| state.history = history);
    }

    fn alert(&self, text: String) {
        self.tx.send_modify(|state| state.alert = Some(text));
    }

    fn set_control(&self, control: Control, enabled: bool) {
        self.tx.send_modify(|state| match control {
            Control::Send => state.send_enabled = enabled,
            Control::Summary => state.summary_enabled = enabled,
        });
    }

    fn is_enabled(&self, control: Control) -> bool {
        let state = self.tx.borrow();
        match control {
            Control::Send => state.send_enabled,
            Control::Summary => state.summary_enabled,
        }
    }

    fn clear_input(&self) {
        self.tx.send_modify(|state| state.input_epoch += 1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_break_markup() {
        assert_eq!(to_line_breaks("a\nb\nc"), "a<br>b<br>c");
        assert_eq!(from_line_breaks("a<br>b"), "a\nb");
    }

    #[test]
    fn test_system_turn_is_not_rendered() {
        assert!(Block::from_turn(TurnId(0), &Turn::system("x")).is_none());
        let block = Block::from_turn(TurnId(3), &Turn::user("hi")).unwrap();
        assert_eq!(block.kind, BlockKind::User);
        assert_eq!(block.turn, Some(TurnId(3)));
    }

    #[test]
    fn test_ui_surface_append_replace_remove() {
        let (surface, rx) = UiSurface::new();
        let a = surface.append(Block::welcome());
        let b = surface.append(Block::from_turn(TurnId(1), &Turn::user("原话")).unwrap());
        let p = surface.append(Block::pending());
        surface.remove(p);
        surface.replace(b, Block::from_turn(TurnId(1), &Turn::user("新话")).unwrap());

        let state = rx.borrow().clone();
        assert_eq!(state.blocks.len(), 2);
        assert_eq!(state.blocks[0].id, a);
        assert_eq!(state.blocks[1].block.content, "新话");
        assert_eq!(surface.find_turn(TurnId(1)), Some(b));
    }

    #[test]
    fn test_ui_surface_controls_and_input_epoch() {
        let (surface, _rx) = UiSurface::new();
        assert!(surface.is_enabled(Control::Send));
        surface.set_control(Control::Send, false);
        assert!(!surface.is_enabled(Control::Send));
        assert!(surface.is_enabled(Control::Summary));
        surface.clear_input();
        assert_eq!(surface.snapshot().input_epoch, 1);
    }
}
