//! 状态定义：UiState 投影
//!
//! UI 只持有轻量的 UiState（渲染块、总结面板、控件开关、一次性提示）；
//! 会话与总结的完整状态分别由 ChatSession 与 SummaryBook 维护，经 RenderSurface 投影到这里。

use crate::chat::surface::{Block, BlockId, SummaryPanel};
use crate::memory::Summary;

/// 已分配 id 的渲染块
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedBlock {
    pub id: BlockId,
    pub block: Block,
}

/// UI 看到的「投影」状态，轻量且易于渲染
#[derive(Clone, Debug)]
pub struct UiState {
    pub blocks: Vec<RenderedBlock>,
    pub summary: SummaryPanel,
    pub send_enabled: bool,
    pub summary_enabled: bool,
    /// 每次「清空输入框」递增，UI 观察到变化即清空输入缓冲
    pub input_epoch: u64,
    pub alert: Option<String>,
    /// 打开的历史总结列表
    pub history: Option<Vec<Summary>>,
}

impl Default for UiState {
    fn default() -> Self {
        Self {
            blocks: Vec::new(),
            summary: SummaryPanel::Placeholder,
            send_enabled: true,
            summary_enabled: true,
            input_epoch: 0,
            alert: None,
            history: None,
        }
    }
}

/// 会话阶段（标题栏显示用）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Idle,
    Waiting,
    Summarizing,
}

impl UiState {
    pub fn phase(&self) -> SessionPhase {
        if !self.send_enabled {
            SessionPhase::Waiting
        } else if !self.summary_enabled {
            SessionPhase::Summarizing
        } else {
            SessionPhase::Idle
        }
    }
}
