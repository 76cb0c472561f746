//! 会话层：对话编排（ChatSession）、总结生成（SummaryGenerator）、渲染面抽象

pub mod session;
pub mod summary;
pub mod surface;

pub use session::{ChatSession, ClearScope, SubmitOutcome};
pub use summary::{local_summary, SummaryGenerator, SummaryOutcome, SUMMARY_INSTRUCTION};
pub use surface::{
    from_line_breaks, to_line_breaks, Block, BlockId, BlockKind, Control, RenderSurface,
    SummaryPanel, UiSurface,
};
