//! 核心编排层：错误与恢复、状态投影、会话监管、主控循环

pub mod error;
pub mod orchestrator;
pub mod recovery;
pub mod session_supervisor;
pub mod state;

pub use error::ChatError;
pub use orchestrator::{create_app, spawn_session, Command, SessionParts};
pub use recovery::{
    chat_notice, pick_fallback_reply, summary_notice, ChatFallback, RecoveryAction,
    RecoveryEngine, RetryPolicy, FALLBACK_REPLIES,
};
pub use session_supervisor::SessionSupervisor;
pub use state::{RenderedBlock, SessionPhase, UiState};
