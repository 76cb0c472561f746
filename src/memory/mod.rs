//! 记忆层：对话记录（Session State）、总结列表、键值持久化

pub mod conversation;
pub mod persistence;
pub mod summaries;

pub use conversation::{preamble, Role, Transcript, Turn, TurnId};
pub use persistence::{
    load_json, save_json, KvStore, MemoryStore, SqliteStore, CHAT_HISTORY_KEY, SUMMARIES_KEY,
};
pub use summaries::{Summary, SummaryBook};
