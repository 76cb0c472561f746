//! 短期记忆：对话记录
//!
//! Turn 是发往 API / 写入存储的 {role, content}；Transcript 为每条 Turn 附带稳定的 TurnId，
//! 编辑按 TurnId 定位，不依赖界面上的渲染顺序推算下标。

use std::fmt;

use serde::{Deserialize, Serialize};

/// 消息角色（与 LLM API 一致，序列化为小写）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// 单条对话
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }
}

/// 进程内稳定的对话标识；不持久化，同一进程内不复用
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TurnId(pub u64);

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// 生成咨询师系统提示；latest_summary 为最近一次总结内容
pub fn preamble(latest_summary: Option<&str>) -> String {
    let latest = latest_summary
        .map(|s| format!("\n根据上次咨询总结：{s}"))
        .unwrap_or_default();
    format!(
        "你是一位专业心理咨询师，遵循以下原则：\n\
         1. 用温暖包容的态度回应\n\
         2. 优先共情理解\n\
         3. 引导用户自我探索\n\
         4. 每次回应控制在3-5句话\n\
         5. 使用自然的口语化中文\n\
         6. 结合之前的咨询总结：{latest}"
    )
}

/// 有序对话记录（Session State）
#[derive(Clone, Debug, Default)]
pub struct Transcript {
    entries: Vec<(TurnId, Turn)>,
    next_id: u64,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_turns(turns: Vec<Turn>) -> Self {
        let mut transcript = Self::new();
        transcript.replace_all(turns);
        transcript
    }

    pub fn push(&mut self, turn: Turn) -> TurnId {
        let id = TurnId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, turn));
        id
    }

    pub fn get(&self, id: TurnId) -> Option<&Turn> {
        self.entries
            .iter()
            .find(|(tid, _)| *tid == id)
            .map(|(_, turn)| turn)
    }

    /// 原地替换指定 Turn 的内容；id 不存在时返回 None
    pub fn replace_content(&mut self, id: TurnId, content: impl Into<String>) -> Option<&Turn> {
        let (_, turn) = self.entries.iter_mut().find(|(tid, _)| *tid == id)?;
        turn.content = content.into();
        Some(turn)
    }

    /// 整体替换为新的 Turn 序列；新 id 从当前计数继续分配
    pub fn replace_all(&mut self, turns: Vec<Turn>) {
        self.entries.clear();
        for turn in turns {
            self.push(turn);
        }
    }

    /// 仅在记录为空时写入系统提示，保证不会重复
    pub fn seed_preamble(&mut self, latest_summary: Option<&str>) -> bool {
        if !self.entries.is_empty() {
            return false;
        }
        self.push(Turn::system(preamble(latest_summary)));
        true
    }

    pub fn entries(&self) -> impl Iterator<Item = (TurnId, &Turn)> {
        self.entries.iter().map(|(id, turn)| (*id, turn))
    }

    /// 当前记录的快照（用于请求与持久化）
    pub fn turns(&self) -> Vec<Turn> {
        self.entries.iter().map(|(_, turn)| turn.clone()).collect()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_role_serializes_lowercase() {
        let json = serde_json::to_string(&Turn::assistant("好的")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"好的"}"#);
    }

    #[test]
    fn test_seed_preamble_only_when_empty() {
        let mut t = Transcript::new();
        assert!(t.seed_preamble(None));
        assert!(!t.seed_preamble(Some("上次总结")));
        assert_eq!(t.len(), 1);
        assert_eq!(t.turns()[0].role, Role::System);
    }

    #[test]
    fn test_preamble_includes_latest_summary() {
        let text = preamble(Some("• 睡眠不好"));
        assert!(text.contains("根据上次咨询总结：• 睡眠不好"));
        assert!(preamble(None).ends_with("结合之前的咨询总结："));
    }

    #[test]
    fn test_ids_are_not_reused_after_replace_all() {
        let mut t = Transcript::from_turns(vec![Turn::user("a"), Turn::assistant("b")]);
        let old: Vec<TurnId> = t.entries().map(|(id, _)| id).collect();
        t.replace_all(vec![Turn::user("c")]);
        let (new_id, _) = t.entries().next().unwrap();
        assert!(!old.contains(&new_id));
        assert!(t.get(old[0]).is_none());
    }

    #[test]
    fn test_replace_content_by_id() {
        let mut t = Transcript::new();
        t.seed_preamble(None);
        let id = t.push(Turn::user("原话"));
        t.push(Turn::assistant("回复"));
        assert_eq!(t.replace_content(id, "改过的话").unwrap().content, "改过的话");
        assert_eq!(t.turns()[1].content, "改过的话");
        assert!(t.replace_content(TurnId(999), "x").is_none());
    }
}
