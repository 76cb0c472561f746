//! 总结记录
//!
//! 每条 Summary 冻结生成时刻的对话快照，可原样恢复；列表整体持久化，不做局部更新。

use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::core::ChatError;
use crate::memory::persistence::{load_json, save_json, KvStore, SUMMARIES_KEY};
use crate::memory::Turn;

/// 单条总结；字段名沿用存储布局 {date, content, chatHistory}
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Summary {
    #[serde(rename = "date")]
    pub timestamp: String,
    pub content: String,
    #[serde(rename = "chatHistory", default)]
    pub transcript_snapshot: Vec<Turn>,
}

impl Summary {
    pub fn new(content: impl Into<String>, transcript_snapshot: Vec<Turn>) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%Y/%m/%d %H:%M:%S").to_string(),
            content: content.into(),
            transcript_snapshot,
        }
    }
}

/// 总结列表：内存副本 + 持久化镜像。锁只在同步代码中持有
pub struct SummaryBook {
    store: Arc<dyn KvStore>,
    entries: Mutex<Vec<Summary>>,
}

impl SummaryBook {
    /// 从存储加载；读取失败时记录告警并以空列表开始
    pub fn load(store: Arc<dyn KvStore>) -> Self {
        let entries = load_json::<Vec<Summary>>(store.as_ref(), SUMMARIES_KEY).unwrap_or_else(|e| {
            tracing::warn!("Failed to load summaries ({}), starting empty", e);
            Vec::new()
        });
        Self {
            store,
            entries: Mutex::new(entries),
        }
    }

    /// 追加一条总结并整体写回，返回其下标
    pub fn push(&self, summary: Summary) -> usize {
        let mut entries = self.lock();
        entries.push(summary);
        self.persist(&entries);
        entries.len() - 1
    }

    /// 编辑总结内容并写回（快照保持不变）
    pub fn edit(&self, index: usize, content: impl Into<String>) -> Result<(), ChatError> {
        let mut entries = self.lock();
        let entry = entries
            .get_mut(index)
            .ok_or(ChatError::UnknownSummary(index))?;
        entry.content = content.into();
        self.persist(&entries);
        Ok(())
    }

    pub fn get(&self, index: usize) -> Option<Summary> {
        self.lock().get(index).cloned()
    }

    pub fn latest(&self) -> Option<Summary> {
        self.lock().last().cloned()
    }

    pub fn list(&self) -> Vec<Summary> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// 清空内存与存储中的全部总结
    pub fn clear(&self) {
        let mut entries = self.lock();
        entries.clear();
        if let Err(e) = self.store.remove(SUMMARIES_KEY) {
            tracing::warn!("Failed to remove summaries: {}", e);
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Summary>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn persist(&self, entries: &[Summary]) {
        if let Err(e) = save_json(self.store.as_ref(), SUMMARIES_KEY, entries) {
            tracing::warn!("Failed to persist summaries: {}", e);
        }
    }
}
