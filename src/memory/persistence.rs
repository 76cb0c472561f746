//! 本地持久化：同步键值存储
//!
//! KvStore 以字符串键存 JSON 文本，键不存在视为空序列。SqliteStore 为默认实现（单表 kv），
//! MemoryStore 供测试与无盘运行使用。

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::core::ChatError;

/// 对话记录的存储键
pub const CHAT_HISTORY_KEY: &str = "chatHistory";
/// 总结列表的存储键
pub const SUMMARIES_KEY: &str = "summaries";

/// 同步键值存储：无事务、无淘汰
pub trait KvStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError>;

    fn set(&self, key: &str, value: &str) -> Result<(), ChatError>;

    fn remove(&self, key: &str) -> Result<(), ChatError>;
}

/// 读取并反序列化；键不存在时返回默认值
pub fn load_json<T>(store: &dyn KvStore, key: &str) -> Result<T, ChatError>
where
    T: DeserializeOwned + Default,
{
    match store.get(key)? {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| ChatError::Storage(format!("{key} 反序列化失败: {e}"))),
        None => Ok(T::default()),
    }
}

/// 序列化后整体写入
pub fn save_json<T>(store: &dyn KvStore, key: &str, value: &T) -> Result<(), ChatError>
where
    T: Serialize + ?Sized,
{
    let raw = serde_json::to_string(value)
        .map_err(|e| ChatError::Storage(format!("{key} 序列化失败: {e}")))?;
    store.set(key, &raw)
}

/// 内存实现
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(key)
    }
}

impl KvStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        let map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        Ok(map.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ChatError> {
        let mut map = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        map.remove(key);
        Ok(())
    }
}

/// SQLite 实现：单表 kv(key, value, updated_at)
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// 打开（或创建）数据库文件；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, ChatError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ChatError::Storage(format!("创建数据目录失败: {e}")))?;
        }
        let conn = Connection::open(path).map_err(storage_err)?;
        Self::init(conn)
    }

    pub fn in_memory() -> Result<Self, ChatError> {
        let conn = Connection::open_in_memory().map_err(storage_err)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self, ChatError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(storage_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn storage_err(e: rusqlite::Error) -> ChatError {
    ChatError::Storage(e.to_string())
}

impl KvStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<String>, ChatError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.query_row("SELECT value FROM kv WHERE key = ?1", params![key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(storage_err)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), ChatError> {
        let now = chrono::Utc::now().to_rfc3339();
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute(
            "INSERT INTO kv (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )
        .map_err(storage_err)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), ChatError> {
        let conn = self.conn.lock().unwrap_or_else(|e| e.into_inner());
        conn.execute("DELETE FROM kv WHERE key = ?1", params![key])
            .map_err(storage_err)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::Turn;

    #[test]
    fn test_missing_key_loads_empty() {
        let store = MemoryStore::new();
        let turns: Vec<Turn> = load_json(&store, CHAT_HISTORY_KEY).unwrap();
        assert!(turns.is_empty());
    }

    #[test]
    fn test_corrupt_value_is_storage_error() {
        let store = MemoryStore::new();
        store.set(CHAT_HISTORY_KEY, "not json").unwrap();
        let err = load_json::<Vec<Turn>>(&store, CHAT_HISTORY_KEY).unwrap_err();
        assert!(matches!(err, ChatError::Storage(_)));
    }

    #[test]
    fn test_sqlite_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("xinyu.db");
        let turns = vec![Turn::user("我最近睡不好"), Turn::assistant("能多说说吗？")];

        {
            let store = SqliteStore::open(&path).unwrap();
            save_json(&store, CHAT_HISTORY_KEY, &turns).unwrap();
            save_json(&store, CHAT_HISTORY_KEY, &turns[..1]).unwrap();
        }

        let store = SqliteStore::open(&path).unwrap();
        let loaded: Vec<Turn> = load_json(&store, CHAT_HISTORY_KEY).unwrap();
        assert_eq!(loaded, turns[..1].to_vec());

        store.remove(CHAT_HISTORY_KEY).unwrap();
        assert!(store.get(CHAT_HISTORY_KEY).unwrap().is_none());
    }
}
