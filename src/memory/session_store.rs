//! 会话持久化
//!
//! 每个会话一个 JSON 文件：{session_id, created_at, updated_at, messages: [{role, content, timestamp, metadata?}]}。
//! 会话 ID 先清洗为 [A-Za-z0-9_-] 再用作文件名；消息只追加不修改。

use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tokio::fs;
use tokio::sync::Mutex;

use crate::memory::{Message, Role};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Corrupt session file {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialize error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 会话中的一条消息
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SessionMessage {
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl SessionMessage {
    pub fn to_message(&self) -> Message {
        Message {
            role: self.role,
            content: self.content.clone(),
        }
    }
}

/// 会话文件内容
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<SessionMessage>,
}

impl SessionRecord {
    fn new(session_id: &str) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.to_string(),
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_-]").expect("static regex"))
}

/// 清洗会话 ID：仅保留字母数字、`-`、`_`；清洗后为空时用 default
pub fn sanitize_session_id(session_id: &str) -> String {
    let cleaned = unsafe_chars().replace_all(session_id, "").into_owned();
    if cleaned.is_empty() {
        "default".to_string()
    } else {
        cleaned
    }
}

/// 文件型会话存储；写操作经互斥锁串行化，避免并发追加丢消息
#[derive(Debug)]
pub struct SessionStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl SessionStore {
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir
            .join(format!("{}.json", sanitize_session_id(session_id)))
    }

    /// 读取会话文件；不存在时返回 None
    pub async fn load(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let path = self.path_for(session_id);
        let data = match fs::read_to_string(&path).await {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let record = serde_json::from_str(&data).map_err(|source| SessionError::Corrupt {
            path: path.display().to_string(),
            source,
        })?;
        Ok(Some(record))
    }

    /// 追加一条消息；目录不存在时自动创建
    pub async fn add_message(
        &self,
        session_id: &str,
        role: Role,
        content: &str,
        metadata: Option<Value>,
    ) -> Result<SessionMessage, SessionError> {
        let _guard = self.write_lock.lock().await;
        let id = sanitize_session_id(session_id);
        let mut record = self
            .load(&id)
            .await?
            .unwrap_or_else(|| SessionRecord::new(&id));

        let message = SessionMessage {
            role,
            content: content.to_string(),
            timestamp: Utc::now(),
            metadata,
        };
        record.messages.push(message.clone());
        record.updated_at = message.timestamp;

        fs::create_dir_all(&self.dir).await?;
        let path = self.path_for(&id);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&record)?).await?;
        fs::rename(&tmp, &path).await?;
        Ok(message)
    }

    /// 最近 limit 条消息（按时间顺序）；limit 为 None 时返回全部
    pub async fn get(
        &self,
        session_id: &str,
        limit: Option<usize>,
    ) -> Result<Vec<SessionMessage>, SessionError> {
        let messages = self
            .load(session_id)
            .await?
            .map(|r| r.messages)
            .unwrap_or_default();
        Ok(match limit {
            Some(l) => messages[messages.len().saturating_sub(l)..].to_vec(),
            None => messages,
        })
    }

    /// 删除会话文件，返回是否存在
    pub async fn clear(&self, session_id: &str) -> Result<bool, SessionError> {
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(self.path_for(session_id)).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// 已有会话 ID（排序）
    pub async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut ids = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    ids.push(stem.to_string());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}
