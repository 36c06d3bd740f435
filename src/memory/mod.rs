//! 记忆层：LLM 消息类型与文件型会话存储

pub mod conversation;
pub mod session_store;

pub use conversation::{Message, Role};
pub use session_store::{
    sanitize_session_id, SessionError, SessionMessage, SessionRecord, SessionStore,
};
