//! 工具客户端层：每个 MCP 服务一个客户端，统一走 ServiceClient（REST/JSON）

pub mod audio;
pub mod control;
pub mod documents;
pub mod files;
pub mod http;
pub mod llm;
pub mod memory;
pub mod rag;
pub mod registry;
pub mod search;
pub mod system;
pub mod vision;

pub use audio::AudioClient;
pub use control::ControlClient;
pub use documents::DocumentsClient;
pub use files::FilesClient;
pub use http::ServiceClient;
pub use llm::LocalLlmToolClient;
pub use memory::MemoryClient;
pub use rag::RagClient;
pub use registry::{parse_args, ToolClient, ToolKind, ToolRegistry};
pub use search::SearchClient;
pub use system::SystemClient;
pub use vision::VisionClient;
