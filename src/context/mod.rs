//! 上下文层：每次请求并发聚合各 MCP 服务的状态

pub mod builder;

pub use builder::{
    ContextBuilder, ContextMetadata, ContextSource, MemoryContext, RagContext, ServiceContext,
    SourceStatus, SuperContext, RAG_DATASETS, SOURCE_NAMES,
};
