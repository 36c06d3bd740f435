//! Copilot 编排服务
//!
//! 入口：初始化日志、加载配置、构建编排器并启动 HTTP 服务。
//! 用法：copilot [config.toml]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use copilot::config::load_config;
use copilot::{observability, server, Orchestrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    observability::init();

    let config_path = std::env::args().nth(1).map(PathBuf::from);
    let cfg = load_config(config_path).unwrap_or_else(|e| {
        tracing::warn!("Config load failed ({}), using defaults", e);
        Default::default()
    });

    tracing::info!("starting {}", cfg.app.name.as_deref().unwrap_or("copilot"));

    std::fs::create_dir_all(&cfg.app.session_dir)
        .with_context(|| format!("Failed to create session dir {}", cfg.app.session_dir.display()))?;

    let orchestrator = Arc::new(Orchestrator::from_config(&cfg));
    server::serve(orchestrator, &cfg.server.host, cfg.server.port)
        .await
        .context("HTTP server failed")?;

    Ok(())
}
