//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `COPILOT__*` 覆盖（双下划线表示嵌套，如 `COPILOT__SERVICES__VISION_URL=http://...`）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    #[serde(default)]
    pub app: AppSection,
    #[serde(default)]
    pub server: ServerSection,
    #[serde(default)]
    pub services: ServicesSection,
    #[serde(default)]
    pub context: ContextSection,
    #[serde(default)]
    pub router: RouterSection,
    #[serde(default)]
    pub executor: ExecutorSection,
    #[serde(default)]
    pub llm: LlmSection,
}

/// [app] 段：应用名、会话目录、对话轮数上限
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    pub name: Option<String>,
    /// 会话 JSON 文件目录，未设置时用 ./sessions
    #[serde(default = "default_session_dir")]
    pub session_dir: PathBuf,
    /// 规划时带入的历史轮数
    #[serde(default = "default_max_context_turns")]
    pub max_context_turns: usize,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: None,
            session_dir: default_session_dir(),
            max_context_turns: default_max_context_turns(),
        }
    }
}

fn default_session_dir() -> PathBuf {
    PathBuf::from("sessions")
}

fn default_max_context_turns() -> usize {
    10
}

/// [server] 段：/orchestrate/ 监听地址
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// [services] 段：各 MCP 服务的 base URL 与单次调用超时
#[derive(Debug, Clone, Deserialize)]
pub struct ServicesSection {
    #[serde(default = "default_files_url")]
    pub files_url: String,
    #[serde(default = "default_memory_url")]
    pub memory_url: String,
    #[serde(default = "default_rag_url")]
    pub rag_url: String,
    #[serde(default = "default_vision_url")]
    pub vision_url: String,
    #[serde(default = "default_search_url")]
    pub search_url: String,
    #[serde(default = "default_system_url")]
    pub system_url: String,
    #[serde(default = "default_control_url")]
    pub control_url: String,
    #[serde(default = "default_audio_url")]
    pub audio_url: String,
    #[serde(default = "default_documents_url")]
    pub documents_url: String,
    /// 本地模型服务（与 files 共用端口）
    #[serde(default = "default_llm_url")]
    pub llm_url: String,
    /// 单次 HTTP 调用超时（秒）
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ServicesSection {
    fn default() -> Self {
        Self {
            files_url: default_files_url(),
            memory_url: default_memory_url(),
            rag_url: default_rag_url(),
            vision_url: default_vision_url(),
            search_url: default_search_url(),
            system_url: default_system_url(),
            control_url: default_control_url(),
            audio_url: default_audio_url(),
            documents_url: default_documents_url(),
            llm_url: default_llm_url(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_files_url() -> String {
    "http://127.0.0.1:8001".into()
}

fn default_memory_url() -> String {
    "http://127.0.0.1:8002".into()
}

fn default_rag_url() -> String {
    "http://127.0.0.1:8003".into()
}

fn default_vision_url() -> String {
    "http://127.0.0.1:8004".into()
}

fn default_search_url() -> String {
    "http://127.0.0.1:8005".into()
}

fn default_system_url() -> String {
    "http://127.0.0.1:8006".into()
}

fn default_control_url() -> String {
    "http://127.0.0.1:8007".into()
}

fn default_audio_url() -> String {
    "http://127.0.0.1:8007".into()
}

fn default_documents_url() -> String {
    "http://127.0.0.1:8009".into()
}

fn default_llm_url() -> String {
    "http://127.0.0.1:8001".into()
}

fn default_timeout_secs() -> u64 {
    30
}

/// [context] 段：记忆检索条数
#[derive(Debug, Clone, Deserialize)]
pub struct ContextSection {
    #[serde(default = "default_memory_recent_limit")]
    pub memory_recent_limit: usize,
    #[serde(default = "default_memory_search_top_k")]
    pub memory_search_top_k: usize,
    /// 写入规划 prompt 的上下文最大字符数
    #[serde(default = "default_prompt_context_chars")]
    pub prompt_context_chars: usize,
}

impl Default for ContextSection {
    fn default() -> Self {
        Self {
            memory_recent_limit: default_memory_recent_limit(),
            memory_search_top_k: default_memory_search_top_k(),
            prompt_context_chars: default_prompt_context_chars(),
        }
    }
}

fn default_memory_recent_limit() -> usize {
    5
}

fn default_memory_search_top_k() -> usize {
    3
}

fn default_prompt_context_chars() -> usize {
    6000
}

/// [[router.agents]] 条目
#[derive(Debug, Clone, Deserialize)]
pub struct AgentEntry {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub priority: u32,
    #[serde(default)]
    pub capabilities: Vec<String>,
}

/// [router] 段：输出截断长度与 Agent 注册表（为空时使用内置默认表）
#[derive(Debug, Clone, Deserialize)]
pub struct RouterSection {
    #[serde(default = "default_max_output_chars")]
    pub max_output_chars: usize,
    #[serde(default)]
    pub agents: Vec<AgentEntry>,
}

impl Default for RouterSection {
    fn default() -> Self {
        Self {
            max_output_chars: default_max_output_chars(),
            agents: Vec::new(),
        }
    }
}

fn default_max_output_chars() -> usize {
    4000
}

/// [executor] 段：重试与默认执行模式
#[derive(Debug, Clone, Deserialize)]
pub struct ExecutorSection {
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,
    /// 第 n 次重试前等待 retry_delay_ms * n
    #[serde(default = "default_retry_delay_ms")]
    pub retry_delay_ms: u64,
    /// auto / safe / parallel / dry_run
    #[serde(default = "default_mode")]
    pub default_mode: String,
}

impl Default for ExecutorSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            retry_delay_ms: default_retry_delay_ms(),
            default_mode: default_mode(),
        }
    }
}

fn default_max_retries() -> usize {
    3
}

fn default_retry_delay_ms() -> u64 {
    500
}

fn default_mode() -> String {
    "safe".to_string()
}

/// [llm] 段：OpenAI 兼容端点与 API Key 所在环境变量
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,
    /// 读取 API Key 的环境变量名；缺失时该连接器不可用，回退到本地模型
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

fn default_llm_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta/openai".to_string()
}

fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}

fn default_request_timeout() -> u64 {
    60
}

/// 从 config 目录加载配置，环境变量 COPILOT__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 COPILOT__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("COPILOT")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}
