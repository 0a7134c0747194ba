//! Run configuration loading and validation.
//!
//! `AgentConfig` is built once at process start and handed to every component
//! by reference. Sources, in order of precedence:
//!
//! 1. An optional YAML file (`--config`, `HOUSING_AGENT_CONFIG`, or
//!    `./housing-agent.yaml`). String values may reference the environment as
//!    `${VAR}` or `${VAR:-default}`.
//! 2. Environment variables for fields the file leaves out (`OPENAI_API_KEY`,
//!    `OPENSEARCH_HOST`, `LANGSMITH_API_KEY`, …).
//! 3. Built-in defaults.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::agent_core::intent::IntentStrategy;

// ─── Constants ───────────────────────────────────────────────────────────────

/// Env var naming an explicit config file.
const CONFIG_ENV_VAR: &str = "HOUSING_AGENT_CONFIG";

/// Config file looked up in the working directory when nothing else is given.
const DEFAULT_CONFIG_FILE: &str = "housing-agent.yaml";

const DEFAULT_API_BASE: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_LANGSMITH_PROJECT: &str = "uk-housing-agent";
const DEFAULT_LANGSMITH_ENDPOINT: &str = "https://api.smith.langchain.com";

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Configuration errors. All of them are fatal and surface before the first
/// model call.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", path.display())]
    NotFound { path: PathBuf },

    #[error("failed to read {}: {reason}", path.display())]
    Read { path: PathBuf, reason: String },

    #[error("failed to parse config: {reason}")]
    Parse { reason: String },

    #[error("missing credential: {name}")]
    MissingCredential { name: &'static str },

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

// ─── Secret ──────────────────────────────────────────────────────────────────

/// A credential string that never shows up in `Debug` output or logs.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("Secret(<empty>)")
        } else {
            f.write_str("Secret(***)")
        }
    }
}

// ─── Sections ────────────────────────────────────────────────────────────────

/// Language model provider settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub api_key: Secret,
    pub api_base: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub request_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: Secret::new(env_or("OPENAI_API_KEY", "")),
            api_base: env_or("OPENAI_API_BASE", DEFAULT_API_BASE),
            model: env_or("OPENAI_MODEL", DEFAULT_MODEL),
            temperature: 0.7,
            max_tokens: 1000,
            request_timeout_secs: 60,
        }
    }
}

/// OpenSearch knowledge index. An empty `host` disables knowledge search.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct KnowledgeConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: Secret,
    pub index: String,
    pub use_tls: bool,
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            host: env_or("OPENSEARCH_HOST", ""),
            port: 25060,
            user: env_or("OPENSEARCH_USER", ""),
            password: Secret::new(env_or("OPENSEARCH_PASSWORD", "")),
            index: "uk-housing".to_string(),
            use_tls: true,
            top_k: 3,
        }
    }
}

impl KnowledgeConfig {
    pub fn is_enabled(&self) -> bool {
        !self.host.trim().is_empty()
    }

    /// Base URL of the index service, e.g. `https://search.example:25060`.
    pub fn base_url(&self) -> String {
        let host = self.host.trim().trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            return format!("{host}:{}", self.port);
        }
        let scheme = if self.use_tls { "https" } else { "http" };
        format!("{scheme}://{host}:{}", self.port)
    }
}

/// Run export to LangSmith. An empty key disables export.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    pub langsmith_api_key: Secret,
    pub langsmith_project: String,
    pub langsmith_endpoint: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            langsmith_api_key: Secret::new(env_or("LANGSMITH_API_KEY", "")),
            langsmith_project: env_or("LANGSMITH_PROJECT", DEFAULT_LANGSMITH_PROJECT),
            langsmith_endpoint: env_or("LANGSMITH_ENDPOINT", DEFAULT_LANGSMITH_ENDPOINT),
        }
    }
}

impl TelemetryConfig {
    pub fn is_enabled(&self) -> bool {
        !self.langsmith_api_key.is_empty()
    }
}

/// Conversation loop settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Upper bound on model invocations per turn.
    pub max_tool_rounds: usize,
    pub intent_strategy: IntentStrategy,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 8,
            intent_strategy: IntentStrategy::Keyword,
        }
    }
}

/// HTTP API settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Bearer token required on `/v1/*`. `None` leaves the API open.
    pub api_token: Option<Secret>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            api_token: std::env::var("HOUSING_AGENT_API_TOKEN")
                .ok()
                .filter(|t| !t.trim().is_empty())
                .map(Secret::new),
        }
    }
}

/// Thread store location.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// `None` resolves to `<data_dir>/threads.db`.
    pub database_path: Option<String>,
}

impl StorageConfig {
    pub fn resolve_database_path(&self) -> String {
        match &self.database_path {
            Some(path) if !path.trim().is_empty() => expand_tilde(path),
            _ => {
                let dir = crate::data_dir();
                let _ = std::fs::create_dir_all(&dir);
                dir.join("threads.db").to_string_lossy().into_owned()
            }
        }
    }
}

/// Log output settings (the filter itself comes from `RUST_LOG`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write a rotated `agent.log` under the data directory.
    pub file: bool,
    /// Emit JSON lines instead of human-readable output.
    pub json: bool,
}

/// Top-level configuration (mirrors `housing-agent.yaml`).
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    pub llm: LlmConfig,
    pub knowledge: KnowledgeConfig,
    pub telemetry: TelemetryConfig,
    pub agent: LoopConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub logging: LoggingConfig,
}

// ─── Loading ─────────────────────────────────────────────────────────────────

impl AgentConfig {
    /// Load the configuration. An explicit path must exist; otherwise the
    /// env var and working-directory file are tried, then env-only defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        match find_config_path(explicit)? {
            Some(path) => {
                tracing::info!(path = %path.display(), "loading config file");
                load_config_file(&path)
            }
            None => {
                tracing::info!("no config file, using environment defaults");
                Ok(Self::default())
            }
        }
    }

    /// Reject configurations that cannot produce a working turn.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.llm.api_key.is_empty() {
            return Err(ConfigError::MissingCredential {
                name: "llm.api_key (OPENAI_API_KEY)",
            });
        }
        if !(self.llm.api_base.starts_with("http://") || self.llm.api_base.starts_with("https://"))
        {
            return Err(ConfigError::Invalid {
                field: "llm.api_base",
                reason: format!("expected an http(s) URL, got '{}'", self.llm.api_base),
            });
        }
        if self.llm.model.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "llm.model",
                reason: "must not be empty".into(),
            });
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::Invalid {
                field: "llm.temperature",
                reason: format!("{} is outside 0.0-2.0", self.llm.temperature),
            });
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::Invalid {
                field: "llm.max_tokens",
                reason: "must be at least 1".into(),
            });
        }
        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::Invalid {
                field: "agent.max_tool_rounds",
                reason: "must be at least 1".into(),
            });
        }
        if self.knowledge.is_enabled() && self.knowledge.port == 0 {
            return Err(ConfigError::Invalid {
                field: "knowledge.port",
                reason: "must be non-zero when knowledge.host is set".into(),
            });
        }
        Ok(())
    }
}

/// Resolve which config file to read, if any.
pub fn find_config_path(explicit: Option<&Path>) -> Result<Option<PathBuf>, ConfigError> {
    if let Some(path) = explicit {
        if path.exists() {
            return Ok(Some(path.to_path_buf()));
        }
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }

    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        let candidate = PathBuf::from(expand_tilde(&path));
        if candidate.exists() {
            return Ok(Some(candidate));
        }
        return Err(ConfigError::NotFound { path: candidate });
    }

    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.exists() {
        return Ok(Some(local));
    }

    Ok(None)
}

/// Read, interpolate and parse a YAML config file.
pub fn load_config_file(path: &Path) -> Result<AgentConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_config(&raw)
}

/// Parse YAML config text after `${VAR}` interpolation.
pub fn parse_config(raw: &str) -> Result<AgentConfig, ConfigError> {
    let interpolated = interpolate_env_vars(raw);
    if interpolated.trim().is_empty() {
        return Ok(AgentConfig::default());
    }
    serde_yaml::from_str(&interpolated).map_err(|e| ConfigError::Parse {
        reason: e.to_string(),
    })
}

// ─── Env-var interpolation ───────────────────────────────────────────────────

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

/// Replace `${VAR}` and `${VAR:-default}` in a string.
fn interpolate_env_vars(input: &str) -> String {
    let mut result = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && chars.peek() == Some(&'{') {
            chars.next();
            let mut var_expr = String::new();
            for c in chars.by_ref() {
                if c == '}' {
                    break;
                }
                var_expr.push(c);
            }
            result.push_str(&resolve_var_expr(&var_expr));
        } else {
            result.push(ch);
        }
    }

    result
}

/// Resolve a variable expression like `VAR` or `VAR:-default`.
fn resolve_var_expr(expr: &str) -> String {
    if let Some(idx) = expr.find(":-") {
        let var_name = &expr[..idx];
        let default = &expr[idx + 2..];
        std::env::var(var_name)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| expand_tilde(default))
    } else {
        std::env::var(expr).unwrap_or_default()
    }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix('~') {
        if let Some(home) = dirs::home_dir() {
            return format!("{}{rest}", home.display());
        }
    }
    path.to_string()
}

// ─── Tests ───────────────────────────────────────────────────────────────────
