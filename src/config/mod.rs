//! Configuration management.
//!
//! Settings come from three layers, later layers winning:
//!
//! 1. Built-in defaults.
//! 2. A TOML file (`<config_dir>/quantix/config.toml` or an explicit path).
//! 3. `QUANTIX_*` environment variables.

mod features;

pub use features::FeatureFlags;

use crate::extract::VariableSelection;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Minimum cosine similarity for a memo cache hit.
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.85;

/// Knowledge-base chunks retrieved per query.
pub const DEFAULT_KB_TOP_K: usize = 3;

/// Knowledge-base relevance floor; weaker chunks are not answers.
pub const DEFAULT_KB_MIN_SCORE: f32 = 0.6;

/// Sub-problems resolved in parallel by `resolve_concurrent`.
pub const DEFAULT_MAX_CONCURRENT: usize = 4;

/// Main configuration for quantix.
#[derive(Debug, Clone, Serialize)]
pub struct QuantixConfig {
    /// Directory for the memo store and knowledge index.
    pub data_dir: PathBuf,
    /// Memo cache settings.
    pub memo: MemoConfig,
    /// Knowledge-base settings.
    pub knowledge: KnowledgeConfig,
    /// LLM provider settings.
    pub llm: LlmConfig,
    /// Cascade settings.
    pub cascade: CascadeConfig,
    /// Symbolic tier settings.
    pub symbolic: SymbolicConfig,
    /// Tier switches.
    pub features: FeatureFlags,
    /// Logging settings.
    pub logging: LoggingSettings,
}

/// Where confirmed answers are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MemoBackend {
    /// `SQLite` database.
    #[default]
    Sqlite,
    /// Single JSON document.
    File,
    /// Process memory only.
    Memory,
}

impl MemoBackend {
    /// Parses a backend name. Unknown names fall back to `SQLite`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "file" | "json" => Self::File,
            "memory" | "in-memory" | "in_memory" => Self::Memory,
            _ => Self::Sqlite,
        }
    }
}

/// Memo cache settings.
#[derive(Debug, Clone, Serialize)]
pub struct MemoConfig {
    /// Storage backend.
    pub backend: MemoBackend,
    /// Store location; defaults under `data_dir`.
    pub path: Option<PathBuf>,
    /// Minimum cosine similarity for reuse (inclusive).
    pub similarity_threshold: f32,
}

impl Default for MemoConfig {
    fn default() -> Self {
        Self {
            backend: MemoBackend::default(),
            path: None,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
        }
    }
}

/// Knowledge-base settings.
#[derive(Debug, Clone, Serialize)]
pub struct KnowledgeConfig {
    /// Directory of markdown documents to ingest.
    pub docs_dir: Option<PathBuf>,
    /// Saved index location; defaults under `data_dir`.
    pub index_path: Option<PathBuf>,
    /// Chunks retrieved per query.
    pub top_k: usize,
    /// Relevance floor for a chunk to count as a match.
    pub min_score: f32,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            docs_dir: None,
            index_path: None,
            top_k: DEFAULT_KB_TOP_K,
            min_score: DEFAULT_KB_MIN_SCORE,
        }
    }
}

/// Cascade settings.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CascadeConfig {
    /// Worker limit for concurrent resolution.
    pub max_concurrent: usize,
}

impl Default for CascadeConfig {
    fn default() -> Self {
        Self {
            max_concurrent: DEFAULT_MAX_CONCURRENT,
        }
    }
}

/// Symbolic tier settings.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SymbolicConfig {
    /// Which variable to differentiate by when none is named.
    pub variable_selection: VariableSelection,
}

/// Logging settings. The environment still wins at init time.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoggingSettings {
    /// Filter directive, e.g. `info` or `quantix=debug`.
    pub level: Option<String>,
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

/// LLM provider configuration.
#[derive(Debug, Clone, Default, Serialize)]
pub struct LlmConfig {
    /// Provider name: "anthropic", "openai", "ollama", "lmstudio", "none".
    pub provider: LlmProvider,
    /// Model name.
    pub model: Option<String>,
    /// API key (can be environment variable reference like `${OPENAI_API_KEY}`).
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL for the provider (for self-hosted).
    pub base_url: Option<String>,
    /// Maximum tokens per completion.
    pub max_tokens: Option<u32>,
    /// Request timeout in milliseconds.
    pub timeout_ms: Option<u64>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: Option<u64>,
    /// Retries for timed-out calls.
    pub max_retries: Option<u32>,
    /// Backoff between retries in milliseconds.
    pub retry_backoff_ms: Option<u64>,
    /// Consecutive failures before the circuit opens.
    pub breaker_failure_threshold: Option<u32>,
    /// How long the circuit stays open in milliseconds.
    pub breaker_reset_ms: Option<u64>,
    /// Maximum concurrent requests.
    pub max_concurrent: Option<usize>,
}

/// Available LLM providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// No model; the last tier answers "not recognized".
    #[default]
    None,
    /// Anthropic Claude.
    Anthropic,
    /// `OpenAI` GPT.
    OpenAi,
    /// Ollama (local, OpenAI-compatible endpoint).
    Ollama,
    /// LM Studio (local, OpenAI-compatible endpoint).
    LmStudio,
}

impl LlmProvider {
    /// Parses a provider string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "anthropic" | "claude" => Self::Anthropic,
            "openai" => Self::OpenAi,
            "ollama" => Self::Ollama,
            "lmstudio" | "lm_studio" | "lm-studio" => Self::LmStudio,
            _ => Self::None,
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Memo section.
    pub memo: Option<ConfigFileMemo>,
    /// Knowledge section.
    pub knowledge: Option<ConfigFileKnowledge>,
    /// LLM section.
    pub llm: Option<ConfigFileLlm>,
    /// Cascade section.
    pub cascade: Option<ConfigFileCascade>,
    /// Symbolic section.
    pub symbolic: Option<ConfigFileSymbolic>,
    /// Feature flags.
    pub features: Option<ConfigFileFeatures>,
    /// Logging section.
    pub logging: Option<ConfigFileLogging>,
}

/// Memo section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileMemo {
    /// Backend name.
    pub backend: Option<String>,
    /// Store path.
    pub path: Option<String>,
    /// Similarity threshold.
    pub similarity_threshold: Option<f32>,
}

/// Knowledge section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileKnowledge {
    /// Documents directory.
    pub docs_dir: Option<String>,
    /// Index path.
    pub index_path: Option<String>,
    /// Top k.
    pub top_k: Option<usize>,
    /// Minimum score.
    pub min_score: Option<f32>,
}

/// LLM section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLlm {
    /// Provider name.
    pub provider: Option<String>,
    /// Model name.
    pub model: Option<String>,
    /// API key.
    pub api_key: Option<String>,
    /// Base URL.
    pub base_url: Option<String>,
    /// Max tokens.
    pub max_tokens: Option<u32>,
    /// Request timeout.
    pub timeout_ms: Option<u64>,
    /// Connect timeout.
    pub connect_timeout_ms: Option<u64>,
    /// Retries.
    pub max_retries: Option<u32>,
    /// Retry backoff.
    pub retry_backoff_ms: Option<u64>,
    /// Breaker threshold.
    pub breaker_failure_threshold: Option<u32>,
    /// Breaker reset.
    pub breaker_reset_ms: Option<u64>,
    /// Concurrency cap.
    pub max_concurrent: Option<usize>,
}

/// Cascade section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileCascade {
    /// Worker limit.
    pub max_concurrent: Option<usize>,
}

/// Symbolic section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSymbolic {
    /// "first" or "last".
    pub variable_selection: Option<String>,
}

/// Features section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileFeatures {
    /// Memory tier.
    pub memory_tier: Option<bool>,
    /// Knowledge tier.
    pub knowledge_tier: Option<bool>,
    /// Symbolic tier.
    pub symbolic_tier: Option<bool>,
    /// Explainer.
    pub explainer: Option<bool>,
}

/// Logging section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileLogging {
    /// Filter directive.
    pub level: Option<String>,
    /// Output format.
    pub format: Option<String>,
    /// Log file.
    pub file: Option<String>,
}

impl Default for QuantixConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            memo: MemoConfig::default(),
            knowledge: KnowledgeConfig::default(),
            llm: LlmConfig::default(),
            cascade: CascadeConfig::default(),
            symbolic: SymbolicConfig::default(),
            features: FeatureFlags::default(),
            logging: LoggingSettings::default(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    directories::ProjectDirs::from("", "", "quantix")
        .map_or_else(|| PathBuf::from(".quantix"), |dirs| dirs.data_dir().to_path_buf())
}

impl QuantixConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path, then applies env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| Error::OperationFailed {
            operation: "read_config_file".to_string(),
            cause: format!("{}: {e}", path.display()),
        })?;
        Ok(Self::from_toml(&contents)?.with_env_overrides())
    }

    /// Parses TOML without applying env overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the TOML is malformed.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(contents).map_err(|e| Error::OperationFailed {
            operation: "parse_config_file".to_string(),
            cause: e.to_string(),
        })?;
        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks the platform config dir, then `~/.config/quantix/`. Falls back
    /// to defaults when neither has a readable file. Env overrides always
    /// apply.
    #[must_use]
    pub fn load_default() -> Self {
        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Self::default().with_env_overrides();
        };

        let candidates = [
            base_dirs.config_dir().join("quantix").join("config.toml"),
            base_dirs.home_dir().join(".config").join("quantix").join("config.toml"),
        ];
        for path in candidates.iter().filter(|p| p.exists()) {
            match Self::load_from_file(path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                },
            }
        }

        Self::default().with_env_overrides()
    }

    /// Converts a `ConfigFile` to `QuantixConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(memo) = file.memo {
            if let Some(backend) = memo.backend {
                config.memo.backend = MemoBackend::parse(&backend);
            }
            config.memo.path = memo.path.map(PathBuf::from);
            if let Some(threshold) = memo.similarity_threshold {
                config.memo.similarity_threshold = threshold;
            }
        }
        if let Some(knowledge) = file.knowledge {
            config.knowledge.docs_dir = knowledge.docs_dir.map(PathBuf::from);
            config.knowledge.index_path = knowledge.index_path.map(PathBuf::from);
            if let Some(top_k) = knowledge.top_k {
                config.knowledge.top_k = top_k.max(1);
            }
            if let Some(min_score) = knowledge.min_score {
                config.knowledge.min_score = min_score;
            }
        }
        if let Some(llm) = file.llm {
            if let Some(provider) = llm.provider {
                config.llm.provider = LlmProvider::parse(&provider);
            }
            config.llm.model = llm.model;
            config.llm.api_key = llm.api_key.map(|key| expand_env_reference(&key));
            config.llm.base_url = llm.base_url;
            config.llm.max_tokens = llm.max_tokens;
            config.llm.timeout_ms = llm.timeout_ms;
            config.llm.connect_timeout_ms = llm.connect_timeout_ms;
            config.llm.max_retries = llm.max_retries;
            config.llm.retry_backoff_ms = llm.retry_backoff_ms;
            config.llm.breaker_failure_threshold = llm.breaker_failure_threshold;
            config.llm.breaker_reset_ms = llm.breaker_reset_ms;
            config.llm.max_concurrent = llm.max_concurrent;
        }
        if let Some(max_concurrent) = file.cascade.and_then(|c| c.max_concurrent) {
            config.cascade.max_concurrent = max_concurrent.max(1);
        }
        if let Some(selection) = file.symbolic.and_then(|s| s.variable_selection) {
            config.symbolic.variable_selection = parse_selection(&selection);
        }
        if let Some(features) = file.features {
            if let Some(v) = features.memory_tier {
                config.features.memory_tier = v;
            }
            if let Some(v) = features.knowledge_tier {
                config.features.knowledge_tier = v;
            }
            if let Some(v) = features.symbolic_tier {
                config.features.symbolic_tier = v;
            }
            if let Some(v) = features.explainer {
                config.features.explainer = v;
            }
        }
        if let Some(logging) = file.logging {
            config.logging.level = logging.level;
            config.logging.format = logging.format;
            config.logging.file = logging.file.map(PathBuf::from);
        }

        config
    }

    /// Applies `QUANTIX_*` environment variable overrides.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = std::env::var("QUANTIX_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = std::env::var("QUANTIX_MEMO_BACKEND") {
            self.memo.backend = MemoBackend::parse(&v);
        }
        if let Ok(v) = std::env::var("QUANTIX_MEMO_PATH") {
            self.memo.path = Some(PathBuf::from(v));
        }
        if let Some(v) = env_parse("QUANTIX_SIMILARITY_THRESHOLD") {
            self.memo.similarity_threshold = v;
        }
        if let Ok(v) = std::env::var("QUANTIX_KB_DIR") {
            self.knowledge.docs_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = env_parse::<usize>("QUANTIX_KB_TOP_K") {
            self.knowledge.top_k = v.max(1);
        }
        if let Some(v) = env_parse("QUANTIX_KB_MIN_SCORE") {
            self.knowledge.min_score = v;
        }
        if let Some(v) = env_parse::<usize>("QUANTIX_MAX_CONCURRENT") {
            self.cascade.max_concurrent = v.max(1);
        }
        if let Ok(v) = std::env::var("QUANTIX_VARIABLE_SELECTION") {
            self.symbolic.variable_selection = parse_selection(&v);
        }
        if let Ok(v) = std::env::var("QUANTIX_LLM_PROVIDER") {
            self.llm.provider = LlmProvider::parse(&v);
        }
        if let Ok(v) = std::env::var("QUANTIX_LLM_MODEL") {
            self.llm.model = Some(v);
        }
        if let Ok(v) = std::env::var("QUANTIX_LLM_API_KEY") {
            self.llm.api_key = Some(v);
        }
        if let Ok(v) = std::env::var("QUANTIX_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        self.features = self.features.with_env_overrides();
        self
    }

    /// Path of the memo store for the configured backend.
    #[must_use]
    pub fn memo_path(&self) -> PathBuf {
        self.memo.path.clone().unwrap_or_else(|| match self.memo.backend {
            MemoBackend::File => self.data_dir.join("memo.json"),
            MemoBackend::Sqlite | MemoBackend::Memory => self.data_dir.join("memo.db"),
        })
    }

    /// Path of the saved knowledge index.
    #[must_use]
    pub fn knowledge_index_path(&self) -> PathBuf {
        self.knowledge
            .index_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join("knowledge.json"))
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }
}

fn parse_selection(s: &str) -> VariableSelection {
    if s.trim().eq_ignore_ascii_case("last") {
        VariableSelection::Last
    } else {
        VariableSelection::First
    }
}

/// Reads and parses an environment variable, ignoring unparsable values.
pub(crate) fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

/// Expands a `${VAR}` reference; other values pass through.
fn expand_env_reference(value: &str) -> String {
    value
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .map_or_else(|| value.to_string(), |name| std::env::var(name).unwrap_or_default())
}
