use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::application::ChatPrompts;

pub const DEFAULT_CONFIG_PATH: &str = "config/app.yaml";
pub const DEFAULT_PROMPTS_PATH: &str = "config/prompts.yaml";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";

const FRIENDLY_PROMPT: &str = "\
You are a friendly and enthusiastic AI-powered travel guide, eager to make every trip feel exciting and memorable!
Your responses should be warm, engaging, and natural, just like a conversation with a well-traveled friend.

How you should interact:
- Greet users warmly and make them feel special.
- Keep the tone friendly, cheerful, and full of positive energy.
- Offer thoughtful travel recommendations based on their preferences.
- Use casual, inviting language while keeping responses informative.
- Add a touch of excitement and storytelling to inspire travelers.

Now, let's help our traveler!";

const EXPERT_PROMPT: &str = "\
You are an expert travel consultant with deep knowledge of destinations, logistics and local culture.
Give precise, well-organized recommendations grounded in the provided travel notes.

How you should interact:
- Lead with the most relevant recommendation, then supporting options.
- Mention practical details such as best season, getting around and typical costs when the notes cover them.
- Tailor suggestions to the traveler's companions and interests.
- Say plainly when the notes do not cover something instead of guessing.";

const CONTEXT_TEMPLATE: &str = "\
Travel notes are below.
---------------------
{context}
---------------------
Using the travel notes and not prior knowledge, answer the traveler's request.
Request: {query}
Answer: ";

const NO_CONTEXT: &str = "(no matching travel notes)";

const SIGN_OFF: &str =
    "\n\n🌟 I hope this helps! Let me know if you'd like more details or a different suggestion.";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("environment variable {0} is not set")]
    MissingApiKey(&'static str),
}

/// Service settings plus prompt texts, loaded from two YAML files.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub config: Config,
    pub prompts: PromptsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub llm: LlmConfig,
    pub embedding: EmbeddingConfig,
    pub rag: RagConfig,
    pub sessions: SessionConfig,
    pub cors: CorsConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub model: String,
    pub temperature: Option<f64>,
    /// Longest wait for the first or next streamed chunk.
    pub timeout_seconds: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: None,
            timeout_seconds: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimension: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "embedding-001".to_string(),
            dimension: 768,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RagConfig {
    pub documents_dir: PathBuf,
    pub storage_dir: PathBuf,
    pub recursive_documents: bool,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub top_k: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            documents_dir: PathBuf::from("data"),
            storage_dir: PathBuf::from("storage"),
            recursive_documents: false,
            chunk_size: 800,
            chunk_overlap: 20,
            top_k: 2,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionBackend {
    #[default]
    Memory,
    Redis,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub backend: SessionBackend,
    pub redis_url: String,
    pub ttl_seconds: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: SessionBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            ttl_seconds: 60 * 60 * 24,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub format: LogFormat,
    /// Used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Text,
            filter: "api=debug,indexer=debug,travel_concierge=debug,tower_http=debug".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptsConfig {
    pub agent: AgentPrompts,
    pub query: QueryPrompts,
    pub response: ResponsePrompts,
}

impl PromptsConfig {
    /// The system prompt of the active variant.
    pub fn system_prompt(&self) -> Option<&str> {
        self.agent
            .variants
            .get(&self.agent.active)
            .map(String::as_str)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentPrompts {
    pub active: String,
    pub variants: BTreeMap<String, String>,
}

impl Default for AgentPrompts {
    fn default() -> Self {
        let mut variants = BTreeMap::new();
        variants.insert("friendly".to_string(), FRIENDLY_PROMPT.to_string());
        variants.insert("expert".to_string(), EXPERT_PROMPT.to_string());
        Self {
            active: "friendly".to_string(),
            variants,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryPrompts {
    /// Must contain `{context}` and `{query}`.
    pub context_template: String,
    pub no_context: String,
}

impl Default for QueryPrompts {
    fn default() -> Self {
        Self {
            context_template: CONTEXT_TEMPLATE.to_string(),
            no_context: NO_CONTEXT.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponsePrompts {
    /// Appended to every successful answer. Empty disables it.
    pub sign_off: String,
}

impl Default for ResponsePrompts {
    fn default() -> Self {
        Self {
            sign_off: SIGN_OFF.to_string(),
        }
    }
}

impl AppConfig {
    /// Reads both YAML files (paths overridable through `CONCIERGE_CONFIG` and
    /// `CONCIERGE_PROMPTS`), applies environment overrides and validates.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONCIERGE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
        let prompts_path =
            std::env::var("CONCIERGE_PROMPTS").unwrap_or_else(|_| DEFAULT_PROMPTS_PATH.into());

        let mut app = Self::from_files(Path::new(&config_path), Path::new(&prompts_path))?;
        app.apply_overrides(|key| std::env::var(key).ok())?;
        app.validate()?;
        Ok(app)
    }

    /// Missing files fall back to built-in defaults.
    pub fn from_files(config_path: &Path, prompts_path: &Path) -> Result<Self, ConfigError> {
        Ok(Self {
            config: read_yaml_or_default(config_path)?,
            prompts: read_yaml_or_default(prompts_path)?,
        })
    }

    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let config = &mut self.config;

        if let Some(host) = lookup("SERVER_HOST") {
            config.server.host = host;
        }
        if let Some(port) = lookup("SERVER_PORT") {
            config.server.port = port
                .parse()
                .map_err(|_| {
                    ConfigError::Invalid(format!("SERVER_PORT '{port}' is not a port"))
                })?;
        }
        if let Some(dir) = lookup("DOCUMENTS_DIR") {
            config.rag.documents_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STORAGE_DIR") {
            config.rag.storage_dir = PathBuf::from(dir);
        }
        if let Some(top_k) = lookup("RAG_TOP_K") {
            config.rag.top_k = top_k
                .parse()
                .map_err(|_| {
                    ConfigError::Invalid(format!("RAG_TOP_K '{top_k}' is not a number"))
                })?;
        }
        if let Some(model) = lookup("LLM_MODEL") {
            config.llm.model = model;
        }
        if let Some(model) = lookup("EMBEDDING_MODEL") {
            config.embedding.model = model;
        }
        if let Some(url) = lookup("REDIS_URL") {
            config.sessions.backend = SessionBackend::Redis;
            config.sessions.redis_url = url;
        }
        if let Some(format) = lookup("LOG_FORMAT") {
            config.logging.format = match format.to_lowercase().as_str() {
                "json" => LogFormat::Json,
                _ => LogFormat::Text,
            };
        }
        if let Some(variant) = lookup("PROMPT_VARIANT") {
            self.prompts.agent.active = variant;
        }

        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let rag = &self.config.rag;

        if rag.chunk_size == 0 {
            return Err(ConfigError::Invalid(
                "rag.chunk_size must be positive".into(),
            ));
        }
        if rag.chunk_overlap >= rag.chunk_size {
            return Err(ConfigError::Invalid(format!(
                "rag.chunk_overlap ({}) must be smaller than rag.chunk_size ({})",
                rag.chunk_overlap, rag.chunk_size
            )));
        }
        if rag.top_k == 0 {
            return Err(ConfigError::Invalid("rag.top_k must be positive".into()));
        }
        if self.config.sessions.ttl_seconds == 0 {
            return Err(ConfigError::Invalid(
                "sessions.ttl_seconds must be positive".into(),
            ));
        }
        if self.config.llm.timeout_seconds == 0 {
            return Err(ConfigError::Invalid(
                "llm.timeout_seconds must be positive".into(),
            ));
        }
        if self.prompts.system_prompt().is_none() {
            let known = self
                .prompts
                .agent
                .variants
                .keys()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ");
            return Err(ConfigError::Invalid(format!(
                "prompt variant '{}' is not defined (known: {known})",
                self.prompts.agent.active
            )));
        }

        let template = &self.prompts.query.context_template;
        if !template.contains("{context}") || !template.contains("{query}") {
            return Err(ConfigError::Invalid(
                "prompts.query.context_template needs {context} and {query}".into(),
            ));
        }

        Ok(())
    }

    /// Active system prompt. Only valid after `validate`.
    pub fn system_prompt(&self) -> &str {
        self.prompts.system_prompt().unwrap_or_default()
    }

    pub fn chat_prompts(&self) -> ChatPrompts {
        ChatPrompts {
            system: self.system_prompt().to_string(),
            context_template: self.prompts.query.context_template.clone(),
            no_context: self.prompts.query.no_context.clone(),
            sign_off: self.prompts.response.sign_off.clone(),
        }
    }
}

/// The hosted-API key must come from the environment, never from source.
pub fn require_api_key() -> Result<String, ConfigError> {
    std::env::var(GEMINI_API_KEY_ENV)
        .ok()
        .filter(|key| !key.trim().is_empty())
        .ok_or(ConfigError::MissingApiKey(GEMINI_API_KEY_ENV))
}

fn read_yaml_or_default<T: DeserializeOwned + Default>(path: &Path) -> Result<T, ConfigError> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file absent, using defaults");
        return Ok(T::default());
    }

    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
