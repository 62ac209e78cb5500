//! Configuration for the literature pipeline
//!
//! Values come from the process environment (optionally seeded from a `.env`
//! file) and are validated once at startup. The resulting [`AppConfig`] is
//! handed to each component when it is constructed.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{Error, Result};

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,
    /// Chat-completion API configuration
    pub llm: LlmConfig,
    /// Embedding configuration
    pub embeddings: EmbeddingConfig,
    /// Chunking configuration
    pub chunking: ChunkingConfig,
    /// Prompt budget configuration
    pub prompt: PromptConfig,
    /// On-disk storage configuration
    pub storage: StorageConfig,
    /// OCR tooling configuration
    pub ocr: OcrConfig,
    /// Upload limits
    pub limits: LimitsConfig,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Chat-completion API (OpenAI-compatible) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// API base URL, without the `/chat/completions` suffix
    pub base_url: String,
    /// Bearer token
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Sampling temperature
    pub temperature: f32,
    /// Maximum completion tokens
    pub max_tokens: u32,
    /// Per-request timeout in seconds
    pub timeout_secs: u64,
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt, doubled for each later one
    pub retry_base_ms: u64,
    /// Upper bound on a single backoff delay
    pub retry_max_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.deepseek.com/v1".to_string(),
            api_key: String::new(),
            model: "deepseek-chat".to_string(),
            temperature: 0.3,
            max_tokens: 1500,
            timeout_secs: 30,
            max_attempts: 4,
            retry_base_ms: 500,
            retry_max_ms: 8000,
        }
    }
}

impl LlmConfig {
    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Which embedding implementation to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingBackend {
    /// OpenAI-compatible `/embeddings` endpoint
    #[default]
    OpenAi,
    /// Local feature-hashing embedder, no network
    Hashing,
}

impl FromStr for EmbeddingBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "openai" | "api" | "remote" => Ok(Self::OpenAi),
            "hashing" | "local" => Ok(Self::Hashing),
            other => Err(Error::Config(format!(
                "EMBEDDING_BACKEND must be 'openai' or 'hashing', got '{}'",
                other
            ))),
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Backend selection
    pub backend: EmbeddingBackend,
    /// API base URL
    pub base_url: String,
    /// Bearer token (falls back to the LLM key)
    #[serde(skip_serializing)]
    pub api_key: String,
    /// Model name
    pub model: String,
    /// Vector dimensions (hashing backend; requested from `text-embedding-3` models)
    pub dimensions: usize,
    /// Texts per embedding request
    pub batch_size: usize,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: EmbeddingBackend::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 256,
            batch_size: 32,
        }
    }
}

/// Chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkingConfig {
    /// Characters owned by each chunk
    pub chunk_size: usize,
    /// Characters of preceding context prepended to each chunk
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 120,
        }
    }
}

/// Prompt budget configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptConfig {
    /// Hard cap on the assembled prompt (system + user message), in chars
    pub max_chars: usize,
    /// Share of the budget conversation history may use
    pub history_max_chars: usize,
    /// Per-section excerpt length when whole sections are used as evidence
    pub section_excerpt_chars: usize,
    /// Chunks retrieved for a question
    pub top_k: usize,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            max_chars: 12_000,
            history_max_chars: 3_000,
            section_excerpt_chars: 1_500,
            top_k: 5,
        }
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Root directory for documents, indexes and conversation logs
    pub data_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
        }
    }
}

/// OCR tooling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrConfig {
    /// Enable OCR of scanned pages
    pub enabled: bool,
    /// tesseract binary
    pub tesseract_cmd: String,
    /// pdftoppm binary
    pub pdftoppm_cmd: String,
    /// tesseract language(s), e.g. `eng` or `eng+chi_sim`
    pub language: String,
    /// Render resolution
    pub dpi: u32,
    /// Pages with fewer extracted chars than this are treated as scanned
    pub min_chars_per_page: usize,
    /// Timeout for a single external command
    pub timeout_secs: u64,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            tesseract_cmd: "tesseract".to_string(),
            pdftoppm_cmd: "pdftoppm".to_string(),
            language: "eng".to_string(),
            dpi: 200,
            min_chars_per_page: 25,
            timeout_secs: 300,
        }
    }
}

/// Upload limits
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum bytes per uploaded file
    pub max_file_size: usize,
    /// Maximum files per upload request
    pub max_batch_size: usize,
    /// Timeout for importing a paper from a URL
    pub fetch_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_file_size: 50 * 1024 * 1024,
            max_batch_size: 100,
            fetch_timeout_secs: 60,
        }
    }
}

impl LimitsConfig {
    /// Request body ceiling for a full batch
    pub fn max_request_size(&self) -> usize {
        self.max_file_size.saturating_mul(self.max_batch_size.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs.max(1))
    }
}

impl AppConfig {
    /// Load `.env` (if present) and read the process environment
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!("Loaded environment from {}", path.display()),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(Error::Config(format!("Failed to read .env: {}", e))),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup, then validate
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut config = AppConfig::default();

        if let Some(v) = get("HOST") {
            config.server.host = v;
        }
        set_parsed(&get, "PORT", &mut config.server.port)?;

        if let Some(v) = get("LLM_API_KEY") {
            config.llm.api_key = v;
        }
        if let Some(v) = get("LLM_BASE_URL") {
            config.llm.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("LLM_MODEL") {
            config.llm.model = v;
        }
        set_parsed(&get, "LLM_TEMPERATURE", &mut config.llm.temperature)?;
        set_parsed(&get, "LLM_MAX_TOKENS", &mut config.llm.max_tokens)?;
        set_parsed(&get, "LLM_TIMEOUT_SECS", &mut config.llm.timeout_secs)?;
        set_parsed(&get, "LLM_MAX_ATTEMPTS", &mut config.llm.max_attempts)?;
        set_parsed(&get, "LLM_RETRY_BASE_MS", &mut config.llm.retry_base_ms)?;
        set_parsed(&get, "LLM_RETRY_MAX_MS", &mut config.llm.retry_max_ms)?;

        if let Some(v) = get("EMBEDDING_BACKEND") {
            config.embeddings.backend = v.parse()?;
        }
        config.embeddings.api_key = get("EMBEDDING_API_KEY").unwrap_or_else(|| config.llm.api_key.clone());
        if let Some(v) = get("EMBEDDING_BASE_URL") {
            config.embeddings.base_url = v.trim_end_matches('/').to_string();
        }
        if let Some(v) = get("EMBEDDING_MODEL") {
            config.embeddings.model = v;
        }
        set_parsed(&get, "EMBEDDING_DIMENSIONS", &mut config.embeddings.dimensions)?;
        set_parsed(&get, "EMBEDDING_BATCH_SIZE", &mut config.embeddings.batch_size)?;

        set_parsed(&get, "CHUNK_SIZE", &mut config.chunking.chunk_size)?;
        set_parsed(&get, "CHUNK_OVERLAP", &mut config.chunking.chunk_overlap)?;

        set_parsed(&get, "PROMPT_MAX_CHARS", &mut config.prompt.max_chars)?;
        set_parsed(&get, "PROMPT_HISTORY_MAX_CHARS", &mut config.prompt.history_max_chars)?;
        set_parsed(&get, "PROMPT_SECTION_EXCERPT_CHARS", &mut config.prompt.section_excerpt_chars)?;
        set_parsed(&get, "RETRIEVAL_TOP_K", &mut config.prompt.top_k)?;

        if let Some(v) = get("DATA_DIR") {
            config.storage.data_dir = PathBuf::from(v);
        }

        set_parsed(&get, "OCR_ENABLED", &mut config.ocr.enabled)?;
        if let Some(v) = get("TESSERACT_CMD") {
            config.ocr.tesseract_cmd = v;
        }
        if let Some(v) = get("PDFTOPPM_CMD") {
            config.ocr.pdftoppm_cmd = v;
        }
        if let Some(v) = get("OCR_LANG") {
            config.ocr.language = v;
        }
        set_parsed(&get, "OCR_DPI", &mut config.ocr.dpi)?;
        set_parsed(&get, "OCR_TIMEOUT_SECS", &mut config.ocr.timeout_secs)?;

        if let Some(v) = get("MAX_FILE_SIZE") {
            config.limits.max_file_size = parse_size(&v)?;
        }
        set_parsed(&get, "MAX_BATCH_SIZE", &mut config.limits.max_batch_size)?;
        set_parsed(&get, "FETCH_TIMEOUT_SECS", &mut config.limits.fetch_timeout_secs)?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints; called by the loaders
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.is_empty() {
            return Err(Error::Config("LLM_API_KEY is required".to_string()));
        }
        if self.embeddings.backend == EmbeddingBackend::OpenAi && self.embeddings.api_key.is_empty() {
            return Err(Error::Config(
                "EMBEDDING_API_KEY (or LLM_API_KEY) is required for the openai embedding backend".to_string(),
            ));
        }
        for (name, url) in [("LLM_BASE_URL", &self.llm.base_url), ("EMBEDDING_BASE_URL", &self.embeddings.base_url)] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                return Err(Error::Config(format!("{} must be an http(s) URL, got '{}'", name, url)));
            }
        }
        if self.chunking.chunk_size == 0 {
            return Err(Error::Config("CHUNK_SIZE must be positive".to_string()));
        }
        if self.chunking.chunk_overlap >= self.chunking.chunk_size {
            return Err(Error::Config(format!(
                "CHUNK_OVERLAP ({}) must be smaller than CHUNK_SIZE ({})",
                self.chunking.chunk_overlap, self.chunking.chunk_size
            )));
        }
        if self.prompt.max_chars == 0 {
            return Err(Error::Config("PROMPT_MAX_CHARS must be positive".to_string()));
        }
        if self.prompt.history_max_chars >= self.prompt.max_chars {
            return Err(Error::Config(
                "PROMPT_HISTORY_MAX_CHARS must be smaller than PROMPT_MAX_CHARS".to_string(),
            ));
        }
        if self.llm.max_attempts == 0 {
            return Err(Error::Config("LLM_MAX_ATTEMPTS must be at least 1".to_string()));
        }
        if self.embeddings.batch_size == 0 || self.embeddings.dimensions == 0 {
            return Err(Error::Config(
                "EMBEDDING_BATCH_SIZE and EMBEDDING_DIMENSIONS must be positive".to_string(),
            ));
        }
        if self.limits.max_batch_size == 0 || self.limits.max_file_size == 0 {
            return Err(Error::Config("MAX_FILE_SIZE and MAX_BATCH_SIZE must be positive".to_string()));
        }
        Ok(())
    }
}

fn set_parsed<T, G>(get: &G, key: &str, slot: &mut T) -> Result<()>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    if let Some(raw) = get(key) {
        *slot = raw
            .parse()
            .map_err(|e| Error::Config(format!("Invalid value for {}: '{}' ({})", key, raw, e)))?;
    }
    Ok(())
}

/// Parse sizes such as `50MB`, `512 KB`, `1gb` or a plain byte count
pub fn parse_size(raw: &str) -> Result<usize> {
    let s = raw.trim().to_uppercase();
    let split = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    let (number, unit) = s.split_at(split);
    let number: usize = number
        .parse()
        .map_err(|_| Error::Config(format!("Invalid size '{}'", raw)))?;
    let multiplier = match unit.trim() {
        "" | "B" => 1,
        "KB" | "K" => 1024,
        "MB" | "M" => 1024 * 1024,
        "GB" | "G" => 1024 * 1024 * 1024,
        other => return Err(Error::Config(format!("Unknown size unit '{}' in '{}'", other, raw))),
    };
    Ok(number.saturating_mul(multiplier))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_fails_fast() {
        let err = AppConfig::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, Error::Config(msg) if msg.contains("LLM_API_KEY")));
    }

    #[test]
    fn test_defaults_with_key() {
        let config = AppConfig::from_lookup(lookup(&[("LLM_API_KEY", "sk-test")])).unwrap();
        assert_eq!(config.llm.model, "deepseek-chat");
        assert_eq!(config.embeddings.api_key, "sk-test");
        assert_eq!(config.limits.max_file_size, 50 * 1024 * 1024);
        assert_eq!(config.chunking.chunk_size, 800);
    }

    #[test]
    fn test_overrides() {
        let config = AppConfig::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-test"),
            ("LLM_BASE_URL", "http://localhost:9000/v1/"),
            ("EMBEDDING_BACKEND", "hashing"),
            ("CHUNK_SIZE", "400"),
            ("CHUNK_OVERLAP", "50"),
            ("MAX_FILE_SIZE", "10MB"),
            ("PORT", "9999"),
        ]))
        .unwrap();
        assert_eq!(config.llm.base_url, "http://localhost:9000/v1");
        assert_eq!(config.embeddings.backend, EmbeddingBackend::Hashing);
        assert_eq!(config.chunking.chunk_size, 400);
        assert_eq!(config.limits.max_file_size, 10 * 1024 * 1024);
        assert_eq!(config.server.port, 9999);
    }

    #[test]
    fn test_overlap_must_be_smaller_than_chunk() {
        let err = AppConfig::from_lookup(lookup(&[
            ("LLM_API_KEY", "sk-test"),
            ("CHUNK_SIZE", "100"),
            ("CHUNK_OVERLAP", "100"),
        ]))
        .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_bad_number_is_reported() {
        let err = AppConfig::from_lookup(lookup(&[("LLM_API_KEY", "k"), ("PORT", "eighty")])).unwrap_err();
        assert!(err.to_string().contains("PORT"));
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("50MB").unwrap(), 50 * 1024 * 1024);
        assert_eq!(parse_size("512 kb").unwrap(), 512 * 1024);
        assert_eq!(parse_size("1024").unwrap(), 1024);
        assert!(parse_size("lots").is_err());
        assert!(parse_size("5TB").is_err());
    }
}
