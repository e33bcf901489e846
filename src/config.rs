use std::env;
use std::path::PathBuf;

use crate::error::ConfigError;

const DEFAULT_MODEL_PROVIDER: &str = "openai";
const DEFAULT_OPENAI_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_OLLAMA_MODEL: &str = "llama3.2";
const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
const DEFAULT_OLLAMA_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_EMBEDDING_MODEL: &str = "text-embedding-ada-002";
const DEFAULT_OLLAMA_EMBEDDING_MODEL: &str = "nomic-embed-text";
const DEFAULT_MODEL_TIMEOUT_SECS: u64 = 60;
const DEFAULT_MAX_TOKENS: usize = 2048;
const DEFAULT_TEMPERATURE: f32 = 0.5;
const DEFAULT_CHUNK_SIZE: usize = 200;
const DEFAULT_CHUNK_OVERLAP: usize = 20;
const DEFAULT_SUMMARY_CHUNKS: usize = 10;
const DEFAULT_FORCE_SEARCH_MARKER: &str = "[web]";

const DEFAULT_SYSTEM_PROMPTS: [&str; 2] = [
    "Always use code blocks with the appropriate language tags",
    "If the answer may have changed since your cut-off date, simply reply with \"I do not have real-time information\" and nothing else",
];

const DEFAULT_STALENESS_PHRASES: [&str; 8] = [
    "not have access to real-time",
    "don't have access to real-time",
    "don't have real-time",
    "not able to provide real-time",
    "not have real-time",
    "as of my training data",
    "as of september 2021",
    "as of my programmed cut-off date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    OpenAi,
    Ollama,
}

impl Provider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OpenAi => "openai",
            Self::Ollama => "ollama",
        }
    }

    fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => DEFAULT_OPENAI_BASE_URL,
            Self::Ollama => DEFAULT_OLLAMA_BASE_URL,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchCredentials {
    pub api_key: String,
    pub engine_id: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub model_provider: Provider,
    pub model: String,
    pub model_base_url: String,
    pub openai_api_key: Option<String>,
    pub model_timeout_secs: u64,
    pub max_tokens: usize,
    pub temperature: f32,
    pub embedding_provider: Provider,
    pub embedding_model: String,
    pub embedding_base_url: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
    pub summary_chunks: usize,
    pub search_credentials: Option<SearchCredentials>,
    pub force_search_marker: String,
    pub staleness_phrases: Vec<String>,
    pub system_prompts: Vec<String>,
    pub export_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_with(|key| env::var(key).ok())
    }

    pub(crate) fn from_env_with(
        mut get_var: impl FnMut(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw_provider =
            non_empty(get_var("MODEL_PROVIDER")).unwrap_or_else(|| DEFAULT_MODEL_PROVIDER.into());
        let model_provider = parse_provider(&raw_provider, "MODEL_PROVIDER")?;
        let embedding_provider = match non_empty(get_var("EMBEDDING_PROVIDER")) {
            Some(raw) => parse_provider(&raw, "EMBEDDING_PROVIDER")?,
            None => model_provider,
        };

        let openai_api_key = non_empty(get_var("OPENAI_API_KEY"));
        for (provider, setting) in [
            (model_provider, "MODEL_PROVIDER"),
            (embedding_provider, "EMBEDDING_PROVIDER"),
        ] {
            if provider == Provider::OpenAi && openai_api_key.is_none() {
                return Err(ConfigError::MissingCredential {
                    var: "OPENAI_API_KEY",
                    setting,
                    provider: provider.as_str().to_string(),
                });
            }
        }

        let model_base_url = non_empty(get_var("MODEL_BASE_URL"))
            .unwrap_or_else(|| model_provider.default_base_url().to_string());
        let embedding_base_url = if embedding_provider == model_provider {
            model_base_url.clone()
        } else {
            embedding_provider.default_base_url().to_string()
        };

        let model = non_empty(get_var("MODEL")).unwrap_or_else(|| {
            match model_provider {
                Provider::OpenAi => DEFAULT_OPENAI_MODEL,
                Provider::Ollama => DEFAULT_OLLAMA_MODEL,
            }
            .to_string()
        });
        let embedding_model = non_empty(get_var("EMBEDDING_MODEL")).unwrap_or_else(|| {
            match embedding_provider {
                Provider::OpenAi => DEFAULT_OPENAI_EMBEDDING_MODEL,
                Provider::Ollama => DEFAULT_OLLAMA_EMBEDDING_MODEL,
            }
            .to_string()
        });

        let (chunk_size, chunk_overlap) = parse_chunking(
            get_var("CHUNK_SIZE").as_deref(),
            get_var("CHUNK_OVERLAP").as_deref(),
        );

        let search_credentials = match (
            non_empty(get_var("GOOGLE_CUSTOM_SEARCH_API_KEY")),
            non_empty(get_var("GOOGLE_CUSTOM_SEARCH_ENGINE_ID")),
        ) {
            (Some(api_key), Some(engine_id)) => Some(SearchCredentials { api_key, engine_id }),
            _ => None,
        };

        let system_prompts = match non_empty(get_var("SYSTEM_PROMPT")) {
            Some(prompt) => vec![prompt],
            None => DEFAULT_SYSTEM_PROMPTS.iter().map(|s| s.to_string()).collect(),
        };

        Ok(Self {
            model_provider,
            model,
            model_base_url,
            openai_api_key,
            model_timeout_secs: parse_positive_u64(
                get_var("MODEL_TIMEOUT_SECS").as_deref(),
                DEFAULT_MODEL_TIMEOUT_SECS,
            ),
            max_tokens: parse_positive_usize(
                get_var("MAX_TOKENS").as_deref(),
                DEFAULT_MAX_TOKENS,
            ),
            temperature: parse_temperature(get_var("TEMPERATURE").as_deref()),
            embedding_provider,
            embedding_model,
            embedding_base_url,
            chunk_size,
            chunk_overlap,
            summary_chunks: parse_usize(
                get_var("SUMMARY_CHUNKS").as_deref(),
                DEFAULT_SUMMARY_CHUNKS,
            ),
            search_credentials,
            force_search_marker: non_empty(get_var("FORCE_SEARCH_MARKER"))
                .unwrap_or_else(|| DEFAULT_FORCE_SEARCH_MARKER.to_string()),
            staleness_phrases: parse_phrases(get_var("STALENESS_PHRASES").as_deref()),
            system_prompts,
            export_dir: parse_export_dir(get_var("EXPORT_DIR").as_deref()),
        })
    }

    /// Number of chunks that fit in the token budget. Zero disables
    /// document context.
    pub fn retrieval_k(&self) -> usize {
        self.max_tokens / self.chunk_size
    }
}

fn non_empty(raw: Option<String>) -> Option<String> {
    raw.map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_provider(raw: &str, setting: &'static str) -> Result<Provider, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "openai" => Ok(Provider::OpenAi),
        "ollama" => Ok(Provider::Ollama),
        _ => Err(ConfigError::UnsupportedProvider {
            setting,
            provider: raw.trim().to_string(),
        }),
    }
}

fn parse_usize(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .unwrap_or(default)
}

fn parse_positive_usize(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|value| value.trim().parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_positive_u64(raw: Option<&str>, default: u64) -> u64 {
    raw.and_then(|value| value.trim().parse::<u64>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(default)
}

fn parse_temperature(raw: Option<&str>) -> f32 {
    raw.and_then(|value| value.trim().parse::<f32>().ok())
        .filter(|value| (0.0..=2.0).contains(value))
        .unwrap_or(DEFAULT_TEMPERATURE)
}

fn parse_chunking(size: Option<&str>, overlap: Option<&str>) -> (usize, usize) {
    let size = parse_positive_usize(size, DEFAULT_CHUNK_SIZE);
    let overlap = parse_positive_usize(overlap, DEFAULT_CHUNK_OVERLAP);
    if overlap < size {
        (size, overlap)
    } else {
        (DEFAULT_CHUNK_SIZE, DEFAULT_CHUNK_OVERLAP)
    }
}

fn parse_phrases(raw: Option<&str>) -> Vec<String> {
    let phrases: Vec<String> = raw
        .unwrap_or_default()
        .split('|')
        .map(|phrase| phrase.trim().to_lowercase())
        .filter(|phrase| !phrase.is_empty())
        .collect();
    if phrases.is_empty() {
        DEFAULT_STALENESS_PHRASES
            .iter()
            .map(|s| s.to_string())
            .collect()
    } else {
        phrases
    }
}

fn parse_export_dir(raw: Option<&str>) -> PathBuf {
    raw.map(str::trim)
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::download_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        model_provider: Provider::Ollama,
        model: DEFAULT_OLLAMA_MODEL.to_string(),
        model_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
        openai_api_key: None,
        model_timeout_secs: DEFAULT_MODEL_TIMEOUT_SECS,
        max_tokens: DEFAULT_MAX_TOKENS,
        temperature: DEFAULT_TEMPERATURE,
        embedding_provider: Provider::Ollama,
        embedding_model: DEFAULT_OLLAMA_EMBEDDING_MODEL.to_string(),
        embedding_base_url: DEFAULT_OLLAMA_BASE_URL.to_string(),
        chunk_size: DEFAULT_CHUNK_SIZE,
        chunk_overlap: DEFAULT_CHUNK_OVERLAP,
        summary_chunks: DEFAULT_SUMMARY_CHUNKS,
        search_credentials: None,
        force_search_marker: DEFAULT_FORCE_SEARCH_MARKER.to_string(),
        staleness_phrases: parse_phrases(None),
        system_prompts: DEFAULT_SYSTEM_PROMPTS.iter().map(|s| s.to_string()).collect(),
        export_dir: PathBuf::from("."),
    }
}
