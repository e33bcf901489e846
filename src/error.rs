use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error(
        "{var} must be set when {setting}={provider} (see https://platform.openai.com/account/api-keys)"
    )]
    MissingCredential {
        var: &'static str,
        setting: &'static str,
        provider: String,
    },

    #[error("Unsupported {setting}='{provider}'. Supported providers: openai, ollama.")]
    UnsupportedProvider {
        setting: &'static str,
        provider: String,
    },
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error(
        "Cannot search the web since GOOGLE_CUSTOM_SEARCH_API_KEY and GOOGLE_CUSTOM_SEARCH_ENGINE_ID are not set"
    )]
    MissingCredentials,

    #[error("No search result found")]
    NoResults,

    #[error("Web search request failed: {0}")]
    Request(String),
}

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Unsupported source '{0}'. Supported: .txt, .text, .md, .pdf, .docx, .html, http(s) URLs")]
    UnsupportedSource(String),

    #[error("Missing file: {}", .0.display())]
    SourceNotFound(PathBuf),

    #[error("Failed to load '{source_id}': {reason}")]
    Load { source_id: String, reason: String },

    #[error("Failed to embed '{source_id}': {reason}")]
    Embedding { source_id: String, reason: String },
}

#[derive(Debug, Error)]
pub enum TurnError {
    #[error("{0:#}")]
    ModelCall(anyhow::Error),

    #[error("Answer may be out of date and the web search to refresh it failed: {source}")]
    StaleAnswerNotRefreshed {
        answer: String,
        #[source]
        source: SearchError,
    },
}
