use anyhow::Result;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{Config, Provider};
use crate::providers;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

pub async fn chat(client: &Client, cfg: &Config, messages: &[Message]) -> Result<String> {
    debug!(
        provider = cfg.model_provider.as_str(),
        model = %cfg.model,
        message_count = messages.len(),
        "dispatching model chat request"
    );

    match cfg.model_provider {
        Provider::OpenAi => providers::openai::chat(client, cfg, messages).await,
        Provider::Ollama => providers::ollama::chat(client, cfg, messages).await,
    }
}

pub async fn embed(client: &Client, cfg: &Config, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    debug!(
        provider = cfg.embedding_provider.as_str(),
        model = %cfg.embedding_model,
        text_count = texts.len(),
        "dispatching embedding request"
    );

    match cfg.embedding_provider {
        Provider::OpenAi => providers::openai::embed(client, cfg, texts).await,
        Provider::Ollama => providers::ollama::embed(client, cfg, texts).await,
    }
}
