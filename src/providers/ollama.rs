use anyhow::{Context, Result, anyhow};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::Message;
use crate::providers::http_errors::{api_request_error, ensure_success};

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    stream: bool,
    messages: &'a [Message],
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessageResponse,
}

#[derive(Debug, Deserialize)]
struct ChatMessageResponse {
    content: String,
}

#[derive(Debug, Serialize)]
struct OllamaEmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

fn api_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

pub async fn chat(client: &Client, cfg: &Config, messages: &[Message]) -> Result<String> {
    let api_url = api_url(&cfg.model_base_url, "/api/chat");
    let body = OllamaChatRequest {
        model: &cfg.model,
        stream: false,
        messages,
        options: OllamaOptions {
            temperature: cfg.temperature,
            num_predict: cfg.max_tokens,
        },
    };
    debug!(
        api_url = %api_url,
        model = %cfg.model,
        message_count = messages.len(),
        "sending ollama chat request"
    );

    let response = client
        .post(&api_url)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            warn!(api_url = %api_url, model = %cfg.model, error = %err, "ollama request failed");
            api_request_error(err, &api_url, cfg.model_timeout_secs)
        })?;
    let response = ensure_success(response, &api_url, "ollama").await?;

    let parsed: OllamaChatResponse = response
        .json()
        .await
        .context("Failed to parse model chat response")?;
    debug!(
        model = %cfg.model,
        response_len = parsed.message.content.len(),
        "received ollama chat response"
    );
    Ok(parsed.message.content)
}

pub async fn embed(client: &Client, cfg: &Config, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_url = api_url(&cfg.embedding_base_url, "/api/embed");
    let body = OllamaEmbedRequest {
        model: &cfg.embedding_model,
        input: texts,
    };

    let response = client
        .post(&api_url)
        .json(&body)
        .send()
        .await
        .map_err(|err| api_request_error(err, &api_url, cfg.model_timeout_secs))?;
    let response = ensure_success(response, &api_url, "ollama").await?;

    let parsed: OllamaEmbedResponse = response
        .json()
        .await
        .context("Failed to parse embedding response")?;
    if parsed.embeddings.len() != texts.len() {
        return Err(anyhow!(
            "ollama returned {} embeddings for {} inputs",
            parsed.embeddings.len(),
            texts.len()
        ));
    }
    Ok(parsed.embeddings)
}
