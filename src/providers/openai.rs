use anyhow::{Context, Result, anyhow};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::config::Config;
use crate::model::Message;
use crate::providers::http_errors::{api_request_error, ensure_success};

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: usize,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

fn api_url(base_url: &str, path: &str) -> String {
    format!("{}{}", base_url.trim_end_matches('/'), path)
}

fn authorized(builder: RequestBuilder, cfg: &Config) -> RequestBuilder {
    match &cfg.openai_api_key {
        Some(key) => builder.bearer_auth(key),
        None => builder,
    }
}

pub async fn chat(client: &Client, cfg: &Config, messages: &[Message]) -> Result<String> {
    let api_url = api_url(&cfg.model_base_url, "/v1/chat/completions");
    let body = ChatCompletionRequest {
        model: &cfg.model,
        messages,
        max_tokens: cfg.max_tokens,
        temperature: cfg.temperature,
    };
    debug!(
        api_url = %api_url,
        model = %cfg.model,
        message_count = messages.len(),
        "sending openai chat request"
    );

    let response = authorized(client.post(&api_url), cfg)
        .json(&body)
        .send()
        .await
        .map_err(|err| {
            warn!(api_url = %api_url, model = %cfg.model, error = %err, "openai request failed");
            api_request_error(err, &api_url, cfg.model_timeout_secs)
        })?;
    let response = ensure_success(response, &api_url, "openai").await?;

    let parsed: ChatCompletionResponse = response
        .json()
        .await
        .context("Failed to parse model chat response")?;
    let content = first_choice_content(parsed)?;
    debug!(
        model = %cfg.model,
        response_len = content.len(),
        "received openai chat response"
    );
    Ok(content)
}

fn first_choice_content(parsed: ChatCompletionResponse) -> Result<String> {
    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("Model response contained no message content"))
}

pub async fn embed(client: &Client, cfg: &Config, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let api_url = api_url(&cfg.embedding_base_url, "/v1/embeddings");
    let body = EmbeddingRequest {
        model: &cfg.embedding_model,
        input: texts,
    };

    let response = authorized(client.post(&api_url), cfg)
        .json(&body)
        .send()
        .await
        .map_err(|err| api_request_error(err, &api_url, cfg.model_timeout_secs))?;
    let response = ensure_success(response, &api_url, "openai").await?;

    let parsed: EmbeddingResponse = response
        .json()
        .await
        .context("Failed to parse embedding response")?;
    ordered_embeddings(parsed, texts.len())
}

fn ordered_embeddings(parsed: EmbeddingResponse, expected: usize) -> Result<Vec<Vec<f32>>> {
    if parsed.data.len() != expected {
        return Err(anyhow!(
            "openai returned {} embeddings for {} inputs",
            parsed.data.len(),
            expected
        ));
    }
    let mut data = parsed.data;
    data.sort_by_key(|item| item.index);
    Ok(data.into_iter().map(|item| item.embedding).collect())
}

#[cfg(test)]
mod tests {
    use super::{
        ChatCompletionResponse, EmbeddingResponse, api_url, first_choice_content,
        ordered_embeddings,
    };

    #[test]
    fn api_url_joins_base_and_path() {
        assert_eq!(
            api_url("https://api.openai.com/", "/v1/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn first_choice_content_reads_message() {
        let parsed: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#,
        )
        .expect("parse");
        assert_eq!(first_choice_content(parsed).expect("content"), "hello");
    }

    #[test]
    fn first_choice_content_rejects_empty_choices() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[]}"#).expect("parse");
        assert!(first_choice_content(parsed).is_err());
    }

    #[test]
    fn embeddings_are_reordered_by_index() {
        let parsed: EmbeddingResponse = serde_json::from_str(
            r#"{"data":[{"index":1,"embedding":[0.0,1.0]},{"index":0,"embedding":[1.0,0.0]}]}"#,
        )
        .expect("parse");
        let vectors = ordered_embeddings(parsed, 2).expect("vectors");
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn embedding_count_mismatch_is_an_error() {
        let parsed: EmbeddingResponse =
            serde_json::from_str(r#"{"data":[{"index":0,"embedding":[1.0]}]}"#).expect("parse");
        assert!(ordered_embeddings(parsed, 2).is_err());
    }
}
