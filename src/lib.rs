pub mod browsing;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod logging;
pub mod model;
pub mod model_gateway;
pub mod orchestrator;
pub mod prompts;
pub mod providers;
pub mod repl;
pub mod retrieval;
pub mod search;
pub mod tokens;

use anyhow::{Context, Result, bail};
use reqwest::Client;
use std::env;
use std::time::Duration;
use tracing::info;

use config::Config;
use error::TurnError;
use model_gateway::HostModelGateway;
use orchestrator::{ChatOrchestrator, Collaborators};
use repl::run_repl;
use retrieval::{HostEmbedder, LoaderRegistry};
use search::GoogleSearch;
use tokens::TiktokenCounter;

pub async fn run() -> Result<()> {
    let cfg = Config::from_env()?;
    info!(
        model_provider = cfg.model_provider.as_str(),
        model = %cfg.model,
        embedding_provider = cfg.embedding_provider.as_str(),
        max_tokens = cfg.max_tokens,
        chunk_size = cfg.chunk_size,
        chunk_overlap = cfg.chunk_overlap,
        web_search = cfg.search_credentials.is_some(),
        "loaded runtime configuration"
    );

    let client = Client::builder()
        .timeout(Duration::from_secs(cfg.model_timeout_secs))
        .build()
        .context("Failed to initialize HTTP client")?;
    let counter = TiktokenCounter::new()?;

    let model = HostModelGateway::new(&client, &cfg);
    let search = GoogleSearch::new(&client, cfg.search_credentials.as_ref());
    let embedder = HostEmbedder::new(&client, &cfg);
    let loaders = LoaderRegistry::with_defaults(&client);
    let mut chat = ChatOrchestrator::new(
        &cfg,
        &counter,
        Collaborators {
            model: &model,
            search: &search,
            embedder: &embedder,
            loaders: &loaders,
        },
    );

    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        return run_repl(&mut chat, &cfg).await;
    }

    match chat.run_turn(&args.join(" ")).await {
        Ok(reply) => {
            println!("{}", reply.text.trim());
            Ok(())
        }
        Err(TurnError::StaleAnswerNotRefreshed { answer, source }) => {
            println!("{}", answer.trim());
            bail!("answer may be out of date: {source}")
        }
        Err(err) => Err(err.into()),
    }
}
