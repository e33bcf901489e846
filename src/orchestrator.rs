use anyhow::Result;
use chrono::{Local, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::browsing::WebBrowsingDecider;
use crate::config::Config;
use crate::error::{IngestError, TurnError};
use crate::export;
use crate::history::ConversationHistory;
use crate::model::{Message, MessageRole};
use crate::model_gateway::{ModelGateway, ModelGatewayRequest};
use crate::prompts;
use crate::retrieval::{Embedder, IngestReport, LoaderRegistry, RetrievalStore, TextSplitter};
use crate::search::{WebSearch, join_snippets};
use crate::tokens::TokenCounter;

pub struct Session<'a> {
    pub history: ConversationHistory<'a>,
    pub store: RetrievalStore,
}

impl<'a> Session<'a> {
    pub fn new(cfg: &Config, counter: &'a dyn TokenCounter) -> Self {
        Self {
            history: ConversationHistory::new(counter, cfg.max_tokens, cfg.system_prompts.clone()),
            store: RetrievalStore::new(TextSplitter::new(cfg.chunk_size, cfg.chunk_overlap)),
        }
    }
}

pub struct Collaborators<'a> {
    pub model: &'a dyn ModelGateway,
    pub search: &'a dyn WebSearch,
    pub embedder: &'a dyn Embedder,
    pub loaders: &'a LoaderRegistry,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnReply {
    pub text: String,
    /// Whether web search results went into the prompt that produced `text`.
    pub web_augmented: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOutcome {
    pub report: IngestReport,
    pub summary: Option<String>,
}

enum TurnState {
    AugmentingPrompt,
    AwaitingModel { prompt: String, nested: bool },
    ReAugmenting { stale_answer: String },
    Done(TurnReply),
}

pub struct ChatOrchestrator<'a> {
    session: Session<'a>,
    collaborators: Collaborators<'a>,
    decider: WebBrowsingDecider,
    retrieval_k: usize,
    summary_chunks: usize,
}

impl<'a> ChatOrchestrator<'a> {
    pub fn new(cfg: &Config, counter: &'a dyn TokenCounter, collaborators: Collaborators<'a>) -> Self {
        Self {
            session: Session::new(cfg, counter),
            collaborators,
            decider: WebBrowsingDecider::from_config(cfg),
            retrieval_k: cfg.retrieval_k(),
            summary_chunks: cfg.summary_chunks,
        }
    }

    pub fn history(&self) -> &ConversationHistory<'a> {
        &self.session.history
    }

    pub fn store(&self) -> &RetrievalStore {
        &self.session.store
    }

    pub fn clear(&mut self) {
        self.session.history.clear();
        self.session.store.clear();
        info!("session cleared");
    }

    pub fn export(&self, dir: &Path) -> Result<PathBuf> {
        let path = export::write_history(dir, &self.session.history.get(), Utc::now())?;
        info!(path = %path.display(), turns = self.session.history.len(), "exported history");
        Ok(path)
    }

    pub async fn run_turn(&mut self, user_text: &str) -> Result<TurnReply, TurnError> {
        let forced = self.decider.is_forced(user_text);
        let query = if forced {
            self.decider.strip_marker(user_text)
        } else {
            user_text.trim().to_string()
        };
        let mut web_augmented = false;
        let mut state = TurnState::AugmentingPrompt;

        loop {
            state = match state {
                TurnState::AugmentingPrompt => {
                    let (prompt, searched) = self.augment(&query, forced).await;
                    web_augmented = searched;
                    // A forced turn already carries search results.
                    TurnState::AwaitingModel {
                        prompt,
                        nested: forced,
                    }
                }
                TurnState::AwaitingModel { prompt, nested } => {
                    let answer = self.ask(&prompt).await?;
                    if !nested && self.decider.needs_live_data(&answer) {
                        TurnState::ReAugmenting {
                            stale_answer: answer,
                        }
                    } else {
                        TurnState::Done(TurnReply {
                            text: answer,
                            web_augmented,
                        })
                    }
                }
                TurnState::ReAugmenting { stale_answer } => {
                    info!(query = %query, "answer looks out of date; searching the web");
                    let results = self.collaborators.search.search(&query).await.map_err(
                        |source| TurnError::StaleAnswerNotRefreshed {
                            answer: stale_answer,
                            source,
                        },
                    )?;
                    web_augmented = true;
                    TurnState::AwaitingModel {
                        prompt: prompts::post_search(&query, &join_snippets(&results), &Local::now()),
                        nested: true,
                    }
                }
                TurnState::Done(reply) => return Ok(reply),
            };
        }
    }

    async fn augment(&self, query: &str, forced: bool) -> (String, bool) {
        if forced {
            match self.collaborators.search.search(query).await {
                Ok(results) => return (prompts::pre_search(query, &join_snippets(&results)), true),
                Err(err) => {
                    warn!(error = %err, "web search failed; sending the query without results");
                    return (query.to_string(), false);
                }
            }
        }

        if self.session.store.has_content() {
            match self
                .session
                .store
                .query(query, self.retrieval_k, self.collaborators.embedder)
                .await
            {
                Ok(chunks) if !chunks.is_empty() => {
                    debug!(chunk_count = chunks.len(), "augmenting prompt with document chunks");
                    return (prompts::with_documents(query, &chunks), false);
                }
                Ok(_) => {}
                Err(err) => {
                    warn!(error = %format!("{err:#}"), "document lookup failed; sending the query without context");
                }
            }
        }

        (query.to_string(), false)
    }

    async fn ask(&mut self, prompt: &str) -> Result<String, TurnError> {
        self.session.history.add(MessageRole::User, prompt);
        let request = ModelGatewayRequest {
            messages: self.session.history.get(),
        };
        let response = self
            .collaborators
            .model
            .chat(request)
            .await
            .map_err(TurnError::ModelCall)?;
        self.session
            .history
            .add(MessageRole::Assistant, &response.content);
        debug!(
            total_tokens = self.session.history.total_tokens(),
            turns = self.session.history.len(),
            "model replied"
        );
        Ok(response.content)
    }

    /// Adds a document to the store and asks the model for a summary of its
    /// opening chunks. The summary is best effort and stays out of the
    /// conversation history.
    pub async fn ingest(&mut self, raw: &str) -> Result<IngestOutcome, IngestError> {
        let report = self
            .session
            .store
            .ingest(raw, self.collaborators.loaders, self.collaborators.embedder)
            .await?;
        let summary = self.summarize(&report.source_id).await;
        Ok(IngestOutcome { report, summary })
    }

    async fn summarize(&self, source_id: &str) -> Option<String> {
        if self.summary_chunks == 0 {
            return None;
        }
        let text = self
            .session
            .store
            .chunks_of(source_id)
            .take(self.summary_chunks)
            .map(|chunk| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        let request = ModelGatewayRequest {
            messages: vec![Message::user(prompts::summarize(&text))],
        };
        match self.collaborators.model.chat(request).await {
            Ok(response) => Some(response.content.trim().to_string()),
            Err(err) => {
                warn!(source = source_id, error = %format!("{err:#}"), "document summary failed");
                None
            }
        }
    }
}
