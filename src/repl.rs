use anyhow::{Context, Result};
use std::io::{self, Write};
use tracing::warn;

use crate::config::Config;
use crate::error::TurnError;
use crate::history::Turn;
use crate::orchestrator::{ChatOrchestrator, IngestOutcome};
use crate::retrieval::looks_like_source;

const HELP: &str = "\
commands:
  ?, help          show this help
  q, quit, exit    leave the chat
  clr, clear       forget the conversation and all loaded documents
  h, history       show the conversation so far
  export           save the conversation as JSON
  docs             list loaded documents
  doc <source>     load a file (.txt .md .pdf .docx .html) or web page
anything else is sent to the model. Paste a path or URL on its own to load it.
Add [web] anywhere in a message to search the web first.";

#[derive(Debug, PartialEq, Eq)]
enum Command<'a> {
    Help,
    Quit,
    Clear,
    History,
    Export,
    Docs,
    Ingest(&'a str),
    Chat(&'a str),
}

fn parse_command(line: &str) -> Command<'_> {
    match line.to_ascii_lowercase().as_str() {
        "?" | "help" => return Command::Help,
        "q" | "quit" | "exit" => return Command::Quit,
        "clr" | "clear" => return Command::Clear,
        "h" | "history" => return Command::History,
        "export" => return Command::Export,
        "docs" => return Command::Docs,
        _ => {}
    }
    if let Some((word, source)) = line.split_once(char::is_whitespace)
        && word.eq_ignore_ascii_case("doc")
    {
        return Command::Ingest(source.trim());
    }
    if looks_like_source(line) {
        return Command::Ingest(line);
    }
    Command::Chat(line)
}

pub async fn run_repl(chat: &mut ChatOrchestrator<'_>, cfg: &Config) -> Result<()> {
    println!("ragchat");
    println!("model: {} ({})", cfg.model, cfg.model_provider.as_str());
    if cfg.search_credentials.is_none() {
        println!("web search disabled: set GOOGLE_CUSTOM_SEARCH_API_KEY and GOOGLE_CUSTOM_SEARCH_ENGINE_ID");
    }
    println!("type '?' for help\n");

    loop {
        print!("> ");
        io::stdout().flush().context("Failed to flush stdout")?;

        let mut input = String::new();
        let read = io::stdin()
            .read_line(&mut input)
            .context("Failed to read stdin")?;
        if read == 0 {
            break;
        }

        let line = input.trim();
        if line.is_empty() {
            continue;
        }

        match parse_command(line) {
            Command::Help => println!("{HELP}\n"),
            Command::Quit => break,
            Command::Clear => {
                chat.clear();
                println!("conversation and documents cleared\n");
            }
            Command::History => print_history(chat.history().turns(), chat.history().total_tokens()),
            Command::Export => match chat.export(&cfg.export_dir) {
                Ok(path) => println!("saved to {}\n", path.display()),
                Err(err) => eprintln!("export failed: {err:#}\n"),
            },
            Command::Docs => print_docs(chat),
            Command::Ingest(source) => match chat.ingest(source).await {
                Ok(outcome) => print_ingest(&outcome),
                Err(err) => eprintln!("{err}\n"),
            },
            Command::Chat(text) => match chat.run_turn(text).await {
                Ok(reply) => {
                    if reply.web_augmented {
                        println!("(with web results)");
                    }
                    println!("{}\n", reply.text.trim());
                }
                Err(TurnError::StaleAnswerNotRefreshed { answer, source }) => {
                    println!("{}\n", answer.trim());
                    eprintln!("this answer may be out of date: {source}\n");
                }
                Err(err) => {
                    warn!(error = %err, "chat turn failed");
                    eprintln!("error: {err}\n");
                }
            },
        }
    }

    Ok(())
}

fn print_history(turns: &[Turn], total_tokens: usize) {
    for (idx, turn) in turns.iter().enumerate() {
        println!(
            "[{}] {} ({} tokens): {}",
            idx,
            turn.role.as_str(),
            turn.token_count,
            turn.content
        );
    }
    println!("total: {total_tokens} tokens\n");
}

fn print_docs(chat: &ChatOrchestrator<'_>) {
    let store = chat.store();
    let sources = store.sources();
    if sources.is_empty() {
        println!("(no documents loaded)\n");
        return;
    }
    for source in sources {
        println!("{} ({} chunks)", source, store.chunks_of(source).count());
    }
    println!();
}

fn print_ingest(outcome: &IngestOutcome) {
    println!(
        "loaded {} {} ({} chunks)",
        outcome.report.kind.as_str(),
        outcome.report.source_id,
        outcome.report.chunk_count
    );
    if let Some(summary) = &outcome.summary {
        println!("{summary}");
    }
    println!();
}
