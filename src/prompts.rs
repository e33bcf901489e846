use chrono::{DateTime, TimeZone};
use std::fmt::Display;

use crate::retrieval::DocumentChunk;

pub fn pre_search(query: &str, search_results: &str) -> String {
    format!(
        "Can you answer \"{query}\"?
I also found the following web search results for the same query:

  {search_results}

If needed, feel free to augment your response with anything helpful from the above search results too.
"
    )
}

pub fn post_search<Tz>(query: &str, search_results: &str, now: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    format!(
        "I found the following up-to-date web search results for \"{query}\":

  {search_results}

Using the above search results, can you now take a best guess at answering {query}.
Exclude the disclaimer note about this information might be inaccurate or subject to change.
Be short and don't say \"based on the search results\".
Btw, the date and time right now is {}. Feel free to mention that in your response if needed.",
        now.format("%Y-%m-%d %H:%M:%S %Z")
    )
}

pub fn with_documents(query: &str, chunks: &[&DocumentChunk]) -> String {
    let snippets = chunks
        .iter()
        .map(|chunk| chunk.text.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "I was asked the following query: {query}

Some relevant snippets from documents that I have that you may find useful in the context of my query:

  {snippets}

Answer to best of your abilities the original query"
    )
}

pub fn summarize(text: &str) -> String {
    format!("Write a concise summary of the following:\n\n\"{text}\"\n\nCONCISE SUMMARY:")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{post_search, pre_search, summarize, with_documents};
    use crate::browsing::WebBrowsingDecider;
    use crate::config::test_config;
    use crate::retrieval::DocumentChunk;

    fn chunk(text: &str, position: usize) -> DocumentChunk {
        DocumentChunk {
            source_id: "doc.md".to_string(),
            text: text.to_string(),
            embedding: Vec::new(),
            position,
        }
    }

    #[test]
    fn pre_search_includes_query_and_results() {
        let prompt = pre_search("rust release", "Rust 1.90 is out");
        assert!(prompt.starts_with("Can you answer \"rust release\"?"));
        assert!(prompt.contains("  Rust 1.90 is out"));
    }

    #[test]
    fn post_search_includes_timestamp_and_is_deterministic() {
        let now = Utc.with_ymd_and_hms(2026, 10, 17, 9, 30, 0).single().expect("valid date");
        let first = post_search("weather", "Sunny, 21C", &now);
        let second = post_search("weather", "Sunny, 21C", &now);
        assert_eq!(first, second);
        assert!(first.contains("2026-10-17 09:30:00 UTC"));
        assert!(first.contains("best guess at answering weather"));
    }

    #[test]
    fn post_search_prompt_is_not_itself_stale() {
        let now = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).single().expect("valid date");
        let decider = WebBrowsingDecider::from_config(&test_config());
        let prompt = post_search("bitcoin price", "BTC trades at 100k", &now);
        assert!(!decider.needs_live_data(&prompt));
        assert!(!decider.needs_live_data("Bitcoin is trading at about 100k today."));
    }

    #[test]
    fn with_documents_lists_snippets_in_given_order() {
        let a = chunk("alpha snippet", 0);
        let b = chunk("beta snippet", 1);
        let prompt = with_documents("what is alpha?", &[&b, &a]);
        assert!(prompt.starts_with("I was asked the following query: what is alpha?"));
        assert!(prompt.contains("  beta snippet\nalpha snippet"));
        assert!(prompt.ends_with("Answer to best of your abilities the original query"));
    }

    #[test]
    fn summarize_wraps_text() {
        assert!(summarize("body").contains("\"body\""));
    }
}
