use anyhow::{Context, Result};
use tiktoken_rs::CoreBPE;

pub trait TokenCounter {
    fn count(&self, text: &str) -> usize;
}

pub struct TiktokenCounter {
    bpe: CoreBPE,
}

impl TiktokenCounter {
    pub fn new() -> Result<Self> {
        let bpe = tiktoken_rs::cl100k_base().context("Failed to load cl100k_base tokenizer")?;
        Ok(Self { bpe })
    }
}

impl TokenCounter for TiktokenCounter {
    fn count(&self, text: &str) -> usize {
        self.bpe.encode_ordinary(text).len()
    }
}


#[cfg(test)]
mod tests {
    use super::{TiktokenCounter, TokenCounter};

    #[test]
    fn tiktoken_counts_are_positive_for_text_and_zero_for_empty() {
        let counter = TiktokenCounter::new().expect("tokenizer should load");
        assert_eq!(counter.count(""), 0);
        assert!(counter.count("hello world") >= 2);
    }

    #[test]
    fn longer_text_costs_more_tokens() {
        let counter = TiktokenCounter::new().expect("tokenizer should load");
        let short = counter.count("The quick brown fox.");
        let long = counter.count("The quick brown fox jumps over the lazy dog, twice over.");
        assert!(long > short);
    }
}
