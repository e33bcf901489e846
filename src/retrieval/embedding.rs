use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::pin::Pin;

use crate::config::Config;
use crate::model;

pub type EmbedFuture<'a> = Pin<Box<dyn Future<Output = Result<Vec<Vec<f32>>>> + 'a>>;

pub trait Embedder {
    fn embed<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a>;
}

pub struct HostEmbedder<'a> {
    client: &'a Client,
    cfg: &'a Config,
}

impl<'a> HostEmbedder<'a> {
    pub fn new(client: &'a Client, cfg: &'a Config) -> Self {
        Self { client, cfg }
    }
}

impl Embedder for HostEmbedder<'_> {
    fn embed<'b>(&'b self, texts: &'b [String]) -> EmbedFuture<'b> {
        Box::pin(async move {
            if texts.is_empty() {
                return Ok(Vec::new());
            }
            model::embed(self.client, self.cfg, texts).await
        })
    }
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, mismatched or
/// zero-length vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

#[cfg(test)]
pub(crate) mod testing {
    use anyhow::anyhow;
    use std::cell::Cell;

    use super::{EmbedFuture, Embedder};

    #[derive(Debug, Default)]
    pub struct LetterEmbedder {
        pub calls: Cell<usize>,
        pub fail: bool,
    }

    impl LetterEmbedder {
        pub fn failing() -> Self {
            Self {
                calls: Cell::new(0),
                fail: true,
            }
        }

        pub fn vector(text: &str) -> Vec<f32> {
            let mut v = vec![0.0f32; 26];
            for c in text.chars().filter(char::is_ascii_alphabetic) {
                v[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
            }
            v
        }
    }

    impl Embedder for LetterEmbedder {
        fn embed<'a>(&'a self, texts: &'a [String]) -> EmbedFuture<'a> {
            self.calls.set(self.calls.get() + 1);
            let result = if self.fail {
                Err(anyhow!("embedding service unavailable"))
            } else {
                Ok(texts.iter().map(|t| Self::vector(t)).collect())
            };
            Box::pin(async move { result })
        }
    }
}
