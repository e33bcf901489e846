use anyhow::{Result, anyhow};
use tracing::{debug, info};

use super::chunk::TextSplitter;
use super::embedding::{Embedder, cosine_similarity};
use super::loaders::{LoaderRegistry, SourceKind, resolve};
use crate::error::IngestError;

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentChunk {
    pub source_id: String,
    pub text: String,
    pub embedding: Vec<f32>,
    pub position: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub source_id: String,
    pub kind: SourceKind,
    pub chunk_count: usize,
}

pub struct RetrievalStore {
    splitter: TextSplitter,
    chunks: Vec<DocumentChunk>,
    has_content: bool,
}

impl RetrievalStore {
    pub fn new(splitter: TextSplitter) -> Self {
        Self {
            splitter,
            chunks: Vec::new(),
            has_content: false,
        }
    }

    pub fn has_content(&self) -> bool {
        self.has_content
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn sources(&self) -> Vec<&str> {
        let mut sources: Vec<&str> = Vec::new();
        for chunk in &self.chunks {
            if !sources.contains(&chunk.source_id.as_str()) {
                sources.push(&chunk.source_id);
            }
        }
        sources
    }

    pub fn chunks_of<'s>(&'s self, source_id: &'s str) -> impl Iterator<Item = &'s DocumentChunk> {
        self.chunks
            .iter()
            .filter(move |chunk| chunk.source_id == source_id)
    }

    /// Loads, splits and embeds `raw`, then appends its chunks. Nothing is
    /// stored unless every step succeeds.
    pub async fn ingest(
        &mut self,
        raw: &str,
        loaders: &LoaderRegistry,
        embedder: &dyn Embedder,
    ) -> Result<IngestReport, IngestError> {
        let source = resolve(raw)?;
        let text = loaders.load(&source).await?;
        let pieces = self.splitter.split(&text);
        if pieces.is_empty() {
            return Err(IngestError::Load {
                source_id: source.id,
                reason: "no text could be extracted".to_string(),
            });
        }
        debug!(source = %source, chunk_count = pieces.len(), "embedding document chunks");

        let embeddings = embedder
            .embed(&pieces)
            .await
            .map_err(|err| IngestError::Embedding {
                source_id: source.id.clone(),
                reason: format!("{err:#}"),
            })?;
        if embeddings.len() != pieces.len() {
            return Err(IngestError::Embedding {
                source_id: source.id,
                reason: format!(
                    "expected {} embeddings, got {}",
                    pieces.len(),
                    embeddings.len()
                ),
            });
        }

        let chunk_count = pieces.len();
        let start = self.chunks.len();
        self.chunks.extend(
            pieces
                .into_iter()
                .zip(embeddings)
                .enumerate()
                .map(|(offset, (text, embedding))| DocumentChunk {
                    source_id: source.id.clone(),
                    text,
                    embedding,
                    position: start + offset,
                }),
        );
        self.has_content = true;
        info!(source = %source, kind = source.kind.as_str(), chunk_count, "ingested document");

        Ok(IngestReport {
            source_id: source.id,
            kind: source.kind,
            chunk_count,
        })
    }

    /// Up to `k` chunks, most similar to `text` first. Equal scores keep
    /// ingestion order.
    pub async fn query(
        &self,
        text: &str,
        k: usize,
        embedder: &dyn Embedder,
    ) -> Result<Vec<&DocumentChunk>> {
        if !self.has_content || k == 0 {
            return Ok(Vec::new());
        }

        let input = [text.to_string()];
        let query_embedding = embedder
            .embed(&input)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Empty embedding response"))?;

        let mut scored: Vec<(f32, &DocumentChunk)> = self
            .chunks
            .iter()
            .map(|chunk| (score(&query_embedding, &chunk.embedding), chunk))
            .collect();
        scored.sort_by(|a, b| {
            b.0.total_cmp(&a.0)
                .then(a.1.position.cmp(&b.1.position))
        });

        Ok(scored.into_iter().take(k).map(|(_, chunk)| chunk).collect())
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.has_content = false;
    }
}

/// Non-finite similarities (NaN or overflowing embeddings) rank last.
fn score(query: &[f32], chunk: &[f32]) -> f32 {
    let similarity = cosine_similarity(query, chunk);
    if similarity.is_finite() {
        similarity
    } else {
        f32::NEG_INFINITY
    }
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::Path;

    use super::{DocumentChunk, RetrievalStore};
    use crate::error::IngestError;
    use crate::retrieval::chunk::TextSplitter;
    use crate::retrieval::embedding::testing::LetterEmbedder;
    use crate::retrieval::loaders::{LoaderRegistry, SourceKind};

    fn write(dir: &Path, name: &str, contents: &str) -> String {
        let path = dir.join(name);
        fs::write(&path, contents).expect("write fixture");
        path.to_str().expect("utf8 path").to_string()
    }

    fn registry() -> LoaderRegistry {
        LoaderRegistry::with_defaults(&reqwest::Client::new())
    }

    #[tokio::test]
    async fn ingest_splits_embeds_and_flags_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(dir.path(), "doc.txt", "aaaa aaaa\nbbbb bbbb\ncccc cccc");
        let embedder = LetterEmbedder::default();
        let mut store = RetrievalStore::new(TextSplitter::new(10, 2));
        assert!(!store.has_content());

        let report = store
            .ingest(&path, &registry(), &embedder)
            .await
            .expect("ingest");

        assert_eq!(report.kind, SourceKind::PlainText);
        assert_eq!(report.chunk_count, 3);
        assert_eq!(store.len(), 3);
        assert!(store.has_content());
        assert_eq!(store.sources(), vec![path.as_str()]);
        assert_eq!(store.chunks_of(&path).count(), 3);
    }

    #[tokio::test]
    async fn query_returns_at_most_k_by_descending_similarity() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(
            dir.path(),
            "doc.md",
            "xxxx yyyy\nxxxx xxxx\nzzzz zzzz\nxxxx xxzz",
        );
        let embedder = LetterEmbedder::default();
        let mut store = RetrievalStore::new(TextSplitter::new(10, 2));
        store
            .ingest(&path, &registry(), &embedder)
            .await
            .expect("ingest");

        let hits = store.query("x", 3, &embedder).await.expect("query");
        let texts: Vec<&str> = hits.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["xxxx xxxx", "xxxx xxzz", "xxxx yyyy"]);
    }

    #[tokio::test]
    async fn ties_keep_ingestion_order() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(dir.path(), "doc.txt", "abab abab\nbaba baba\nqqqq qqqq");
        let embedder = LetterEmbedder::default();
        let mut store = RetrievalStore::new(TextSplitter::new(10, 2));
        store
            .ingest(&path, &registry(), &embedder)
            .await
            .expect("ingest");

        let hits = store.query("ab", 2, &embedder).await.expect("query");
        let positions: Vec<usize> = hits.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![0, 1]);
    }

    #[tokio::test]
    async fn clear_then_reingest_drops_old_chunks() {
        let dir = tempfile::tempdir().expect("tempdir");
        let old = write(dir.path(), "old.txt", "xxxx xxxx");
        let new = write(dir.path(), "new.txt", "yyyy yyyy");
        let embedder = LetterEmbedder::default();
        let mut store = RetrievalStore::new(TextSplitter::new(10, 2));

        store.ingest(&old, &registry(), &embedder).await.expect("ingest old");
        store.clear();
        assert!(!store.has_content());
        assert!(store.is_empty());

        store.ingest(&new, &registry(), &embedder).await.expect("ingest new");
        let hits = store.query("xxxx", 10, &embedder).await.expect("query");
        assert!(hits.iter().all(|chunk| chunk.source_id == new));
        assert_eq!(hits.len(), 1);
    }

    #[tokio::test]
    async fn failed_ingestion_leaves_store_unchanged() {
        let dir = tempfile::tempdir().expect("tempdir");
        let good = write(dir.path(), "good.txt", "aaaa");
        let unsupported = write(dir.path(), "image.png", "png");
        let mut store = RetrievalStore::new(TextSplitter::new(10, 2));
        store
            .ingest(&good, &registry(), &LetterEmbedder::default())
            .await
            .expect("ingest");

        let err = store
            .ingest(&unsupported, &registry(), &LetterEmbedder::default())
            .await
            .expect_err("png is unsupported");
        assert!(matches!(err, IngestError::UnsupportedSource(_)));

        let missing = dir.path().join("missing.md");
        let err = store
            .ingest(missing.to_str().expect("utf8"), &registry(), &LetterEmbedder::default())
            .await
            .expect_err("missing file");
        assert!(matches!(err, IngestError::SourceNotFound(_)));

        let other = write(dir.path(), "other.txt", "bbbb");
        let err = store
            .ingest(&other, &registry(), &LetterEmbedder::failing())
            .await
            .expect_err("embedding fails");
        assert!(matches!(err, IngestError::Embedding { .. }));

        assert_eq!(store.len(), 1);
        assert_eq!(store.sources(), vec![good.as_str()]);
    }

    #[tokio::test]
    async fn empty_documents_are_rejected() {
        let dir = tempfile::tempdir().expect("tempdir");
        let blank = write(dir.path(), "blank.txt", "  \n\n ");
        let mut store = RetrievalStore::new(TextSplitter::new(10, 2));
        let err = store
            .ingest(&blank, &registry(), &LetterEmbedder::default())
            .await
            .expect_err("blank");
        assert!(matches!(err, IngestError::Load { .. }));
        assert!(!store.has_content());
    }

    #[tokio::test]
    async fn query_without_content_skips_the_embedder() {
        let store = RetrievalStore::new(TextSplitter::new(10, 2));
        let embedder = LetterEmbedder::default();
        let hits = store.query("anything", 5, &embedder).await.expect("query");
        assert!(hits.is_empty());
        assert_eq!(embedder.calls.get(), 0);
    }

    #[tokio::test]
    async fn invalid_embeddings_rank_last_without_panicking() {
        let mut store = RetrievalStore::new(TextSplitter::new(10, 2));
        for position in 0..40 {
            let embedding = if position % 3 == 0 {
                let mut v = vec![0.0f32; 26];
                v[0] = f32::NAN;
                v
            } else {
                LetterEmbedder::vector(if position % 2 == 0 { "qqqq" } else { "zzzz" })
            };
            store.chunks.push(DocumentChunk {
                source_id: "doc.txt".to_string(),
                text: format!("chunk {position}"),
                embedding,
                position,
            });
        }
        store.has_content = true;

        let hits = store
            .query("q", 5, &LetterEmbedder::default())
            .await
            .expect("query");

        let positions: Vec<usize> = hits.iter().map(|c| c.position).collect();
        assert_eq!(positions, vec![2, 4, 8, 10, 14]);
    }

    #[tokio::test]
    async fn zero_k_returns_nothing() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = write(dir.path(), "doc.txt", "aaaa");
        let embedder = LetterEmbedder::default();
        let mut store = RetrievalStore::new(TextSplitter::new(10, 2));
        store.ingest(&path, &registry(), &embedder).await.expect("ingest");

        let hits = store.query("aaaa", 0, &embedder).await.expect("query");
        assert!(hits.is_empty());
        assert_eq!(embedder.calls.get(), 1);
    }
}
