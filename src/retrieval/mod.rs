pub mod chunk;
pub mod embedding;
pub mod loaders;
pub mod store;

pub use chunk::TextSplitter;
pub use embedding::{Embedder, HostEmbedder};
pub use loaders::{LoaderRegistry, looks_like_source};
pub use store::{DocumentChunk, IngestReport, RetrievalStore};
