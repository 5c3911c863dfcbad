// Embeddings module
// Text chunking and the embedding provider seam

pub mod chunking;
pub mod openai;

pub use chunking::{ChunkingConfig, split_text};
pub use openai::OpenAiEmbeddings;

use crate::Result;

/// A dense vector representing the meaning of a span of text
pub type Embedding = Vec<f32>;

/// Anything that can turn text into fixed-dimension vectors.
///
/// Indexing and querying must use the same provider, otherwise distances
/// between stored chunks and queries are meaningless.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed many texts, returning exactly one vector per input in input order
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>>;

    fn embed_one(&self, text: &str) -> Result<Embedding>;
}
