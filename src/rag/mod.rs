//! Knowledge base: document indexing and nearest-chunk retrieval.
//!
//! Chunks and their vectors are kept side by side under one lock. Row `i` of
//! the vector index always belongs to chunk `i`.

#[cfg(test)]
mod tests;

use std::path::Path;
use std::sync::Arc;

use itertools::Itertools;
use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use crate::documents::{self, DocumentSegment, DocumentType};
use crate::embeddings::{ChunkingConfig, EmbeddingProvider, split_text};
use crate::index::VectorIndex;
use crate::{RagError, Result};

/// Number of chunks retrieved when the caller has no preference
pub const DEFAULT_TOP_K: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub text: String,
    /// Document label plus the segment location, e.g. `faq.csv (row 3)`
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub chunk: Chunk,
    /// Squared L2 distance between the query and the chunk vector
    pub distance: f32,
}

/// Summary of one successful indexing call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedDocument {
    pub source: String,
    pub document_type: DocumentType,
    pub chunks_added: usize,
}

#[derive(Debug)]
struct IndexState {
    chunks: Vec<Chunk>,
    index: VectorIndex,
}

pub struct KnowledgeBase {
    embedder: Arc<dyn EmbeddingProvider>,
    chunking: ChunkingConfig,
    state: RwLock<IndexState>,
}

impl std::fmt::Debug for KnowledgeBase {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("KnowledgeBase")
            .field("chunking", &self.chunking)
            .field("dimension", &state.index.dimension())
            .field("chunks", &state.chunks.len())
            .finish_non_exhaustive()
    }
}

impl KnowledgeBase {
    /// Fails with [`RagError::Config`] when `dimension` is zero
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        chunking: ChunkingConfig,
        dimension: usize,
    ) -> Result<Self> {
        Ok(Self {
            embedder,
            chunking,
            state: RwLock::new(IndexState {
                chunks: Vec::new(),
                index: VectorIndex::new(dimension)?,
            }),
        })
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.state.read().index.dimension()
    }

    /// Number of indexed chunks
    #[inline]
    pub fn len(&self) -> usize {
        self.state.read().chunks.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state.read().chunks.is_empty()
    }

    /// Load, split, embed and append a document from disk.
    ///
    /// Indexing is additive: the same file indexed twice is stored twice.
    /// On any error the knowledge base is left untouched.
    #[inline]
    pub fn index_document(&self, path: &Path) -> Result<IndexedDocument> {
        info!("Indexing document: {}", path.display());
        let (document_type, segments) = documents::load_file(path)?;
        self.index_segments(segments, document_type, &path.display().to_string())
    }

    /// Same as [`KnowledgeBase::index_document`] for bytes already in memory
    #[inline]
    pub fn index_bytes(
        &self,
        bytes: &[u8],
        document_type: DocumentType,
        source: &str,
    ) -> Result<IndexedDocument> {
        let segments = documents::load_segments(bytes, document_type, source)?;
        self.index_segments(segments, document_type, source)
    }

    fn index_segments(
        &self,
        segments: Vec<DocumentSegment>,
        document_type: DocumentType,
        source: &str,
    ) -> Result<IndexedDocument> {
        let chunks: Vec<Chunk> = segments
            .into_iter()
            .flat_map(|segment| {
                let label = segment.location.as_ref().map_or_else(
                    || source.to_string(),
                    |location| format!("{} ({})", source, location),
                );
                split_text(&segment.text, &self.chunking)
                    .into_iter()
                    .map(move |text| Chunk {
                        text,
                        source: label.clone(),
                    })
            })
            .collect();

        if chunks.is_empty() {
            return Err(RagError::EmptyDocument {
                document: source.to_string(),
            });
        }

        let texts: Vec<String> = chunks.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts)?;

        if vectors.len() != chunks.len() {
            return Err(RagError::EmbeddingProvider(format!(
                "Expected {} embeddings, received {}",
                chunks.len(),
                vectors.len()
            )));
        }

        let chunks_added = chunks.len();
        {
            let mut state = self.state.write();
            state.index.add(&vectors).map_err(|e| match e {
                RagError::DimensionMismatch { expected, actual } => RagError::EmbeddingProvider(
                    format!("Embedding has dimension {}, index expects {}", actual, expected),
                ),
                other => other,
            })?;
            state.chunks.extend(chunks);
            debug!("Knowledge base now holds {} chunks", state.chunks.len());
        }

        info!("Indexed {} chunks from {}", chunks_added, source);

        Ok(IndexedDocument {
            source: source.to_string(),
            document_type,
            chunks_added,
        })
    }

    /// Texts of the `top_k` chunks nearest to `query`, closest first
    #[inline]
    pub fn retrieve_relevant_chunks(&self, query: &str, top_k: usize) -> Result<Vec<String>> {
        Ok(self
            .search(query, top_k)?
            .into_iter()
            .map(|hit| hit.chunk.text)
            .collect())
    }

    /// Nearest chunks with their sources and distances.
    ///
    /// Fails with [`RagError::EmptyIndex`] before calling the embedder when
    /// nothing has been indexed.
    #[inline]
    pub fn search(&self, query: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        if self.is_empty() {
            return Err(RagError::EmptyIndex);
        }

        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_vector = self.embedder.embed_one(query)?;

        let state = self.state.read();
        let neighbors = state.index.search(&query_vector, top_k).map_err(|e| match e {
            RagError::DimensionMismatch { expected, actual } => RagError::EmbeddingProvider(
                format!("Query embedding has dimension {}, index expects {}", actual, expected),
            ),
            other => other,
        })?;

        debug!("Retrieved {} chunks for query", neighbors.len());

        Ok(neighbors
            .into_iter()
            .filter_map(|neighbor| {
                state.chunks.get(neighbor.id).map(|chunk| SearchHit {
                    chunk: chunk.clone(),
                    distance: neighbor.distance,
                })
            })
            .collect())
    }
}

/// Join retrieved chunk texts into the context handed to the assistant
#[inline]
pub fn join_context<S: AsRef<str>>(chunks: &[S]) -> String {
    chunks.iter().map(AsRef::<str>::as_ref).join("\n")
}
