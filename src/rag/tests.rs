use super::*;
use crate::embeddings::Embedding;
use std::fs;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

const DIMENSION: usize = 26;

/// Letter-frequency vectors: identical texts map to identical vectors
#[derive(Default)]
struct LetterEmbedder {
    calls: AtomicUsize,
}

fn letter_vector(text: &str) -> Embedding {
    let mut vector = vec![0.0; DIMENSION];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        let slot = (c.to_ascii_lowercase() as u8 - b'a') as usize;
        vector[slot] += 1.0;
    }
    vector
}

impl EmbeddingProvider for LetterEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    fn embed_one(&self, text: &str) -> Result<Embedding> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(letter_vector(text))
    }
}

struct FailingEmbedder;

impl EmbeddingProvider for FailingEmbedder {
    fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Embedding>> {
        Err(RagError::EmbeddingProvider("service unavailable".to_string()))
    }

    fn embed_one(&self, _text: &str) -> Result<Embedding> {
        Err(RagError::EmbeddingProvider("service unavailable".to_string()))
    }
}

/// Returns vectors of the wrong size, or too few of them
struct BrokenEmbedder {
    drop_one: bool,
}

impl EmbeddingProvider for BrokenEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if self.drop_one {
            Ok(texts.iter().skip(1).map(|t| letter_vector(t)).collect())
        } else {
            Ok(texts.iter().map(|_| vec![0.0; 4]).collect())
        }
    }

    fn embed_one(&self, _text: &str) -> Result<Embedding> {
        Ok(vec![0.0; 4])
    }
}

fn knowledge_base() -> (KnowledgeBase, Arc<LetterEmbedder>) {
    let embedder = Arc::new(LetterEmbedder::default());
    let kb = KnowledgeBase::new(
        Arc::clone(&embedder) as Arc<dyn EmbeddingProvider>,
        ChunkingConfig::default(),
        DIMENSION,
    )
    .expect("dimension is non-zero");
    (kb, embedder)
}

#[test]
fn retrieval_on_empty_index_fails_without_embedding() {
    let (kb, embedder) = knowledge_base();

    let result = kb.retrieve_relevant_chunks("anything", DEFAULT_TOP_K);

    assert!(matches!(result, Err(RagError::EmptyIndex)));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn indexed_text_is_retrievable_by_its_own_content() {
    let (kb, _) = knowledge_base();
    kb.index_bytes(b"zebras zigzag", DocumentType::Text, "z.txt")
        .expect("index succeeds");
    kb.index_bytes(b"apples and bananas", DocumentType::Text, "a.txt")
        .expect("index succeeds");

    let chunks = kb
        .retrieve_relevant_chunks("zebras zigzag", 1)
        .expect("retrieval succeeds");

    assert_eq!(chunks, vec!["zebras zigzag".to_string()]);
}

#[test]
fn search_reports_sources_and_ascending_distances() {
    let (kb, _) = knowledge_base();
    kb.index_bytes(
        b"name,fruit\nann,apple\nbob,cherry\n",
        DocumentType::Csv,
        "fruit.csv",
    )
    .expect("index succeeds");

    let hits = kb
        .search("name: bob\nfruit: cherry", 2)
        .expect("search succeeds");

    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].chunk.source, "fruit.csv (row 1)");
    assert_eq!(hits[0].distance, 0.0);
    assert!(hits[0].distance <= hits[1].distance);
}

#[test]
fn top_k_is_clamped_and_zero_is_empty() {
    let (kb, _) = knowledge_base();
    kb.index_bytes(b"[\"one\", \"two\"]", DocumentType::Json, "n.json")
        .expect("index succeeds");

    assert_eq!(kb.retrieve_relevant_chunks("one", 10).expect("ok").len(), 2);
    assert!(kb.retrieve_relevant_chunks("one", 0).expect("ok").is_empty());
}

#[test]
fn equal_distances_keep_insertion_order() {
    let (kb, _) = knowledge_base();
    kb.index_bytes(b"[\"ab\", \"ba\", \"zz\"]", DocumentType::Json, "t.json")
        .expect("index succeeds");

    let chunks = kb.retrieve_relevant_chunks("ab", 2).expect("ok");

    assert_eq!(chunks, vec!["ab".to_string(), "ba".to_string()]);
}

#[test]
fn reindexing_is_additive() {
    let (kb, _) = knowledge_base();
    let first = kb
        .index_bytes(b"same text", DocumentType::Text, "s.txt")
        .expect("index succeeds");
    kb.index_bytes(b"same text", DocumentType::Text, "s.txt")
        .expect("index succeeds");

    assert_eq!(first.chunks_added, 1);
    assert_eq!(first.document_type, DocumentType::Text);
    assert_eq!(kb.len(), 2);
}

#[test]
fn unsupported_file_leaves_index_untouched() {
    let (kb, embedder) = knowledge_base();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("slides.pptx");
    fs::write(&path, "binary").expect("should write file");

    let result = kb.index_document(&path);

    assert!(matches!(result, Err(RagError::UnsupportedType { ref extension }) if extension == "pptx"));
    assert!(kb.is_empty());
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn index_document_reads_from_disk() {
    let (kb, _) = knowledge_base();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let path = temp_dir.path().join("guide.txt");
    fs::write(&path, "Press the red button to start.").expect("should write file");

    let indexed = kb.index_document(&path).expect("index succeeds");

    assert_eq!(indexed.chunks_added, 1);
    assert_eq!(indexed.source, path.display().to_string());
    let hits = kb.search("red button", 1).expect("search succeeds");
    assert_eq!(hits[0].chunk.source, path.display().to_string());
}

#[test]
fn whitespace_document_is_empty() {
    let (kb, embedder) = knowledge_base();

    let result = kb.index_bytes(b"  \n\n\t ", DocumentType::Text, "blank.txt");

    assert!(matches!(result, Err(RagError::EmptyDocument { ref document }) if document == "blank.txt"));
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn embedding_failure_leaves_index_untouched() {
    let kb = KnowledgeBase::new(Arc::new(FailingEmbedder), ChunkingConfig::default(), DIMENSION)
        .expect("dimension is non-zero");

    let result = kb.index_bytes(b"some text", DocumentType::Text, "t.txt");

    assert!(matches!(result, Err(RagError::EmbeddingProvider(_))));
    assert!(kb.is_empty());
}

#[test]
fn wrong_dimension_is_an_embedding_error() {
    let kb = KnowledgeBase::new(
        Arc::new(BrokenEmbedder { drop_one: false }),
        ChunkingConfig::default(),
        DIMENSION,
    )
    .expect("dimension is non-zero");

    let result = kb.index_bytes(b"some text", DocumentType::Text, "t.txt");

    assert!(matches!(result, Err(RagError::EmbeddingProvider(_))));
    assert!(kb.is_empty());
}

#[test]
fn missing_vectors_are_an_embedding_error() {
    let kb = KnowledgeBase::new(
        Arc::new(BrokenEmbedder { drop_one: true }),
        ChunkingConfig::default(),
        DIMENSION,
    )
    .expect("dimension is non-zero");

    let result = kb.index_bytes(b"[\"a\", \"b\"]", DocumentType::Json, "t.json");

    assert!(matches!(result, Err(RagError::EmbeddingProvider(_))));
    assert_eq!(kb.len(), 0);
}

#[test]
fn chunks_and_vectors_stay_aligned() {
    let (kb, _) = knowledge_base();
    let long_text = "alpha beta gamma delta. ".repeat(200);
    kb.index_bytes(long_text.as_bytes(), DocumentType::Text, "long.txt")
        .expect("index succeeds");
    let _ = kb.index_bytes(b"", DocumentType::Text, "empty.txt");
    kb.index_bytes(b"{\"k\": \"v\"}", DocumentType::Json, "kv.json")
        .expect("index succeeds");

    let state = kb.state.read();
    assert!(state.chunks.len() > 2);
    assert_eq!(state.chunks.len(), state.index.len());
}

#[test]
fn context_is_newline_joined() {
    assert_eq!(join_context(&["a", "b", "c"]), "a\nb\nc");
    assert_eq!(join_context::<String>(&[]), "");
}

#[test]
fn zero_dimension_knowledge_base_is_rejected() {
    let result = KnowledgeBase::new(
        Arc::new(LetterEmbedder::default()),
        ChunkingConfig::default(),
        0,
    );

    assert!(matches!(result, Err(RagError::Config(_))));
}
