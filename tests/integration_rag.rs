#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end indexing and retrieval over real files with a deterministic embedder

use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::thread;
use tempfile::TempDir;
use voice_rag::assistant::{Assistant, ChatMessage, ChatModel};
use voice_rag::commands::{index_documents, run_chat};
use voice_rag::embeddings::{ChunkingConfig, Embedding, EmbeddingProvider};
use voice_rag::pipeline::ConversePipeline;
use voice_rag::rag::KnowledgeBase;
use voice_rag::speech::{SpeechToText, TextToSpeech};
use voice_rag::{RagError, Result};

const DIMENSION: usize = 26;

/// Letter-frequency vectors; whitespace and punctuation are ignored so
/// extraction artefacts do not move a chunk away from its own text
struct LetterEmbedder;

fn letter_vector(text: &str) -> Embedding {
    let mut vector = vec![0.0; DIMENSION];
    for c in text.chars().filter(char::is_ascii_alphabetic) {
        vector[(c.to_ascii_lowercase() as u8 - b'a') as usize] += 1.0;
    }
    vector
}

impl EmbeddingProvider for LetterEmbedder {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        Ok(texts.iter().map(|t| letter_vector(t)).collect())
    }

    fn embed_one(&self, text: &str) -> Result<Embedding> {
        Ok(letter_vector(text))
    }
}

fn init_test_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter("debug")
        .with_test_writer()
        .try_init()
        .ok();
}

fn knowledge_base() -> KnowledgeBase {
    KnowledgeBase::new(Arc::new(LetterEmbedder), ChunkingConfig::default(), DIMENSION)
        .expect("dimension is non-zero")
}

/// Single-page PDF using the built-in Helvetica font
fn minimal_pdf(text: &str) -> Vec<u8> {
    let content = format!("BT /F1 18 Tf 72 720 Td ({}) Tj ET", text);
    let objects = [
        "<< /Type /Catalog /Pages 2 0 R >>".to_string(),
        "<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_string(),
        "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R \
         /Resources << /Font << /F1 5 0 R >> >> >>"
            .to_string(),
        format!(
            "<< /Length {} >>\nstream\n{}\nendstream",
            content.len(),
            content
        ),
        "<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>"
            .to_string(),
    ];

    let mut pdf = b"%PDF-1.4\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(pdf.len());
        pdf.extend_from_slice(format!("{} 0 obj\n{}\nendobj\n", i + 1, body).as_bytes());
    }

    let xref_offset = pdf.len();
    let mut xref = format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1);
    for offset in offsets {
        writeln!(xref, "{:010} 00000 n ", offset).expect("writing to a string");
    }
    pdf.extend_from_slice(xref.as_bytes());
    pdf.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{}\n%%EOF\n",
            objects.len() + 1,
            xref_offset
        )
        .as_bytes(),
    );
    pdf
}

fn write_corpus(dir: &Path) -> Vec<PathBuf> {
    let files = [
        (
            "notes.txt",
            b"Water the ferns every Tuesday morning.".to_vec(),
        ),
        (
            "contacts.csv",
            b"name,phone\nMaria,555-0101\nQuentin,555-0199\n".to_vec(),
        ),
        (
            "faq.json",
            br#"[{"question": "Is parking free?", "answer": "Only on weekends."}]"#.to_vec(),
        ),
        ("warranty.pdf", minimal_pdf("Warranty lasts two years")),
    ];

    files
        .into_iter()
        .map(|(name, bytes)| {
            let path = dir.join(name);
            fs::write(&path, bytes).expect("should write corpus file");
            path
        })
        .collect()
}

#[test]
fn every_document_type_is_retrievable_by_its_content() {
    init_test_tracing();
    let temp_dir = TempDir::new().expect("should create temp dir");
    let paths = write_corpus(temp_dir.path());
    let kb = knowledge_base();

    let total = index_documents(&kb, &paths).expect("all documents index");
    assert_eq!(total, kb.len());

    let cases = [
        ("Water the ferns every Tuesday morning.", "notes.txt"),
        ("name: Quentin\nphone: 555-0199", "contacts.csv (row 1)"),
        (
            "answer: Only on weekends.\nquestion: Is parking free?",
            "faq.json (record 0)",
        ),
        ("Warranty lasts two years", "warranty.pdf"),
    ];

    for (query, expected_source) in cases {
        let hits = kb.search(query, 1).expect("search succeeds");
        assert_eq!(hits.len(), 1);
        assert!(
            hits[0].chunk.source.contains(expected_source),
            "query {:?} matched {:?}",
            query,
            hits[0].chunk.source
        );
        assert_eq!(hits[0].distance, 0.0);
    }
}

#[test]
fn pdf_text_is_extracted() {
    let kb = knowledge_base();
    kb.index_bytes(
        &minimal_pdf("Warranty lasts two years"),
        voice_rag::documents::DocumentType::Pdf,
        "warranty.pdf",
    )
    .expect("pdf indexes");

    let chunks = kb
        .retrieve_relevant_chunks("warranty", 1)
        .expect("retrieval succeeds");
    let squashed: String = chunks[0].split_whitespace().collect();
    assert!(squashed.contains("Warrantylaststwoyears"));
}

#[test]
fn results_are_ordered_by_distance() {
    let kb = knowledge_base();
    kb.index_bytes(
        br#"["aaaa", "aaab", "abbb", "bbbb"]"#,
        voice_rag::documents::DocumentType::Json,
        "letters.json",
    )
    .expect("index succeeds");

    let hits = kb.search("aaaa", 4).expect("search succeeds");

    let texts: Vec<&str> = hits.iter().map(|h| h.chunk.text.as_str()).collect();
    assert_eq!(texts, vec!["aaaa", "aaab", "abbb", "bbbb"]);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn failed_document_stops_indexing_without_partial_state() {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let good = temp_dir.path().join("good.txt");
    let bad = temp_dir.path().join("slides.pptx");
    fs::write(&good, "kept").expect("should write file");
    fs::write(&bad, "binary").expect("should write file");
    let kb = knowledge_base();

    let error = index_documents(&kb, &[good, bad]).expect_err("pptx is unsupported");

    assert!(matches!(
        error.downcast_ref::<RagError>(),
        Some(RagError::UnsupportedType { .. })
    ));
    assert_eq!(kb.len(), 1);
}

#[test]
fn concurrent_indexing_keeps_chunks_and_vectors_aligned() {
    let kb = Arc::new(knowledge_base());

    let writers: Vec<_> = (0..4)
        .map(|i| {
            let kb = Arc::clone(&kb);
            thread::spawn(move || {
                for j in 0..20 {
                    kb.index_bytes(
                        format!("document {} part {}", i, j).as_bytes(),
                        voice_rag::documents::DocumentType::Text,
                        "gen.txt",
                    )
                    .expect("index succeeds");
                }
            })
        })
        .collect();

    let reader = {
        let kb = Arc::clone(&kb);
        thread::spawn(move || {
            for _ in 0..50 {
                match kb.search("document part", usize::MAX) {
                    Ok(hits) => assert!(!hits.is_empty()),
                    Err(RagError::EmptyIndex) => {}
                    Err(e) => panic!("unexpected error: {}", e),
                }
            }
        })
    };

    for writer in writers {
        writer.join().expect("writer finished");
    }
    reader.join().expect("reader finished");

    assert_eq!(kb.len(), 80);
    assert_eq!(kb.search("document", usize::MAX).expect("search").len(), 80);
}

/// Chat model that answers with the number of messages it received
#[derive(Default)]
struct CountingModel {
    calls: AtomicUsize,
}

impl ChatModel for CountingModel {
    fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("{} messages", messages.len()))
    }
}

struct NoSpeech;

impl SpeechToText for NoSpeech {
    fn transcribe(&self, _audio: &[u8], _file_name: &str) -> Result<String> {
        Err(RagError::Speech("not used".to_string()))
    }
}

impl TextToSpeech for NoSpeech {
    fn synthesize(&self, _text: &str) -> Result<Vec<u8>> {
        Err(RagError::Speech("not used".to_string()))
    }
}

#[test]
fn chat_loop_handles_reset_and_quit() {
    let kb = Arc::new(knowledge_base());
    kb.index_bytes(b"Ferns like shade.", voice_rag::documents::DocumentType::Text, "f.txt")
        .expect("index succeeds");
    let model = Arc::new(CountingModel::default());
    let pipeline = ConversePipeline::new(
        kb,
        Assistant::new(Arc::clone(&model) as Arc<dyn ChatModel>),
        Arc::new(NoSpeech),
        Arc::new(NoSpeech),
    );

    let input = "Do ferns like sun?\n\nAnd water?\n/reset\nAgain?\n/quit\nNever asked\n";
    let mut output = Vec::new();
    run_chat(&pipeline, input.as_bytes(), &mut output).expect("chat loop runs");

    let output = String::from_utf8(output).expect("utf-8 output");
    let lines: Vec<&str> = output.lines().collect();
    assert_eq!(
        lines[1..],
        [
            "3 messages. Do you need more info?",
            "5 messages. Do you need more info?",
            "Conversation memory cleared.",
            "3 messages. Do you need more info?",
        ]
    );
    assert_eq!(model.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn chat_loop_reports_errors_and_continues() {
    let model = Arc::new(CountingModel::default());
    let pipeline = ConversePipeline::new(
        Arc::new(knowledge_base()),
        Assistant::new(Arc::clone(&model) as Arc<dyn ChatModel>),
        Arc::new(NoSpeech),
        Arc::new(NoSpeech),
    );

    let mut output = Vec::new();
    run_chat(&pipeline, "first\nsecond\n".as_bytes(), &mut output).expect("chat loop runs");

    let output = String::from_utf8(output).expect("utf-8 output");
    assert_eq!(output.matches("Error: Retrieval failed").count(), 2);
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}
