use thiserror::Error;

pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Unsupported file type: '{extension}' (expected one of txt, csv, json, pdf)")]
    UnsupportedType { extension: String },

    #[error("No content extracted from document: {document}")]
    EmptyDocument { document: String },

    #[error("Failed to load document {document}: {message}")]
    DocumentLoad { document: String, message: String },

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Vector dimension mismatch: index expects {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("No documents indexed yet")]
    EmptyIndex,

    #[error("Generation provider error: {0}")]
    GenerationProvider(String),

    #[error("Speech provider error: {0}")]
    Speech(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod assistant;
pub mod commands;
pub mod config;
pub mod conversation;
pub mod documents;
pub mod embeddings;
pub mod index;
pub mod openai;
pub mod pipeline;
pub mod rag;
pub mod speech;
