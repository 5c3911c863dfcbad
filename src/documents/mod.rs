// Document loading
// Turns raw file bytes into plain-text segments ready for chunking


use std::fmt;
use std::fs;
use std::panic;
use std::path::Path;

use itertools::Itertools;
use serde_json::Value;
use tracing::{debug, warn};

use crate::{RagError, Result};

/// Supported document formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentType {
    Text,
    Csv,
    Json,
    Pdf,
}

/// One unit of raw text produced by a loader: a whole text file, a CSV row,
/// a JSON record or a PDF page. Chunks never span two segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentSegment {
    pub text: String,
    /// Where in the document the segment came from, e.g. `row 3` or `page 2`
    pub location: Option<String>,
}

impl DocumentSegment {
    fn whole(text: String) -> Self {
        Self {
            text,
            location: None,
        }
    }

    fn at(text: String, location: String) -> Self {
        Self {
            text,
            location: Some(location),
        }
    }
}

impl DocumentType {
    /// Resolve a file extension (without the dot, any case)
    #[inline]
    pub fn from_extension(extension: &str) -> Result<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "txt" => Ok(Self::Text),
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            "pdf" => Ok(Self::Pdf),
            _ => Err(RagError::UnsupportedType {
                extension: extension.to_string(),
            }),
        }
    }

    #[inline]
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .map(|ext| ext.to_string_lossy())
            .unwrap_or_default();
        Self::from_extension(&extension)
    }

    #[inline]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Text => "txt",
            Self::Csv => "csv",
            Self::Json => "json",
            Self::Pdf => "pdf",
        }
    }
}

impl fmt::Display for DocumentType {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Read a file from disk and load it according to its extension.
///
/// The extension is checked before the file is touched.
#[inline]
pub fn load_file(path: &Path) -> Result<(DocumentType, Vec<DocumentSegment>)> {
    let document_type = DocumentType::from_path(path)?;
    let source = path.display().to_string();

    let bytes = fs::read(path).map_err(|e| RagError::DocumentLoad {
        document: source.clone(),
        message: e.to_string(),
    })?;

    let segments = load_segments(&bytes, document_type, &source)?;
    Ok((document_type, segments))
}

/// Convert raw bytes of a known type into text segments
#[inline]
pub fn load_segments(
    bytes: &[u8],
    document_type: DocumentType,
    source: &str,
) -> Result<Vec<DocumentSegment>> {
    let segments = match document_type {
        DocumentType::Text => load_text(bytes),
        DocumentType::Csv => load_csv(bytes),
        DocumentType::Json => load_json(bytes),
        DocumentType::Pdf => load_pdf(bytes),
    }
    .map_err(|message| RagError::DocumentLoad {
        document: source.to_string(),
        message,
    })?;

    debug!(
        "Loaded {} segments from {} document {}",
        segments.len(),
        document_type,
        source
    );

    Ok(segments)
}

fn load_text(bytes: &[u8]) -> Result<Vec<DocumentSegment>, String> {
    let text = String::from_utf8_lossy(bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    Ok(vec![DocumentSegment::whole(text.to_string())])
}

/// Each data row becomes `header: value` lines
fn load_csv(bytes: &[u8]) -> Result<Vec<DocumentSegment>, String> {
    let bytes = bytes.strip_prefix(b"\xef\xbb\xbf").unwrap_or(bytes);
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(bytes);

    let headers = reader
        .headers()
        .map_err(|e| format!("Invalid CSV header: {}", e))?
        .clone();

    let mut segments = Vec::new();
    for (row, record) in reader.records().enumerate() {
        let record = record.map_err(|e| format!("Invalid CSV record: {}", e))?;

        let text = headers
            .iter()
            .zip(record.iter())
            .map(|(header, value)| format!("{}: {}", header.trim(), value.trim()))
            .join("\n");

        segments.push(DocumentSegment::at(text, format!("row {}", row)));
    }

    Ok(segments)
}

/// A top-level array yields one segment per element, anything else one segment
fn load_json(bytes: &[u8]) -> Result<Vec<DocumentSegment>, String> {
    let value: Value =
        serde_json::from_slice(bytes).map_err(|e| format!("Invalid JSON: {}", e))?;

    let segments = match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| DocumentSegment::at(flatten_json(item), format!("record {}", i)))
            .collect(),
        other => vec![DocumentSegment::whole(flatten_json(&other))],
    };

    Ok(segments)
}

/// Render every scalar leaf as a `dotted.path: value` line
fn flatten_json(value: &Value) -> String {
    let mut lines = Vec::new();
    collect_json_leaves(value, "", &mut lines);
    lines.join("\n")
}

fn collect_json_leaves(value: &Value, path: &str, lines: &mut Vec<String>) {
    let child_path = |key: &str| {
        if path.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", path, key)
        }
    };

    match value {
        Value::Object(map) => {
            for (key, child) in map {
                collect_json_leaves(child, &child_path(key), lines);
            }
        }
        Value::Array(items) => {
            for (i, child) in items.iter().enumerate() {
                collect_json_leaves(child, &child_path(&i.to_string()), lines);
            }
        }
        Value::Null => {}
        Value::String(s) => push_leaf(path, s, lines),
        Value::Bool(b) => push_leaf(path, &b.to_string(), lines),
        Value::Number(n) => push_leaf(path, &n.to_string(), lines),
    }
}

fn push_leaf(path: &str, value: &str, lines: &mut Vec<String>) {
    if path.is_empty() {
        lines.push(value.to_string());
    } else {
        lines.push(format!("{}: {}", path, value));
    }
}

/// Pages are separated by form feeds in the extracted text
fn load_pdf(bytes: &[u8]) -> Result<Vec<DocumentSegment>, String> {
    // pdf-extract panics on some malformed files
    let extracted = panic::catch_unwind(|| pdf_extract::extract_text_from_mem(bytes))
        .map_err(|_| "PDF parser crashed on malformed input".to_string())?
        .map_err(|e| format!("PDF extraction error: {}", e))?;

    if extracted.trim().is_empty() {
        warn!("PDF contains no extractable text; it may be image-based or encrypted");
    }

    let segments = extracted
        .split('\u{c}')
        .enumerate()
        .filter(|(_, page)| !page.trim().is_empty())
        .map(|(i, page)| DocumentSegment::at(page.to_string(), format!("page {}", i + 1)))
        .collect();

    Ok(segments)
}
