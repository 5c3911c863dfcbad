
use std::collections::VecDeque;
use std::sync::LazyLock;

use fancy_regex::Regex;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

static SENTENCE_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?<=[.!?])\s+").expect("sentence regex is valid"));

/// A word together with the whitespace that follows it
static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\S+\s*").expect("word regex is valid"));

/// Configuration for splitting text into chunks, measured in characters
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Upper bound on chunk length
    pub chunk_size: usize,
    /// Characters carried over from the end of one chunk into the next
    pub chunk_overlap: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
        }
    }
}

/// Natural text boundaries, coarsest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
    Character,
}

const BOUNDARIES: [Boundary; 5] = [
    Boundary::Paragraph,
    Boundary::Line,
    Boundary::Sentence,
    Boundary::Word,
    Boundary::Character,
];

impl Boundary {
    fn occurs_in(self, text: &str) -> bool {
        match self {
            Self::Paragraph => text.contains("\n\n"),
            Self::Line => text.contains('\n'),
            Self::Sentence => SENTENCE_BREAK.is_match(text).unwrap_or(false),
            Self::Word => text.contains(char::is_whitespace),
            Self::Character => true,
        }
    }

    /// Separator used when adjacent pieces are merged back together.
    ///
    /// Word pieces carry their own trailing whitespace, so tabs and runs of
    /// spaces survive the merge unchanged.
    fn joiner(self) -> &'static str {
        match self {
            Self::Paragraph => "\n\n",
            Self::Line => "\n",
            Self::Sentence => " ",
            Self::Word | Self::Character => "",
        }
    }

    fn split(self, text: &str) -> Vec<&str> {
        let pieces: Vec<&str> = match self {
            Self::Paragraph => text.split("\n\n").collect(),
            Self::Line => text.split('\n').collect(),
            Self::Sentence => split_sentences(text),
            Self::Word => WORD
                .find_iter(text)
                .filter_map(Result::ok)
                .map(|found| found.as_str())
                .collect(),
            Self::Character => text.split_inclusive(|_: char| true).collect(),
        };

        pieces
            .into_iter()
            .filter(|piece| !piece.trim().is_empty())
            .collect()
    }
}

fn split_sentences(text: &str) -> Vec<&str> {
    let mut pieces = Vec::new();
    let mut last = 0;

    for found in SENTENCE_BREAK.find_iter(text).filter_map(Result::ok) {
        if let Some(piece) = text.get(last..found.start()) {
            pieces.push(piece);
        }
        last = found.end();
    }

    if let Some(rest) = text.get(last..) {
        pieces.push(rest);
    }

    pieces
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Split text into overlapping chunks of at most `chunk_size` characters.
///
/// Splitting prefers paragraph breaks, then line breaks, then sentence ends,
/// then whitespace, and only cuts inside a word when a single word is longer
/// than a chunk. Small neighbouring pieces are merged back together, and each
/// chunk starts with up to `chunk_overlap` characters of trailing context from
/// the previous one.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut chunks = Vec::new();

    if text.trim().is_empty() {
        return chunks;
    }

    split_recursive(text, &BOUNDARIES, config, &mut chunks);

    debug!(
        "Split {} characters into {} chunks (avg {} characters)",
        char_len(text),
        chunks.len(),
        chunks.iter().map(|c| char_len(c)).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

fn split_recursive(
    text: &str,
    boundaries: &[Boundary],
    config: &ChunkingConfig,
    chunks: &mut Vec<String>,
) {
    let Some(position) = boundaries.iter().position(|b| b.occurs_in(text)) else {
        push_chunk(text, chunks);
        return;
    };
    let boundary = boundaries[position];
    let finer = boundaries.get(position + 1..).unwrap_or_default();

    let mut small_pieces: Vec<&str> = Vec::new();

    for piece in boundary.split(text) {
        if char_len(piece) < config.chunk_size {
            small_pieces.push(piece);
            continue;
        }

        if !small_pieces.is_empty() {
            merge_pieces(&small_pieces, boundary.joiner(), config, chunks);
            small_pieces.clear();
        }

        if finer.is_empty() {
            push_chunk(piece, chunks);
        } else {
            split_recursive(piece, finer, config, chunks);
        }
    }

    if !small_pieces.is_empty() {
        merge_pieces(&small_pieces, boundary.joiner(), config, chunks);
    }
}

/// Greedily pack pieces into chunks, keeping a tail window for overlap
fn merge_pieces(pieces: &[&str], joiner: &str, config: &ChunkingConfig, chunks: &mut Vec<String>) {
    let joiner_len = char_len(joiner);
    let mut window: VecDeque<(&str, usize)> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);
        let separator = if window.is_empty() { 0 } else { joiner_len };

        if total + len + separator > config.chunk_size && !window.is_empty() {
            if total > config.chunk_size {
                warn!(
                    "Created a chunk of {} characters, longer than the configured {}",
                    total, config.chunk_size
                );
            }

            push_chunk(&window.iter().map(|(p, _)| *p).join(joiner), chunks);

            // Drop pieces from the front until what's left fits as overlap
            while total > config.chunk_overlap
                || (total > 0
                    && total + len + if window.is_empty() { 0 } else { joiner_len }
                        > config.chunk_size)
            {
                let Some((_, first_len)) = window.pop_front() else {
                    break;
                };
                let separator = if window.is_empty() { 0 } else { joiner_len };
                total = total.saturating_sub(first_len + separator);
            }
        }

        window.push_back((piece, len));
        total += len + if window.len() > 1 { joiner_len } else { 0 };
    }

    if !window.is_empty() {
        push_chunk(&window.iter().map(|(p, _)| *p).join(joiner), chunks);
    }
}

fn push_chunk(text: &str, chunks: &mut Vec<String>) {
    let trimmed = text.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
