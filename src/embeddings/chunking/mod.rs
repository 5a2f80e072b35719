#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::loader::{Page, PageMetadata};

/// Represents a chunk of page text ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChunk {
    /// The chunk text, trimmed of surrounding whitespace
    pub content: String,
    /// Source path and page number inherited from the page
    pub metadata: PageMetadata,
    /// Position of this chunk within the whole document
    pub chunk_index: usize,
}

/// Configuration for content chunking. Sizes are measured in characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Maximum chunk length
    pub chunk_size: usize,
    /// Trailing characters of one chunk repeated at the start of the next
    pub chunk_overlap: usize,
    /// Separators tried in order; an empty string means a hard cut
    pub separators: Vec<String>,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 80,
            separators: vec![
                "\n\n".to_string(),
                "\n".to_string(),
                " ".to_string(),
                String::new(),
            ],
        }
    }
}

/// Split every page into chunks. Chunks never span pages.
#[inline]
pub fn chunk_pages(pages: &[Page], config: &ChunkingConfig) -> Vec<ContentChunk> {
    let mut chunks = Vec::new();

    for page in pages {
        for content in split_text(&page.text, config) {
            chunks.push(ContentChunk {
                content,
                metadata: page.metadata.clone(),
                chunk_index: chunks.len(),
            });
        }
    }

    debug!(
        "Chunked {} pages into {} chunks (avg {} chars)",
        pages.len(),
        chunks.len(),
        chunks.iter().map(|c| char_len(&c.content)).sum::<usize>() / chunks.len().max(1)
    );

    chunks
}

/// Split text into chunks of at most `chunk_size` characters, preferring the
/// earliest separator in the list that occurs in the text.
#[inline]
pub fn split_text(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    split_recursive(text, &config.separators, config)
}

fn split_recursive(text: &str, separators: &[String], config: &ChunkingConfig) -> Vec<String> {
    let (separator, remaining) = select_separator(text, separators);

    let mut chunks = Vec::new();
    let mut fitting: Vec<&str> = Vec::new();

    for piece in split_keeping_separator(text, separator) {
        if char_len(piece) < config.chunk_size {
            fitting.push(piece);
            continue;
        }

        if !fitting.is_empty() {
            chunks.extend(merge_splits(&fitting, config));
            fitting.clear();
        }

        if !remaining.is_empty() {
            chunks.extend(split_recursive(piece, remaining, config));
        } else if !separator.is_empty() {
            // Out of separators: cut the piece per character
            chunks.extend(split_recursive(piece, &[String::new()], config));
        } else {
            let trimmed = piece.trim();
            if !trimmed.is_empty() {
                chunks.push(trimmed.to_string());
            }
        }
    }

    if !fitting.is_empty() {
        chunks.extend(merge_splits(&fitting, config));
    }

    chunks
}

fn select_separator<'a>(text: &str, separators: &'a [String]) -> (&'a str, &'a [String]) {
    for (i, separator) in separators.iter().enumerate() {
        if separator.is_empty() || text.contains(separator.as_str()) {
            return (separator.as_str(), &separators[i + 1..]);
        }
    }
    ("", &[])
}

/// Split on `separator`, attaching each separator to the start of the piece
/// that follows it. An empty separator splits into single characters.
fn split_keeping_separator<'t>(text: &'t str, separator: &str) -> Vec<&'t str> {
    if separator.is_empty() {
        return text
            .char_indices()
            .map(|(i, c)| &text[i..i + c.len_utf8()])
            .collect();
    }

    let mut pieces = Vec::new();
    let mut start = 0;
    for (idx, _) in text.match_indices(separator) {
        pieces.push(&text[start..idx]);
        start = idx;
    }
    pieces.push(&text[start..]);
    pieces.retain(|piece| !piece.is_empty());
    pieces
}

/// Greedily join pieces into chunks, carrying up to `chunk_overlap`
/// characters of trailing pieces into the next chunk.
fn merge_splits(pieces: &[&str], config: &ChunkingConfig) -> Vec<String> {
    let mut docs = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0;

    for &piece in pieces {
        let len = char_len(piece);

        if total + len > config.chunk_size {
            if total > config.chunk_size {
                warn!(
                    "Created a chunk of {} characters, longer than the limit of {}",
                    total, config.chunk_size
                );
            }

            if !current.is_empty() {
                push_joined(&current, &mut docs);

                while total > config.chunk_overlap
                    || (total + len > config.chunk_size && total > 0)
                {
                    let Some(front) = current.pop_front() else {
                        break;
                    };
                    total -= char_len(front);
                }
            }
        }

        current.push_back(piece);
        total += len;
    }

    push_joined(&current, &mut docs);
    docs
}

fn push_joined(pieces: &VecDeque<&str>, docs: &mut Vec<String>) {
    let joined: String = pieces.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

#[inline]
fn char_len(text: &str) -> usize {
    text.chars().count()
}
