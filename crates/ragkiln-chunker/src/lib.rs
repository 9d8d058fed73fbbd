//! Hierarchical 3-level chunking: document / section / proposition
//!.
//!
//! The document level is the caller's concern (it is only ever used as the
//! embedding-template input, never chunked itself). This crate produces the
//! section grouping internally and flattens it into the position-ordered
//! proposition-level `ChunkDraft`s that are the only level persisted.

use serde::{Deserialize, Serialize};

mod sections;
mod tokens;

pub use tokens::estimate_tokens;

/// A chunk before it has an id, document id, position, or embedding
/// assigned — those are filled in by `DocumentCreator`/`DocumentMerger`
/// once the chunk's target document is known and its embedding has been
/// computed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkDraft {
    pub content: String,
    pub token_count: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct ChunkerConfig {
    pub max_tokens: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self { max_tokens: 400 }
    }
}

/// Splits `content` into ordered, position-stable proposition-level chunks.
///
/// An empty or whitespace-only document yields no chunks; callers that
/// require `len(chunks) >= 1` after creation must treat
/// that as a validation failure before calling the chunker, not as a
/// chunker bug.
pub fn chunk_document(content: &str, config: &ChunkerConfig) -> Vec<ChunkDraft> {
    let mut drafts = Vec::new();
    for section in sections::split_sections(content) {
        for proposition in split_propositions(&section, config.max_tokens) {
            if proposition.trim().is_empty() {
                continue;
            }
            let token_count = estimate_tokens(&proposition);
            drafts.push(ChunkDraft {
                content: proposition,
                token_count: token_count as u32,
            });
        }
    }
    drafts
}

/// Splits one section into paragraph-sized propositions, then greedily
/// re-packs any paragraph exceeding `max_tokens` along sentence boundaries.
fn split_propositions(section: &str, max_tokens: usize) -> Vec<String> {
    let mut out = Vec::new();
    for paragraph in section.split("\n\n") {
        let paragraph = paragraph.trim();
        if paragraph.is_empty() {
            continue;
        }
        if estimate_tokens(paragraph) <= max_tokens {
            out.push(paragraph.to_string());
            continue;
        }
        out.extend(pack_sentences(paragraph, max_tokens));
    }
    out
}

/// Greedily packs sentences (split on `. `, `! `, `? `) back up to
/// `max_tokens` per chunk, never splitting a sentence itself.
fn pack_sentences(paragraph: &str, max_tokens: usize) -> Vec<String> {
    let sentences = split_sentences(paragraph);
    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_tokens = 0usize;

    for sentence in sentences {
        let sentence_tokens = estimate_tokens(&sentence);
        if !current.is_empty() && current_tokens + sentence_tokens > max_tokens {
            out.push(std::mem::take(&mut current));
            current_tokens = 0;
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&sentence);
        current_tokens += sentence_tokens;
    }
    if !current.is_empty() {
        out.push(current);
    }
    out
}

fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        if (c == b'.' || c == b'!' || c == b'?') && i + 1 < bytes.len() && bytes[i + 1] == b' ' {
            sentences.push(text[start..=i].trim().to_string());
            start = i + 1;
        }
        i += 1;
    }
    let tail = text[start..].trim();
    if !tail.is_empty() {
        sentences.push(tail.to_string());
    }
    sentences.into_iter().filter(|s| !s.is_empty()).collect()
}
