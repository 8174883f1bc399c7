//! Paragraph-boundary text chunker for free-text documents.
//!
//! Splits a document body into pieces that respect a configurable
//! `max_tokens` budget. Splitting occurs on paragraph boundaries (`\n\n`)
//! to keep each piece semantically coherent; a single oversized paragraph
//! is hard-split at the nearest newline or space boundary.

/// Approximate chars-per-token ratio.
const CHARS_PER_TOKEN: usize = 4;

/// Split text into chunk strings on paragraph boundaries, respecting
/// `max_tokens`. Whitespace-only input yields no chunks.
pub fn chunk_text(text: &str, max_tokens: usize) -> Vec<String> {
    let max_chars = max_tokens * CHARS_PER_TOKEN;
    let mut chunks = Vec::new();
    let mut current = String::new();

    for para in text.split("\n\n") {
        let trimmed = para.trim();
        if trimmed.is_empty() {
            continue;
        }

        // Flush the buffer if adding this paragraph would exceed the budget.
        let would_be = if current.is_empty() {
            trimmed.len()
        } else {
            current.len() + 2 + trimmed.len()
        };
        if would_be > max_chars && !current.is_empty() {
            chunks.push(std::mem::take(&mut current));
        }

        if trimmed.len() > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            hard_split(trimmed, max_chars, &mut chunks);
        } else {
            if !current.is_empty() {
                current.push_str("\n\n");
            }
            current.push_str(trimmed);
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Split an oversized paragraph at `max_chars` boundaries, preferring a
/// newline or space break near the limit.
fn hard_split(paragraph: &str, max_chars: usize, chunks: &mut Vec<String>) {
    let mut remaining = paragraph;
    while !remaining.is_empty() {
        let split_at = floor_char_boundary(remaining, remaining.len().min(max_chars));
        let actual_split = if split_at < remaining.len() {
            remaining[..split_at]
                .rfind('\n')
                .or_else(|| remaining[..split_at].rfind(' '))
                .map(|pos| pos + 1)
                .unwrap_or(split_at)
        } else {
            split_at
        };
        if actual_split == 0 {
            break;
        }
        let piece = remaining[..actual_split].trim();
        if !piece.is_empty() {
            chunks.push(piece.to_string());
        }
        remaining = &remaining[actual_split..];
    }
}

/// Largest char boundary at or below `index`.
fn floor_char_boundary(s: &str, mut index: usize) -> usize {
    while index > 0 && !s.is_char_boundary(index) {
        index -= 1;
    }
    index
}
