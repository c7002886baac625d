//! Text normalization and overlapping chunk segmentation.
//!
//! Documents are normalized (whitespace runs collapsed to single spaces,
//! leading/trailing whitespace trimmed) and then split into segments of at
//! most `chunk_size` characters. When a window does not already reach the end
//! of the text, the cut prefers the last sentence terminator or newline found
//! past the midpoint of the window, so chunks tend to end on sentence
//! boundaries instead of mid-word. Adjacent chunks share up to
//! `chunk_overlap` characters so context survives a cut.

use super::types::ChunkingError;

/// Collapse whitespace runs to single spaces and trim the ends.
pub(crate) fn normalize(text: &str) -> String {
    let mut normalized = String::with_capacity(text.len());
    for word in text.split_whitespace() {
        if !normalized.is_empty() {
            normalized.push(' ');
        }
        normalized.push_str(word);
    }
    normalized
}

/// Split `text` into overlapping chunks of at most `size` characters.
///
/// Preconditions: `size > 0` and `overlap < size`. The input is normalized
/// first; all-whitespace input yields an empty vector. Text that fits inside
/// a single window comes back as one chunk equal to the whole trimmed text.
/// Chunks that are empty after trimming are discarded.
pub(crate) fn chunk_text(
    text: &str,
    size: usize,
    overlap: usize,
) -> Result<Vec<String>, ChunkingError> {
    if size == 0 {
        return Err(ChunkingError::InvalidChunkSize);
    }
    if overlap >= size {
        return Err(ChunkingError::InvalidOverlap { overlap, size });
    }

    let normalized = normalize(text);
    if normalized.is_empty() {
        return Ok(Vec::new());
    }

    // Windows are measured in characters, not bytes, so multi-byte input
    // never lands a cut inside a code point.
    let chars: Vec<char> = normalized.chars().collect();
    let mut chunks = Vec::new();
    let mut start = 0_usize;

    while start < chars.len() {
        let end = (start + size).min(chars.len());
        let mut cut = end;
        let next_start;

        if end < chars.len() {
            let window = &chars[start..end];
            match window.iter().rposition(|&c| c == '.' || c == '\n') {
                Some(offset) if offset > window.len() / 2 => {
                    cut = start + offset + 1;
                    next_start = cut.saturating_sub(overlap);
                }
                _ => {
                    next_start = end - overlap;
                }
            }
        } else {
            next_start = end;
        }

        let piece: String = chars[start..cut].iter().collect();
        let trimmed = piece.trim();
        if !trimmed.is_empty() {
            chunks.push(trimmed.to_string());
        }

        // The cursor must advance even when the overlap swallows the cut,
        // or large overlaps on short boundaries would never terminate.
        start = next_start.max(start + 1);
    }

    Ok(chunks)
}
