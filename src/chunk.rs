//! Sentence-aware overlapping text chunker.
//!
//! Windows of at most `chunk_size` characters are cut backward to the last
//! sentence terminator (`". "`, `"? "`, `"! "`, tried in that order), else
//! the last space, else the raw window end. Consecutive chunks share
//! `overlap` characters. Sizes count Unicode scalar values, never bytes, so
//! multi-byte scripts are never split mid-character.

use std::ops::Range;

/// Sentence terminators in priority order.
const TERMINATORS: [&str; 3] = [". ", "? ", "! "];

/// Split `text` into overlapping chunks. Empty input yields no chunks.
pub fn chunk_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    chunk_spans(text, chunk_size, overlap)
        .into_iter()
        .map(|span| text[span].to_string())
        .collect()
}

/// Byte ranges of the chunks [`chunk_text`] would return.
pub fn chunk_spans(text: &str, chunk_size: usize, overlap: usize) -> Vec<Range<usize>> {
    if text.is_empty() || chunk_size == 0 {
        return Vec::new();
    }

    // Byte offset of every char boundary, including the end of the text.
    let offsets: Vec<usize> = text
        .char_indices()
        .map(|(i, _)| i)
        .chain(std::iter::once(text.len()))
        .collect();
    let total = offsets.len() - 1;

    let mut spans = Vec::new();
    let mut start = 0usize;

    loop {
        let end = (start + chunk_size).min(total);
        if end == total {
            spans.push(offsets[start]..text.len());
            break;
        }

        let window = &text[offsets[start]..offsets[end]];
        let cut = match cut_in_window(window) {
            Some(byte) => offsets.partition_point(|&o| o < offsets[start] + byte),
            None => end,
        };
        spans.push(offsets[start]..offsets[cut]);

        let next = cut.saturating_sub(overlap);
        start = if next > start { next } else { cut };
    }

    spans
}

/// Byte position just after the preferred break inside `window`, if any.
fn cut_in_window(window: &str) -> Option<usize> {
    TERMINATORS
        .iter()
        .find_map(|t| window.rfind(t).map(|pos| pos + t.len()))
        .or_else(|| window.rfind(' ').map(|pos| pos + 1))
}
