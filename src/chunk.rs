//! Deterministic text chunker.
//!
//! Splits a [`Document`]'s content into retrieval units under a character
//! budget, carrying a configurable tail overlap across boundaries for
//! continuity. Splitting backs off to the last whitespace inside the window
//! so words are never cut when avoidable.
//!
//! The same content with the same policy always yields the same chunk
//! boundaries, and chunk ids are `<document_id>:<index>`, so change
//! detection stays meaningful across syncs.

use crate::models::{Chunk, Document};

/// Split a document's content into ordered chunks.
///
/// Content at or under `max_chars` yields exactly one chunk.
pub fn chunk_document(doc: &Document, max_chars: usize, overlap_chars: usize) -> Vec<Chunk> {
    split_text(&doc.content, max_chars, overlap_chars)
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            id: format!("{}:{}", doc.id, index),
            document_id: doc.id.clone(),
            index,
            text,
            metadata: doc.metadata.clone(),
        })
        .collect()
}

/// Split text into windows of at most `max_chars` characters, preferring
/// whitespace boundaries, with `overlap` characters carried between
/// adjacent windows. Always returns at least one piece.
fn split_text(text: &str, max_chars: usize, overlap: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let overlap = overlap.min(max_chars / 2);

    let trimmed = text.trim();
    let chars: Vec<char> = trimmed.chars().collect();
    if chars.len() <= max_chars {
        return vec![trimmed.to_string()];
    }

    let mut pieces = Vec::new();
    let mut start = 0usize;

    while start < chars.len() {
        let window_end = (start + max_chars).min(chars.len());

        let cut = if window_end < chars.len() {
            // Back off to the last whitespace in the window; hard cut when
            // a single run of text fills the whole window.
            match chars[start..window_end].iter().rposition(|c| c.is_whitespace()) {
                Some(pos) if pos > 0 => start + pos,
                _ => window_end,
            }
        } else {
            window_end
        };

        let piece: String = chars[start..cut].iter().collect();
        let piece = piece.trim();
        if !piece.is_empty() {
            pieces.push(piece.to_string());
        }

        if cut >= chars.len() {
            break;
        }

        // Carry the tail of this window into the next, but always advance.
        let next = cut.saturating_sub(overlap);
        start = if next > start { next } else { cut };
        while start < chars.len() && chars[start].is_whitespace() {
            start += 1;
        }
    }

    if pieces.is_empty() {
        pieces.push(trimmed.to_string());
    }

    pieces
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RowMeta;

    fn doc(content: &str) -> Document {
        Document {
            id: "doc1".to_string(),
            content: content.to_string(),
            content_hash: String::new(),
            metadata: RowMeta {
                row_number: 2,
                question: "Q".to_string(),
                answer: "A".to_string(),
                ..RowMeta::default()
            },
        }
    }

    #[test]
    fn test_short_content_single_chunk() {
        let chunks = chunk_document(&doc("Question: Q\nAnswer: A"), 2000, 200);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].id, "doc1:0");
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Question: Q\nAnswer: A");
    }

    #[test]
    fn test_deterministic() {
        let content = (0..40)
            .map(|i| format!("sentence number {} about refunds", i))
            .collect::<Vec<_>>()
            .join(". ");
        let a = chunk_document(&doc(&content), 120, 20);
        let b = chunk_document(&doc(&content), 120, 20);
        assert_eq!(a.len(), b.len());
        for (x, y) in a.iter().zip(b.iter()) {
            assert_eq!(x.id, y.id);
            assert_eq!(x.text, y.text);
        }
    }

    #[test]
    fn test_ids_are_contiguous() {
        let content = "word ".repeat(500);
        let chunks = chunk_document(&doc(&content), 100, 10);
        assert!(chunks.len() > 1);
        for (i, c) in chunks.iter().enumerate() {
            assert_eq!(c.index, i);
            assert_eq!(c.id, format!("doc1:{}", i));
        }
    }

    #[test]
    fn test_no_mid_word_split() {
        let content = "alpha beta gamma delta epsilon zeta eta theta".repeat(8);
        let chunks = chunk_document(&doc(&content), 50, 0);
        let words = [
            "alpha", "beta", "gamma", "delta", "epsilon", "zeta", "eta", "theta",
        ];
        for c in &chunks {
            for piece in c.text.split_whitespace() {
                // Every whitespace-delimited piece is a full word, possibly
                // two fused where the repeat removed the separator.
                assert!(
                    words.iter().any(|w| piece == *w)
                        || words
                            .iter()
                            .any(|a| words.iter().any(|b| piece == format!("{}{}", a, b))),
                    "split mid-word: {:?}",
                    piece
                );
            }
        }
    }

    #[test]
    fn test_overlap_carries_tail_forward() {
        let content = (0..30)
            .map(|i| format!("w{}", i))
            .collect::<Vec<_>>()
            .join(" ");
        let chunks = chunk_document(&doc(&content), 40, 10);
        assert!(chunks.len() > 1);
        for pair in chunks.windows(2) {
            let tail_word = pair[0].text.split_whitespace().last().unwrap();
            assert!(
                pair[1].text.contains(tail_word),
                "chunk {:?} lost overlap with {:?}",
                pair[1].text,
                pair[0].text
            );
        }
    }

    #[test]
    fn test_multibyte_content_is_safe() {
        // CJK content has no spaces to back off to — hard cuts must land on
        // character boundaries.
        let content = "П課程的退費規則是什麼呢".repeat(30);
        let chunks = chunk_document(&doc(&content), 50, 5);
        assert!(chunks.len() > 1);
        let total: usize = chunks.iter().map(|c| c.text.chars().count()).sum();
        assert!(total >= content.chars().count());
    }

    #[test]
    fn test_metadata_copied_to_every_chunk() {
        let content = "word ".repeat(200);
        let chunks = chunk_document(&doc(&content), 100, 10);
        for c in &chunks {
            assert_eq!(c.metadata.row_number, 2);
            assert_eq!(c.document_id, "doc1");
        }
    }
}
