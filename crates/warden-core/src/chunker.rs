//! Fixed-size overlapping text chunks for the offline rule indexer.
//!
//! Chunks are 1000 characters with a 200-character overlap so rule context
//! is not lost at cut points; each chunk is tagged with its source filename
//! for citation.

use serde_json::json;

use crate::rule_store::RuleDocument;

pub const CHUNK_SIZE: usize = 1000;
pub const CHUNK_OVERLAP: usize = 200;

/// Splits `text` into chunks of at most `chunk_size` characters, each
/// starting `chunk_size - overlap` characters after the previous one.
/// Operates on characters, not bytes, so multibyte text never splits inside
/// a code point.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    assert!(chunk_size > overlap, "chunk size must exceed overlap");
    let chars: Vec<char> = text.chars().collect();
    if chars.is_empty() {
        return Vec::new();
    }

    let step = chunk_size - overlap;
    let mut chunks = Vec::new();
    let mut start = 0;
    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        chunks.push(chars[start..end].iter().collect());
        if end == chars.len() {
            break;
        }
        start += step;
    }
    chunks
}

/// Chunk one document with the standard size/overlap and tag every chunk
/// with its source filename.
pub fn chunk_document(text: &str, source: &str) -> Vec<RuleDocument> {
    split_text(text, CHUNK_SIZE, CHUNK_OVERLAP)
        .into_iter()
        .map(|content| RuleDocument {
            content,
            metadata: json!({ "source": source }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_text_is_one_chunk() {
        let chunks = split_text("small rule set", 1000, 200);
        assert_eq!(chunks, vec!["small rule set".to_string()]);
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        assert!(split_text("", 1000, 200).is_empty());
    }

    #[test]
    fn chunks_overlap_and_cover_the_source() {
        let text: String = ('a'..='z').cycle().take(2500).collect();
        let chunks = split_text(&text, 1000, 200);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].chars().count(), 1000);
        assert_eq!(chunks[1].chars().count(), 1000);
        // Consecutive chunks share the 200-char boundary region.
        let tail: String = chunks[0].chars().skip(800).collect();
        let head: String = chunks[1].chars().take(200).collect();
        assert_eq!(tail, head);
        // Reassembling without the overlaps reproduces the source.
        let mut rebuilt: String = chunks[0].clone();
        for chunk in &chunks[1..] {
            rebuilt.extend(chunk.chars().skip(200));
        }
        assert_eq!(rebuilt, text);
    }

    #[test]
    fn multibyte_text_splits_on_char_boundaries() {
        let text: String = "日本語テキスト".chars().cycle().take(1500).collect();
        let chunks = split_text(&text, 1000, 200);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].chars().count(), 1000);
    }

    #[test]
    fn chunk_document_tags_source() {
        let docs = chunk_document("no absolute claims", "fda_rules.pdf");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].metadata["source"], "fda_rules.pdf");
    }
}
