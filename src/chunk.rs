//! Fixed-width text chunking.
//!
//! Each page is cut into windows of `chunk_size` characters that advance by
//! `chunk_size - chunk_overlap`, so neighbouring chunks of a page share exactly
//! `chunk_overlap` characters. Windows never span pages and ignore sentence or
//! paragraph boundaries.

use crate::document::Page;
use crate::error::{RagError, Result};
use bincode::{Decode, Encode};
use serde::{Deserialize, Serialize};

/// Configuration for text chunking (both values in characters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// Maximum characters per chunk.
    pub chunk_size: usize,
    /// Characters shared between consecutive chunks of a page.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 512,
            chunk_overlap: 50,
        }
    }
}

impl ChunkConfig {
    /// Reject configurations that would never advance through the text.
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::InvalidConfig(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::InvalidConfig(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    fn step(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

/// A window of page text with its provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Encode, Decode)]
pub struct Chunk {
    /// Position of the chunk in the full chunk sequence.
    pub index: usize,
    /// File name of the source document.
    pub source: String,
    /// 1-indexed page the chunk was cut from.
    pub page: u32,
    /// Character offset of the chunk within its page.
    pub start_char: usize,
    /// Chunk text content.
    pub text: String,
}

/// Split pages into overlapping fixed-size chunks.
pub fn split_pages(pages: &[Page], config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;

    let mut chunks = Vec::new();
    for page in pages {
        if page.content.trim().is_empty() {
            continue;
        }

        for (start_char, text) in windows(&page.content, config) {
            chunks.push(Chunk {
                index: chunks.len(),
                source: page.source.clone(),
                page: page.number,
                start_char,
                text,
            });
        }
    }

    Ok(chunks)
}

/// Cut one text into `(start_char, window)` pairs. `config` must be valid.
fn windows(text: &str, config: &ChunkConfig) -> Vec<(usize, String)> {
    let chars: Vec<char> = text.chars().collect();
    let mut out = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + config.chunk_size).min(chars.len());
        out.push((start, chars[start..end].iter().collect()));

        if end == chars.len() {
            break;
        }
        start += config.step();
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(chunk_size: usize, chunk_overlap: usize) -> ChunkConfig {
        ChunkConfig {
            chunk_size,
            chunk_overlap,
        }
    }

    fn page(number: u32, content: &str) -> Page {
        Page::new("handbook.pdf", number, content)
    }

    #[test]
    fn test_chunk_config_default() {
        let config = ChunkConfig::default();
        assert_eq!(config.chunk_size, 512);
        assert_eq!(config.chunk_overlap, 50);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overlap_must_be_smaller_than_size() {
        assert!(config(10, 10).validate().is_err());
        assert!(config(10, 11).validate().is_err());
        assert!(config(0, 0).validate().is_err());
        assert!(split_pages(&[page(1, "abc")], &config(4, 4)).is_err());
    }

    #[test]
    fn test_fixed_windows() {
        let chunks = split_pages(&[page(1, "abcdefghij")], &config(4, 1)).unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcd", "defg", "ghij"]);
        let starts: Vec<_> = chunks.iter().map(|c| c.start_char).collect();
        assert_eq!(starts, vec![0, 3, 6]);
    }

    #[test]
    fn test_final_chunk_may_be_shorter() {
        let chunks = split_pages(&[page(1, "abcdefgh")], &config(5, 2)).unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcde", "defgh"]);

        let chunks = split_pages(&[page(1, "abcdefghi")], &config(5, 2)).unwrap();
        let texts: Vec<_> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["abcde", "defgh", "ghi"]);
    }

    #[test]
    fn test_overlap_invariant() {
        let text = "Employees receive 20 vacation days annually. Requests must be \
                    approved by a manager two weeks in advance. Unused days expire \
                    at the end of March of the following year.";
        let cfg = config(40, 7);
        let chunks = split_pages(&[page(1, text)], &cfg).unwrap();
        assert!(chunks.len() > 2);

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            let tail = &prev[prev.len() - cfg.chunk_overlap..];
            let head = &next[..cfg.chunk_overlap];
            assert_eq!(tail, head);
        }
    }

    #[test]
    fn test_chunking_is_deterministic() {
        let pages = vec![page(1, "lorem ipsum dolor sit amet ".repeat(20).as_str()), page(2, "second page")];
        let first = split_pages(&pages, &config(64, 16)).unwrap();
        let second = split_pages(&pages, &config(64, 16)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_chunks_do_not_span_pages() {
        let pages = vec![page(1, "aaaaaa"), page(2, "bbbbbb")];
        let chunks = split_pages(&pages, &config(4, 1)).unwrap();

        for chunk in &chunks {
            let expected = if chunk.page == 1 { 'a' } else { 'b' };
            assert!(chunk.text.chars().all(|c| c == expected));
        }
        let indices: Vec<_> = chunks.iter().map(|c| c.index).collect();
        assert_eq!(indices, (0..chunks.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_multibyte_text_is_split_on_chars() {
        let chunks = split_pages(&[page(1, "añoñoñoñ")], &config(3, 1)).unwrap();
        assert!(chunks.iter().all(|c| c.text.chars().count() <= 3));
        assert_eq!(chunks[0].text, "año");
    }

    #[test]
    fn test_blank_pages_produce_no_chunks() {
        let chunks = split_pages(&[page(1, "   \n  ")], &config(4, 1)).unwrap();
        assert!(chunks.is_empty());
    }
}
