//! Fixed-size word windows with overlap.

use crate::error::{Error, Result};

pub const DEFAULT_CHUNK_SIZE: usize = 500;
pub const DEFAULT_OVERLAP: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self { chunk_size: DEFAULT_CHUNK_SIZE, overlap: DEFAULT_OVERLAP }
    }
}

impl Chunker {
    /// Sizes are counted in whitespace-separated words. `overlap` must be
    /// strictly smaller than `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(Error::InvalidConfig("chunk_size must be greater than zero".into()));
        }
        if overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "overlap ({overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    pub fn chunk_size(&self) -> usize { self.chunk_size }
    pub fn overlap(&self) -> usize { self.overlap }
    fn step(&self) -> usize { self.chunk_size - self.overlap }

    /// Windows start every `chunk_size - overlap` words and run until the
    /// start passes the end of the text. The last window may consist only
    /// of words already covered by its predecessor.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        let words: Vec<&str> = text.split_whitespace().collect();
        let mut chunks = Vec::with_capacity(words.len().div_ceil(self.step()));
        for start in (0..words.len()).step_by(self.step()) {
            let end = (start + self.chunk_size).min(words.len());
            let chunk = words[start..end].join(" ");
            if !chunk.trim().is_empty() { chunks.push(chunk); }
        }
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(n: usize) -> String {
        (0..n).map(|i| format!("w{i}")).collect::<Vec<_>>().join(" ")
    }

    #[test]
    fn empty_text_has_no_chunks() {
        let c = Chunker::default();
        assert!(c.chunk("").is_empty());
        assert!(c.chunk("   \n\t ").is_empty());
    }

    #[test]
    fn short_text_is_one_chunk() {
        let c = Chunker::default();
        assert_eq!(c.chunk("hello   world\nagain"), vec!["hello world again".to_string()]);
    }

    #[test]
    fn twelve_hundred_words_make_three_chunks() {
        let c = Chunker::default();
        let chunks = c.chunk(&words(1200));
        assert_eq!(chunks.len(), 3);
        let first: Vec<&str> = chunks[0].split(' ').collect();
        let second: Vec<&str> = chunks[1].split(' ').collect();
        let third: Vec<&str> = chunks[2].split(' ').collect();
        assert_eq!(first.len(), 500);
        assert_eq!((first[0], first[499]), ("w0", "w499"));
        assert_eq!((second[0], second[499]), ("w450", "w949"));
        assert_eq!((third[0], third.len()), ("w900", 300));
    }

    #[test]
    fn tail_window_of_overlap_words_is_kept() {
        let c = Chunker::new(10, 5).unwrap();
        let chunks = c.chunk(&words(10));
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[1], "w5 w6 w7 w8 w9");
    }

    #[test]
    fn count_matches_ceiling_of_words_over_step() {
        let c = Chunker::new(7, 3).unwrap();
        for n in 1..40 {
            assert_eq!(c.chunk(&words(n)).len(), n.div_ceil(4), "n={n}");
        }
    }

    #[test]
    fn rejects_overlap_not_smaller_than_size() {
        assert!(matches!(Chunker::new(50, 50), Err(Error::InvalidConfig(_))));
        assert!(matches!(Chunker::new(50, 80), Err(Error::InvalidConfig(_))));
        assert!(matches!(Chunker::new(0, 0), Err(Error::InvalidConfig(_))));
    }
}
