//! Text chunking for large documents

use crate::error::ChunkingError;

/// One bounded-size fragment of source content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    /// 0-based position of the chunk in the source document
    pub index: usize,
    /// The fragment text sent to the provider
    pub text: String,
}

/// Splits normalized text into bounded, ordered chunks
///
/// Splits preferentially at paragraph boundaries, then sentence boundaries,
/// and falls back to a hard cut when a single sentence exceeds the budget.
/// When an overlap is configured, the trailing portion of chunk *i* is
/// duplicated at the head of chunk *i+1* to preserve cross-boundary context.
/// The same input and configuration always produce the same chunk sequence.
pub struct TextChunker {
    max_chunk_size: usize,
    overlap: usize,
}

impl TextChunker {
    /// Create a chunker with the given size budget and overlap
    ///
    /// The overlap must be smaller than the budget; config validation
    /// enforces this before a chunker is built.
    pub fn new(max_chunk_size: usize, overlap: usize) -> Self {
        Self {
            max_chunk_size,
            overlap,
        }
    }

    /// Split the input into chunks covering it in order
    ///
    /// Every produced chunk is at most `max_chunk_size` bytes. Empty or
    /// whitespace-only input fails with [`ChunkingError::EmptyInput`].
    pub fn chunk(&self, text: &str) -> Result<Vec<Chunk>, ChunkingError> {
        if text.trim().is_empty() {
            return Err(ChunkingError::EmptyInput);
        }

        if text.len() <= self.max_chunk_size {
            return Ok(vec![Chunk {
                index: 0,
                text: text.to_string(),
            }]);
        }

        // Reserve room for the overlap prefix so finished chunks stay
        // within the budget
        let budget = self.max_chunk_size - self.overlap;

        let paragraphs: Vec<&str> = text
            .split("\n\n")
            .filter(|paragraph| !paragraph.trim().is_empty())
            .collect();
        let pieces = combine_until_limit(&paragraphs, budget);

        let mut chunks = Vec::with_capacity(pieces.len());
        for (index, piece) in pieces.iter().enumerate() {
            let text = if index == 0 || self.overlap == 0 {
                piece.clone()
            } else {
                format!("{}{}", tail(&pieces[index - 1], self.overlap), piece)
            };
            chunks.push(Chunk { index, text });
        }

        Ok(chunks)
    }
}

/// Pack paragraphs into pieces no larger than the budget
fn combine_until_limit(paragraphs: &[&str], budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for paragraph in paragraphs {
        if paragraph.len() > budget {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(split_sentences(paragraph, budget));
        } else if current.is_empty() {
            current.push_str(paragraph);
        } else if current.len() + 2 + paragraph.len() > budget {
            pieces.push(std::mem::take(&mut current));
            current.push_str(paragraph);
        } else {
            current.push_str("\n\n");
            current.push_str(paragraph);
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Split an oversized paragraph at sentence boundaries
fn split_sentences(text: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();

    for sentence in text.split_inclusive(['.', '!', '?']) {
        if sentence.len() > budget {
            if !current.is_empty() {
                pieces.push(std::mem::take(&mut current));
            }
            pieces.extend(hard_cut(sentence, budget));
        } else if current.len() + sentence.len() > budget {
            pieces.push(std::mem::take(&mut current));
            current.push_str(sentence);
        } else {
            current.push_str(sentence);
        }
    }

    if !current.is_empty() {
        pieces.push(current);
    }

    pieces
}

/// Cut text at the byte budget, respecting UTF-8 character boundaries
fn hard_cut(text: &str, budget: usize) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        if rest.len() <= budget {
            pieces.push(rest.to_string());
            break;
        }

        let mut end = budget;
        while end > 0 && !rest.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            // Budget smaller than one character; take the character anyway
            end = rest
                .char_indices()
                .nth(1)
                .map(|(i, _)| i)
                .unwrap_or(rest.len());
        }

        pieces.push(rest[..end].to_string());
        rest = &rest[end..];
    }

    pieces
}

/// The trailing `overlap` bytes of a piece, aligned to a character boundary
fn tail(text: &str, overlap: usize) -> &str {
    if text.len() <= overlap {
        return text;
    }
    let mut start = text.len() - overlap;
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_small_text_is_single_chunk() {
        let chunker = TextChunker::new(100, 0);
        let chunks = chunker.chunk("Short text here.").unwrap();
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].index, 0);
        assert_eq!(chunks[0].text, "Short text here.");
    }

    #[test]
    fn test_empty_input_fails() {
        let chunker = TextChunker::new(100, 0);
        assert_eq!(chunker.chunk("").unwrap_err(), ChunkingError::EmptyInput);
        assert_eq!(
            chunker.chunk("   \n\n  ").unwrap_err(),
            ChunkingError::EmptyInput
        );
    }

    #[test]
    fn test_splits_at_paragraphs() {
        let chunker = TextChunker::new(12, 0);
        let chunks = chunker.chunk("alpha\n\nbravo\n\ncharlie").unwrap();

        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(texts, vec!["alpha\n\nbravo", "charlie"]);
    }

    #[test]
    fn test_indices_are_ordered_and_dense() {
        let chunker = TextChunker::new(8, 0);
        let chunks = chunker.chunk("one\n\ntwo\n\nthree\n\nfour").unwrap();

        for (expected, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, expected);
        }
    }

    #[test]
    fn test_chunks_respect_budget() {
        let chunker = TextChunker::new(20, 0);
        let text = "First sentence here. Second sentence here. Third sentence here.";
        let chunks = chunker.chunk(text).unwrap();

        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 20);
        }
    }

    #[test]
    fn test_long_sentence_hard_cut() {
        let chunker = TextChunker::new(10, 0);
        let text = "a".repeat(35);
        let chunks = chunker.chunk(&text).unwrap();

        assert_eq!(chunks.len(), 4);
        for chunk in &chunks {
            assert!(chunk.text.len() <= 10);
        }
        let rejoined: String = chunks.iter().map(|c| c.text.as_str()).collect();
        assert_eq!(rejoined, text);
    }

    #[test]
    fn test_hard_cut_respects_utf8_boundaries() {
        let chunker = TextChunker::new(7, 0);
        let text = "héllo wörld ünïcode tëxt hére ällo";
        let chunks = chunker.chunk(text).unwrap();

        for chunk in &chunks {
            assert!(chunk.text.len() <= 7);
            assert!(!chunk.text.is_empty());
        }
    }

    #[test]
    fn test_overlap_duplicates_tail() {
        let chunker = TextChunker::new(12, 3);
        let chunks = chunker.chunk("alphabet\n\nbravado\n\ncharlie!").unwrap();

        assert!(chunks.len() > 1);
        for window in chunks.windows(2) {
            let prev = &window[0];
            let next = &window[1];
            assert!(prev.text.len() <= 12);
            assert!(next.text.len() <= 12);
            // The head of each later chunk repeats the previous tail
            let shared = &next.text[..3.min(next.text.len())];
            assert!(prev.text.ends_with(shared) || prev.text.len() < 3);
        }
    }

    #[test]
    fn test_deterministic() {
        let chunker = TextChunker::new(15, 4);
        let text = "Some document.\n\nWith paragraphs. And sentences. For splitting.";
        assert_eq!(chunker.chunk(text).unwrap(), chunker.chunk(text).unwrap());
    }

    #[test]
    fn test_section_like_document() {
        let chunker = TextChunker::new(60, 0);
        let text = "# Introduction\n\nThis covers the basics of the system.\n\n# Details\n\nMore in-depth material lives here. It spans sentences.";
        let chunks = chunker.chunk(text).unwrap();

        assert!(chunks.len() >= 2);
        assert!(chunks[0].text.contains("Introduction"));
    }
}
