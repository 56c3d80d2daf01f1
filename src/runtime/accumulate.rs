//! Folding streamed chunks into the reply text

use crate::llm::Chunk;

/// Trim a fragment and turn each newline into a single space
pub fn normalize_fragment(text: &str) -> String {
    text.trim().replace('\n', " ")
}

/// Accumulates normalized chunk text in arrival order
#[derive(Debug, Default)]
pub struct Accumulator {
    text: String,
}

impl Accumulator {
    /// Add a chunk. Returns false for chunks that carry no text.
    pub fn push(&mut self, chunk: &Chunk) -> bool {
        match &chunk.text {
            Some(text) => {
                self.text.push_str(&normalize_fragment(text));
                true
            }
            None => false,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

/// Accumulate a complete chunk sequence
#[cfg(test)]
pub fn accumulate<'a>(chunks: impl IntoIterator<Item = &'a Chunk>) -> String {
    let mut acc = Accumulator::default();
    for chunk in chunks {
        acc.push(chunk);
    }
    acc.into_text()
}
