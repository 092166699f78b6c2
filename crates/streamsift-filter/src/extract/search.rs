//! Search-query bookkeeping

/// Tracks which search query is being written
///
/// Separators between queries are often repeated or trail the last query,
/// so the index only advances once the current query produced text.
#[derive(Debug, Clone, Default)]
pub struct SearchQueryTracker {
    index: usize,
    has_text: bool,
}

impl SearchQueryTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index of the query currently receiving text
    pub fn index(&self) -> usize {
        self.index
    }

    /// Record that the current query received text
    pub fn note_text(&mut self) {
        self.has_text = true;
    }

    /// Move on to the next query
    pub fn next(&mut self) {
        if self.has_text {
            self.index += 1;
            self.has_text = false;
        }
    }
}
