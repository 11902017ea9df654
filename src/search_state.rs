//! Search box state: raw keystrokes, the committed term, and the list it selects.

use crate::{collection::MediaEntry, media_filter::filter_items};

/// Projection of a committed search term over the current source list.
///
/// `filtered` is only ever recomputed from `committed_term` and `source`.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    raw_term: String,
    committed_term: String,
    source: Vec<MediaEntry>,
    filtered: Vec<MediaEntry>,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the latest keystroke value. Does not touch the results.
    pub fn set_raw_term(&mut self, term: impl Into<String>) {
        self.raw_term = term.into();
    }

    /// Applies a term that survived the debounce window or was submitted
    /// directly. Returns whether the committed term changed.
    pub fn commit(&mut self, term: impl Into<String>) -> bool {
        let term = term.into();
        if term == self.committed_term {
            return false;
        }
        self.committed_term = term;
        self.recompute();
        true
    }

    /// Replaces the source list (a new fetch result) and re-applies the
    /// committed term.
    pub fn set_source(&mut self, source: Vec<MediaEntry>) {
        self.source = source;
        self.recompute();
    }

    pub fn raw_term(&self) -> &str {
        &self.raw_term
    }

    pub fn committed_term(&self) -> &str {
        &self.committed_term
    }

    pub fn source(&self) -> &[MediaEntry] {
        &self.source
    }

    pub fn filtered(&self) -> &[MediaEntry] {
        &self.filtered
    }

    /// The unfiltered list is paginated; search results are shown in full.
    pub fn pagination_enabled(&self) -> bool {
        self.committed_term.is_empty()
    }

    fn recompute(&mut self) {
        self.filtered = filter_items(&self.source, &self.committed_term);
    }
}
