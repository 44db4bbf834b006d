//! Catalog view model: the (possibly filtered) track list and its paging.
//!
//! The view is plain data.  The TUI wraps it in a lock and shares it between
//! the app loop and the playback controller.

use crate::protocol::Track;

pub const DEFAULT_PAGE_SIZE: usize = 500;

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogView {
    tracks: Vec<Track>,
    page_size: usize,
    /// 1-based.
    current_page: usize,
}

/// Result of applying a search query to the view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    /// The view now holds `matches` tracks.
    Replaced { matches: usize },
    /// Nothing matched; the view is untouched.
    NoResults,
}

impl CatalogView {
    /// A zero page size is bumped to 1 so paging math never divides by zero.
    pub fn new(page_size: usize) -> Self {
        Self {
            tracks: Vec::new(),
            page_size: page_size.max(1),
            current_page: 1,
        }
    }

    pub fn with_tracks(page_size: usize, tracks: Vec<Track>) -> Self {
        let mut view = Self::new(page_size);
        view.tracks = tracks;
        view
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn get(&self, index: usize) -> Option<&Track> {
        self.tracks.get(index)
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn total_pages(&self) -> usize {
        self.tracks.len().div_ceil(self.page_size)
    }

    /// Absolute index of the first row on the current page.
    pub fn page_start(&self) -> usize {
        (self.current_page - 1) * self.page_size
    }

    /// The slice of tracks on the current page.
    pub fn page(&self) -> &[Track] {
        let start = self.page_start().min(self.tracks.len());
        let end = (start + self.page_size).min(self.tracks.len());
        &self.tracks[start..end]
    }

    /// Map a visible row (0-based) on the current page to a catalog index.
    /// `None` if the row is past the end of the page.
    pub fn select_row(&self, row: usize) -> Option<usize> {
        if row >= self.page_size {
            return None;
        }
        let index = self.page_start() + row;
        (index < self.tracks.len()).then_some(index)
    }

    /// Returns `true` if the page changed.
    pub fn next_page(&mut self) -> bool {
        if self.current_page < self.total_pages() {
            self.current_page += 1;
            true
        } else {
            false
        }
    }

    /// Returns `true` if the page changed.
    pub fn prev_page(&mut self) -> bool {
        if self.current_page > 1 {
            self.current_page -= 1;
            true
        } else {
            false
        }
    }

    /// Swap in a freshly fetched track list, but only if it differs from the
    /// one already held.  Returns `true` when the view was replaced and the
    /// table needs a rebuild.
    pub fn replace_if_changed(&mut self, tracks: Vec<Track>) -> bool {
        if self.tracks == tracks {
            return false;
        }
        self.tracks = tracks;
        self.current_page = 1;
        true
    }

    /// Case-insensitive substring search over title, artist and album.
    /// Destructive: matches replace the view.  An empty match set leaves the
    /// view as it was.
    pub fn search(&mut self, query: &str) -> SearchOutcome {
        let matches = filter_tracks(&self.tracks, query);
        if matches.is_empty() {
            return SearchOutcome::NoResults;
        }
        let count = matches.len();
        self.tracks = matches;
        self.current_page = 1;
        SearchOutcome::Replaced { matches: count }
    }
}

impl Default for CatalogView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

pub fn filter_tracks(tracks: &[Track], query: &str) -> Vec<Track> {
    let needle = query.to_lowercase();
    tracks.iter().filter(|t| t.matches(&needle)).cloned().collect()
}
