use std::collections::VecDeque;

use crate::image_source::ImageReference;

/// Number of recent images shown to the user.
pub const HISTORY_DISPLAY_LIMIT: usize = 6;

/// Most-recent-first list of selected images.
///
/// Two storage policies are available and read the same way through
/// [`HistoryStore::window`]:
/// - [`HistoryStore::new`] keeps every entry and only the view is windowed.
/// - [`HistoryStore::bounded`] keeps at most `capacity` entries and drops the
///   oldest one when a new entry arrives.
///
/// Entries are never deduplicated. Selecting an image that is already in the
/// history adds it to the front a second time.
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    entries: VecDeque<ImageReference>,
    capacity: Option<usize>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that never holds more than `capacity` entries.
    /// A capacity of zero is raised to one.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: Some(capacity),
        }
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Puts `reference` at the front of the history.
    pub fn record(&mut self, reference: ImageReference) {
        self.entries.push_front(reference);
        if let Some(capacity) = self.capacity {
            self.entries.truncate(capacity);
        }
    }

    /// Returns the `limit` most recent entries, newest first.
    pub fn window(&self, limit: usize) -> Vec<&ImageReference> {
        self.entries.iter().take(limit).collect()
    }

    pub fn get(&self, index: usize) -> Option<&ImageReference> {
        self.entries.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ImageReference> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
