//! Route navigator: the history the wizard moves through.

use super::runtime::NavigationIntent;

/// One history entry: a route and the back override it was pushed with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub route: String,
    pub back_override: Option<String>,
}

/// Host routing: push a route (with its one-time payload) or go back.
pub trait Navigator {
    fn push(&mut self, intent: &NavigationIntent);

    /// Pop the current entry. Returns `false` when there is nothing to go
    /// back to.
    fn go_back(&mut self) -> bool;

    fn current(&self) -> Option<&HistoryEntry>;

    /// The entry `go_back` would return to.
    fn previous(&self) -> Option<&HistoryEntry>;
}

/// In-memory browser-style history stack.
#[derive(Debug, Clone, Default)]
pub struct HistoryNavigator {
    entries: Vec<HistoryEntry>,
}

impl HistoryNavigator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all history.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl Navigator for HistoryNavigator {
    fn push(&mut self, intent: &NavigationIntent) {
        self.entries.push(HistoryEntry {
            route: intent.target_path.clone(),
            back_override: intent.back_override.clone(),
        });
    }

    fn go_back(&mut self) -> bool {
        if self.entries.len() < 2 {
            return false;
        }
        self.entries.pop();
        true
    }

    fn current(&self) -> Option<&HistoryEntry> {
        self.entries.last()
    }

    fn previous(&self) -> Option<&HistoryEntry> {
        self.entries.len().checked_sub(2).map(|i| &self.entries[i])
    }
}
