//! Per-session storage of the last successful search

use crate::SearchResult;
use tracing::debug;

/// Holds at most one search result for one user session.
///
/// Only a successful search writes here, so a failed search leaves the previous
/// result in place. There is no way to clear it.
#[derive(Debug, Clone, Default)]
pub struct SessionStore {
    current: Option<SearchResult>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace whatever result was held before
    pub fn put(&mut self, result: SearchResult) {
        debug!(
            flights = result.flights.len(),
            intent = result.intent.label(),
            replaced = self.current.is_some(),
            "Storing search result"
        );
        self.current = Some(result);
    }

    pub fn get(&self) -> Option<&SearchResult> {
        self.current.as_ref()
    }
}
