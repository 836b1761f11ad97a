//! Time-windowed coalescing of "file changed" work items.
//!
//! Editors often write a file several times per save. Every event refreshes
//! the path's deadline; a path is released once it has been quiet for the
//! whole window. Time is passed in, so this is deterministic under test.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    last_seen: HashMap<PathBuf, Instant>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_seen: HashMap::new(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record an event for `path` observed at `at`.
    pub fn push(&mut self, path: PathBuf, at: Instant) {
        let entry = self.last_seen.entry(path).or_insert(at);
        if at > *entry {
            *entry = at;
        }
    }

    /// Forget a path, e.g. because the file was deleted.
    pub fn cancel(&mut self, path: &PathBuf) {
        self.last_seen.remove(path);
    }

    /// Remove and return every path that has been quiet for a full window,
    /// sorted for stable processing order.
    pub fn drain_ready(&mut self, now: Instant) -> Vec<PathBuf> {
        let window = self.window;
        let mut ready: Vec<PathBuf> = self
            .last_seen
            .iter()
            .filter(|(_, seen)| now.saturating_duration_since(**seen) >= window)
            .map(|(path, _)| path.clone())
            .collect();
        for path in &ready {
            self.last_seen.remove(path);
        }
        ready.sort();
        ready
    }

    /// Earliest instant at which `drain_ready` will release something.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.last_seen.values().min().map(|seen| *seen + self.window)
    }

    pub fn is_empty(&self) -> bool {
        self.last_seen.is_empty()
    }

    pub fn len(&self) -> usize {
        self.last_seen.len()
    }
}
